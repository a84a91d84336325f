use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::remote::{parse_remote_date, RemoteTask};

/// Opaque task identifier.
///
/// Client-created tasks get a random UUID string; once the server has
/// accepted a task, the server-assigned id (numeric on the wire for some
/// backends) takes its place.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(String);

impl TaskId {
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TaskId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TaskId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

/// Group membership key: all tasks on the same calendar day form one group,
/// undated tasks form the Inbox group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GroupKey {
    Inbox,
    Day(NaiveDate),
}

/// Normalize a task date to its group key.
///
/// Two dates map to the same key iff they fall on the same calendar day;
/// time-of-day is discarded before comparison.
pub fn group_key(date: Option<DateTime<Utc>>) -> GroupKey {
    match date {
        Some(d) => GroupKey::Day(d.date_naive()),
        None => GroupKey::Inbox,
    }
}

/// A task as the client holds it.
///
/// `group_index` is the zero-based position inside the task's date group and
/// defines drag-and-drop display order. Within a group the indices are a
/// dense permutation of `0..n`; the store maintains that on every mutation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Task {
    pub id: TaskId,
    pub name: String,
    pub description: String,
    pub date: Option<DateTime<Utc>>,
    pub is_done: bool,
    pub group_index: u32,
}

impl Task {
    /// New task with a fresh client-side id, not done, at group position 0.
    /// The store recomputes `group_index` when the task is inserted.
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        date: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: TaskId::random(),
            name: name.into(),
            description: description.into(),
            date,
            is_done: false,
            group_index: 0,
        }
    }

    pub fn group_key(&self) -> GroupKey {
        group_key(self.date)
    }

    /// Translate a server task into the client shape. The server says
    /// `title` where the client says `name`; a payload without an id gets a
    /// fresh client id. Unparseable date strings degrade to no date.
    pub fn from_remote(remote: &RemoteTask) -> Self {
        Self {
            id: remote.id.clone().unwrap_or_else(TaskId::random),
            name: remote.title.clone(),
            description: remote.description.clone(),
            date: remote.due_date.as_deref().and_then(parse_remote_date),
            is_done: remote.completed,
            group_index: remote.group_index,
        }
    }

    /// Inverse of [`Task::from_remote`]: the field set the server's
    /// create/update endpoints accept.
    pub fn to_remote(&self) -> RemoteTask {
        RemoteTask {
            id: Some(self.id.clone()),
            title: self.name.clone(),
            description: self.description.clone(),
            due_date: self.date.map(|d| d.to_rfc3339()),
            completed: self.is_done,
            group_index: self.group_index,
        }
    }
}
