//! Applies an assistant-proposed batch of task mutations.
//!
//! The assistant returns a structured action list which the user previews;
//! on approval this module replays it against the store in a fixed order:
//! all creates, then all updates, then all deletes, so an update or delete
//! can never race a create it depends on. Application is best-effort per
//! action: a missing update/delete target is skipped and counted, never
//! fatal to the rest of the batch.

use funtodo_core::remote::parse_remote_date;
use funtodo_core::{Task, TaskId};
use serde::{Deserialize, Deserializer};

use crate::store::{StoreOutcome, TaskEdit, TaskStore};

/// What to do with assistant-suggested dates, chosen once per batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DatePolicy {
    /// Schedule created tasks on the dates the assistant proposed.
    #[default]
    KeepSuggested,
    /// Ignore suggested dates; everything new lands in the Inbox.
    ForceInbox,
}

/// The `actions` object of an assistant response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ActionBatch {
    #[serde(default)]
    pub create: Vec<CreateAction>,
    #[serde(default)]
    pub update: Vec<UpdateAction>,
    #[serde(default)]
    pub delete: Vec<TaskId>,
}

impl ActionBatch {
    pub fn is_empty(&self) -> bool {
        self.create.is_empty() && self.update.is_empty() && self.delete.is_empty()
    }

    /// Number of proposed actions; what a preview dialog shows.
    pub fn len(&self) -> usize {
        self.create.len() + self.update.len() + self.delete.len()
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateAction {
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `YYYY-MM-DD`, or null for the Inbox.
    #[serde(default)]
    pub date: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateAction {
    pub id: TaskId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, alias = "isdone", alias = "isDone")]
    pub is_done: Option<bool>,
    /// Missing means leave the date alone; null moves the task to the Inbox.
    #[serde(default, deserialize_with = "double_option")]
    pub date: Option<Option<String>>,
}

/// Keep the missing/null distinction serde collapses by default.
fn double_option<'de, D>(deserializer: D) -> Result<Option<Option<String>>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<String>::deserialize(deserializer).map(Some)
}

/// Per-batch application tally. `skipped` counts update/delete entries whose
/// target id no longer exists.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyReport {
    pub created: usize,
    pub updated: usize,
    pub deleted: usize,
    pub skipped: usize,
}

impl ApplyReport {
    /// True when at least one action could not be applied.
    pub fn is_partial(&self) -> bool {
        self.skipped > 0
    }
}

/// Replay an approved batch against the store. Rejecting a batch simply
/// means never calling this.
pub async fn apply_actions(
    store: &TaskStore,
    batch: &ActionBatch,
    policy: DatePolicy,
) -> ApplyReport {
    let mut report = ApplyReport::default();

    for action in &batch.create {
        let date = match policy {
            DatePolicy::KeepSuggested => action.date.as_deref().and_then(parse_remote_date),
            DatePolicy::ForceInbox => None,
        };
        let task = Task::new(action.name.clone(), action.description.clone(), date);
        store.create_task(task).await;
        report.created += 1;
    }

    for action in &batch.update {
        let mut edit = TaskEdit::new(action.id.clone());
        edit.name = action.name.clone();
        edit.description = action.description.clone();
        edit.is_done = action.is_done;
        edit.date = match &action.date {
            None => None,
            Some(None) => Some(None),
            Some(Some(raw)) => match parse_remote_date(raw) {
                Some(date) => Some(Some(date)),
                None => {
                    tracing::warn!(task_id = %action.id, date = %raw, "unparseable date in update action, leaving date unchanged");
                    None
                }
            },
        };

        match store.edit_task(edit).await {
            StoreOutcome::NotFound => {
                tracing::warn!(task_id = %action.id, "update target not found, skipping");
                report.skipped += 1;
            }
            _ => report.updated += 1,
        }
    }

    for id in &batch.delete {
        match store.remove_task(id).await {
            StoreOutcome::NotFound => {
                tracing::warn!(task_id = %id, "delete target not found, skipping");
                report.skipped += 1;
            }
            _ => report.deleted += 1,
        }
    }

    report
}
