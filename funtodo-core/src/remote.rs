//! Wire types for the task server's REST endpoints.

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use serde::{de, Deserialize, Deserializer, Serialize};

use crate::models::{Task, TaskId};

/// A task as the server speaks it. Older server builds send `date`/`isDone`
/// where newer ones send `dueDate`/`completed`; both spellings deserialize.
/// `title` is the only required field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteTask {
    #[serde(
        default,
        deserialize_with = "remote_id",
        skip_serializing_if = "Option::is_none"
    )]
    pub id: Option<TaskId>,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default, alias = "date")]
    pub due_date: Option<String>,
    #[serde(default, alias = "isDone")]
    pub completed: bool,
    // Ordering is client-owned; read back if the server echoes it, never sent.
    #[serde(default, skip_serializing)]
    pub group_index: u32,
}

/// Accept task ids as either JSON strings or numbers; some backends use
/// serial row ids.
fn remote_id<'de, D>(deserializer: D) -> Result<Option<TaskId>, D::Error>
where
    D: Deserializer<'de>,
{
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Null => Ok(None),
        serde_json::Value::String(s) => Ok(Some(TaskId::from(s))),
        serde_json::Value::Number(n) => Ok(Some(TaskId::from(n.to_string()))),
        other => Err(de::Error::custom(format!(
            "task id must be a string or number, got {other}"
        ))),
    }
}

/// Parse the date formats the server and the assistant emit: RFC 3339
/// timestamps, `YYYY-MM-DD HH:MM:SS`, or a bare `YYYY-MM-DD`. Anything else
/// is treated as "no date" rather than an error.
pub fn parse_remote_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .map(|d| d.and_time(NaiveTime::MIN).and_utc())
}

/// `POST /tasks/create` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateTaskRequest {
    pub user_id: String,
    pub title: String,
    pub description: String,
    pub due_date: Option<DateTime<Utc>>,
    /// Accepted by the server but not part of the client entity.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<String>,
}

impl CreateTaskRequest {
    pub fn from_task(user_id: impl Into<String>, task: &Task) -> Self {
        Self {
            user_id: user_id.into(),
            title: task.name.clone(),
            description: task.description.clone(),
            due_date: task.date,
            priority: None,
        }
    }
}

/// `PUT /tasks/update` body. Absent fields stay untouched on the server;
/// `due_date` distinguishes "leave alone" (outer `None`, omitted from the
/// body) from "clear the date" (`Some(None)`, serialized as `null`).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskRequest {
    pub task_id: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_date: Option<Option<DateTime<Utc>>>,
}

impl UpdateTaskRequest {
    pub fn new(task_id: TaskId) -> Self {
        Self {
            task_id,
            title: None,
            description: None,
            completed: None,
            due_date: None,
        }
    }
}

/// `PUT /tasks/toggleIsDone` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleDoneRequest {
    pub task_id: TaskId,
}

/// `DELETE /tasks/delete` body.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTaskRequest {
    pub task_id: TaskId,
}

#[derive(Debug, Deserialize)]
pub struct TaskEnvelope {
    pub task: RemoteTask,
}

#[derive(Debug, Deserialize)]
pub struct TaskListEnvelope {
    pub tasks: Vec<RemoteTask>,
}

#[derive(Debug, Deserialize)]
pub struct MessageEnvelope {
    pub message: String,
}
