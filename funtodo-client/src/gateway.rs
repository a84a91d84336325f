use std::time::Duration;

use chrono::{DateTime, Utc};
use funtodo_core::remote::{
    CreateTaskRequest, DeleteTaskRequest, MessageEnvelope, TaskEnvelope, TaskListEnvelope,
    ToggleDoneRequest, UpdateTaskRequest,
};
use funtodo_core::{RemoteTask, SyncError, Task, TaskId};

use crate::errors::ClientResult;

/// Remote calls are bounded so a dead server degrades like an unreachable
/// one instead of hanging the caller.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

/// Thin wrapper over the server's task endpoints: one method per operation,
/// no retry, no caching. Callers treat every `Err` as "server unavailable".
pub struct TaskGateway {
    http: reqwest::Client,
    base_url: String,
}

impl TaskGateway {
    /// `base_url` is the API root, e.g. `https://funtodo.example.com/api`.
    pub fn new(base_url: impl Into<String>) -> ClientResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn create(&self, user_id: &str, task: &Task) -> ClientResult<RemoteTask> {
        let body = CreateTaskRequest::from_task(user_id, task);
        let response = self
            .http
            .post(self.url("/tasks/create"))
            .json(&body)
            .send()
            .await?;

        let envelope: TaskEnvelope = ok_json(response).await?;
        Ok(envelope.task)
    }

    pub async fn list_by_user(&self, user_id: &str) -> ClientResult<Vec<RemoteTask>> {
        let response = self
            .http
            .get(self.url("/tasks/getByUserId"))
            .query(&[("userId", user_id)])
            .send()
            .await?;

        let envelope: TaskListEnvelope = ok_json(response).await?;
        Ok(envelope.tasks)
    }

    pub async fn update(&self, request: &UpdateTaskRequest) -> ClientResult<RemoteTask> {
        let response = self
            .http
            .put(self.url("/tasks/update"))
            .json(request)
            .send()
            .await?;

        let envelope: TaskEnvelope = ok_json(response).await?;
        Ok(envelope.task)
    }

    pub async fn remove(&self, task_id: &TaskId) -> ClientResult<()> {
        let body = DeleteTaskRequest {
            task_id: task_id.clone(),
        };
        let response = self
            .http
            .delete(self.url("/tasks/delete"))
            .json(&body)
            .send()
            .await?;

        let envelope: MessageEnvelope = ok_json(response).await?;
        tracing::debug!(task_id = %task_id, message = %envelope.message, "task deleted on server");
        Ok(())
    }

    pub async fn toggle_done(&self, task_id: &TaskId) -> ClientResult<RemoteTask> {
        let body = ToggleDoneRequest {
            task_id: task_id.clone(),
        };
        let response = self
            .http
            .put(self.url("/tasks/toggleIsDone"))
            .json(&body)
            .send()
            .await?;

        let envelope: TaskEnvelope = ok_json(response).await?;
        Ok(envelope.task)
    }

    /// Date moves reuse the update endpoint with only `dueDate` in the body;
    /// `None` clears the date (back to the Inbox).
    pub async fn move_task(
        &self,
        task_id: &TaskId,
        new_date: Option<DateTime<Utc>>,
    ) -> ClientResult<RemoteTask> {
        let request = UpdateTaskRequest {
            due_date: Some(new_date),
            ..UpdateTaskRequest::new(task_id.clone())
        };
        self.update(&request).await
    }
}

/// Check the status line, then parse the JSON body.
async fn ok_json<T: serde::de::DeserializeOwned>(response: reqwest::Response) -> ClientResult<T> {
    let status = response.status();
    if status.is_success() {
        Ok(response.json::<T>().await?)
    } else {
        Err(SyncError::Status(status.as_u16()).into())
    }
}
