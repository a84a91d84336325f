//! The task synchronization store: single owner of the in-memory task list
//! and its sync state.
//!
//! Every mutation applies locally (memory, then durable storage) before any
//! network call is issued, so the UI always reflects the latest user action
//! even when the server is slow or down. Server failures never roll local
//! state back; they surface as [`StoreOutcome::SyncFailed`] and a log line.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use funtodo_core::remote::UpdateTaskRequest;
use funtodo_core::{group_key, Task, TaskId};
use tokio::sync::Mutex as OpGate;

use crate::database::ClientDatabase;
use crate::errors::ClientResult;
use crate::events::EventDispatcher;
use crate::gateway::TaskGateway;

/// What happened to a store operation. Local application and server sync are
/// reported separately because the first can succeed while the second fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOutcome {
    /// Applied locally and confirmed by the server.
    Synced,
    /// Applied locally; no account, so no server call was made.
    LocalOnly,
    /// Applied locally; the server call failed and was logged.
    SyncFailed,
    /// No task with the given id; nothing changed.
    NotFound,
}

impl StoreOutcome {
    /// Whether the local collection changed.
    pub fn applied(self) -> bool {
        !matches!(self, StoreOutcome::NotFound)
    }
}

/// A partial edit addressed by task id. Only fields that are `Some` change.
///
/// `date` is three-state: `None` leaves the date alone, `Some(None)` moves
/// the task to the Inbox, `Some(Some(d))` schedules it on `d`.
#[derive(Debug, Clone)]
pub struct TaskEdit {
    pub id: TaskId,
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_done: Option<bool>,
    pub date: Option<Option<DateTime<Utc>>>,
}

impl TaskEdit {
    pub fn new(id: TaskId) -> Self {
        Self {
            id,
            name: None,
            description: None,
            is_done: None,
            date: None,
        }
    }
}

/// One entry of a drag-reorder gesture: a task and its new position within
/// its group.
#[derive(Debug, Clone)]
pub struct ReorderItem {
    pub id: TaskId,
    pub group_index: u32,
}

/// Result of merging pre-login local tasks into a server account.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MergeReport {
    pub merged: usize,
    pub failed: usize,
}

#[derive(Default)]
struct StoreState {
    tasks: Vec<Task>,
    user_id: Option<String>,
    is_online: bool,
}

pub struct TaskStore {
    db: ClientDatabase,
    gateway: TaskGateway,
    state: std::sync::Mutex<StoreState>,
    // Fair FIFO mutex: mutations run one at a time in submission order, each
    // completing its local portion (and persistence) before the next starts.
    // Readers take only the short-lived state lock and never wait on the
    // network.
    op_gate: OpGate<()>,
    events: Arc<EventDispatcher>,
    is_loading: AtomicBool,
}

impl TaskStore {
    pub fn new(db: ClientDatabase, gateway: TaskGateway) -> Self {
        Self {
            db,
            gateway,
            state: std::sync::Mutex::new(StoreState::default()),
            op_gate: OpGate::new(()),
            events: Arc::new(EventDispatcher::new()),
            is_loading: AtomicBool::new(false),
        }
    }

    /// Open local storage and the gateway in one step.
    pub async fn connect(database_url: &str, server_base_url: &str) -> ClientResult<Self> {
        let db = ClientDatabase::new(database_url).await?;
        db.init_schema().await?;
        let gateway = TaskGateway::new(server_base_url)?;
        Ok(Self::new(db, gateway))
    }

    pub fn events(&self) -> Arc<EventDispatcher> {
        self.events.clone()
    }

    fn state(&self) -> MutexGuard<'_, StoreState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// The account to sync against, if any. Mirrors the `isOnline && userId`
    /// guard every mutation applies before talking to the server.
    fn sync_target(&self) -> Option<String> {
        let state = self.state();
        if state.is_online {
            state.user_id.clone()
        } else {
            None
        }
    }

    /// Mirror the in-memory collection to durable storage. Best-effort: a
    /// storage failure is logged and the in-memory state stands.
    async fn persist_tasks(&self) {
        let snapshot = self.state().tasks.clone();
        if let Err(e) = self.db.save_tasks(&snapshot).await {
            tracing::warn!("failed to persist tasks to local storage: {e}");
        }
    }

    async fn load_local_snapshot(&self) -> Vec<Task> {
        match self.db.load_tasks().await {
            Ok(tasks) => tasks,
            Err(e) => {
                tracing::warn!("failed to load tasks from local storage: {e}");
                Vec::new()
            }
        }
    }

    /// Load the durable snapshot into memory. Called once at application
    /// bootstrap; calling it again is harmless because every mutation writes
    /// through to storage.
    pub async fn initialize(&self) {
        let _gate = self.op_gate.lock().await;

        let user_id = match self.db.load_user_id().await {
            Ok(id) => id,
            Err(e) => {
                tracing::warn!("failed to load stored user id: {e}");
                None
            }
        };
        let tasks = self.load_local_snapshot().await;
        let count = tasks.len();

        {
            let mut state = self.state();
            state.is_online = user_id.is_some();
            state.user_id = user_id;
            state.tasks = tasks;
        }
        self.events.emit_tasks_loaded(count);
    }

    /// Record (or clear) the authenticated account. Pure state transition
    /// plus persistence of the id; no network call.
    pub async fn set_user_id(&self, user_id: Option<String>) {
        let _gate = self.op_gate.lock().await;

        let is_online = user_id.is_some();
        let was_online;
        {
            let mut state = self.state();
            was_online = state.is_online;
            state.user_id = user_id.clone();
            state.is_online = is_online;
        }

        match &user_id {
            Some(id) => {
                if let Err(e) = self.db.save_user_id(id).await {
                    tracing::warn!("failed to persist user id: {e}");
                }
            }
            None => {
                if let Err(e) = self.db.clear_user_id().await {
                    tracing::warn!("failed to clear stored user id: {e}");
                }
            }
        }

        if was_online != is_online {
            self.events.emit_online_changed(is_online);
        }
    }

    /// Replace the collection from the server, or from local storage when
    /// anonymous. A server failure falls back to the local copy and flips
    /// the store offline; no error escapes this method.
    pub async fn load_tasks(&self, user_id: Option<&str>) -> StoreOutcome {
        let _gate = self.op_gate.lock().await;

        let Some(user_id) = user_id else {
            let tasks = self.load_local_snapshot().await;
            let count = tasks.len();
            {
                let mut state = self.state();
                state.tasks = tasks;
                state.is_online = false;
            }
            self.events.emit_tasks_loaded(count);
            return StoreOutcome::LocalOnly;
        };

        self.is_loading.store(true, Ordering::SeqCst);
        let outcome = match self.gateway.list_by_user(user_id).await {
            Ok(remote_tasks) => {
                let tasks: Vec<Task> = remote_tasks.iter().map(Task::from_remote).collect();
                let count = tasks.len();
                {
                    let mut state = self.state();
                    state.tasks = tasks;
                    state.user_id = Some(user_id.to_string());
                    state.is_online = true;
                }
                tracing::info!(count, "tasks loaded from server");
                self.events.emit_tasks_loaded(count);
                StoreOutcome::Synced
            }
            Err(e) => {
                tracing::warn!("failed to load tasks from server, falling back to local storage: {e}");
                let tasks = self.load_local_snapshot().await;
                let count = tasks.len();
                {
                    let mut state = self.state();
                    state.tasks = tasks;
                    state.is_online = false;
                }
                self.events.emit_tasks_loaded(count);
                StoreOutcome::SyncFailed
            }
        };
        self.is_loading.store(false, Ordering::SeqCst);
        outcome
    }

    /// Append a task to the end of its date group. The optimistic state is
    /// visible to readers (and persisted) before any network attempt; on
    /// server success the echoed task replaces the placeholder, capturing a
    /// server-assigned id but keeping the locally computed position.
    pub async fn create_task(&self, task: Task) -> StoreOutcome {
        let _gate = self.op_gate.lock().await;

        let mut task = task;
        {
            let mut state = self.state();
            let key = task.group_key();
            task.group_index = state
                .tasks
                .iter()
                .filter(|t| t.group_key() == key)
                .count() as u32;
            state.tasks.push(task.clone());
        }
        self.events.emit_task_created(&task);
        self.persist_tasks().await;

        let Some(user_id) = self.sync_target() else {
            tracing::debug!(task_id = %task.id, "no account, task saved locally only");
            return StoreOutcome::LocalOnly;
        };

        match self.gateway.create(&user_id, &task).await {
            Ok(remote) => {
                let mut accepted = Task::from_remote(&remote);
                // The server does not track ordering; adopting its default
                // would break the group's dense numbering.
                accepted.group_index = task.group_index;
                {
                    let mut state = self.state();
                    if let Some(slot) = state.tasks.iter_mut().find(|t| t.id == task.id) {
                        *slot = accepted.clone();
                    }
                }
                self.events.emit_task_updated(&accepted);
                self.persist_tasks().await;
                StoreOutcome::Synced
            }
            Err(e) => {
                tracing::warn!(task_id = %task.id, "failed to create task on server, keeping local copy: {e}");
                StoreOutcome::SyncFailed
            }
        }
    }

    /// Apply a partial edit by id. Only explicitly provided fields change,
    /// and the same partial field set goes to the server. An edit that moves
    /// the task to a different date group goes through the same relocation
    /// as [`TaskStore::move_task`] so group numbering stays dense.
    pub async fn edit_task(&self, edit: TaskEdit) -> StoreOutcome {
        let _gate = self.op_gate.lock().await;

        let updated = {
            let mut state = self.state();
            let Some(position) = state.tasks.iter().position(|t| t.id == edit.id) else {
                tracing::debug!(task_id = %edit.id, "edit target not found, skipping");
                return StoreOutcome::NotFound;
            };

            {
                let task = &mut state.tasks[position];
                if let Some(name) = &edit.name {
                    task.name = name.clone();
                }
                if let Some(description) = &edit.description {
                    task.description = description.clone();
                }
                if let Some(is_done) = edit.is_done {
                    task.is_done = is_done;
                }
            }

            if let Some(new_date) = edit.date {
                if group_key(new_date) != state.tasks[position].group_key() {
                    relocate(&mut state.tasks, &edit.id, new_date);
                } else {
                    state.tasks[position].date = new_date;
                }
            }

            state.tasks[position].clone()
        };
        self.events.emit_task_updated(&updated);
        self.persist_tasks().await;

        if self.sync_target().is_none() {
            return StoreOutcome::LocalOnly;
        }

        let request = UpdateTaskRequest {
            task_id: edit.id.clone(),
            title: edit.name,
            description: edit.description,
            completed: edit.is_done,
            due_date: edit.date,
        };
        match self.gateway.update(&request).await {
            Ok(_) => StoreOutcome::Synced,
            Err(e) => {
                tracing::warn!(task_id = %request.task_id, "failed to update task on server, keeping local copy: {e}");
                StoreOutcome::SyncFailed
            }
        }
    }

    /// Set the completion flag by id.
    pub async fn update_is_done(&self, task_id: &TaskId, value: bool) -> StoreOutcome {
        let _gate = self.op_gate.lock().await;

        let updated = {
            let mut state = self.state();
            let Some(task) = state.tasks.iter_mut().find(|t| &t.id == task_id) else {
                tracing::debug!(task_id = %task_id, "toggle target not found, skipping");
                return StoreOutcome::NotFound;
            };
            task.is_done = value;
            task.clone()
        };
        self.events.emit_task_updated(&updated);
        self.persist_tasks().await;

        if self.sync_target().is_none() {
            return StoreOutcome::LocalOnly;
        }

        match self.gateway.toggle_done(task_id).await {
            Ok(_) => StoreOutcome::Synced,
            Err(e) => {
                tracing::warn!(task_id = %task_id, "failed to toggle task on server, keeping local copy: {e}");
                StoreOutcome::SyncFailed
            }
        }
    }

    /// Remove by id, renumbering the surviving group members so the group
    /// stays a dense `0..n` permutation.
    pub async fn remove_task(&self, task_id: &TaskId) -> StoreOutcome {
        let _gate = self.op_gate.lock().await;

        {
            let mut state = self.state();
            let Some(position) = state.tasks.iter().position(|t| &t.id == task_id) else {
                tracing::debug!(task_id = %task_id, "delete target not found, skipping");
                return StoreOutcome::NotFound;
            };
            let removed = state.tasks.remove(position);
            let key = removed.group_key();
            for task in state.tasks.iter_mut() {
                if task.group_key() == key && task.group_index > removed.group_index {
                    task.group_index -= 1;
                }
            }
        }
        self.events.emit_task_removed(task_id);
        self.persist_tasks().await;

        if self.sync_target().is_none() {
            return StoreOutcome::LocalOnly;
        }

        match self.gateway.remove(task_id).await {
            Ok(()) => StoreOutcome::Synced,
            Err(e) => {
                tracing::warn!(task_id = %task_id, "failed to delete task on server, keeping local removal: {e}");
                StoreOutcome::SyncFailed
            }
        }
    }

    /// Reassign a task to the group for `new_date` (`None` = Inbox),
    /// appending at the destination's end and closing the gap left behind in
    /// the source group. The local move always stands, even when the server
    /// cannot be reached.
    pub async fn move_task(
        &self,
        task_id: &TaskId,
        new_date: Option<DateTime<Utc>>,
    ) -> StoreOutcome {
        let _gate = self.op_gate.lock().await;

        let moved = {
            let mut state = self.state();
            match relocate(&mut state.tasks, task_id, new_date) {
                Some(task) => task,
                None => {
                    tracing::debug!(task_id = %task_id, "move target not found, skipping");
                    return StoreOutcome::NotFound;
                }
            }
        };
        self.events.emit_task_updated(&moved);
        self.persist_tasks().await;

        if self.sync_target().is_none() {
            return StoreOutcome::LocalOnly;
        }

        match self.gateway.move_task(task_id, new_date).await {
            Ok(_) => StoreOutcome::Synced,
            Err(e) => {
                tracing::warn!(task_id = %task_id, "failed to move task on server, local move stands: {e}");
                StoreOutcome::SyncFailed
            }
        }
    }

    /// Apply a drag-reorder gesture: rewrite the listed tasks' positions,
    /// then keep the collection sorted by position. Ordering is client-side
    /// presentation state and is not sent to the server.
    pub async fn update_group_index(&self, items: &[ReorderItem]) -> StoreOutcome {
        let _gate = self.op_gate.lock().await;

        {
            let mut state = self.state();
            for item in items {
                if let Some(task) = state.tasks.iter_mut().find(|t| t.id == item.id) {
                    task.group_index = item.group_index;
                }
            }
            state.tasks.sort_by_key(|t| t.group_index);
        }
        self.events.emit_tasks_reordered();
        self.persist_tasks().await;

        StoreOutcome::LocalOnly
    }

    /// One-time push of pre-login local tasks into a freshly authenticated
    /// account. Tasks go up sequentially, in stored order, so append-style
    /// indices assigned at creation stay consistent. Local task storage is
    /// cleared after the attempt; tasks the server rejected are counted in
    /// the report rather than kept.
    pub async fn merge_local_tasks(&self, user_id: &str) -> MergeReport {
        let _gate = self.op_gate.lock().await;

        let local_tasks = self.load_local_snapshot().await;
        if local_tasks.is_empty() {
            tracing::debug!("no local tasks to merge");
            return MergeReport::default();
        }

        let mut report = MergeReport::default();
        for task in &local_tasks {
            match self.gateway.create(user_id, task).await {
                Ok(_) => {
                    tracing::debug!(task_name = %task.name, "local task merged");
                    report.merged += 1;
                }
                Err(e) => {
                    tracing::warn!(task_name = %task.name, "failed to merge local task: {e}");
                    report.failed += 1;
                }
            }
        }

        if let Err(e) = self.db.clear_tasks().await {
            tracing::warn!("failed to clear local tasks after merge: {e}");
        }

        report
    }

    /// Logout: drop all in-memory task state and both storage keys.
    pub async fn clear_tasks(&self) {
        let _gate = self.op_gate.lock().await;

        let was_online;
        {
            let mut state = self.state();
            was_online = state.is_online;
            state.tasks.clear();
            state.user_id = None;
            state.is_online = false;
        }
        if let Err(e) = self.db.clear_all().await {
            tracing::warn!("failed to clear local storage: {e}");
        }
        self.events.emit_store_cleared();
        if was_online {
            self.events.emit_online_changed(false);
        }
    }

    pub fn tasks(&self) -> Vec<Task> {
        self.state().tasks.clone()
    }

    pub fn task(&self, task_id: &TaskId) -> Option<Task> {
        self.state().tasks.iter().find(|t| &t.id == task_id).cloned()
    }

    pub fn user_id(&self) -> Option<String> {
        self.state().user_id.clone()
    }

    pub fn is_online(&self) -> bool {
        self.state().is_online
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading.load(Ordering::SeqCst)
    }
}

/// Move `task_id` to the group for `new_date`: append at the destination's
/// end (counting the destination without the moving task, so a same-group
/// move lands last) and decrement every other source-group task that sat
/// above the vacated position. Both groups end dense.
fn relocate(
    tasks: &mut [Task],
    task_id: &TaskId,
    new_date: Option<DateTime<Utc>>,
) -> Option<Task> {
    let position = tasks.iter().position(|t| &t.id == task_id)?;
    let old_key = tasks[position].group_key();
    let old_index = tasks[position].group_index;
    let new_key = group_key(new_date);

    let destination_len = tasks
        .iter()
        .filter(|t| t.group_key() == new_key && &t.id != task_id)
        .count() as u32;

    {
        let task = &mut tasks[position];
        task.date = new_date;
        task.group_index = destination_len;
    }

    for task in tasks.iter_mut() {
        if &task.id != task_id && task.group_key() == old_key && task.group_index > old_index {
            task.group_index -= 1;
        }
    }

    Some(tasks[position].clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn inbox_task(name: &str, group_index: u32) -> Task {
        Task {
            group_index,
            ..Task::new(name, "", None)
        }
    }

    #[test]
    fn relocate_closes_the_source_gap() {
        let day = Utc.with_ymd_and_hms(2025, 6, 1, 0, 0, 0).unwrap();
        let mut tasks = vec![
            inbox_task("a", 0),
            inbox_task("b", 1),
            inbox_task("c", 2),
            Task {
                group_index: 0,
                ..Task::new("d", "", Some(day))
            },
        ];

        let moved_id = tasks[0].id.clone();
        let moved = relocate(&mut tasks, &moved_id, Some(day)).unwrap();

        assert_eq!(moved.group_index, 1);
        let inbox: Vec<u32> = tasks
            .iter()
            .filter(|t| t.date.is_none())
            .map(|t| t.group_index)
            .collect();
        assert_eq!(inbox, vec![0, 1]);
    }

    #[test]
    fn relocate_within_the_same_group_moves_to_the_end() {
        let mut tasks = vec![inbox_task("a", 0), inbox_task("b", 1), inbox_task("c", 2)];

        let moved_id = tasks[0].id.clone();
        let moved = relocate(&mut tasks, &moved_id, None).unwrap();

        assert_eq!(moved.group_index, 2);
        let mut indices: Vec<u32> = tasks.iter().map(|t| t.group_index).collect();
        indices.sort_unstable();
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[test]
    fn relocate_unknown_id_is_a_no_op() {
        let mut tasks = vec![inbox_task("a", 0)];
        assert!(relocate(&mut tasks, &TaskId::random(), None).is_none());
        assert_eq!(tasks[0].group_index, 0);
    }
}
