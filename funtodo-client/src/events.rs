//! Store change notifications.
//!
//! The store is the sole owner of task state; UI layers observe it through
//! callbacks registered here rather than polling. Callbacks run on the
//! mutating call's thread, after the local mutation has been applied.

use std::sync::Mutex;

use funtodo_core::{Task, TaskId};

use crate::errors::{ClientError, ClientResult};

/// Discriminant for filtered registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventType {
    TaskCreated,
    TaskUpdated,
    TaskRemoved,
    TasksLoaded,
    TasksReordered,
    OnlineChanged,
    StoreCleared,
}

/// A change that already happened to store state.
#[derive(Debug, Clone)]
pub enum StoreEvent {
    TaskCreated { task: Task },
    TaskUpdated { task: Task },
    TaskRemoved { id: TaskId },
    /// The whole collection was replaced (initial load or server fetch).
    TasksLoaded { count: usize },
    TasksReordered,
    OnlineChanged { is_online: bool },
    StoreCleared,
}

impl StoreEvent {
    pub fn event_type(&self) -> EventType {
        match self {
            StoreEvent::TaskCreated { .. } => EventType::TaskCreated,
            StoreEvent::TaskUpdated { .. } => EventType::TaskUpdated,
            StoreEvent::TaskRemoved { .. } => EventType::TaskRemoved,
            StoreEvent::TasksLoaded { .. } => EventType::TasksLoaded,
            StoreEvent::TasksReordered => EventType::TasksReordered,
            StoreEvent::OnlineChanged { .. } => EventType::OnlineChanged,
            StoreEvent::StoreCleared => EventType::StoreCleared,
        }
    }
}

struct CallbackEntry {
    callback: Box<dyn Fn(StoreEvent) + Send>,
    event_filter: Option<EventType>,
}

#[derive(Default)]
pub struct EventDispatcher {
    callbacks: Mutex<Vec<CallbackEntry>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a callback for every store event.
    pub fn register_callback<F>(&self, callback: F) -> ClientResult<()>
    where
        F: Fn(StoreEvent) + Send + 'static,
    {
        let mut callbacks = self
            .callbacks
            .lock()
            .map_err(|_| ClientError::LockError("event callbacks".into()))?;

        callbacks.push(CallbackEntry {
            callback: Box::new(callback),
            event_filter: None,
        });

        Ok(())
    }

    /// Register a callback that only sees events of one type.
    pub fn register_callback_filtered<F>(
        &self,
        callback: F,
        event_filter: EventType,
    ) -> ClientResult<()>
    where
        F: Fn(StoreEvent) + Send + 'static,
    {
        let mut callbacks = self
            .callbacks
            .lock()
            .map_err(|_| ClientError::LockError("event callbacks".into()))?;

        callbacks.push(CallbackEntry {
            callback: Box::new(callback),
            event_filter: Some(event_filter),
        });

        Ok(())
    }

    pub fn emit_task_created(&self, task: &Task) {
        self.emit(StoreEvent::TaskCreated { task: task.clone() });
    }

    pub fn emit_task_updated(&self, task: &Task) {
        self.emit(StoreEvent::TaskUpdated { task: task.clone() });
    }

    pub fn emit_task_removed(&self, id: &TaskId) {
        self.emit(StoreEvent::TaskRemoved { id: id.clone() });
    }

    pub fn emit_tasks_loaded(&self, count: usize) {
        self.emit(StoreEvent::TasksLoaded { count });
    }

    pub fn emit_tasks_reordered(&self) {
        self.emit(StoreEvent::TasksReordered);
    }

    pub fn emit_online_changed(&self, is_online: bool) {
        self.emit(StoreEvent::OnlineChanged { is_online });
    }

    pub fn emit_store_cleared(&self) {
        self.emit(StoreEvent::StoreCleared);
    }

    fn emit(&self, event: StoreEvent) {
        let callbacks = match self.callbacks.lock() {
            Ok(callbacks) => callbacks,
            Err(_) => {
                tracing::error!("failed to acquire callback lock for event emission");
                return;
            }
        };

        for entry in callbacks.iter() {
            if let Some(filter) = entry.event_filter {
                if filter != event.event_type() {
                    continue;
                }
            }
            (entry.callback)(event.clone());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn filtered_callback_only_sees_its_event_type() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        dispatcher
            .register_callback_filtered(
                move |_| {
                    counter.fetch_add(1, Ordering::SeqCst);
                },
                EventType::TaskRemoved,
            )
            .unwrap();

        dispatcher.emit_task_created(&Task::new("a", "", None));
        dispatcher.emit_tasks_reordered();
        assert_eq!(seen.load(Ordering::SeqCst), 0);

        dispatcher.emit_task_removed(&TaskId::random());
        assert_eq!(seen.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unfiltered_callback_sees_everything() {
        let dispatcher = EventDispatcher::new();
        let seen = Arc::new(AtomicUsize::new(0));

        let counter = seen.clone();
        dispatcher
            .register_callback(move |_| {
                counter.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();

        dispatcher.emit_online_changed(true);
        dispatcher.emit_store_cleared();
        dispatcher.emit_tasks_loaded(3);
        assert_eq!(seen.load(Ordering::SeqCst), 3);
    }
}
