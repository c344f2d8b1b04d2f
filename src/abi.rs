//! # Handle-based API for foreign hosts.
//!
//! [`TaskArena`] exposes the task lifecycle through integer handles and JSON
//! strings, the shape a C or mobile binding needs. Each call maps onto a
//! [`Task`] method:
//!
//! ```text
//! task_start(settings_json)            -> handle (0 on failure)
//! task_wait_for_next_event(h, ms)      -> event JSON | None
//! task_is_done(h)                      -> bool
//! task_interrupt(h)
//! task_free(h)
//! ```
//!
//! ## Rules
//! - Invalid or stale handles are tolerated: `is_done` reports true, `wait`
//!   returns `None`, `interrupt` and `free` do nothing.
//! - A negative timeout waits forever.
//! - Waiting on a finished task yields a synthetic `task_terminated` event.
//! - `task_free` removes the handle first and releases the task outside the
//!   table lock; it returns once the runner exited.

use std::sync::Arc;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::core::{Handle, HandleTable, INVALID_HANDLE, Task};
use crate::events::Event;
use crate::probe::SessionBuilder;

/// Owns every task started through the handle API.
pub struct TaskArena {
    tasks: HandleTable<Task>,
    sessions: Arc<dyn SessionBuilder>,
    config: EngineConfig,
}

impl TaskArena {
    pub fn new(sessions: Arc<dyn SessionBuilder>) -> Self {
        Self::with_config(sessions, EngineConfig::default())
    }

    pub fn with_config(sessions: Arc<dyn SessionBuilder>, config: EngineConfig) -> Self {
        Self {
            tasks: HandleTable::new(config.max_handles_clamped()),
            sessions,
            config,
        }
    }

    /// Starts a task; returns [`INVALID_HANDLE`] if the settings cannot be
    /// parsed or no handle is available.
    pub fn task_start(&self, settings: &str) -> Handle {
        match Task::start_with_config(settings, Arc::clone(&self.sessions), self.config.clone()) {
            Ok(task) => self.tasks.insert(task),
            Err(e) => {
                tracing::warn!(error = %e, label = e.as_label(), "cannot start task");
                INVALID_HANDLE
            }
        }
    }

    /// Waits for the next event of `handle` and returns it as JSON.
    pub fn task_wait_for_next_event(&self, handle: Handle, timeout_ms: i64) -> Option<String> {
        let task = self.tasks.get(handle)?;
        let event = if task.is_done() {
            Event::task_terminated()
        } else {
            let timeout = u64::try_from(timeout_ms).ok().map(Duration::from_millis);
            task.wait_for_next_event(timeout)?
        };
        match event.to_json() {
            Ok(json) => Some(json),
            Err(e) => {
                tracing::error!(error = %e, key = %event.key, "cannot serialize event");
                None
            }
        }
    }

    pub fn task_is_done(&self, handle: Handle) -> bool {
        self.tasks.get(handle).is_none_or(|t| t.is_done())
    }

    pub fn task_interrupt(&self, handle: Handle) {
        if let Some(task) = self.tasks.get(handle) {
            task.interrupt();
        }
    }

    pub fn task_free(&self, handle: Handle) {
        if let Some(task) = self.tasks.remove(handle) {
            task.shutdown();
        }
    }

    /// Number of live handles.
    pub fn live(&self) -> usize {
        self.tasks.len()
    }
}

impl Drop for TaskArena {
    fn drop(&mut self) {
        for task in self.tasks.drain() {
            task.shutdown();
        }
    }
}

impl std::fmt::Debug for TaskArena {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskArena")
            .field("tasks", &self.tasks)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
