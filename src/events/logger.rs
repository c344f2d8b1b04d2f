//! # TaskLogger — log lines as events
//!
//! Turns log lines into `log` events on the task's [`Emitter`] and mirrors them to
//! `tracing` for process-local diagnostics.
//!
//! The gate is computed once from the requested [`LogLevel`]; suppressed severities
//! are never emitted at all.
//!
//! ```text
//! requested   debug  info  warning
//! DEBUG2        ✓     ✓      ✓
//! DEBUG         ✓     ✓      ✓
//! INFO                ✓      ✓
//! WARNING                    ✓
//! ERR
//! ```

use std::fmt::Display;

use crate::events::{Emitter, Event};
use crate::settings::LogLevel;

/// Per-severity log gate bound to one task.
#[derive(Clone, Debug)]
pub struct TaskLogger {
    emitter: Emitter,
    debug: bool,
    info: bool,
    warning: bool,
}

impl TaskLogger {
    /// Creates a logger for `level`.
    #[must_use]
    pub fn new(emitter: Emitter, level: LogLevel) -> Self {
        let (debug, info, warning) = match level {
            LogLevel::Debug2 | LogLevel::Debug => (true, true, true),
            LogLevel::Info => (false, true, true),
            LogLevel::Warning => (false, false, true),
            LogLevel::Err => (false, false, false),
        };
        Self {
            emitter,
            debug,
            info,
            warning,
        }
    }

    pub fn debug(&self, msg: impl Display) {
        if self.debug {
            let msg = msg.to_string();
            tracing::debug!("{msg}");
            self.emitter.emit(Event::log(LogLevel::Debug, msg));
        }
    }

    pub fn info(&self, msg: impl Display) {
        if self.info {
            let msg = msg.to_string();
            tracing::info!("{msg}");
            self.emitter.emit(Event::log(LogLevel::Info, msg));
        }
    }

    pub fn warn(&self, msg: impl Display) {
        if self.warning {
            let msg = msg.to_string();
            tracing::warn!("{msg}");
            self.emitter.emit(Event::log(LogLevel::Warning, msg));
        }
    }
}
