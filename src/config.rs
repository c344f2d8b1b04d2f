//! # Engine configuration.
//!
//! Provides [`EngineConfig`] centralized knobs for the task engine that are owned by
//! the Rust side rather than by the host's [`Settings`](crate::Settings).
//!
//! Config is used in two ways:
//! 1. **Task creation**: `Task::start_with_config(doc, sessions, config)`
//! 2. **Arena creation**: `TaskArena::with_config(sessions, config)`
//!
//! ## Sentinel values
//! - `queue_capacity = 0` → clamped to 1
//! - `submit_grace = 0s` → submissions share the measuring deadline

use std::time::Duration;

/// Fraction of the progress range consumed by bootstrap (lookups and report creation).
pub const BOOTSTRAP_PROGRESS: f64 = 0.4;

/// Fraction of the progress range left for the measurement loop.
pub const MEASUREMENT_PROGRESS: f64 = 1.0 - BOOTSTRAP_PROGRESS;

/// Global configuration for the task engine.
///
/// ## Field semantics
/// - `queue_capacity`: Event queue slots per task (min 1; events beyond it are dropped)
/// - `submit_grace`: Extra time granted to submissions past the measuring budget
/// - `max_handles`: Upper bound of live handles in a [`TaskArena`](crate::TaskArena)
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Capacity of the per-task event queue.
    ///
    /// The runner never blocks on a full queue: the event is discarded. Terminal
    /// events rely on this slack to survive a host that does not drain.
    pub queue_capacity: usize,

    /// Grace period added to `max_runtime` for the submitting context.
    ///
    /// Keeps the last in-flight submission alive after the measuring deadline
    /// stopped new measurements from starting.
    pub submit_grace: Duration,

    /// Maximum number of live handles in an arena.
    pub max_handles: usize,
}

impl EngineConfig {
    /// Returns a queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn queue_capacity_clamped(&self) -> usize {
        self.queue_capacity.max(1)
    }

    /// Returns the submitting budget for a given measuring budget.
    #[inline]
    pub fn submit_budget(&self, max_runtime: Duration) -> Duration {
        max_runtime.saturating_add(self.submit_grace)
    }

    /// Returns the handle limit clamped to a minimum of 1.
    #[inline]
    pub fn max_handles_clamped(&self) -> usize {
        self.max_handles.max(1)
    }
}

impl Default for EngineConfig {
    /// Default configuration:
    ///
    /// - `queue_capacity = 1024` (plenty for an ordinary run)
    /// - `submit_grace = 30s`
    /// - `max_handles = 1 << 20`
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
            submit_grace: Duration::from_secs(30),
            max_handles: 1 << 20,
        }
    }
}
