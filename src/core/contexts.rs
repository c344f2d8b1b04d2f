//! # Cancellation contexts of the measurement loop.
//!
//! The loop runs under two deadlines derived from the task's root token:
//!
//! ```text
//! root (interrupt) ──┬──► measuring   cancelled at max_runtime
//!                    └──► submitting  cancelled at max_runtime + submit_grace
//! ```
//!
//! ## Rules
//! - Both contexts are **children** of root: interrupting the task cancels both.
//! - Without a budget both contexts are plain children (no deadline).
//! - Dropping [`RunContexts`] cancels both contexts and releases their timers.

use std::time::Duration;

use tokio::time;
use tokio_util::sync::{CancellationToken, DropGuard};

/// Deadlines applied to the measurement loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Budget {
    pub measuring: Duration,
    pub submitting: Duration,
}

/// Measuring and submitting contexts for one run.
pub(crate) struct RunContexts {
    /// Gates starting (and, for interruptible experiments, continuing) measurements.
    pub measuring: CancellationToken,
    /// Bounds submissions; outlives `measuring` by the grace period.
    pub submitting: CancellationToken,
    _guards: [DropGuard; 2],
}

impl RunContexts {
    /// Derives both contexts from `root`. Must be called within a tokio runtime.
    pub fn new(root: &CancellationToken, budget: Option<Budget>) -> Self {
        let measuring = child_with_deadline(root, budget.map(|b| b.measuring));
        let submitting = child_with_deadline(root, budget.map(|b| b.submitting));
        Self {
            _guards: [measuring.clone().drop_guard(), submitting.clone().drop_guard()],
            measuring,
            submitting,
        }
    }
}

fn child_with_deadline(root: &CancellationToken, deadline: Option<Duration>) -> CancellationToken {
    let child = root.child_token();
    if let Some(after) = deadline {
        let token = child.clone();
        tokio::spawn(async move {
            tokio::select! {
                _ = time::sleep(after) => token.cancel(),
                _ = token.cancelled() => {}
            }
        });
    }
    child
}
