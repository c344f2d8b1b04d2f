//! Runtime core: run execution and task lifecycle.
//!
//! Internal modules:
//! - [`runner`]: drives one run through bootstrap and the measurement loop;
//! - [`contexts`]: measuring/submitting deadlines of the loop;
//! - [`task`]: host-facing lifecycle (start, wait, interrupt, free);
//! - [`handles`]: integer handles for foreign callers.

mod contexts;
mod handles;
mod runner;
mod task;

pub use handles::{Handle, HandleTable, INVALID_HANDLE, MAX_HANDLE};
pub use runner::Runner;
pub use task::Task;
