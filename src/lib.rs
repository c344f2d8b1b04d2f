//! # probetask
//!
//! **probetask** runs one network measurement experiment per task and streams its
//! lifecycle to a host as a sequence of typed events.
//!
//! The engine itself performs no measurement: sessions, experiments and target
//! loading are injected through the capability traits in [`probe`]. What the crate
//! owns is the run state machine, cancellation, deadlines, progress accounting and
//! the host-facing lifecycle.
//!
//! ## Architecture
//! ```text
//!   host thread(s)                         task runtime (1 worker per task)
//! ┌──────────────────────┐               ┌───────────────────────────────────┐
//! │ TaskArena (handles)  │               │ Runner                            │
//! │  └─ Task             │── spawn ─────►│  ├─ SessionBuilder → Session      │
//! │      ├─ wait ◄───────┼── bounded ────┤  ├─ ExperimentBuilder             │
//! │      ├─ interrupt ───┼── cancel ────►│  │    ├─ TargetLoader             │
//! │      └─ free/drop    │   queue       │  │    └─ Experiment               │
//! └──────────────────────┘               │  └─ Emitter (drop-on-full)        │
//!                                        └───────────────────────────────────┘
//! ```
//!
//! ### Event stream
//! ```text
//! status.queued → status.started → progress/geoip/resolver → report_create
//!   → per target: measurement_start … measurement_done
//!   → status.end                      (always last, exactly once)
//! ```
//!
//! ## Features
//! | Area              | Description                                               | Key types                              |
//! |-------------------|-----------------------------------------------------------|----------------------------------------|
//! | **Lifecycle**     | Start, wait, interrupt and free a run.                    | [`Task`]                               |
//! | **Handles**       | Integer-handle API for foreign hosts.                     | [`TaskArena`], [`HandleTable`]         |
//! | **Events**        | Typed events with a stable JSON wire form.                | [`Event`], [`EventKey`], [`Emitter`]   |
//! | **Collaborators** | Session and experiment capabilities.                      | [`SessionBuilder`], [`Experiment`]     |
//! | **Settings**      | Host-provided run description.                            | [`Settings`], [`LogLevel`]             |
//! | **Configuration** | Engine-side knobs.                                        | [`EngineConfig`]                       |
//! | **Errors**        | Typed errors for start-up and collaborators.              | [`StartError`], [`ProbeError`]         |
//!
//! ## Example
//! ```no_run
//! use std::sync::Arc;
//! use probetask::{SessionBuilder, Task};
//!
//! fn run(sessions: Arc<dyn SessionBuilder>) -> Result<(), probetask::StartError> {
//!     let task = Task::start(
//!         r#"{"name":"Example","log_level":"INFO","state_dir":"/tmp/state","version":1}"#,
//!         sessions,
//!     )?;
//!     while !task.is_done() {
//!         if let Some(ev) = task.wait_for_next_event(None) {
//!             println!("{}", ev.key);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
mod abi;
mod config;
mod core;
mod error;
mod events;
pub mod probe;
mod settings;

#[cfg(test)]
mod testing;

// ---- Public re-exports ----

pub use abi::TaskArena;
pub use config::{BOOTSTRAP_PROGRESS, EngineConfig, MEASUREMENT_PROGRESS};
pub use crate::core::{Handle, HandleTable, INVALID_HANDLE, MAX_HANDLE, Runner, Task};
pub use error::{ProbeError, StartError};
pub use events::{
    EmptyValue, Emitter, EndValue, Event, EventKey, EventValue, FailureValue, GeoIpValue,
    LogValue, MeasurementValue, ProgressValue, ReportValue, ResolverValue, TaskLogger,
};
pub use probe::{
    Experiment, ExperimentBuilder, ExperimentCallbacks, InputPolicy, Measurement, ProbeLocation,
    Session, SessionBuilder, SessionConfig, Target, TargetLoader,
};
pub use settings::{ABI_VERSION, LogLevel, Settings, SettingsOptions};
