//! Task events: vocabulary, non-blocking emitter and log gate.
//!
//! This module groups the event **data model**, the **emitter** the runner
//! publishes into, and the **logger** that turns log lines into `log` events.
//!
//! ## Contents
//! - [`EventKey`], [`Event`], [`EventValue`] closed, versioned event vocabulary
//! - [`Emitter`] drop-on-full wrapper over a bounded `tokio::sync::mpsc` queue
//! - [`TaskLogger`] per-severity gate computed once from the requested level
//!
//! ## Quick reference
//! - **Publishers**: `Runner` (lifecycle/progress/measurement events),
//!   `TaskLogger` (log events), experiment progress callbacks.
//! - **Consumer**: the host, through `Task::wait_for_next_event`.

mod emitter;
mod event;
mod logger;

pub use emitter::Emitter;
pub use event::{
    EmptyValue, EndValue, Event, EventKey, EventValue, FailureValue, GeoIpValue, LogValue,
    MeasurementValue, ProgressValue, ReportValue, ResolverValue,
};
pub use logger::TaskLogger;
