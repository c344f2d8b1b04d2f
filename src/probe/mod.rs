//! # Collaborator capabilities consumed by the runner.
//!
//! The runner never talks to the network itself. Everything it needs is expressed as
//! narrow, object-safe traits so that hosts plug in a real engine and tests plug in
//! deterministic fakes.
//!
//! ```text
//! SessionBuilder ──► Session ──► ExperimentBuilder ──┬──► Experiment
//!   (new_session)   (lookups)    (policy, callbacks) └──► TargetLoader
//! ```
//!
//! Supporting types:
//! - [`SessionConfig`], [`ProbeService`], [`ProbeLocation`] session inputs/outputs
//! - [`Target`], [`Measurement`], [`InputPolicy`] experiment data
//! - [`KeyValueStore`], [`FsKeyValueStore`] persistent state handed to the session
//! - [`ProxyUrl`] validated proxy setting

mod experiment;
mod kvstore;
mod proxy;
mod session;
mod target;

pub use experiment::{Experiment, ExperimentBuilder, ExperimentCallbacks, Measurement};
pub use kvstore::{FsKeyValueStore, KeyValueStore};
pub use proxy::ProxyUrl;
pub use session::{ProbeLocation, ProbeService, Session, SessionBuilder, SessionConfig};
pub use target::{InputPolicy, StaticTargetLoader, Target, TargetLoader, TargetLoaderConfig};
