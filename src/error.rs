//! Error types used by the task engine and its collaborators.
//!
//! This module defines two main error enums:
//!
//! - [`StartError`] — structural failures that make [`Task::start`](crate::Task::start) itself fail.
//! - [`ProbeError`] — errors raised while a run is in progress (session construction,
//!   backend/location lookups, measurement, submission).
//!
//! A [`ProbeError`] never escapes a run: the runner converts it to its message and
//! embeds it into the matching `failure.*` event. Both types provide `as_label` for logs.

use std::io;

use thiserror::Error;

/// # Errors that prevent a task from being created at all.
///
/// Everything that can be reported as an event is deferred to the runner; only
/// input that cannot even be parsed, or a missing execution environment, ends up here.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StartError {
    /// The settings document is not valid JSON or does not match the schema.
    #[error("invalid settings: {0}")]
    InvalidSettings(#[from] serde_json::Error),

    /// The dedicated runtime for the task could not be built.
    #[error("cannot build task runtime: {0}")]
    Runtime(#[source] io::Error),
}

impl StartError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use probetask::StartError;
    ///
    /// let err = StartError::from(serde_json::from_str::<u8>("{").unwrap_err());
    /// assert_eq!(err.as_label(), "start_invalid_settings");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            StartError::InvalidSettings(_) => "start_invalid_settings",
            StartError::Runtime(_) => "start_runtime",
        }
    }
}

/// # Errors produced during a measurement run.
///
/// Returned by the collaborator traits in [`probe`](crate::probe) and by session construction.
/// The `Display` output is what ends up in the `failure` field of emitted events.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ProbeError {
    /// `Settings::version` is below the supported ABI version.
    #[error("invalid Settings.Version number")]
    InvalidVersion,

    /// No state directory was configured.
    #[error("empty state dir")]
    EmptyStateDir,

    /// The state directory cannot be created or written.
    #[error("state dir {path}: {source}")]
    StateDir {
        /// Offending path.
        path: String,
        /// Underlying I/O failure.
        #[source]
        source: io::Error,
    },

    /// The proxy setting is not a usable URL.
    #[error("invalid proxy URL {url:?}: {reason}")]
    InvalidProxy {
        /// Raw value from the settings.
        url: String,
        /// Why it was rejected.
        reason: &'static str,
    },

    /// No experiment is registered under the requested name.
    #[error("no such experiment: {0}")]
    UnknownExperiment(String),

    /// The experiment needs input and none was provided.
    #[error("no input provided")]
    NoInput,

    /// The experiment takes no input but some was provided.
    #[error("experiment does not accept input")]
    InputNotAccepted,

    /// The experiment has no static default input list.
    #[error("no default static input for this experiment")]
    NoStaticInput,

    /// Backend discovery failed.
    #[error("backend lookup failed: {0}")]
    Backend(String),

    /// Probe location discovery failed.
    #[error("location lookup failed: {0}")]
    Location(String),

    /// The collector refused to open a report.
    #[error("cannot open report: {0}")]
    Report(String),

    /// A single measurement failed.
    #[error("{0}")]
    Measurement(String),

    /// A measurement could not be submitted.
    #[error("{0}")]
    Submission(String),

    /// A measurement could not be serialized.
    #[error("cannot serialize measurement: {0}")]
    Serialize(#[from] serde_json::Error),

    /// The operation observed cancellation of its context.
    #[error("interrupted")]
    Canceled,

    /// Anything else reported by a collaborator.
    #[error("{0}")]
    Other(String),
}

impl ProbeError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use probetask::ProbeError;
    ///
    /// assert_eq!(ProbeError::NoInput.as_label(), "probe_no_input");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ProbeError::InvalidVersion => "probe_invalid_version",
            ProbeError::EmptyStateDir => "probe_empty_state_dir",
            ProbeError::StateDir { .. } => "probe_state_dir",
            ProbeError::InvalidProxy { .. } => "probe_invalid_proxy",
            ProbeError::UnknownExperiment(_) => "probe_unknown_experiment",
            ProbeError::NoInput => "probe_no_input",
            ProbeError::InputNotAccepted => "probe_input_not_accepted",
            ProbeError::NoStaticInput => "probe_no_static_input",
            ProbeError::Backend(_) => "probe_backend",
            ProbeError::Location(_) => "probe_location",
            ProbeError::Report(_) => "probe_report",
            ProbeError::Measurement(_) => "probe_measurement",
            ProbeError::Submission(_) => "probe_submission",
            ProbeError::Serialize(_) => "probe_serialize",
            ProbeError::Canceled => "probe_canceled",
            ProbeError::Other(_) => "probe_other",
        }
    }
}
