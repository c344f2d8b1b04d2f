//! # Task settings supplied by the host.
//!
//! [`Settings`] is the immutable input of a run. Hosts pass it as a JSON document
//! to [`Task::start`](crate::Task::start); unknown fields are ignored so that newer
//! hosts can talk to older engines.
//!
//! ## Sentinel values
//! - `options.max_runtime <= 0` → no time budget for the measurement loop
//! - `proxy = ""` → no proxy
//! - `options.probe_services_base_url = ""` → use the default backends
//!
//! ## Example
//! ```rust
//! use probetask::{LogLevel, Settings};
//!
//! let settings = Settings::from_json(r#"{
//!     "name": "Example",
//!     "log_level": "INFO",
//!     "options": {"software_name": "demo", "software_version": "0.1.0", "max_runtime": 90},
//!     "state_dir": "/tmp/state",
//!     "version": 1
//! }"#).unwrap();
//!
//! assert_eq!(settings.log_level, LogLevel::Info);
//! assert_eq!(settings.options.max_runtime().unwrap().as_secs(), 90);
//! ```

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ProbeError, StartError};

/// Minimum settings version this engine understands.
pub const ABI_VERSION: i64 = 1;

/// Severity threshold requested by the host.
///
/// Ordered from the most verbose to the most restrictive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum LogLevel {
    #[serde(rename = "DEBUG2")]
    Debug2,
    #[serde(rename = "DEBUG")]
    Debug,
    #[serde(rename = "INFO")]
    Info,
    #[serde(rename = "WARNING")]
    Warning,
    #[default]
    #[serde(rename = "ERR")]
    Err,
}

impl LogLevel {
    /// Returns the wire spelling of this level.
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug2 => "DEBUG2",
            LogLevel::Debug => "DEBUG",
            LogLevel::Info => "INFO",
            LogLevel::Warning => "WARNING",
            LogLevel::Err => "ERR",
        }
    }
}

/// Experiment and engine options.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SettingsOptions {
    /// Name of the application embedding the engine.
    pub software_name: String,
    /// Version of the application embedding the engine.
    pub software_version: String,
    /// Budget for the measurement loop in seconds (`<= 0` disables it).
    pub max_runtime: f64,
    /// Skip report creation and submission entirely.
    pub no_collector: bool,
    /// Use this base URL instead of discovering backends.
    pub probe_services_base_url: String,
}

impl SettingsOptions {
    /// Returns the measurement budget as an `Option`.
    ///
    /// - `None` → unbounded
    /// - `Some(d)` → the loop stops starting new targets after `d`
    #[inline]
    pub fn max_runtime(&self) -> Option<Duration> {
        if self.max_runtime > 0.0 {
            Duration::try_from_secs_f64(self.max_runtime).ok()
        } else {
            None
        }
    }

    /// Returns the probe-services override, if any.
    #[inline]
    pub fn probe_services_override(&self) -> Option<&str> {
        Some(self.probe_services_base_url.as_str()).filter(|s| !s.is_empty())
    }
}

/// Input of a single run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Experiment name (e.g. `"Telegram"`).
    pub name: String,
    /// Run-level annotations copied into every measurement.
    pub annotations: BTreeMap<String, String>,
    /// Explicit targets; may be empty.
    pub inputs: Vec<String>,
    /// Experiment options.
    pub options: SettingsOptions,
    /// Requested log verbosity.
    pub log_level: LogLevel,
    /// Optional proxy URL (`psiphon:///`, `socks5://host:port/`, ...).
    pub proxy: String,
    /// Directory for the persistent key-value store.
    pub state_dir: String,
    /// Directory for temporary files.
    pub temp_dir: String,
    /// Directory for tunnel state.
    pub tunnel_dir: String,
    /// Settings ABI version; must be at least [`ABI_VERSION`].
    pub version: i64,
}

impl Settings {
    /// Parses settings from a JSON document.
    ///
    /// Only structural problems fail here; semantic validation happens inside the
    /// run so that it is reported as a `failure.startup` event.
    pub fn from_json(doc: &str) -> Result<Self, StartError> {
        Ok(serde_json::from_str(doc)?)
    }

    /// Checks that the engine supports this settings version.
    pub fn check_version(&self) -> Result<(), ProbeError> {
        if self.version < ABI_VERSION {
            return Err(ProbeError::InvalidVersion);
        }
        Ok(())
    }

    /// Returns the proxy setting, if any.
    #[inline]
    pub fn proxy(&self) -> Option<&str> {
        Some(self.proxy.as_str()).filter(|s| !s.is_empty())
    }
}
