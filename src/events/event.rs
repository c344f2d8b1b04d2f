//! # Events emitted by a running task.
//!
//! The [`EventKey`] enum is the closed vocabulary of the host protocol. Keys fall into
//! these groups:
//! - **Lifecycle**: `status.queued`, `status.started`, `status.end`
//! - **Lookup**: `status.geoip_lookup`, `status.resolver_lookup` and their `failure.*` twins
//! - **Progress/report**: `status.progress`, `status.report_create`, `failure.report_create`
//! - **Per-target**: `status.measurement_start`, `measurement`, `failure.measurement`,
//!   `status.measurement_submission`, `failure.measurement_submission`, `status.measurement_done`
//! - **Other**: `failure.startup`, `log`, `task_terminated`
//!
//! Each key has exactly one payload shape ([`EventValue`]). The vocabulary is
//! additive-only: new keys may appear, existing payloads never change shape.
//!
//! ## Wire form
//! ```text
//! {"key": "status.progress", "value": {"percentage": 0.1, "message": "contacted bouncer"}}
//! ```
//!
//! ## Example
//! ```rust
//! use probetask::{Event, EventKey};
//!
//! let ev = Event::progress(0.3, "resolver lookup");
//! assert_eq!(ev.key, EventKey::StatusProgress);
//! assert_eq!(ev.key.as_str(), "status.progress");
//! ```

use std::fmt;

use serde::{Serialize, Serializer};

use crate::settings::LogLevel;

/// Classification of task events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKey {
    // === Lifecycle ===
    /// The task was accepted.
    StatusQueued,
    /// Settings were validated; bootstrap is starting.
    StatusStarted,
    /// Final event of every task, emitted exactly once.
    StatusEnd,

    // === Lookups ===
    /// Probe location facts are known.
    StatusGeoipLookup,
    /// Resolver facts are known.
    StatusResolverLookup,
    /// Probe IP lookup failed.
    FailureIpLookup,
    /// Probe ASN lookup failed.
    FailureAsnLookup,
    /// Probe country lookup failed.
    FailureCcLookup,
    /// Resolver lookup failed.
    FailureResolverLookup,

    // === Progress and report ===
    /// Progress update, percentage in `[0, 1]`.
    StatusProgress,
    /// A report was opened with the collector.
    StatusReportCreate,
    /// The collector refused to open a report.
    FailureReportCreate,

    // === Per-target ===
    /// Measurement of a target is starting.
    StatusMeasurementStart,
    /// Serialized measurement of a target.
    Measurement,
    /// Measuring a target failed.
    FailureMeasurement,
    /// The measurement was submitted.
    StatusMeasurementSubmission,
    /// The measurement could not be submitted.
    FailureMeasurementSubmission,
    /// Work on a target is finished.
    StatusMeasurementDone,

    // === Other ===
    /// Fatal failure before any measurement could start.
    FailureStartup,
    /// Log line.
    Log,
    /// Synthetic event returned to hosts polling a finished task.
    TaskTerminated,
}

impl EventKey {
    /// Returns the wire spelling of this key.
    pub const fn as_str(&self) -> &'static str {
        match self {
            EventKey::StatusQueued => "status.queued",
            EventKey::StatusStarted => "status.started",
            EventKey::StatusEnd => "status.end",
            EventKey::StatusGeoipLookup => "status.geoip_lookup",
            EventKey::StatusResolverLookup => "status.resolver_lookup",
            EventKey::FailureIpLookup => "failure.ip_lookup",
            EventKey::FailureAsnLookup => "failure.asn_lookup",
            EventKey::FailureCcLookup => "failure.cc_lookup",
            EventKey::FailureResolverLookup => "failure.resolver_lookup",
            EventKey::StatusProgress => "status.progress",
            EventKey::StatusReportCreate => "status.report_create",
            EventKey::FailureReportCreate => "failure.report_create",
            EventKey::StatusMeasurementStart => "status.measurement_start",
            EventKey::Measurement => "measurement",
            EventKey::FailureMeasurement => "failure.measurement",
            EventKey::StatusMeasurementSubmission => "status.measurement_submission",
            EventKey::FailureMeasurementSubmission => "failure.measurement_submission",
            EventKey::StatusMeasurementDone => "status.measurement_done",
            EventKey::FailureStartup => "failure.startup",
            EventKey::Log => "log",
            EventKey::TaskTerminated => "task_terminated",
        }
    }

    /// Returns true for `failure.*` keys.
    #[inline]
    pub fn is_failure(&self) -> bool {
        self.as_str().starts_with("failure.")
    }

    /// Returns true for `log`.
    #[inline]
    pub fn is_log(&self) -> bool {
        matches!(self, EventKey::Log)
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventKey {
    fn serialize<S: Serializer>(&self, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(self.as_str())
    }
}

/// Payload of `status.queued`, `status.started` and `task_terminated`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EmptyValue {}

/// Payload of `failure.startup`, lookup failures and `failure.report_create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FailureValue {
    pub failure: String,
}

/// Payload of `log`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LogValue {
    pub log_level: &'static str,
    pub message: String,
}

/// Payload of `status.progress`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ProgressValue {
    pub percentage: f64,
    pub message: String,
}

/// Payload of `status.geoip_lookup`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct GeoIpValue {
    pub probe_ip: String,
    pub probe_asn: String,
    pub probe_cc: String,
    pub probe_network_name: String,
}

/// Payload of `status.resolver_lookup`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ResolverValue {
    pub resolver_asn: String,
    pub resolver_ip: String,
    pub resolver_network_name: String,
}

/// Payload of `status.report_create`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReportValue {
    pub report_id: String,
}

/// Payload shared by all per-target events.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MeasurementValue {
    pub idx: i64,
    pub input: String,
    pub json_str: String,
    pub failure: String,
}

/// Payload of `status.end`.
///
/// Accumulated during the run and emitted once by the teardown step.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EndValue {
    pub downloaded_kb: f64,
    pub uploaded_kb: f64,
    pub failure: String,
}

/// Typed payload of an [`Event`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum EventValue {
    Empty(EmptyValue),
    Failure(FailureValue),
    Log(LogValue),
    Progress(ProgressValue),
    GeoIp(GeoIpValue),
    Resolver(ResolverValue),
    Report(ReportValue),
    Measurement(MeasurementValue),
    End(EndValue),
}

/// Immutable `(key, payload)` pair delivered to the host.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    /// Event classification.
    pub key: EventKey,
    /// Payload whose shape is fixed by `key`.
    pub value: EventValue,
}

impl Event {
    /// Creates an event with an empty payload.
    #[inline]
    pub fn empty(key: EventKey) -> Self {
        Self {
            key,
            value: EventValue::Empty(EmptyValue {}),
        }
    }

    /// Creates a `failure.*` event carrying `failure`.
    #[inline]
    pub fn failure(key: EventKey, failure: impl Into<String>) -> Self {
        debug_assert!(key.is_failure(), "{key} is not a failure key");
        Self {
            key,
            value: EventValue::Failure(FailureValue {
                failure: failure.into(),
            }),
        }
    }

    /// Creates a `log` event.
    #[inline]
    pub fn log(level: LogLevel, message: impl Into<String>) -> Self {
        Self {
            key: EventKey::Log,
            value: EventValue::Log(LogValue {
                log_level: level.as_str(),
                message: message.into(),
            }),
        }
    }

    /// Creates a `status.progress` event; the percentage is clamped into `[0, 1]`.
    #[inline]
    pub fn progress(percentage: f64, message: impl Into<String>) -> Self {
        let percentage = if percentage.is_nan() {
            0.0
        } else {
            percentage.clamp(0.0, 1.0)
        };
        Self {
            key: EventKey::StatusProgress,
            value: EventValue::Progress(ProgressValue {
                percentage,
                message: message.into(),
            }),
        }
    }

    /// Creates a `status.geoip_lookup` event.
    #[inline]
    pub fn geoip(value: GeoIpValue) -> Self {
        Self {
            key: EventKey::StatusGeoipLookup,
            value: EventValue::GeoIp(value),
        }
    }

    /// Creates a `status.resolver_lookup` event.
    #[inline]
    pub fn resolver(value: ResolverValue) -> Self {
        Self {
            key: EventKey::StatusResolverLookup,
            value: EventValue::Resolver(value),
        }
    }

    /// Creates a `status.report_create` event.
    #[inline]
    pub fn report_create(report_id: impl Into<String>) -> Self {
        Self {
            key: EventKey::StatusReportCreate,
            value: EventValue::Report(ReportValue {
                report_id: report_id.into(),
            }),
        }
    }

    /// Creates a per-target event for target `idx`.
    ///
    /// Attach the serialized measurement or the failure with
    /// [`with_json`](Self::with_json) / [`with_failure`](Self::with_failure).
    #[inline]
    pub fn target(key: EventKey, idx: usize, input: impl Into<String>) -> Self {
        Self {
            key,
            value: EventValue::Measurement(MeasurementValue {
                idx: i64::try_from(idx).unwrap_or(i64::MAX),
                input: input.into(),
                ..Default::default()
            }),
        }
    }

    /// Attaches a serialized measurement to a per-target event.
    #[inline]
    pub fn with_json(mut self, json: impl Into<String>) -> Self {
        if let EventValue::Measurement(v) = &mut self.value {
            v.json_str = json.into();
        }
        self
    }

    /// Attaches a failure string to a per-target event.
    #[inline]
    pub fn with_failure(mut self, failure: impl Into<String>) -> Self {
        if let EventValue::Measurement(v) = &mut self.value {
            v.failure = failure.into();
        }
        self
    }

    /// Creates the `status.end` event.
    #[inline]
    pub fn end(value: EndValue) -> Self {
        Self {
            key: EventKey::StatusEnd,
            value: EventValue::End(value),
        }
    }

    /// Creates the synthetic `task_terminated` event.
    #[inline]
    pub fn task_terminated() -> Self {
        Self::empty(EventKey::TaskTerminated)
    }

    /// Serializes the event to its JSON wire form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn wire(ev: &Event) -> serde_json::Value {
        serde_json::from_str(&ev.to_json().unwrap()).unwrap()
    }

    #[test]
    fn test_empty_payload_is_an_object() {
        assert_eq!(
            wire(&Event::empty(EventKey::StatusQueued)),
            json!({"key": "status.queued", "value": {}})
        );
    }

    #[test]
    fn test_per_target_payload_shape() {
        let ev = Event::target(EventKey::Measurement, 2, "https://x.org/").with_json("{}");
        assert_eq!(
            wire(&ev),
            json!({
                "key": "measurement",
                "value": {"idx": 2, "input": "https://x.org/", "json_str": "{}", "failure": ""}
            })
        );
    }

    #[test]
    fn test_progress_is_clamped() {
        let EventValue::Progress(p) = Event::progress(1.7, "x").value else {
            panic!("not a progress payload");
        };
        assert_eq!(p.percentage, 1.0);
        let EventValue::Progress(p) = Event::progress(f64::NAN, "x").value else {
            panic!("not a progress payload");
        };
        assert_eq!(p.percentage, 0.0);
    }

    #[test]
    fn test_failure_keys() {
        assert!(EventKey::FailureStartup.is_failure());
        assert!(EventKey::FailureMeasurementSubmission.is_failure());
        assert!(!EventKey::StatusMeasurementSubmission.is_failure());
        assert!(!EventKey::Log.is_failure());
    }

    #[test]
    fn test_end_payload_shape() {
        let ev = Event::end(EndValue {
            downloaded_kb: 10.0,
            uploaded_kb: 4.0,
            failure: String::new(),
        });
        assert_eq!(
            wire(&ev),
            json!({
                "key": "status.end",
                "value": {"downloaded_kb": 10.0, "uploaded_kb": 4.0, "failure": ""}
            })
        );
    }
}
