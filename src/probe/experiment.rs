//! # Experiment capabilities.
//!
//! An [`ExperimentBuilder`] describes an experiment (input policy, interruptibility)
//! and creates the [`Experiment`] instance that measures targets, plus the
//! [`TargetLoader`] that decides which targets to measure.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::error::ProbeError;
use crate::probe::target::{InputPolicy, Target, TargetLoader, TargetLoaderConfig};

/// Receives progress reports from inside a running experiment.
pub trait ExperimentCallbacks: Send + Sync {
    /// `percentage` is the experiment's own progress in `[0, 1]`.
    fn on_progress(&self, percentage: f64, message: &str);
}

/// # Describes and instantiates one experiment.
pub trait ExperimentBuilder: Send + Sync {
    /// Installs the progress callbacks used by experiments created afterwards.
    fn set_callbacks(&self, callbacks: Arc<dyn ExperimentCallbacks>);

    /// How the experiment treats input.
    fn input_policy(&self) -> InputPolicy;

    /// Whether an in-flight [`Experiment::measure`] honors cancellation.
    fn interruptible(&self) -> bool;

    /// Creates a fresh experiment instance.
    fn new_experiment(&self) -> Box<dyn Experiment>;

    /// Creates the loader resolving the targets of this run.
    fn new_target_loader(&self, config: TargetLoaderConfig) -> Box<dyn TargetLoader>;
}

/// # Measures targets and submits results.
#[async_trait]
pub trait Experiment: Send + Sync {
    /// Opens a report with the collector.
    async fn open_report(&self, ctx: &CancellationToken) -> Result<(), ProbeError>;

    /// Identifier of the open report (empty if none).
    fn report_id(&self) -> String;

    /// Measures one target.
    async fn measure(
        &self,
        ctx: &CancellationToken,
        target: &Target,
    ) -> Result<Measurement, ProbeError>;

    /// Submits `measurement`, updating it with collector-assigned fields.
    async fn submit_and_update(
        &self,
        ctx: &CancellationToken,
        measurement: &mut Measurement,
    ) -> Result<(), ProbeError>;

    fn kibibytes_sent(&self) -> f64;

    fn kibibytes_received(&self) -> f64;
}

/// Result of measuring one target.
///
/// The engine treats the body as opaque; it only merges run-level annotations
/// and serializes the whole document into the `measurement` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Measurement {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
    /// Experiment-defined fields.
    #[serde(flatten)]
    pub body: serde_json::Map<String, serde_json::Value>,
}

impl Measurement {
    /// Merges `annotations` into the measurement; run-level values win.
    pub fn add_annotations(&mut self, annotations: &BTreeMap<String, String>) {
        self.annotations
            .extend(annotations.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    /// Serializes the measurement to JSON.
    pub fn to_json(&self) -> Result<String, ProbeError> {
        Ok(serde_json::to_string(self)?)
    }
}
