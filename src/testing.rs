//! Scripted collaborators for unit tests.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::core::Runner;
use crate::error::ProbeError;
use crate::events::{Emitter, Event, EventKey};
use crate::probe::{
    Experiment, ExperimentBuilder, ExperimentCallbacks, InputPolicy, Measurement, ProbeLocation,
    Session, SessionBuilder, SessionConfig, StaticTargetLoader, Target, TargetLoader,
    TargetLoaderConfig,
};
use crate::settings::{ABI_VERSION, LogLevel, Settings};

/// What the fakes should do at each step.
#[derive(Clone, Default)]
pub(crate) struct Script {
    pub session_error: Option<&'static str>,
    pub backends_error: Option<&'static str>,
    pub location_error: Option<&'static str>,
    pub unknown_experiment: bool,
    pub input_policy: InputPolicy,
    pub interruptible: bool,
    pub open_report_error: Option<&'static str>,
    pub measure_delay: Duration,
    pub failing_inputs: Vec<&'static str>,
    pub submit_error: Option<&'static str>,
    /// Cancelled as soon as a measurement starts.
    pub cancel_on_measure: Option<CancellationToken>,
    /// Reported through the experiment callbacks during each measurement.
    pub progress_on_measure: Option<f64>,
    pub panic_on_measure: bool,
    pub panic_on_close: bool,
    /// Inputs the target loader falls back to under `OrStaticDefault`.
    pub static_defaults: Vec<&'static str>,
}

/// Observations shared by all fakes of one run.
#[derive(Clone, Default)]
pub(crate) struct Probe {
    inner: Arc<ProbeInner>,
}

#[derive(Default)]
struct ProbeInner {
    measured: AtomicUsize,
    closed: AtomicBool,
    config: Mutex<Option<SessionConfig>>,
}

impl Probe {
    pub fn measured(&self) -> usize {
        self.inner.measured.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> bool {
        self.inner.closed.load(Ordering::SeqCst)
    }

    pub fn session_config(&self) -> Option<SessionConfig> {
        self.inner.config.lock().clone()
    }
}

pub(crate) struct FakeSessions {
    script: Arc<Script>,
    probe: Probe,
}

impl FakeSessions {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            probe: Probe::default(),
        }
    }

    pub fn probe(&self) -> Probe {
        self.probe.clone()
    }
}

#[async_trait]
impl SessionBuilder for FakeSessions {
    async fn new_session(
        &self,
        _ctx: &CancellationToken,
        config: SessionConfig,
    ) -> Result<Box<dyn Session>, ProbeError> {
        if let Some(msg) = self.script.session_error {
            return Err(ProbeError::Other(msg.into()));
        }
        *self.probe.inner.config.lock() = Some(config);
        Ok(Box::new(FakeSession {
            script: Arc::clone(&self.script),
            probe: self.probe.clone(),
        }))
    }
}

struct FakeSession {
    script: Arc<Script>,
    probe: Probe,
}

#[async_trait]
impl Session for FakeSession {
    async fn lookup_backends(&self, _ctx: &CancellationToken) -> Result<(), ProbeError> {
        match self.script.backends_error {
            Some(msg) => Err(ProbeError::Backend(msg.into())),
            None => Ok(()),
        }
    }

    async fn lookup_location(&self, _ctx: &CancellationToken) -> Result<(), ProbeError> {
        match self.script.location_error {
            Some(msg) => Err(ProbeError::Location(msg.into())),
            None => Ok(()),
        }
    }

    fn location(&self) -> ProbeLocation {
        ProbeLocation {
            probe_ip: "127.0.0.1".into(),
            probe_asn: "AS30722".into(),
            probe_cc: "IT".into(),
            probe_network_name: "Vodafone Italia S.p.A.".into(),
            resolver_asn: "AS15169".into(),
            resolver_ip: "8.8.8.8".into(),
            resolver_network_name: "Google LLC".into(),
        }
    }

    fn new_experiment_builder(&self, name: &str) -> Result<Box<dyn ExperimentBuilder>, ProbeError> {
        if self.script.unknown_experiment {
            return Err(ProbeError::UnknownExperiment(name.into()));
        }
        Ok(Box::new(FakeBuilder {
            script: Arc::clone(&self.script),
            probe: self.probe.clone(),
            callbacks: Mutex::new(None),
        }))
    }

    async fn close(&self) -> Result<(), ProbeError> {
        self.probe.inner.closed.store(true, Ordering::SeqCst);
        if self.script.panic_on_close {
            panic!("session close exploded");
        }
        Ok(())
    }
}

struct FakeBuilder {
    script: Arc<Script>,
    probe: Probe,
    callbacks: Mutex<Option<Arc<dyn ExperimentCallbacks>>>,
}

impl ExperimentBuilder for FakeBuilder {
    fn set_callbacks(&self, callbacks: Arc<dyn ExperimentCallbacks>) {
        *self.callbacks.lock() = Some(callbacks);
    }

    fn input_policy(&self) -> InputPolicy {
        self.script.input_policy
    }

    fn interruptible(&self) -> bool {
        self.script.interruptible
    }

    fn new_experiment(&self) -> Box<dyn Experiment> {
        Box::new(FakeExperiment {
            script: Arc::clone(&self.script),
            probe: self.probe.clone(),
            callbacks: self.callbacks.lock().clone(),
        })
    }

    fn new_target_loader(&self, config: TargetLoaderConfig) -> Box<dyn TargetLoader> {
        let defaults = self.script.static_defaults.iter().map(|s| s.to_string()).collect();
        Box::new(StaticTargetLoader::new(config).with_defaults(defaults))
    }
}

struct FakeExperiment {
    script: Arc<Script>,
    probe: Probe,
    callbacks: Option<Arc<dyn ExperimentCallbacks>>,
}

#[async_trait]
impl Experiment for FakeExperiment {
    async fn open_report(&self, _ctx: &CancellationToken) -> Result<(), ProbeError> {
        match self.script.open_report_error {
            Some(msg) => Err(ProbeError::Report(msg.into())),
            None => Ok(()),
        }
    }

    fn report_id(&self) -> String {
        "20240101T000000Z_example_IT_30722_n1_abcdef".into()
    }

    async fn measure(
        &self,
        ctx: &CancellationToken,
        target: &Target,
    ) -> Result<Measurement, ProbeError> {
        self.probe.inner.measured.fetch_add(1, Ordering::SeqCst);
        if let Some(root) = &self.script.cancel_on_measure {
            root.cancel();
        }
        if let (Some(pct), Some(cb)) = (self.script.progress_on_measure, &self.callbacks) {
            cb.on_progress(pct, "experiment progress");
        }
        if self.script.panic_on_measure {
            panic!("experiment exploded");
        }
        let delay = self.script.measure_delay;
        if !delay.is_zero() {
            if self.script.interruptible {
                tokio::select! {
                    _ = tokio::time::sleep(delay) => {}
                    _ = ctx.cancelled() => return Err(ProbeError::Canceled),
                }
            } else {
                tokio::time::sleep(delay).await;
            }
        }
        if self.script.failing_inputs.contains(&target.input.as_str()) {
            return Err(ProbeError::Measurement("generic_timeout_error".into()));
        }
        let mut m = Measurement::default();
        m.body.insert("input".into(), json!(target.input));
        m.body.insert("test_keys".into(), json!({"accessible": true}));
        Ok(m)
    }

    async fn submit_and_update(
        &self,
        ctx: &CancellationToken,
        measurement: &mut Measurement,
    ) -> Result<(), ProbeError> {
        if ctx.is_cancelled() {
            return Err(ProbeError::Canceled);
        }
        if let Some(msg) = self.script.submit_error {
            return Err(ProbeError::Submission(msg.into()));
        }
        measurement
            .body
            .insert("report_id".into(), json!(self.report_id()));
        Ok(())
    }

    fn kibibytes_sent(&self) -> f64 {
        1.0
    }

    fn kibibytes_received(&self) -> f64 {
        10.0
    }
}

/// Fresh per-test directory, removed when the guard drops.
pub(crate) fn scratch_dir(tag: &str) -> TempDir {
    tempfile::Builder::new()
        .prefix(&format!("probetask-{tag}-"))
        .tempdir()
        .unwrap()
}

/// Valid settings for experiment `name` rooted in a private scratch dir.
///
/// Keep the returned guard alive for as long as the run uses the directories.
pub(crate) fn settings_for(tag: &str, name: &str, inputs: &[&str]) -> (Settings, TempDir) {
    let dir = scratch_dir(tag);
    let root = dir.path();
    let mut settings = Settings {
        name: name.into(),
        inputs: inputs.iter().map(|s| s.to_string()).collect(),
        log_level: LogLevel::Info,
        state_dir: root.join("state").display().to_string(),
        temp_dir: root.join("tmp").display().to_string(),
        tunnel_dir: root.join("tunnel").display().to_string(),
        version: ABI_VERSION,
        ..Default::default()
    };
    settings.options.software_name = "probetask-tests".into();
    settings.options.software_version = "0.1.0".into();
    (settings, dir)
}

/// [`settings_for`] serialized as the host would send it.
pub(crate) fn settings_json(tag: &str, name: &str) -> (String, TempDir) {
    let (settings, dir) = settings_for(tag, name, &[]);
    (serde_json::to_string(&settings).unwrap(), dir)
}

pub(crate) async fn collect_run(settings: Settings, sessions: FakeSessions) -> Vec<Event> {
    collect_run_with(settings, sessions, CancellationToken::new()).await
}

/// Runs to completion under `root` and returns the retained non-log events.
pub(crate) async fn collect_run_with(
    settings: Settings,
    sessions: FakeSessions,
    root: CancellationToken,
) -> Vec<Event> {
    let (emitter, mut rx) = Emitter::channel(4096);
    Runner::new(settings, Arc::new(sessions), emitter, EngineConfig::default())
        .run(root)
        .await;
    let mut events = Vec::new();
    while let Ok(ev) = rx.try_recv() {
        if !ev.key.is_log() {
            events.push(ev);
        }
    }
    events
}

/// Event keys with log lines filtered out.
pub(crate) fn keys(events: &[Event]) -> Vec<EventKey> {
    events
        .iter()
        .map(|e| e.key)
        .filter(|k| !k.is_log())
        .collect()
}
