//! # Execute one measurement run.
//!
//! [`Runner`] drives a single run from validated settings to `status.end`, turning
//! every step into events on its [`Emitter`].
//!
//! ## Flow
//!
//! ```text
//! status.queued
//!   └► check version ──✗──► failure.startup
//! status.started
//!   └► new session ────✗──► failure.startup
//!   └► lookup backends ✗──► failure.startup          progress 0.1
//!   └► lookup location ✗──► failure.{ip,asn,cc,resolver}_lookup
//!                                                     progress 0.2, 0.3, geoip, resolver
//!   └► experiment builder / load targets ──✗──► failure.startup
//!   └► open report (unless no_collector) ──✗──► failure.report_create
//!                                                     progress 0.4, report_create
//!   └► for each target:
//!        measurement_start [progress] measurement|failure.measurement
//!        [measurement_submission|failure.measurement_submission] measurement_done
//! teardown: close session ─► status.end (always, exactly once)
//! ```
//!
//! ## Rules
//! - Exactly one `status.end`, always last; emitted even if a step panics.
//! - A bootstrap failure ends the run; a per-target failure does not.
//! - The loop stops starting targets once the measuring context is cancelled.
//! - Interruptible experiments measure under the measuring context; the rest run
//!   each measurement to completion.
//! - Submissions run under the submitting context.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use futures::FutureExt;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::{BOOTSTRAP_PROGRESS, EngineConfig, MEASUREMENT_PROGRESS};
use crate::core::contexts::{Budget, RunContexts};
use crate::error::ProbeError;
use crate::events::{EndValue, Emitter, Event, EventKey, GeoIpValue, ResolverValue, TaskLogger};
use crate::probe::{
    Experiment, ExperimentBuilder, ExperimentCallbacks, FsKeyValueStore, InputPolicy,
    ProbeService, ProxyUrl, Session, SessionBuilder, SessionConfig, Target, TargetLoaderConfig,
};
use crate::settings::Settings;

/// Lookup failures reported when location discovery fails.
const LOCATION_FAILURES: [EventKey; 4] = [
    EventKey::FailureIpLookup,
    EventKey::FailureAsnLookup,
    EventKey::FailureCcLookup,
    EventKey::FailureResolverLookup,
];

/// Inflation applied to `max_runtime` when estimating time-based progress.
const RUNTIME_INFLATION: f64 = 1.1;

/// Drives one run of one experiment.
pub struct Runner {
    settings: Settings,
    sessions: Arc<dyn SessionBuilder>,
    emitter: Emitter,
    config: EngineConfig,
}

/// Resources the teardown step releases, plus the accumulated `status.end` payload.
#[derive(Default)]
struct Teardown {
    session: Option<Box<dyn Session>>,
    experiment: Option<Box<dyn Experiment>>,
    end: EndValue,
}

impl Runner {
    pub fn new(
        settings: Settings,
        sessions: Arc<dyn SessionBuilder>,
        emitter: Emitter,
        config: EngineConfig,
    ) -> Self {
        Self {
            settings,
            sessions,
            emitter,
            config,
        }
    }

    /// Runs to completion; cancelling `ctx` interrupts the run.
    ///
    /// Consumes the runner so that its emitter is released when the run ends.
    pub async fn run(self, ctx: CancellationToken) {
        let log = TaskLogger::new(self.emitter.clone(), self.settings.log_level);
        let mut teardown = Teardown::default();

        let outcome = AssertUnwindSafe(self.bootstrap_and_measure(&ctx, &log, &mut teardown))
            .catch_unwind()
            .await;
        if let Err(panic) = outcome {
            let msg = panic_message(&*panic);
            tracing::error!(experiment = %self.settings.name, "runner panicked: {msg}");
            teardown.end.failure = format!("runner panicked: {msg}");
        }

        self.finish(teardown, &log).await;
    }

    async fn bootstrap_and_measure(
        &self,
        ctx: &CancellationToken,
        log: &TaskLogger,
        td: &mut Teardown,
    ) {
        let em = &self.emitter;
        em.emit_empty(EventKey::StatusQueued);
        if let Err(e) = self.settings.check_version() {
            em.emit_failure_startup(e.to_string());
            return;
        }
        em.emit_empty(EventKey::StatusStarted);

        let session = match self.new_session(ctx).await {
            Ok(s) => td.session.insert(s),
            Err(e) => {
                em.emit_failure_startup(e.to_string());
                return;
            }
        };

        log.info("Looking up backends... please, be patient");
        if let Err(e) = session.lookup_backends(ctx).await {
            em.emit_failure_startup(e.to_string());
            return;
        }
        em.emit_progress(0.1, "contacted bouncer");

        log.info("Looking up your location... please, be patient");
        if let Err(e) = session.lookup_location(ctx).await {
            let failure = e.to_string();
            for key in LOCATION_FAILURES {
                em.emit_failure(key, failure.clone());
            }
            return;
        }
        let loc = session.location();
        em.emit_progress(0.2, "geoip lookup");
        em.emit_progress(0.3, "resolver lookup");
        em.emit(Event::geoip(GeoIpValue {
            probe_ip: loc.probe_ip,
            probe_asn: loc.probe_asn,
            probe_cc: loc.probe_cc,
            probe_network_name: loc.probe_network_name,
        }));
        em.emit(Event::resolver(ResolverValue {
            resolver_asn: loc.resolver_asn,
            resolver_ip: loc.resolver_ip,
            resolver_network_name: loc.resolver_network_name,
        }));

        let builder = match session.new_experiment_builder(&self.settings.name) {
            Ok(b) => b,
            Err(e) => {
                em.emit_failure_startup(e.to_string());
                return;
            }
        };
        builder.set_callbacks(Arc::new(ProgressCallbacks {
            emitter: em.clone(),
        }));

        let targets = match self.load_targets(ctx, builder.as_ref()).await {
            Ok(t) => t,
            Err(e) => {
                em.emit_failure_startup(e.to_string());
                return;
            }
        };

        let experiment = td.experiment.insert(builder.new_experiment());
        if !self.settings.options.no_collector {
            log.info("Opening report... please, be patient");
            if let Err(e) = experiment.open_report(ctx).await {
                em.emit_failure(EventKey::FailureReportCreate, e.to_string());
                return;
            }
            em.emit_progress(BOOTSTRAP_PROGRESS, "open report");
            em.emit(Event::report_create(experiment.report_id()));
        }

        self.measure_targets(ctx, log, builder.as_ref(), experiment.as_ref(), &targets)
            .await;
    }

    async fn new_session(&self, ctx: &CancellationToken) -> Result<Box<dyn Session>, ProbeError> {
        let s = &self.settings;
        let kv_store = FsKeyValueStore::open(&s.state_dir)?;
        let proxy = s.proxy().map(ProxyUrl::parse).transpose()?;
        let available_probe_services = s
            .options
            .probe_services_override()
            .map(|addr| vec![ProbeService::https(addr)])
            .unwrap_or_default();
        let config = SessionConfig {
            kv_store: Arc::new(kv_store),
            proxy,
            software_name: s.options.software_name.clone(),
            software_version: s.options.software_version.clone(),
            temp_dir: s.temp_dir.clone().into(),
            tunnel_dir: s.tunnel_dir.clone().into(),
            available_probe_services,
        };
        tracing::debug!(experiment = %s.name, ?config, "creating session");
        self.sessions.new_session(ctx, config).await
    }

    /// Resolves the targets, enforcing the input policy whatever the loader does.
    async fn load_targets(
        &self,
        ctx: &CancellationToken,
        builder: &dyn ExperimentBuilder,
    ) -> Result<Vec<Target>, ProbeError> {
        let policy = builder.input_policy();
        if policy == InputPolicy::None && !self.settings.inputs.is_empty() {
            return Err(ProbeError::InputNotAccepted);
        }
        let loader = builder.new_target_loader(TargetLoaderConfig {
            experiment: self.settings.name.clone(),
            inputs: self.settings.inputs.clone(),
            policy,
        });
        let mut targets = loader.load(ctx).await?;
        if targets.is_empty() {
            match policy {
                InputPolicy::OrStaticDefault => return Err(ProbeError::NoStaticInput),
                p if p.requires_input() => return Err(ProbeError::NoInput),
                _ => targets.push(Target::empty()),
            }
        }
        Ok(targets)
    }

    async fn measure_targets(
        &self,
        ctx: &CancellationToken,
        log: &TaskLogger,
        builder: &dyn ExperimentBuilder,
        experiment: &dyn Experiment,
        targets: &[Target],
    ) {
        let em = &self.emitter;
        let total = targets.len();
        let max_runtime = self.settings.options.max_runtime().filter(|_| total > 1);
        let contexts = RunContexts::new(
            ctx,
            max_runtime.map(|m| Budget {
                measuring: m,
                submitting: self.config.submit_budget(m),
            }),
        );
        let interruptible = builder.interruptible();
        let started = Instant::now();

        for (idx, target) in targets.iter().enumerate() {
            if contexts.measuring.is_cancelled() {
                log.info("stopping: measuring budget exhausted or interrupted");
                break;
            }
            log.info(format!("Starting measurement with index {idx}"));
            em.emit(Event::target(EventKey::StatusMeasurementStart, idx, &target.input));
            if total > 1 {
                let pct = loop_progress(idx, total, started.elapsed(), max_runtime);
                em.emit_progress(pct, format!("processing {}", target.input));
            }

            let outcome = if interruptible {
                experiment.measure(&contexts.measuring, target).await
            } else {
                experiment.measure(&CancellationToken::new(), target).await
            };
            if interruptible && contexts.measuring.is_cancelled() {
                break;
            }

            let block = Event::target(EventKey::StatusMeasurementDone, idx, &target.input);
            let mut measurement = match outcome {
                Ok(m) => m,
                Err(e) => {
                    log.warn(format!("measurement failed: {e}"));
                    em.emit(
                        Event::target(EventKey::FailureMeasurement, idx, &target.input)
                            .with_failure(e.to_string()),
                    );
                    em.emit(block);
                    continue;
                }
            };
            measurement.add_annotations(&self.settings.annotations);
            let json = match measurement.to_json() {
                Ok(json) => json,
                Err(e) => {
                    em.emit(
                        Event::target(EventKey::FailureMeasurement, idx, &target.input)
                            .with_failure(e.to_string()),
                    );
                    em.emit(block);
                    continue;
                }
            };
            em.emit(Event::target(EventKey::Measurement, idx, &target.input).with_json(&json));

            if !self.settings.options.no_collector {
                log.info("Submitting measurement... please, be patient");
                let submitted = experiment
                    .submit_and_update(&contexts.submitting, &mut measurement)
                    .await;
                let ev = match submitted {
                    Ok(()) => Event::target(EventKey::StatusMeasurementSubmission, idx, &target.input),
                    Err(e) => {
                        log.warn(format!("cannot submit measurement: {e}"));
                        Event::target(EventKey::FailureMeasurementSubmission, idx, &target.input)
                            .with_failure(e.to_string())
                    }
                };
                em.emit(ev.with_json(json));
            }
            em.emit(block);
        }
    }

    /// Closes the session and emits `status.end`.
    ///
    /// Collaborator panics here are recorded in the end payload; `status.end` is
    /// emitted regardless.
    async fn finish(&self, td: Teardown, log: &TaskLogger) {
        let Teardown {
            session,
            experiment,
            mut end,
        } = td;
        let released = AssertUnwindSafe(async {
            if let Some(exp) = &experiment {
                end.downloaded_kb = exp.kibibytes_received();
                end.uploaded_kb = exp.kibibytes_sent();
            }
            drop(experiment);
            if let Some(session) = session {
                if let Err(e) = session.close().await {
                    log.warn(format!("cannot close session: {e}"));
                }
            }
        })
        .catch_unwind()
        .await;
        if let Err(panic) = released {
            let msg = panic_message(&*panic);
            tracing::error!(experiment = %self.settings.name, "teardown panicked: {msg}");
            if end.failure.is_empty() {
                end.failure = format!("teardown panicked: {msg}");
            }
        }

        tracing::debug!(
            experiment = %self.settings.name,
            dropped = self.emitter.dropped(),
            "run finished"
        );
        self.emitter.emit(Event::end(end));
    }
}

/// Maps experiment-internal progress onto the post-bootstrap range.
struct ProgressCallbacks {
    emitter: Emitter,
}

impl ExperimentCallbacks for ProgressCallbacks {
    fn on_progress(&self, percentage: f64, message: &str) {
        self.emitter
            .emit_progress(BOOTSTRAP_PROGRESS + percentage * MEASUREMENT_PROGRESS, message);
    }
}

/// Progress of the loop at target `idx`.
///
/// With a runtime budget the estimate follows elapsed time over the (inflated)
/// budget; otherwise it follows the target index.
fn loop_progress(idx: usize, total: usize, elapsed: Duration, max_runtime: Option<Duration>) -> f64 {
    let fraction = match max_runtime {
        Some(budget) => elapsed.as_secs_f64() / (budget.as_secs_f64() * RUNTIME_INFLATION),
        None => idx as f64 / total as f64,
    };
    BOOTSTRAP_PROGRESS + fraction.clamp(0.0, 1.0) * MEASUREMENT_PROGRESS
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
