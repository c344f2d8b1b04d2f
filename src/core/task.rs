//! # Task: one run owned by the host.
//!
//! A [`Task`] couples a background [`Runner`] with the receiving end of its event
//! queue. The host drives it with blocking calls from its own thread(s).
//!
//! ```text
//! host thread                         task runtime ("probe-task" worker)
//! ───────────                         ──────────────────────────────────
//! Task::start ──────── spawn ───────► Runner::run(root)
//! wait_for_next_event ◄── queue ───── Emitter::emit
//! interrupt ─────────── root.cancel ► (observed at the next step)
//! free / drop ─ cancel + drain ─────► status.end ─► stopped.cancel()
//! ```
//!
//! ## Rules
//! - `is_done()` is monotonic: once true it never becomes false.
//! - `is_done()` turns true only after the runner stopped **and** the queue is drained.
//! - `wait_for_next_event` returns `None` on timeout or once done; after done it
//!   returns `None` immediately.
//! - Dropping a task interrupts it and waits for the runner to exit.
//! - Blocking methods must not be called from inside an async runtime.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use tokio::runtime::{self, Runtime};
use tokio::sync::{Mutex, mpsc};
use tokio::time;
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::core::runner::Runner;
use crate::error::StartError;
use crate::events::{Emitter, Event};
use crate::probe::SessionBuilder;
use crate::settings::Settings;

/// A running (or finished) measurement task.
pub struct Task {
    runtime: Option<Runtime>,
    root: CancellationToken,
    stopped: CancellationToken,
    events: Mutex<mpsc::Receiver<Event>>,
    done: AtomicBool,
}

impl Task {
    /// Parses `settings` and starts the run with the default [`EngineConfig`].
    ///
    /// Only a structurally invalid document fails here; every other problem is
    /// reported through the event stream.
    pub fn start(settings: &str, sessions: Arc<dyn SessionBuilder>) -> Result<Self, StartError> {
        Self::start_with_config(settings, sessions, EngineConfig::default())
    }

    /// Like [`start`](Self::start) with an explicit configuration.
    pub fn start_with_config(
        settings: &str,
        sessions: Arc<dyn SessionBuilder>,
        config: EngineConfig,
    ) -> Result<Self, StartError> {
        let settings = Settings::from_json(settings)?;
        Self::spawn(settings, sessions, config)
    }

    /// Starts the run for already-parsed settings.
    pub fn spawn(
        settings: Settings,
        sessions: Arc<dyn SessionBuilder>,
        config: EngineConfig,
    ) -> Result<Self, StartError> {
        let runtime = runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("probe-task")
            .enable_time()
            .build()
            .map_err(StartError::Runtime)?;

        let (emitter, rx) = Emitter::channel(config.queue_capacity_clamped());
        let root = CancellationToken::new();
        let stopped = CancellationToken::new();
        tracing::debug!(experiment = %settings.name, "starting task");

        let runner = Runner::new(settings, sessions, emitter, config);
        let (ctx, exit) = (root.clone(), stopped.clone());
        runtime.spawn(async move {
            let _exit = exit.drop_guard();
            runner.run(ctx).await;
        });

        Ok(Self {
            runtime: Some(runtime),
            root,
            stopped,
            events: Mutex::new(rx),
            done: AtomicBool::new(false),
        })
    }

    /// Blocks until the next event, the timeout or the end of the stream.
    ///
    /// `None` timeout waits forever. Returns `None` on timeout (the task may still
    /// be running) or once the stream is exhausted, which marks the task done.
    pub fn wait_for_next_event(&self, timeout: Option<Duration>) -> Option<Event> {
        if self.is_done() {
            return None;
        }
        let runtime = self.runtime.as_ref()?;
        runtime.block_on(async {
            // The lock wait counts against the timeout: another thread may be
            // parked on the queue.
            let recv = async {
                let mut rx = self.events.lock().await;
                self.next_event(&mut rx).await
            };
            let next = match timeout {
                Some(limit) => time::timeout(limit, recv).await.ok()?,
                None => recv.await,
            };
            if next.is_none() {
                self.done.store(true, Ordering::Release);
            }
            next
        })
    }

    /// Next queued event, or `None` once the runner stopped and the queue is empty.
    async fn next_event(&self, rx: &mut mpsc::Receiver<Event>) -> Option<Event> {
        tokio::select! {
            biased;
            ev = rx.recv() => return ev,
            _ = self.stopped.cancelled() => {}
        }
        rx.try_recv().ok()
    }

    /// Whether the runner exited and every event was delivered.
    #[inline]
    pub fn is_done(&self) -> bool {
        self.done.load(Ordering::Acquire)
    }

    /// Whether the runner is still executing.
    #[inline]
    pub fn is_running(&self) -> bool {
        !self.stopped.is_cancelled()
    }

    /// Requests cancellation; idempotent and non-blocking.
    pub fn interrupt(&self) {
        self.root.cancel();
    }

    /// Interrupts the run and drains the queue until done.
    ///
    /// Returns once the runner exited. Safe to call more than once.
    pub fn shutdown(&self) {
        self.interrupt();
        if runtime::Handle::try_current().is_ok() {
            std::thread::scope(|s| {
                s.spawn(|| self.drain());
            });
        } else {
            self.drain();
        }
    }

    fn drain(&self) {
        while !self.is_done() {
            self.wait_for_next_event(None);
        }
    }

    /// Releases the task; the runner has exited when this returns.
    pub fn free(self) {
        drop(self);
    }
}

impl Drop for Task {
    fn drop(&mut self) {
        self.shutdown();
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("running", &self.is_running())
            .field("done", &self.is_done())
            .finish()
    }
}
