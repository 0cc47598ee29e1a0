//! Recording session orchestration.
//!
//! A session wires the stopwatch, the capture worker and the position feed
//! together and reports everything through one stream of
//! [`SessionEvent`]s:
//!
//! ```text
//!  tick task ──CaptureRequest──▶ capture worker ──▶ SampleLog
//!      │                              │
//!      └──────────── SessionEvent ◀───┴──── feed task
//! ```
//!
//! The event channel closes once every task has ended, so a front end can
//! simply drain it.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::cancel::CancelHandle;
use crate::capture::{CaptureEvent, CaptureRequest, CaptureWorker};
use crate::config::Config;
use crate::feed::{spawn_feed, DashboardSnapshot, FeedHandle};
use crate::location::{LocationProvider, PositionOptions};
use crate::sample::PositionSample;
use crate::stopwatch::{Elapsed, RolloverMode, SamplingSchedule, Stopwatch};
use crate::storage::SampleLog;
use crate::wake_lock::{WakeLock, WakeLockStatus};

/// Notice shown when the host has no location capability.
pub const LOCATION_UNAVAILABLE_NOTICE: &str = "Location services are unavailable.";

/// Notice shown when the store refuses writes.
pub const STORAGE_UNAVAILABLE_NOTICE: &str =
    "Local storage is unavailable, samples will not be saved.";

/// Runtime settings for one session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Time between stopwatch ticks.
    pub tick_interval: Duration,
    /// Whole-second offsets at which samples are taken.
    pub schedule: SamplingSchedule,
    /// Minute overflow behavior.
    pub rollover: RolloverMode,
    /// Options passed to every location request.
    pub position: PositionOptions,
    /// How long the "saved" indicator stays visible.
    pub saved_indicator: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(100),
            schedule: SamplingSchedule::default(),
            rollover: RolloverMode::default(),
            position: PositionOptions::default(),
            saved_indicator: Duration::from_secs(1),
        }
    }
}

impl From<&Config> for SessionConfig {
    fn from(config: &Config) -> Self {
        Self {
            tick_interval: config.tick_interval(),
            schedule: config.sampling_schedule(),
            rollover: config.rollover_mode(),
            position: config.position_options(),
            saved_indicator: config.saved_indicator_hold(),
        }
    }
}

/// Something the front end should render.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    /// The timer face changed.
    Tick(Elapsed),
    /// A new live position.
    Dashboard(DashboardSnapshot),
    /// A sample was stored.
    SampleSaved(PositionSample),
    /// A sample was read but could not be stored.
    SaveFailed(String),
    /// A one-time message for the user.
    Notice(String),
    /// Outcome of the wake-lock request.
    WakeLock(WakeLockStatus),
}

/// Totals reported when a session ends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct SessionSummary {
    /// Elapsed time when the stopwatch stopped.
    pub elapsed: Elapsed,
    /// Samples stored during the session.
    pub samples_saved: u64,
    /// Live position updates delivered.
    pub dashboard_updates: u64,
}

/// Control handle for a running session.
#[derive(Debug)]
pub struct SessionHandle {
    ticks: CancelHandle,
    tick_task: Option<JoinHandle<Elapsed>>,
    elapsed: Elapsed,
    captures: CancelHandle,
    capture_task: Option<JoinHandle<CaptureWorker>>,
    feed: Option<FeedHandle>,
    wake_lock: Arc<dyn WakeLock>,
}

/// Start a recording session.
///
/// Clears previously recorded samples, requests the wake lock, takes an
/// immediate sample and begins the live feed and the stopwatch. Missing
/// capabilities produce a [`SessionEvent::Notice`]; timing always runs.
///
/// Must be called from within a tokio runtime.
pub fn start(
    config: SessionConfig,
    provider: Arc<dyn LocationProvider>,
    wake_lock: Arc<dyn WakeLock>,
    log: Arc<Mutex<SampleLog>>,
) -> (SessionHandle, mpsc::UnboundedReceiver<SessionEvent>) {
    let (events, rx) = mpsc::unbounded_channel();

    prepare_store(&log, &events);

    let status = wake_lock.request();
    debug!(%status, "Wake lock requested");
    let _ = events.send(SessionEvent::WakeLock(status));

    let captures = CancelHandle::new();
    let mut capture_task = None;
    let mut feed = None;
    let mut requests = None;

    if provider.is_available() {
        let (tx, request_rx) = mpsc::unbounded_channel();
        let _ = tx.send(CaptureRequest::now());
        requests = Some(tx);

        let worker = CaptureWorker::new(Arc::clone(&provider), config.position, log);
        let sink = events.clone();
        capture_task = Some(tokio::spawn(worker.run(
            request_rx,
            captures.clone(),
            move |event| forward_capture(&sink, event),
        )));

        let sink = events.clone();
        match spawn_feed(&provider, &config.position, move |snapshot| {
            let _ = sink.send(SessionEvent::Dashboard(snapshot));
        }) {
            Ok(handle) => feed = Some(handle),
            Err(e) => {
                warn!(error = %e, "Live position feed unavailable");
                let _ = events.send(SessionEvent::Notice(e.to_string()));
            }
        }
    } else {
        info!(provider = provider.name(), "No location capability, timing only");
        let _ = events.send(SessionEvent::Notice(LOCATION_UNAVAILABLE_NOTICE.to_string()));
    }

    let ticks = CancelHandle::new();
    let start = Instant::now();
    let mut stopwatch = Stopwatch::new(config.schedule, config.rollover);
    stopwatch.start(start);
    let tick_task = tokio::spawn(run_ticks(
        stopwatch,
        start,
        config.tick_interval,
        ticks.clone(),
        requests,
        events,
    ));

    info!(tick = ?config.tick_interval, "Session started");

    let handle = SessionHandle {
        ticks,
        tick_task: Some(tick_task),
        elapsed: Elapsed::default(),
        captures,
        capture_task,
        feed,
        wake_lock,
    };
    (handle, rx)
}

fn prepare_store(log: &Arc<Mutex<SampleLog>>, events: &mpsc::UnboundedSender<SessionEvent>) {
    let Ok(mut log) = log.lock() else {
        warn!("Sample log lock poisoned");
        let _ = events.send(SessionEvent::Notice(STORAGE_UNAVAILABLE_NOTICE.to_string()));
        return;
    };

    // Clear first: a store left full by the last session still fails the
    // availability check until its old samples are gone.
    if let Err(e) = log.clear() {
        warn!(error = %e, "Failed to clear previous session");
    }

    if !log.is_available() {
        warn!("Store failed availability check");
        let _ = events.send(SessionEvent::Notice(STORAGE_UNAVAILABLE_NOTICE.to_string()));
    }
}

fn forward_capture(events: &mpsc::UnboundedSender<SessionEvent>, event: CaptureEvent) {
    let event = match event {
        CaptureEvent::Saved(sample) => SessionEvent::SampleSaved(sample),
        CaptureEvent::StoreFailed(message) => SessionEvent::SaveFailed(message),
        // Read failures are dropped without telling the user
        CaptureEvent::ReadFailed(_) => return,
    };
    let _ = events.send(event);
}

async fn run_ticks(
    mut stopwatch: Stopwatch,
    start: Instant,
    period: Duration,
    cancel: CancelHandle,
    requests: Option<mpsc::UnboundedSender<CaptureRequest>>,
    events: mpsc::UnboundedSender<SessionEvent>,
) -> Elapsed {
    let mut interval = tokio::time::interval_at(start, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            now = interval.tick() => {
                let Some(outcome) = stopwatch.tick(now) else {
                    break;
                };
                if outcome.capture {
                    if let Some(requests) = &requests {
                        let _ = requests.send(CaptureRequest { requested_at: now });
                    }
                }
                if outcome.rolled_over {
                    debug!(elapsed = %outcome.elapsed, "Minute rollover");
                }
                let _ = events.send(SessionEvent::Tick(outcome.elapsed));
            }
        }
    }

    stopwatch.stop()
}

impl SessionHandle {
    /// Halt the stopwatch. Captures already in flight still land.
    ///
    /// Returns the elapsed time at the last tick. Calling again returns the
    /// same value.
    pub async fn stop(&mut self) -> Elapsed {
        self.ticks.cancel();
        if let Some(task) = self.tick_task.take() {
            match task.await {
                Ok(elapsed) => self.elapsed = elapsed,
                Err(e) => warn!(error = %e, "Tick task failed"),
            }
            info!(elapsed = %self.elapsed, "Stopwatch stopped");
        }
        self.elapsed
    }

    /// Check if the stopwatch is still ticking.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.tick_task.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop the session, end the live feed and wait for in-flight captures.
    pub async fn finish(mut self) -> SessionSummary {
        let summary = self.wind_down().await;
        info!(
            samples = summary.samples_saved,
            updates = summary.dashboard_updates,
            "Session finished"
        );
        summary
    }

    /// Cancel everything, including captures still in flight.
    pub async fn abort(mut self) -> SessionSummary {
        self.captures.cancel();
        let summary = self.wind_down().await;
        info!(samples = summary.samples_saved, "Session aborted");
        summary
    }

    async fn wind_down(&mut self) -> SessionSummary {
        let elapsed = self.stop().await;

        let dashboard_updates = match self.feed.take() {
            Some(feed) => feed.cancel().await,
            None => 0,
        };

        let samples_saved = match self.capture_task.take() {
            Some(task) => match task.await {
                Ok(worker) => worker.saved_count(),
                Err(e) => {
                    warn!(error = %e, "Capture worker failed");
                    0
                }
            },
            None => 0,
        };

        self.wake_lock.release();
        SessionSummary {
            elapsed,
            samples_saved,
            dashboard_updates,
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.ticks.cancel();
        if let Some(feed) = &self.feed {
            feed.request_stop();
        }
        if self.capture_task.is_some() {
            self.captures.cancel();
        }
    }
}
