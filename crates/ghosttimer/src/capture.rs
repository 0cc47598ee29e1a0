//! One-shot position capture.
//!
//! The stopwatch fires capture requests without waiting for them. A single
//! [`CaptureWorker`] receives those requests, runs each location read
//! concurrently, and handles completions one at a time: it assigns the next
//! sequence number, builds the [`PositionSample`] and appends it to the
//! [`SampleLog`]. Because numbering happens at completion inside one task,
//! stored sequence numbers always increase, whatever order reads finish in.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::CancelHandle;
use crate::location::{Coordinates, LocationError, LocationProvider, PositionOptions};
use crate::sample::PositionSample;
use crate::storage::SampleLog;

/// A request to take one position sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureRequest {
    /// When the request was made.
    pub requested_at: Instant,
}

impl CaptureRequest {
    /// A request made now.
    #[must_use]
    pub fn now() -> Self {
        Self {
            requested_at: Instant::now(),
        }
    }
}

/// What happened to one capture request.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureEvent {
    /// The sample was stored.
    Saved(PositionSample),
    /// No position could be read; nothing was stored.
    ReadFailed(LocationError),
    /// A position was read but could not be stored.
    StoreFailed(String),
}

/// Transient "saved" indicator shown after each stored sample.
///
/// There is one shared deadline, not a timer per save. Each [`mark`]
/// restarts the hold from its own instant, so a save that lands while the
/// indicator is up keeps it visible until `hold` after that later save.
///
/// [`mark`]: SavedIndicator::mark
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SavedIndicator {
    hold: Duration,
    visible_until: Option<Instant>,
}

impl SavedIndicator {
    /// Create a hidden indicator that stays up for `hold` after each save.
    #[must_use]
    pub fn new(hold: Duration) -> Self {
        Self {
            hold,
            visible_until: None,
        }
    }

    /// Show the indicator from `now`.
    pub fn mark(&mut self, now: Instant) {
        self.visible_until = Some(now + self.hold);
    }

    /// Check if the indicator is showing at `now`.
    #[must_use]
    pub fn is_visible(&self, now: Instant) -> bool {
        self.visible_until.is_some_and(|until| now < until)
    }
}

/// Turns capture requests into stored samples.
#[derive(Debug)]
pub struct CaptureWorker {
    provider: Arc<dyn LocationProvider>,
    options: PositionOptions,
    log: Arc<Mutex<SampleLog>>,
    last_sequence_id: u64,
    saved: u64,
}

impl CaptureWorker {
    /// Create a worker for a new session. Numbering starts at 1.
    #[must_use]
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        options: PositionOptions,
        log: Arc<Mutex<SampleLog>>,
    ) -> Self {
        Self {
            provider,
            options,
            log,
            last_sequence_id: 0,
            saved: 0,
        }
    }

    /// The sequence number of the last stored sample (0 if none).
    #[must_use]
    pub fn last_sequence_id(&self) -> u64 {
        self.last_sequence_id
    }

    /// Number of samples stored by this worker.
    #[must_use]
    pub fn saved_count(&self) -> u64 {
        self.saved
    }

    /// Handle one finished location read.
    pub fn complete(&mut self, result: Result<Coordinates, LocationError>) -> CaptureEvent {
        let reading = match result {
            Ok(reading) if reading.is_valid() => reading,
            Ok(_) => {
                debug!("Dropping capture with invalid position");
                return CaptureEvent::ReadFailed(LocationError::Failed(
                    "position is not finite".to_string(),
                ));
            }
            Err(e) => {
                debug!(error = %e, "Dropping failed capture");
                return CaptureEvent::ReadFailed(e);
            }
        };

        self.last_sequence_id += 1;
        let sample = PositionSample::from_reading(self.last_sequence_id, &reading, Local::now());

        let Ok(mut log) = self.log.lock() else {
            return CaptureEvent::StoreFailed("sample log lock poisoned".to_string());
        };
        match log.append(sample.clone()) {
            Ok(count) => {
                self.saved += 1;
                info!(
                    sequence_id = sample.sequence_id,
                    stored = count,
                    "Position sample saved"
                );
                CaptureEvent::Saved(sample)
            }
            Err(e) => {
                warn!(error = %e, sequence_id = sample.sequence_id, "Failed to store sample");
                CaptureEvent::StoreFailed(e.to_string())
            }
        }
    }

    /// Process requests until the request channel closes or `cancel` fires.
    ///
    /// When the channel closes, reads already in flight are still awaited
    /// and stored. Cancellation aborts them. Returns the worker so the
    /// caller can inspect the final sequence number.
    pub async fn run<F>(
        mut self,
        mut requests: mpsc::UnboundedReceiver<CaptureRequest>,
        cancel: CancelHandle,
        mut on_event: F,
    ) -> Self
    where
        F: FnMut(CaptureEvent) + Send,
    {
        let mut in_flight: JoinSet<Result<Coordinates, LocationError>> = JoinSet::new();
        let mut accepting = true;

        loop {
            if !accepting && in_flight.is_empty() {
                break;
            }

            tokio::select! {
                () = cancel.cancelled() => {
                    if !in_flight.is_empty() {
                        debug!(pending = in_flight.len(), "Aborting in-flight captures");
                    }
                    in_flight.abort_all();
                    break;
                }
                request = requests.recv(), if accepting => match request {
                    Some(request) => {
                        let provider = Arc::clone(&self.provider);
                        let options = self.options;
                        debug!(age = ?request.requested_at.elapsed(), "Capture requested");
                        in_flight
                            .spawn(async move { read_position(provider.as_ref(), &options).await });
                    }
                    None => accepting = false,
                },
                Some(joined) = in_flight.join_next() => match joined {
                    Ok(result) => {
                        let event = self.complete(result);
                        on_event(event);
                    }
                    Err(e) if e.is_cancelled() => {}
                    Err(e) => warn!(error = %e, "Capture task failed"),
                },
            }
        }

        self
    }
}

/// Read the current position, honoring the request timeout if one is set.
///
/// # Errors
///
/// Returns the provider's error, or [`LocationError::Timeout`].
pub async fn read_position(
    provider: &dyn LocationProvider,
    options: &PositionOptions,
) -> Result<Coordinates, LocationError> {
    match options.timeout {
        Some(limit) => tokio::time::timeout(limit, provider.current_position(options))
            .await
            .unwrap_or(Err(LocationError::Timeout(limit))),
        None => provider.current_position(options).await,
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::storage::{KeyValueStore, MemoryBackend, DEFAULT_SAMPLE_KEY};

    /// Provider whose n-th read takes `delays[n]` and reports latitude `n`.
    #[derive(Debug)]
    struct ScriptedProvider {
        delays: Vec<Duration>,
        calls: AtomicUsize,
    }

    #[async_trait::async_trait]
    impl LocationProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        fn is_available(&self) -> bool {
            true
        }

        async fn current_position(
            &self,
            _options: &PositionOptions,
        ) -> Result<Coordinates, LocationError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            let delay = self.delays.get(n).copied().unwrap_or_default();
            tokio::time::sleep(delay).await;
            Ok(Coordinates {
                latitude: f64::from(u32::try_from(n).unwrap()),
                longitude: 0.0,
                altitude: None,
                heading: None,
                speed: Some(10.0),
            })
        }

        fn watch_position(
            &self,
            _options: &PositionOptions,
        ) -> Result<crate::location::PositionStream, LocationError> {
            Err(LocationError::Unavailable)
        }
    }

    fn scripted(delays_ms: &[u64]) -> Arc<dyn LocationProvider> {
        Arc::new(ScriptedProvider {
            delays: delays_ms.iter().map(|ms| Duration::from_millis(*ms)).collect(),
            calls: AtomicUsize::new(0),
        })
    }

    fn shared_log() -> Arc<Mutex<SampleLog>> {
        Arc::new(Mutex::new(SampleLog::new(
            KeyValueStore::new(MemoryBackend::new()),
            DEFAULT_SAMPLE_KEY,
        )))
    }

    fn reading() -> Coordinates {
        Coordinates {
            latitude: 41.0,
            longitude: -70.0,
            altitude: None,
            heading: Some(10.0),
            speed: Some(10.0),
        }
    }

    #[test]
    fn test_saved_indicator_clears_after_hold() {
        let t0 = Instant::now();
        let mut indicator = SavedIndicator::new(Duration::from_secs(1));
        assert!(!indicator.is_visible(t0));

        indicator.mark(t0);
        assert!(indicator.is_visible(t0 + Duration::from_millis(999)));
        assert!(!indicator.is_visible(t0 + Duration::from_millis(1_000)));
    }

    #[test]
    fn test_saved_indicator_later_save_extends_hold() {
        let t0 = Instant::now();
        let mut indicator = SavedIndicator::new(Duration::from_secs(1));

        indicator.mark(t0);
        indicator.mark(t0 + Duration::from_millis(600));

        // The first save alone would have cleared at 1s
        assert!(indicator.is_visible(t0 + Duration::from_millis(1_200)));
        assert!(!indicator.is_visible(t0 + Duration::from_millis(1_600)));
    }

    #[test]
    fn test_complete_numbers_from_one() {
        let log = shared_log();
        let mut worker = CaptureWorker::new(
            scripted(&[]),
            PositionOptions::default(),
            Arc::clone(&log),
        );

        let first = worker.complete(Ok(reading()));
        let second = worker.complete(Ok(reading()));

        let CaptureEvent::Saved(first) = first else {
            panic!("expected saved");
        };
        let CaptureEvent::Saved(second) = second else {
            panic!("expected saved");
        };
        assert_eq!(first.sequence_id, 1);
        assert_eq!(second.sequence_id, 2);
        assert_eq!(first.speed_kmh, Some(36.0));
        assert_eq!(log.lock().unwrap().count(), 2);
    }

    #[test]
    fn test_failed_read_stores_nothing() {
        let log = shared_log();
        let mut worker = CaptureWorker::new(
            scripted(&[]),
            PositionOptions::default(),
            Arc::clone(&log),
        );

        let event = worker.complete(Err(LocationError::PermissionDenied));
        assert_eq!(event, CaptureEvent::ReadFailed(LocationError::PermissionDenied));
        assert_eq!(worker.last_sequence_id(), 0);
        assert_eq!(log.lock().unwrap().count(), 0);
    }

    #[test]
    fn test_invalid_position_stores_nothing() {
        let log = shared_log();
        let mut worker = CaptureWorker::new(
            scripted(&[]),
            PositionOptions::default(),
            Arc::clone(&log),
        );

        let mut bad = reading();
        bad.latitude = f64::NAN;
        assert!(matches!(worker.complete(Ok(bad)), CaptureEvent::ReadFailed(_)));
        assert_eq!(log.lock().unwrap().count(), 0);
    }

    #[test]
    fn test_store_failure_reported() {
        let log = Arc::new(Mutex::new(SampleLog::new(
            KeyValueStore::new(MemoryBackend::failing()),
            DEFAULT_SAMPLE_KEY,
        )));
        let mut worker = CaptureWorker::new(scripted(&[]), PositionOptions::default(), log);

        assert!(matches!(worker.complete(Ok(reading())), CaptureEvent::StoreFailed(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_order_completions_keep_sequence_increasing() {
        let log = shared_log();
        // First read is slow, second is fast
        let worker = CaptureWorker::new(
            scripted(&[500, 10]),
            PositionOptions::default(),
            Arc::clone(&log),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        tx.send(CaptureRequest::now()).unwrap();
        tx.send(CaptureRequest::now()).unwrap();
        drop(tx);

        let worker = worker.run(rx, CancelHandle::new(), |_| {}).await;

        let samples = log.lock().unwrap().load();
        let ids: Vec<u64> = samples.iter().map(|s| s.sequence_id).collect();
        assert_eq!(ids, vec![1, 2]);
        // The fast second read (latitude 1) landed first
        assert!((samples[0].latitude - 1.0).abs() < f64::EPSILON);
        assert_eq!(worker.last_sequence_id(), 2);
        assert_eq!(worker.saved_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_aborts_in_flight_reads() {
        let log = shared_log();
        let worker = CaptureWorker::new(
            scripted(&[60_000]),
            PositionOptions::default(),
            Arc::clone(&log),
        );
        let (tx, rx) = mpsc::unbounded_channel();
        let cancel = CancelHandle::new();
        tx.send(CaptureRequest::now()).unwrap();

        let stop = cancel.clone();
        let task = tokio::spawn(worker.run(rx, cancel, |_| {}));
        tokio::time::sleep(Duration::from_millis(100)).await;
        stop.cancel();

        let worker = task.await.unwrap();
        assert_eq!(worker.last_sequence_id(), 0);
        assert_eq!(log.lock().unwrap().count(), 0);
        drop(tx);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reported_as_read_failure() {
        let provider = scripted(&[5_000]);
        let options = PositionOptions {
            high_accuracy: true,
            timeout: Some(Duration::from_secs(1)),
        };

        let result = read_position(provider.as_ref(), &options).await;
        assert_eq!(result, Err(LocationError::Timeout(Duration::from_secs(1))));
    }
}
