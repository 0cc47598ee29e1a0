//! Continuous position feed for the live dashboard.
//!
//! Every update from the provider's watch is turned into an immutable
//! [`DashboardSnapshot`]. The renderer only ever sees snapshots; it never
//! shares mutable fields with the feed.

use std::sync::Arc;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::cancel::CancelHandle;
use crate::compass::{classify, Compass};
use crate::location::{Coordinates, LocationError, LocationProvider, PositionOptions};
use crate::sample::{METERS_TO_FEET, MPS_TO_KNOTS, MPS_TO_MPH};

/// Dashboard fields derived from one location update.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DashboardSnapshot {
    /// Altitude in feet, rounded up.
    pub altitude_feet: Option<i64>,
    /// Heading in degrees, rounded up.
    pub heading: Option<i64>,
    /// Compass octant of the heading.
    pub direction: Compass,
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Speed in mph: whole m/s scaled, then rounded up.
    pub speed_mph: Option<i64>,
    /// Speed in knots: whole m/s scaled, then rounded up.
    pub speed_knots: Option<i64>,
}

impl DashboardSnapshot {
    /// Derive dashboard fields from a reading.
    ///
    /// Returns `None` when the reading has no usable position.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn from_reading(reading: &Coordinates) -> Option<Self> {
        if !reading.is_valid() {
            return None;
        }

        let finite = |v: Option<f64>| v.filter(|x| x.is_finite());
        let heading = finite(reading.heading).map(f64::ceil);
        let speed = finite(reading.speed).map(f64::floor);

        Some(Self {
            altitude_feet: finite(reading.altitude).map(|m| (m * METERS_TO_FEET).ceil() as i64),
            heading: heading.map(|h| h as i64),
            direction: classify(heading),
            latitude: reading.latitude,
            longitude: reading.longitude,
            speed_mph: speed.map(|s| (s * MPS_TO_MPH).ceil() as i64),
            speed_knots: speed.map(|s| (s * MPS_TO_KNOTS).ceil() as i64),
        })
    }
}

/// Handle to a running position feed.
#[derive(Debug)]
pub struct FeedHandle {
    cancel: CancelHandle,
    task: JoinHandle<u64>,
}

impl FeedHandle {
    /// Stop the feed and wait for it to finish.
    ///
    /// Returns the number of snapshots delivered.
    pub async fn cancel(self) -> u64 {
        self.cancel.cancel();
        self.task.await.unwrap_or(0)
    }

    /// Signal the feed to stop without waiting for it.
    pub fn request_stop(&self) {
        self.cancel.cancel();
    }
}

/// Subscribe to the provider's continuous watch.
///
/// Each valid update is converted and passed to `on_snapshot`. Errors and
/// malformed updates are skipped. The feed ends when cancelled or when the
/// provider closes its stream.
///
/// # Errors
///
/// Returns an error if the provider refuses to start watching.
pub fn spawn_feed<F>(
    provider: &Arc<dyn LocationProvider>,
    options: &PositionOptions,
    mut on_snapshot: F,
) -> Result<FeedHandle, LocationError>
where
    F: FnMut(DashboardSnapshot) + Send + 'static,
{
    let mut updates = provider.watch_position(options)?;
    let cancel = CancelHandle::new();
    let stop = cancel.clone();
    debug!(provider = provider.name(), "Starting position feed");

    let task = tokio::spawn(async move {
        let mut delivered = 0u64;
        loop {
            tokio::select! {
                () = stop.cancelled() => break,
                update = updates.recv() => match update {
                    Some(Ok(reading)) => match DashboardSnapshot::from_reading(&reading) {
                        Some(snapshot) => {
                            delivered += 1;
                            on_snapshot(snapshot);
                        }
                        None => trace!("Skipping malformed position update"),
                    },
                    Some(Err(e)) => trace!(error = %e, "Skipping failed position update"),
                    None => {
                        debug!("Position watch closed");
                        break;
                    }
                },
            }
        }
        delivered
    });

    Ok(FeedHandle { cancel, task })
}

/// Convenience sink sending snapshots into a channel.
#[must_use]
pub fn channel_sink(
    tx: mpsc::UnboundedSender<DashboardSnapshot>,
) -> impl FnMut(DashboardSnapshot) + Send + 'static {
    move |snapshot| {
        let _ = tx.send(snapshot);
    }
}
