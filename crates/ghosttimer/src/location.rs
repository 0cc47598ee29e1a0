//! Location capability port.
//!
//! The stopwatch never talks to a positioning device directly. It is handed
//! a [`LocationProvider`], which answers one-shot position requests and
//! streams continuous updates. Two providers ship with the crate: a
//! [`ReplayProvider`] that plays back a recorded track, and an
//! [`UnavailableProvider`] for hosts with no positioning at all.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, trace};

use crate::error::Error;

/// Capacity of the channel returned by [`LocationProvider::watch_position`].
pub const WATCH_CHANNEL_CAPACITY: usize = 32;

/// Errors reported by a location provider.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LocationError {
    /// The host has no location capability.
    #[error("location services are unavailable")]
    Unavailable,

    /// The user or platform refused access to location.
    #[error("location permission denied")]
    PermissionDenied,

    /// A position request did not complete in time.
    #[error("position request timed out after {0:?}")]
    Timeout(Duration),

    /// The provider failed to produce a position.
    #[error("position request failed: {0}")]
    Failed(String),
}

/// A single reading from the location capability.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Altitude in meters.
    #[serde(default)]
    pub altitude: Option<f64>,
    /// Heading in degrees clockwise from true north.
    #[serde(default)]
    pub heading: Option<f64>,
    /// Ground speed in m/s.
    #[serde(default)]
    pub speed: Option<f64>,
}

impl Coordinates {
    /// Check that the reading carries a usable position.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.latitude.is_finite() && self.longitude.is_finite()
    }
}

/// Options passed with every position request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionOptions {
    /// Ask the device for its most accurate fix.
    pub high_accuracy: bool,
    /// Give up on a one-shot request after this long. `None` waits forever.
    pub timeout: Option<Duration>,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: None,
        }
    }
}

/// Receiving end of a continuous position watch.
pub type PositionStream = mpsc::Receiver<Result<Coordinates, LocationError>>;

/// A source of device positions.
#[async_trait::async_trait]
pub trait LocationProvider: Send + Sync {
    /// Name of this provider (for logging).
    fn name(&self) -> &'static str;

    /// Check whether the host can provide locations at all.
    fn is_available(&self) -> bool;

    /// Request the current position once.
    ///
    /// # Errors
    ///
    /// Returns an error if no position could be obtained.
    async fn current_position(
        &self,
        options: &PositionOptions,
    ) -> Result<Coordinates, LocationError>;

    /// Start watching the position continuously.
    ///
    /// Updates arrive on the returned channel until the receiver is dropped
    /// or the provider runs out of positions.
    ///
    /// # Errors
    ///
    /// Returns an error if the watch could not be started.
    fn watch_position(&self, options: &PositionOptions) -> Result<PositionStream, LocationError>;
}

impl std::fmt::Debug for dyn LocationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocationProvider")
            .field("name", &self.name())
            .finish()
    }
}

/// A provider for hosts without any location capability.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableProvider;

#[async_trait::async_trait]
impl LocationProvider for UnavailableProvider {
    fn name(&self) -> &'static str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        Err(LocationError::Unavailable)
    }

    fn watch_position(&self, _options: &PositionOptions) -> Result<PositionStream, LocationError> {
        Err(LocationError::Unavailable)
    }
}

/// One fix of a recorded track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackFix {
    /// Milliseconds after the start of playback at which this fix applies.
    pub offset_ms: u64,
    /// The position.
    #[serde(flatten)]
    pub coordinates: Coordinates,
}

/// Plays back a recorded track as if it were a live device.
///
/// Track files hold one JSON object per line:
///
/// ```text
/// {"offset_ms": 0, "latitude": 41.52, "longitude": -70.67, "speed": 3.1, "heading": 44}
/// ```
///
/// Blank lines and lines starting with `#` are ignored. Playback time starts
/// when the provider is created.
#[derive(Debug, Clone)]
pub struct ReplayProvider {
    fixes: Arc<Vec<TrackFix>>,
    origin: Instant,
}

impl ReplayProvider {
    /// Create a provider from fixes, sorted by offset.
    #[must_use]
    pub fn new(mut fixes: Vec<TrackFix>) -> Self {
        fixes.sort_by_key(|f| f.offset_ms);
        Self {
            fixes: Arc::new(fixes),
            origin: Instant::now(),
        }
    }

    /// Load a track file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or a line is not a valid fix.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, Error> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)?;
        let fixes = parse_track(&text).map_err(|(line, message)| Error::TrackParse {
            path: path.to_path_buf(),
            line,
            message,
        })?;
        debug!(path = %path.display(), fixes = fixes.len(), "Loaded track");
        Ok(Self::new(fixes))
    }

    /// Number of fixes in the track.
    #[must_use]
    pub fn len(&self) -> usize {
        self.fixes.len()
    }

    /// Check if the track has no fixes.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fixes.is_empty()
    }

    /// The fix in effect `elapsed` after playback started.
    fn fix_at(&self, elapsed: Duration) -> Option<&TrackFix> {
        let elapsed_ms = u64::try_from(elapsed.as_millis()).unwrap_or(u64::MAX);
        self.fixes
            .iter()
            .take_while(|f| f.offset_ms <= elapsed_ms)
            .last()
            .or_else(|| self.fixes.first())
    }
}

fn parse_track(text: &str) -> Result<Vec<TrackFix>, (usize, String)> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| {
            let line = line.trim();
            !line.is_empty() && !line.starts_with('#')
        })
        .map(|(idx, line)| serde_json::from_str(line).map_err(|e| (idx + 1, e.to_string())))
        .collect()
}

#[async_trait::async_trait]
impl LocationProvider for ReplayProvider {
    fn name(&self) -> &'static str {
        "replay"
    }

    fn is_available(&self) -> bool {
        !self.fixes.is_empty()
    }

    async fn current_position(
        &self,
        _options: &PositionOptions,
    ) -> Result<Coordinates, LocationError> {
        self.fix_at(self.origin.elapsed())
            .map(|f| f.coordinates.clone())
            .ok_or_else(|| LocationError::Failed("track has no fixes".to_string()))
    }

    fn watch_position(&self, _options: &PositionOptions) -> Result<PositionStream, LocationError> {
        if self.fixes.is_empty() {
            return Err(LocationError::Unavailable);
        }

        let (tx, rx) = mpsc::channel(WATCH_CHANNEL_CAPACITY);
        let fixes = Arc::clone(&self.fixes);
        let origin = self.origin;
        let elapsed_ms = u64::try_from(origin.elapsed().as_millis()).unwrap_or(u64::MAX);

        tokio::spawn(async move {
            for fix in fixes.iter().filter(|f| f.offset_ms >= elapsed_ms) {
                tokio::time::sleep_until(origin + Duration::from_millis(fix.offset_ms)).await;
                if tx.send(Ok(fix.coordinates.clone())).await.is_err() {
                    trace!("Watch receiver dropped, ending replay");
                    return;
                }
            }
            debug!("Replay track exhausted");
        });

        Ok(rx)
    }
}
