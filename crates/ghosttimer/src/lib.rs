//! `ghosttimer` - A stopwatch that samples geolocation on a schedule.
//!
//! While the stopwatch runs, a position sample is taken at fixed second
//! offsets within each minute and appended to a local store. A live feed
//! turns continuous position updates into dashboard snapshots. The recorded
//! session can be read back and exported as CSV.
//!
//! Host capabilities (location, storage, wake lock) are injected as traits,
//! so the same session logic runs against a device, a replayed track, or
//! test doubles.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod cancel;
pub mod capture;
pub mod cli;
pub mod compass;
pub mod config;
pub mod error;
pub mod feed;
pub mod location;
pub mod logging;
pub mod sample;
pub mod session;
pub mod stopwatch;
pub mod storage;
pub mod viewer;
pub mod wake_lock;

pub use compass::{classify, Compass};
pub use config::Config;
pub use error::{Error, Result};
pub use location::{LocationError, LocationProvider};
pub use logging::init_logging;
pub use sample::PositionSample;
pub use session::{SessionConfig, SessionEvent, SessionHandle, SessionSummary};
pub use stopwatch::{Elapsed, Stopwatch};
pub use storage::{KeyValueStore, SampleLog, SqliteBackend, StorageStats};
pub use viewer::RecordedSession;
