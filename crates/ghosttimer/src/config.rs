//! Configuration management for ghosttimer.
//!
//! Configuration is layered with figment: defaults, then a TOML file, then
//! environment variables.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::location::PositionOptions;
use crate::stopwatch::{RolloverMode, SamplingSchedule, SECONDS_PER_MINUTE};
use crate::storage::DEFAULT_SAMPLE_KEY;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "ghosttimer";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "ghosttimer.db";

/// Prefix for environment variable overrides.
const ENV_PREFIX: &str = "GHOSTTIMER_";

/// Default export file name.
pub const DEFAULT_EXPORT_FILE_NAME: &str = "ghost_timer_export.csv";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `GHOSTTIMER_`, sections separated
///    by `__`, e.g. `GHOSTTIMER_STOPWATCH__TICK_INTERVAL_MS=50`)
/// 2. TOML config file at `~/.config/ghosttimer/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Stopwatch configuration.
    pub stopwatch: StopwatchConfig,
    /// Location request configuration.
    pub location: LocationConfig,
    /// Capture feedback configuration.
    pub capture: CaptureConfig,
    /// CSV export configuration.
    pub export: ExportConfig,
}

/// Storage-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/ghosttimer/ghosttimer.db`
    pub database_path: Option<PathBuf>,
    /// Key under which the recorded session is stored.
    pub sample_key: String,
    /// Maximum bytes the store may hold. Set to 0 for unlimited.
    pub quota_bytes: u64,
}

/// Stopwatch-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StopwatchConfig {
    /// Interval between ticks in milliseconds.
    pub tick_interval_ms: u64,
    /// Whole-second offsets within each minute at which to sample.
    pub sampling_offsets: Vec<u64>,
    /// Let minutes grow past 59 and bump hours on every tick once they do,
    /// the way GhostTimer 1.x did.
    pub legacy_minute_rollover: bool,
}

/// Location-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LocationConfig {
    /// Ask for the most accurate position available.
    pub high_accuracy: bool,
    /// Upper bound on a single position read in milliseconds.
    /// Set to 0 to wait indefinitely.
    pub capture_timeout_ms: u64,
}

/// Capture feedback configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureConfig {
    /// How long the "saved" indicator stays up, in milliseconds.
    pub saved_indicator_ms: u64,
}

/// Export-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Name of the CSV file written by `export`.
    pub file_name: String,
    /// Directory the CSV file is written to.
    /// Defaults to the current directory.
    pub output_dir: Option<PathBuf>,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Resolved at runtime
            sample_key: DEFAULT_SAMPLE_KEY.to_string(),
            quota_bytes: 5 * 1024 * 1024,
        }
    }
}

impl Default for StopwatchConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 100,
            sampling_offsets: SamplingSchedule::default().offsets().collect(),
            legacy_minute_rollover: false,
        }
    }
}

impl Default for LocationConfig {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            capture_timeout_ms: 0,
        }
    }
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            saved_indicator_ms: 1_000,
        }
    }
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            file_name: DEFAULT_EXPORT_FILE_NAME.to_string(),
            output_dir: None,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading, parsing or validation fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);
        Self::from_figment(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::file(&config_file))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.stopwatch.tick_interval_ms == 0 {
            return Err(Error::config_validation(
                "tick_interval_ms must be greater than 0",
            ));
        }

        if let Some(offset) = self
            .stopwatch
            .sampling_offsets
            .iter()
            .find(|o| **o >= SECONDS_PER_MINUTE)
        {
            return Err(Error::config_validation(format!(
                "sampling offset {offset} is outside 0..{SECONDS_PER_MINUTE}"
            )));
        }

        if self.storage.sample_key.trim().is_empty() {
            return Err(Error::config_validation("sample_key must not be empty"));
        }

        if self.export.file_name.trim().is_empty() {
            return Err(Error::config_validation("export file_name must not be empty"));
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.storage
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// Get the export directory, defaulting to the current directory.
    #[must_use]
    pub fn export_dir(&self) -> PathBuf {
        self.export
            .output_dir
            .clone()
            .unwrap_or_else(|| PathBuf::from("."))
    }

    /// Get the tick interval as a Duration.
    #[must_use]
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.stopwatch.tick_interval_ms)
    }

    /// Build the sampling schedule.
    #[must_use]
    pub fn sampling_schedule(&self) -> SamplingSchedule {
        SamplingSchedule::new(self.stopwatch.sampling_offsets.iter().copied())
    }

    /// Get the minute rollover behavior.
    #[must_use]
    pub fn rollover_mode(&self) -> RolloverMode {
        if self.stopwatch.legacy_minute_rollover {
            RolloverMode::Legacy
        } else {
            RolloverMode::Wrapping
        }
    }

    /// Build the options passed to location requests.
    #[must_use]
    pub fn position_options(&self) -> PositionOptions {
        PositionOptions {
            high_accuracy: self.location.high_accuracy,
            timeout: match self.location.capture_timeout_ms {
                0 => None,
                ms => Some(Duration::from_millis(ms)),
            },
        }
    }

    /// Get the "saved" indicator hold time as a Duration.
    #[must_use]
    pub fn saved_indicator_hold(&self) -> Duration {
        Duration::from_millis(self.capture.saved_indicator_ms)
    }
}
