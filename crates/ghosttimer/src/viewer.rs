//! Reading back a recorded session.
//!
//! The viewer never writes to the store. It loads the whole sample array
//! and turns it into a table or a CSV file.

use std::fmt::Display;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::sample::PositionSample;
use crate::storage::SampleLog;

/// CSV header row.
pub const CSV_HEADER: &str =
    "PositionRecordLogID,Altitude,Heading,Latitude,Longitude,SpeedMPH,RecordedDateTime";

/// Line terminator used in exported CSV.
pub const CSV_LINE_END: &str = "\r\n";

/// A snapshot of everything recorded in the last session.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordedSession {
    samples: Vec<PositionSample>,
}

impl RecordedSession {
    /// Load all samples from the log. Missing or malformed data loads as an
    /// empty session.
    #[must_use]
    pub fn load(log: &SampleLog) -> Self {
        Self::from_samples(log.load())
    }

    /// Wrap already loaded samples.
    #[must_use]
    pub fn from_samples(samples: Vec<PositionSample>) -> Self {
        Self { samples }
    }

    /// The recorded samples in storage order.
    #[must_use]
    pub fn samples(&self) -> &[PositionSample] {
        &self.samples
    }

    /// Number of samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Check if nothing was recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Write the session as CSV.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoData`] if the session is empty, or an I/O error if
    /// writing fails.
    pub fn write_csv<W: Write>(&self, mut writer: W) -> Result<()> {
        if self.samples.is_empty() {
            return Err(Error::NoData);
        }

        write!(writer, "{CSV_HEADER}{CSV_LINE_END}")?;
        for s in &self.samples {
            write!(
                writer,
                "{},{},{},{},{},{},{}{CSV_LINE_END}",
                s.sequence_id,
                field(s.altitude),
                field(s.heading),
                s.latitude,
                s.longitude,
                field(s.speed_mph),
                s.recorded_at,
            )?;
        }
        writer.flush()?;
        Ok(())
    }

    /// Render the session as a CSV string.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoData`] if the session is empty.
    pub fn to_csv(&self) -> Result<String> {
        let mut buf = Vec::new();
        self.write_csv(&mut buf)?;
        String::from_utf8(buf).map_err(|e| Error::internal(e.to_string()))
    }

    /// Write the CSV to `file_name` inside `dir`, creating `dir` if needed.
    ///
    /// Returns the path written.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoData`] if the session is empty, or an error if the
    /// file cannot be written.
    pub fn export_to(&self, dir: &Path, file_name: &str) -> Result<PathBuf> {
        let csv = self.to_csv()?;

        fs::create_dir_all(dir).map_err(|source| Error::DirectoryCreate {
            path: dir.to_path_buf(),
            source,
        })?;
        let path = dir.join(file_name);
        fs::write(&path, csv)?;

        info!(path = %path.display(), samples = self.samples.len(), "Exported CSV");
        Ok(path)
    }
}

/// Formats an optional value, leaving the field empty when absent.
fn field<T: Display>(value: Option<T>) -> String {
    value.map(|v| v.to_string()).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{KeyValueStore, MemoryBackend, DEFAULT_SAMPLE_KEY};

    fn sample(sequence_id: u64, altitude: Option<f64>) -> PositionSample {
        PositionSample {
            sequence_id,
            altitude,
            heading: Some(90.0),
            latitude: 41.52,
            longitude: -70.67,
            speed_kmh: Some(36.0),
            speed_knots: Some(19.0),
            speed_mps: Some(10.0),
            speed_mph: Some(22.0),
            recorded_at: "2024-05-01T10:00:00.000-04:00".to_string(),
        }
    }

    #[test]
    fn test_empty_session_has_no_data() {
        let session = RecordedSession::default();
        assert!(session.to_csv().unwrap_err().is_no_data());
    }

    #[test]
    fn test_csv_has_header_and_one_line_per_sample() {
        let session = RecordedSession::from_samples(vec![
            sample(1, Some(12.5)),
            sample(2, Some(13.0)),
            sample(3, None),
        ]);
        let csv = session.to_csv().unwrap();

        let lines: Vec<&str> = csv.split_terminator(CSV_LINE_END).collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], CSV_HEADER);
        assert!(csv.ends_with("\r\n"));
        assert_eq!(csv.matches("\r\n").count(), 4);
        assert_eq!(
            lines[1],
            "1,12.5,90,41.52,-70.67,22,2024-05-01T10:00:00.000-04:00"
        );
    }

    #[test]
    fn test_absent_values_are_empty_fields() {
        let mut s = sample(7, None);
        s.speed_mph = None;
        let csv = RecordedSession::from_samples(vec![s]).to_csv().unwrap();

        assert!(csv.contains("\r\n7,,90,41.52,-70.67,,2024"));
    }

    #[test]
    fn test_load_from_log() {
        let mut log = SampleLog::new(KeyValueStore::new(MemoryBackend::new()), DEFAULT_SAMPLE_KEY);
        assert!(RecordedSession::load(&log).is_empty());

        log.append(sample(1, None)).unwrap();
        log.append(sample(2, None)).unwrap();
        let session = RecordedSession::load(&log);
        assert_eq!(session.len(), 2);
        assert_eq!(session.samples()[1].sequence_id, 2);
    }

    #[test]
    fn test_export_writes_file() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("exports");
        let session = RecordedSession::from_samples(vec![sample(1, Some(1.0))]);

        let path = session.export_to(&out, "ghost_timer_export.csv").unwrap();

        assert_eq!(path, out.join("ghost_timer_export.csv"));
        let written = std::fs::read_to_string(path).unwrap();
        assert!(written.starts_with(CSV_HEADER));
    }

    #[test]
    fn test_export_empty_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let result = RecordedSession::default().export_to(dir.path(), "out.csv");

        assert!(matches!(result, Err(Error::NoData)));
        assert!(!dir.path().join("out.csv").exists());
    }
}
