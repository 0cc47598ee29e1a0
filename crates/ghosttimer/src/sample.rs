//! Recorded position samples.
//!
//! A [`PositionSample`] is one geolocation reading taken by the stopwatch,
//! with its speed expressed in every unit the dashboard and export use.

use chrono::{DateTime, Local, SecondsFormat};
use serde::{Deserialize, Serialize};

use crate::location::Coordinates;

/// Meters per second to kilometers per hour.
pub const MPS_TO_KMH: f64 = 3.6;

/// Meters per second to knots.
pub const MPS_TO_KNOTS: f64 = 1.943_844;

/// Meters per second to statute miles per hour.
pub const MPS_TO_MPH: f64 = 2.236_936;

/// Meters to feet.
pub const METERS_TO_FEET: f64 = 3.2808;

/// One recorded geolocation reading.
///
/// Field names on the wire match the records written by earlier GhostTimer
/// releases, so a store populated by them still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionSample {
    /// Sequence number within the recording session, starting at 1.
    #[serde(rename = "PositionRecordLogID")]
    pub sequence_id: u64,

    /// Altitude in meters.
    #[serde(rename = "Altitude")]
    pub altitude: Option<f64>,

    /// Heading in degrees clockwise from true north.
    #[serde(rename = "Heading")]
    pub heading: Option<f64>,

    /// Latitude in decimal degrees.
    #[serde(rename = "Latitude")]
    pub latitude: f64,

    /// Longitude in decimal degrees.
    #[serde(rename = "Longitude")]
    pub longitude: f64,

    /// Speed in km/h, rounded to the nearest integer.
    #[serde(rename = "SpeedKilometersPerHour")]
    pub speed_kmh: Option<f64>,

    /// Speed in knots, rounded to the nearest integer.
    #[serde(rename = "SpeedKnots")]
    pub speed_knots: Option<f64>,

    /// Speed as reported by the device, in m/s.
    #[serde(rename = "SpeedMetersPerSecond")]
    pub speed_mps: Option<f64>,

    /// Speed in mph, rounded to the nearest integer.
    #[serde(rename = "SpeedMilesPerHour")]
    pub speed_mph: Option<f64>,

    /// When the sample was recorded (ISO-8601, local offset).
    #[serde(rename = "RecordedDateTime")]
    pub recorded_at: String,
}

impl PositionSample {
    /// Build a sample from a location reading.
    #[must_use]
    pub fn from_reading(
        sequence_id: u64,
        reading: &Coordinates,
        recorded_at: DateTime<Local>,
    ) -> Self {
        let speed_mps = reading.speed.filter(|s| s.is_finite());
        Self {
            sequence_id,
            altitude: reading.altitude,
            heading: reading.heading,
            latitude: reading.latitude,
            longitude: reading.longitude,
            speed_kmh: speed_mps.map(|s| (s * MPS_TO_KMH).round()),
            speed_knots: speed_mps.map(|s| (s * MPS_TO_KNOTS).round()),
            speed_mps,
            speed_mph: speed_mps.map(|s| (s * MPS_TO_MPH).round()),
            recorded_at: recorded_at.to_rfc3339_opts(SecondsFormat::Millis, false),
        }
    }

    /// Parse the recorded timestamp.
    ///
    /// Returns `None` for records whose timestamp is not RFC 3339.
    #[must_use]
    pub fn recorded_time(&self) -> Option<DateTime<Local>> {
        DateTime::parse_from_rfc3339(&self.recorded_at)
            .ok()
            .map(|dt| dt.with_timezone(&Local))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(speed: Option<f64>) -> Coordinates {
        Coordinates {
            latitude: 41.5,
            longitude: -70.6,
            altitude: Some(12.0),
            heading: Some(90.0),
            speed,
        }
    }

    #[test]
    fn test_speed_conversions_ten_mps() {
        let sample = PositionSample::from_reading(1, &reading(Some(10.0)), Local::now());

        assert_eq!(sample.speed_mps, Some(10.0));
        assert_eq!(sample.speed_kmh, Some(36.0));
        assert_eq!(sample.speed_knots, Some(19.0));
        assert_eq!(sample.speed_mph, Some(22.0));
    }

    #[test]
    fn test_missing_speed_stays_missing() {
        let sample = PositionSample::from_reading(1, &reading(None), Local::now());

        assert!(sample.speed_mps.is_none());
        assert!(sample.speed_kmh.is_none());
        assert!(sample.speed_knots.is_none());
        assert!(sample.speed_mph.is_none());
    }

    #[test]
    fn test_nan_speed_treated_as_missing() {
        let sample = PositionSample::from_reading(1, &reading(Some(f64::NAN)), Local::now());
        assert!(sample.speed_mph.is_none());
    }

    #[test]
    fn test_recorded_time_parses() {
        let now = Local::now();
        let sample = PositionSample::from_reading(7, &reading(Some(1.0)), now);

        let parsed = sample.recorded_time().unwrap();
        assert_eq!(parsed.timestamp_millis(), now.timestamp_millis());
        assert_eq!(sample.sequence_id, 7);
    }

    #[test]
    fn test_serializes_with_legacy_field_names() {
        let sample = PositionSample::from_reading(3, &reading(Some(2.0)), Local::now());
        let json = serde_json::to_string(&sample).unwrap();

        assert!(json.contains("\"PositionRecordLogID\":3"));
        assert!(json.contains("\"SpeedMilesPerHour\""));
        assert!(json.contains("\"RecordedDateTime\""));
    }

    #[test]
    fn test_deserializes_legacy_record_with_nulls() {
        let json = r#"{
            "PositionRecordLogID": 1,
            "Altitude": null,
            "Heading": null,
            "Latitude": 41.5,
            "Longitude": -70.6,
            "SpeedKilometersPerHour": null,
            "SpeedKnots": null,
            "SpeedMetersPerSecond": null,
            "SpeedMilesPerHour": null,
            "RecordedDateTime": "2021-06-01T10:00:00.000-04:00"
        }"#;
        let sample: PositionSample = serde_json::from_str(json).unwrap();

        assert_eq!(sample.sequence_id, 1);
        assert!(sample.altitude.is_none());
        assert!(sample.recorded_time().is_some());
    }
}
