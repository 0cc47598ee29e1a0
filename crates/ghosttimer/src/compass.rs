//! Heading to compass octant classification.

use serde::{Deserialize, Serialize};

/// One of the eight compass octants, or no usable heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Compass {
    /// North, 349..=11 degrees.
    N,
    /// Northeast, 12..=78 degrees.
    NE,
    /// East, 79..=101 degrees.
    E,
    /// Southeast, 102..=168 degrees.
    SE,
    /// South, 169..=191 degrees.
    S,
    /// Southwest, 192..=258 degrees.
    SW,
    /// West, 259..=281 degrees.
    W,
    /// Northwest, 282..=348 degrees.
    NW,
    /// The device did not report a heading.
    Unavailable,
}

impl Compass {
    /// All eight octants, clockwise from north.
    pub const OCTANTS: [Compass; 8] = [
        Self::N,
        Self::NE,
        Self::E,
        Self::SE,
        Self::S,
        Self::SW,
        Self::W,
        Self::NW,
    ];

    /// Display label.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::N => "N",
            Self::NE => "NE",
            Self::E => "E",
            Self::SE => "SE",
            Self::S => "S",
            Self::SW => "SW",
            Self::W => "W",
            Self::NW => "NW",
            Self::Unavailable => "N/A",
        }
    }
}

impl std::fmt::Display for Compass {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.pad(self.label())
    }
}

/// Classify a heading in degrees into a compass octant.
///
/// The heading is rounded up to a whole degree and normalized into
/// `0..360` before the band lookup, so every finite input lands in exactly
/// one octant. Missing or non-finite headings yield [`Compass::Unavailable`].
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub fn classify(heading: Option<f64>) -> Compass {
    let Some(heading) = heading.filter(|h| h.is_finite()) else {
        return Compass::Unavailable;
    };

    let degrees = (heading.ceil() as i64).rem_euclid(360);
    match degrees {
        0..=11 | 349..=359 => Compass::N,
        12..=78 => Compass::NE,
        79..=101 => Compass::E,
        102..=168 => Compass::SE,
        169..=191 => Compass::S,
        192..=258 => Compass::SW,
        259..=281 => Compass::W,
        _ => Compass::NW,
    }
}
