//! Error types for clue-geo.

use std::fmt;

use thiserror::Error;

/// Result type alias using clue-geo's error type.
pub type Result<T> = std::result::Result<T, GeoError>;

/// Coordinate axis, used to report which extent of a region collapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Axis {
    Latitude,
    Longitude,
}

impl fmt::Display for Axis {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Axis::Latitude => write!(f, "latitude"),
            Axis::Longitude => write!(f, "longitude"),
        }
    }
}

/// Errors raised while building search geometry.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeoError {
    /// The bounding box has zero area.
    #[error("bounding box has zero {axis} extent at {value}")]
    DegenerateRegion { axis: Axis, value: f64 },

    /// A coordinate was NaN or infinite.
    #[error("coordinate `{field}` is not a finite number: {value}")]
    NonFiniteCoordinate { field: &'static str, value: f64 },

    /// Transformed corners coincide, so no simple ring can be formed.
    #[error("polygon ring needs 4 distinct corners, got {distinct}")]
    CollapsedRing { distinct: usize },

    /// Textual bounding box could not be parsed.
    #[error("invalid bounding box: {0}")]
    Parse(String),
}

impl GeoError {
    /// Whether the error describes a zero-area or otherwise unusable region.
    pub fn is_degenerate(&self) -> bool {
        matches!(
            self,
            GeoError::DegenerateRegion { .. } | GeoError::CollapsedRing { .. }
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_display_names_axis() {
        let err = GeoError::DegenerateRegion {
            axis: Axis::Longitude,
            value: 10.0,
        };
        assert_eq!(
            err.to_string(),
            "bounding box has zero longitude extent at 10"
        );
        assert!(err.is_degenerate());
    }

    #[test]
    fn test_non_finite_is_not_degenerate() {
        let err = GeoError::NonFiniteCoordinate {
            field: "ne_lat",
            value: f64::NAN,
        };
        assert!(!err.is_degenerate());
        assert!(err.to_string().contains("ne_lat"));
    }
}
