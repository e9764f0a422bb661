//! Error taxonomy
//!
//! - `FetchError` - the feed could not deliver a snapshot; recoverable after a cooldown
//! - `RecordError` - one malformed feed line; skipped, never aborts the batch
//! - `DeviceError` - the indicator strip is unreachable; fatal

use thiserror::Error;

#[derive(Error, Debug)]
pub enum FetchError {
    #[error("feed request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("feed responded with status {0}")]
    Status(u16),

    #[error("feed response unreadable")]
    Body(#[source] reqwest::Error),

    #[error("no recorded snapshots left")]
    Exhausted,
}

impl FetchError {
    /// Message with every underlying cause appended, outermost first
    pub fn report(self) -> String {
        format!("{:#}", anyhow::Error::from(self))
    }
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RecordError {
    #[error("record has {found} fields, need at least {needed}")]
    MissingFields { found: usize, needed: usize },

    #[error("field {field} is not a coordinate: {value:?}")]
    InvalidCoordinate { field: usize, value: String },

    #[error("non-finite coordinate ({lon}, {lat})")]
    NonFiniteCoordinate { lon: f64, lat: f64 },
}

impl RecordError {
    /// Short label for logs and metrics
    pub const fn code(&self) -> &'static str {
        match self {
            Self::MissingFields { .. } => "missing_fields",
            Self::InvalidCoordinate { .. } => "invalid_coordinate",
            Self::NonFiniteCoordinate { .. } => "non_finite_coordinate",
        }
    }
}

#[derive(Error, Debug)]
pub enum DeviceError {
    #[error("cannot open indicator device {device}: {source}")]
    Open {
        device: String,
        #[source]
        source: tokio_serial::Error,
    },

    #[error("indicator write failed: {0}")]
    Write(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_error_codes() {
        assert_eq!(RecordError::MissingFields { found: 2, needed: 6 }.code(), "missing_fields");
        assert_eq!(
            RecordError::InvalidCoordinate { field: 2, value: "x".to_string() }.code(),
            "invalid_coordinate"
        );
        assert_eq!(
            RecordError::NonFiniteCoordinate { lon: f64::NAN, lat: 0.0 }.code(),
            "non_finite_coordinate"
        );
    }

    #[test]
    fn test_error_messages() {
        let e = RecordError::MissingFields { found: 2, needed: 6 };
        assert_eq!(e.to_string(), "record has 2 fields, need at least 6");

        let e = FetchError::Status(503);
        assert_eq!(e.to_string(), "feed responded with status 503");
    }

    #[test]
    fn test_report_without_cause_is_display() {
        assert_eq!(FetchError::Status(503).report(), "feed responded with status 503");
        assert_eq!(FetchError::Exhausted.report(), "no recorded snapshots left");
    }
}
