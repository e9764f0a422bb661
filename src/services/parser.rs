//! Feed record parsing
//!
//! Each snapshot line is one vehicle, semicolon separated:
//! `id;line;lon;lat;<unused>;direction[;...]`
//!
//! A line yields one observation per trigger whose line and direction match.
//! Malformed lines are skipped; they never abort the batch.

use crate::domain::types::{GeoPoint, Observation, Trigger, VehicleId};
use crate::infra::error::RecordError;
use tracing::debug;

const FIELD_ID: usize = 0;
const FIELD_LINE: usize = 1;
const FIELD_LON: usize = 2;
const FIELD_LAT: usize = 3;
const FIELD_DIRECTION: usize = 5;
const MIN_FIELDS: usize = FIELD_DIRECTION + 1;

/// Fields the engine reads from one feed line
#[derive(Debug, Clone, PartialEq)]
pub struct FeedRecord<'a> {
    pub id: &'a str,
    pub line: &'a str,
    pub position: GeoPoint,
    pub direction: &'a str,
}

/// Result of parsing one snapshot
#[derive(Debug, Default)]
pub struct ParsedSnapshot {
    pub observations: Vec<Observation>,
    /// Lines dropped as malformed
    pub skipped: usize,
}

fn parse_coordinate(fields: &[&str], field: usize) -> Result<f64, RecordError> {
    let raw = fields[field];
    raw.trim()
        .parse::<f64>()
        .map_err(|_| RecordError::InvalidCoordinate { field, value: raw.to_string() })
}

/// Split and validate one feed line
pub fn parse_record(line: &str) -> Result<FeedRecord<'_>, RecordError> {
    let fields: Vec<&str> = line.split(';').collect();
    if fields.len() < MIN_FIELDS {
        return Err(RecordError::MissingFields { found: fields.len(), needed: MIN_FIELDS });
    }

    let position = GeoPoint::new(
        parse_coordinate(&fields, FIELD_LON)?,
        parse_coordinate(&fields, FIELD_LAT)?,
    );
    if !position.is_finite() {
        return Err(RecordError::NonFiniteCoordinate { lon: position.lon, lat: position.lat });
    }

    Ok(FeedRecord {
        id: fields[FIELD_ID],
        line: fields[FIELD_LINE],
        position,
        direction: fields[FIELD_DIRECTION].trim(),
    })
}

/// Parse a snapshot into observations for the configured triggers
pub fn parse_snapshot<S: AsRef<str>>(lines: &[S], triggers: &[Trigger]) -> ParsedSnapshot {
    let mut parsed = ParsedSnapshot::default();

    for raw in lines {
        let raw = raw.as_ref().trim_end_matches('\r');
        if raw.trim().is_empty() {
            continue;
        }

        let record = match parse_record(raw) {
            Ok(record) => record,
            Err(e) => {
                debug!(line = %raw, reason = %e.code(), error = %e, "record_skipped");
                parsed.skipped += 1;
                continue;
            }
        };

        for trigger in triggers.iter().filter(|t| t.matches(record.line, record.direction)) {
            parsed.observations.push(Observation {
                id: VehicleId::from(record.id),
                position: record.position,
                alert_point: trigger.alert_point,
                passby_point: trigger.passby_point,
            });
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    fn triggers() -> Vec<Trigger> {
        vec![
            Trigger {
                line: "1006".to_string(),
                direction: "1".to_string(),
                alert_point: GeoPoint::new(24.924765, 60.161483),
                passby_point: GeoPoint::new(24.928901, 60.161841),
            },
            Trigger {
                line: "1006T".to_string(),
                direction: "1".to_string(),
                alert_point: GeoPoint::new(24.924765, 60.161483),
                passby_point: GeoPoint::new(24.928901, 60.161841),
            },
        ]
    }

    #[test]
    fn test_parse_record_fields() {
        let record = parse_record("42;1006;24.9248;60.16149;0;1").unwrap();
        assert_eq!(record.id, "42");
        assert_eq!(record.line, "1006");
        assert_eq!(record.position, GeoPoint::new(24.9248, 60.16149));
        assert_eq!(record.direction, "1");
    }

    #[test]
    fn test_parse_record_ignores_extra_fields() {
        let record = parse_record("42;1006;24.9248;60.16149;180;1;extra;fields").unwrap();
        assert_eq!(record.direction, "1");
    }

    #[test]
    fn test_parse_record_missing_fields() {
        assert_eq!(
            parse_record("42;1006;24.9248").unwrap_err(),
            RecordError::MissingFields { found: 3, needed: 6 }
        );
    }

    #[test]
    fn test_parse_record_bad_coordinate() {
        let err = parse_record("42;1006;east;60.16149;0;1").unwrap_err();
        assert_eq!(err, RecordError::InvalidCoordinate { field: 2, value: "east".to_string() });
    }

    #[test]
    fn test_parse_record_non_finite_coordinate() {
        let err = parse_record("42;1006;NaN;60.16149;0;1").unwrap_err();
        assert_eq!(err.code(), "non_finite_coordinate");
        let err = parse_record("42;1006;24.9;inf;0;1").unwrap_err();
        assert_eq!(err.code(), "non_finite_coordinate");
    }

    #[test]
    fn test_snapshot_example_line() {
        let parsed = parse_snapshot(&["42;1006;24.9248;60.16149;0;1"], &triggers());
        assert_eq!(parsed.observations.len(), 1);
        assert_eq!(parsed.skipped, 0);

        let obs = &parsed.observations[0];
        assert_eq!(obs.id, VehicleId::from("42"));
        assert_eq!(obs.position, GeoPoint::new(24.9248, 60.16149));
        assert_eq!(obs.alert_point, GeoPoint::new(24.924765, 60.161483));
        assert_eq!(obs.passby_point, GeoPoint::new(24.928901, 60.161841));
    }

    #[test]
    fn test_snapshot_filters_line_and_direction() {
        let lines = [
            "1;1006;24.92;60.16;0;1",
            "2;1006;24.92;60.16;0;0",  // wrong direction
            "3;1007;24.92;60.16;0;1",  // untracked line
            "4;1006T;24.92;60.16;0;1", // second trigger
        ];
        let parsed = parse_snapshot(&lines, &triggers());
        let ids: Vec<&str> = parsed.observations.iter().map(|o| o.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "4"]);
    }

    #[test]
    fn test_snapshot_skips_malformed_lines() {
        let lines = [
            "garbage",
            "1;1006;24.92;60.16;0;1",
            "2;1006;not-a-number;60.16;0;1",
            "3;1006;24.93;60.17;0;1",
        ];
        let parsed = parse_snapshot(&lines, &triggers());
        assert_eq!(parsed.observations.len(), 2);
        assert_eq!(parsed.skipped, 2);
    }

    #[test]
    fn test_snapshot_empty_input() {
        let lines: [&str; 0] = [];
        let parsed = parse_snapshot(&lines, &triggers());
        assert!(parsed.observations.is_empty());
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn test_snapshot_blank_lines_not_counted() {
        let parsed = parse_snapshot(&["", "  ", "1;1006;24.92;60.16;0;1\r"], &triggers());
        assert_eq!(parsed.observations.len(), 1);
        assert_eq!(parsed.skipped, 0);
    }

    #[test]
    fn test_snapshot_overlapping_triggers_emit_duplicates() {
        let mut overlapping = triggers();
        overlapping[1].line = "1006".to_string();
        overlapping[1].alert_point = GeoPoint::new(1.0, 1.0);

        let parsed = parse_snapshot(&["1;1006;24.92;60.16;0;1"], &overlapping);
        assert_eq!(parsed.observations.len(), 2);
        assert_eq!(parsed.observations[0].id, parsed.observations[1].id);
        assert_eq!(parsed.observations[1].alert_point, GeoPoint::new(1.0, 1.0));
    }
}
