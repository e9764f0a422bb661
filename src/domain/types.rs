//! Shared types for the transit beacon

use serde::{Deserialize, Serialize};

/// Geographic point in (longitude, latitude) order, degrees
///
/// Serialized as a two-element `[lon, lat]` array to match the config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct GeoPoint {
    pub lon: f64,
    pub lat: f64,
}

impl GeoPoint {
    pub const fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    pub fn is_finite(&self) -> bool {
        self.lon.is_finite() && self.lat.is_finite()
    }
}

impl From<[f64; 2]> for GeoPoint {
    fn from(pair: [f64; 2]) -> Self {
        Self { lon: pair[0], lat: pair[1] }
    }
}

impl From<GeoPoint> for [f64; 2] {
    fn from(point: GeoPoint) -> Self {
        [point.lon, point.lat]
    }
}

impl std::fmt::Display for GeoPoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.lon, self.lat)
    }
}

/// Rectangular area given by its lower-left and upper-right corners
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub lower_left: GeoPoint,
    pub upper_right: GeoPoint,
}

/// Newtype wrapper for feed-assigned vehicle IDs
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VehicleId(pub String);

impl VehicleId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for VehicleId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl std::fmt::Display for VehicleId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A (line, direction) pair of interest with its two geofence centers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trigger {
    pub line: String,
    pub direction: String,
    pub alert_point: GeoPoint,
    pub passby_point: GeoPoint,
}

impl Trigger {
    pub fn matches(&self, line: &str, direction: &str) -> bool {
        self.line == line && self.direction == direction
    }
}

/// One vehicle position from one snapshot, tagged with its trigger's geofences
#[derive(Debug, Clone, PartialEq)]
pub struct Observation {
    pub id: VehicleId,
    pub position: GeoPoint,
    pub alert_point: GeoPoint,
    pub passby_point: GeoPoint,
}

/// A vehicle present in every snapshot since it was first seen
#[derive(Debug, Clone, PartialEq)]
pub struct TrackedVehicle {
    pub id: VehicleId,
    /// Latest known position
    pub position: GeoPoint,
    /// Position as of the prior successful poll
    pub previous_position: GeoPoint,
    pub alert_point: GeoPoint,
    pub passby_point: GeoPoint,
    // Derived each evaluation cycle
    pub inside_alert: bool,
    pub inside_passby: bool,
    pub moving: bool,
}

impl TrackedVehicle {
    /// Start tracking; a fresh vehicle has no movement history
    pub fn from_observation(observation: &Observation) -> Self {
        Self {
            id: observation.id.clone(),
            position: observation.position,
            previous_position: observation.position,
            alert_point: observation.alert_point,
            passby_point: observation.passby_point,
            inside_alert: false,
            inside_passby: false,
            moving: false,
        }
    }

    /// Shift the current position into history and take the new one
    pub fn advance_to(&mut self, position: GeoPoint) {
        self.previous_position = self.position;
        self.position = position;
    }
}

/// Aggregate signals derived from the tracked set each cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct GlobalSignals {
    pub alert_and_not_moving: bool,
    pub alert_and_moving: bool,
    pub passby_and_moving: bool,
    pub moving_count: usize,
    pub tracked_count: usize,
}

impl GlobalSignals {
    /// Any vehicle inside the alert geofence, moving or not
    pub fn has_alert(&self) -> bool {
        self.alert_and_moving || self.alert_and_not_moving
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn observation(id: &str, lon: f64, lat: f64) -> Observation {
        Observation {
            id: VehicleId::from(id),
            position: GeoPoint::new(lon, lat),
            alert_point: GeoPoint::new(24.924765, 60.161483),
            passby_point: GeoPoint::new(24.928901, 60.161841),
        }
    }

    #[test]
    fn test_geo_point_from_array() {
        let p = GeoPoint::from([24.9, 60.1]);
        assert_eq!(p.lon, 24.9);
        assert_eq!(p.lat, 60.1);
        assert_eq!(<[f64; 2]>::from(p), [24.9, 60.1]);
    }

    #[test]
    fn test_geo_point_is_finite() {
        assert!(GeoPoint::new(24.9, 60.1).is_finite());
        assert!(!GeoPoint::new(f64::NAN, 60.1).is_finite());
        assert!(!GeoPoint::new(24.9, f64::INFINITY).is_finite());
    }

    #[test]
    fn test_trigger_matches() {
        let trigger = Trigger {
            line: "1006".to_string(),
            direction: "1".to_string(),
            alert_point: GeoPoint::new(0.0, 0.0),
            passby_point: GeoPoint::new(0.0, 0.0),
        };
        assert!(trigger.matches("1006", "1"));
        assert!(!trigger.matches("1006", "0"));
        assert!(!trigger.matches("1006T", "1"));
    }

    #[test]
    fn test_new_vehicle_has_no_history() {
        let vehicle = TrackedVehicle::from_observation(&observation("42", 24.9248, 60.16149));
        assert_eq!(vehicle.id.as_str(), "42");
        assert_eq!(vehicle.previous_position, vehicle.position);
        assert!(!vehicle.moving);
        assert!(!vehicle.inside_alert);
        assert!(!vehicle.inside_passby);
    }

    #[test]
    fn test_advance_to_keeps_previous_position() {
        let mut vehicle = TrackedVehicle::from_observation(&observation("42", 24.9248, 60.16149));
        vehicle.advance_to(GeoPoint::new(24.9260, 60.1616));
        assert_eq!(vehicle.previous_position, GeoPoint::new(24.9248, 60.16149));
        assert_eq!(vehicle.position, GeoPoint::new(24.9260, 60.1616));
    }

    #[test]
    fn test_has_alert() {
        let mut signals = GlobalSignals::default();
        assert!(!signals.has_alert());
        signals.alert_and_moving = true;
        assert!(signals.has_alert());
        signals = GlobalSignals { alert_and_not_moving: true, ..Default::default() };
        assert!(signals.has_alert());
    }
}
