//! Geographic predicates over (lon, lat) points
//!
//! Distances are great-circle distances on a spherical Earth (mean radius
//! 6371.009 km), which is accurate to well under a metre at geofence scale.

use crate::domain::types::{BoundingBox, GeoPoint};

/// Mean Earth radius in meters
pub const EARTH_RADIUS_M: f64 = 6_371_009.0;

/// Great-circle distance between two points in meters
pub fn great_circle_distance(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.lat.to_radians();
    let lat2 = b.lat.to_radians();
    let delta_lat = (b.lat - a.lat).to_radians();
    let delta_lon = (b.lon - a.lon).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * h.sqrt().atan2((1.0 - h).sqrt());

    EARTH_RADIUS_M * c
}

/// Half-open containment: lower-left edges are inside, upper-right edges are not
pub fn inside_bounding_box(point: GeoPoint, area: &BoundingBox) -> bool {
    point.lon >= area.lower_left.lon
        && point.lon < area.upper_right.lon
        && point.lat >= area.lower_left.lat
        && point.lat < area.upper_right.lat
}

/// True iff `point` is strictly closer than `radius_m` to `center`
pub fn inside_geofence(point: GeoPoint, center: GeoPoint, radius_m: f64) -> bool {
    great_circle_distance(point, center) < radius_m
}
