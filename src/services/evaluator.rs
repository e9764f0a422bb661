//! Per-vehicle state evaluation and signal aggregation
//!
//! Each cycle every tracked vehicle is classified as moving or not and as
//! inside or outside its alert and pass-by geofences. The per-vehicle flags
//! are then folded into `GlobalSignals`, recomputed from scratch every cycle.

use crate::domain::geo::{great_circle_distance, inside_geofence};
use crate::domain::types::{GlobalSignals, TrackedVehicle};
use crate::infra::config::Config;
use crate::services::tracker::Tracker;
use tracing::debug;

/// Classifies tracked vehicles against the shared geofence radius and movement threshold
#[derive(Debug, Clone, Copy)]
pub struct StateEvaluator {
    search_radius_m: f64,
    move_threshold_m: f64,
}

impl StateEvaluator {
    pub fn new(config: &Config) -> Self {
        Self::with_thresholds(config.search_radius_m(), config.move_threshold_m())
    }

    pub fn with_thresholds(search_radius_m: f64, move_threshold_m: f64) -> Self {
        Self { search_radius_m, move_threshold_m }
    }

    pub fn search_radius_m(&self) -> f64 {
        self.search_radius_m
    }

    pub fn move_threshold_m(&self) -> f64 {
        self.move_threshold_m
    }

    /// Refresh every vehicle's derived flags and aggregate them
    pub fn evaluate(&self, tracker: &mut Tracker) -> GlobalSignals {
        let mut signals = GlobalSignals::default();

        for vehicle in tracker.vehicles_mut() {
            self.classify(vehicle);

            signals.tracked_count += 1;
            if vehicle.moving {
                signals.moving_count += 1;
            }
            if vehicle.inside_alert && vehicle.moving {
                signals.alert_and_moving = true;
            }
            if vehicle.inside_alert && !vehicle.moving {
                signals.alert_and_not_moving = true;
            }
            if vehicle.inside_passby && vehicle.moving {
                signals.passby_and_moving = true;
            }
        }

        signals
    }

    /// Derive one vehicle's moving and geofence flags
    pub fn classify(&self, vehicle: &mut TrackedVehicle) {
        let moved_m = great_circle_distance(vehicle.position, vehicle.previous_position);

        // Reaching the threshold exactly counts as moving
        vehicle.moving = moved_m >= self.move_threshold_m;
        vehicle.inside_alert =
            inside_geofence(vehicle.position, vehicle.alert_point, self.search_radius_m);
        vehicle.inside_passby =
            inside_geofence(vehicle.position, vehicle.passby_point, self.search_radius_m);

        debug!(
            vehicle = %vehicle.id,
            moved_m = %format!("{moved_m:.1}"),
            moving = %vehicle.moving,
            alert = %vehicle.inside_alert,
            passby = %vehicle.inside_passby,
            "vehicle_classified"
        );
    }
}
