//! Reconciliation steps for the Tracker
//!
//! Each step mutates the tracked set for one case of a snapshot:
//! reset on empty input, bootstrap into an empty set, pruning of vehicles
//! that disappeared, and per-observation update or insert.

use super::{ReconcileStats, Tracker};
use crate::domain::types::{Observation, TrackedVehicle, VehicleId};
use std::collections::{HashMap, HashSet};
use tracing::{debug, info};

impl Tracker {
    /// Collapse duplicate ids, keeping the last observation for each
    ///
    /// Order of first appearance is kept so reconciliation is deterministic.
    pub(crate) fn latest_per_id(observed: &[Observation]) -> Vec<&Observation> {
        let mut slot_by_id: HashMap<&VehicleId, usize> = HashMap::with_capacity(observed.len());
        let mut latest: Vec<&Observation> = Vec::with_capacity(observed.len());

        for observation in observed {
            match slot_by_id.get(&observation.id) {
                Some(&slot) => latest[slot] = observation,
                None => {
                    slot_by_id.insert(&observation.id, latest.len());
                    latest.push(observation);
                }
            }
        }

        latest
    }

    /// Drop every tracked vehicle
    pub(crate) fn reset(&mut self) -> ReconcileStats {
        let removed = self.vehicles.len();
        if removed > 0 {
            info!(removed = %removed, "tracking_reset");
        }
        self.vehicles.clear();
        ReconcileStats { removed, ..Default::default() }
    }

    /// Fill an empty set straight from the observations
    pub(crate) fn bootstrap(&mut self, latest: &[&Observation]) -> ReconcileStats {
        for observation in latest {
            self.insert_new(observation);
        }
        ReconcileStats { added: latest.len(), ..Default::default() }
    }

    /// Remove vehicles not present in this snapshot, returning how many went
    pub(crate) fn prune_missing(&mut self, latest: &[&Observation]) -> usize {
        let present: HashSet<&VehicleId> = latest.iter().map(|o| &o.id).collect();
        let before = self.vehicles.len();

        self.vehicles.retain(|id, vehicle| {
            let keep = present.contains(id);
            if !keep {
                info!(vehicle = %id, last_position = %vehicle.position, "vehicle_dropped");
            }
            keep
        });

        before - self.vehicles.len()
    }

    /// Move an existing vehicle or start tracking a new one
    ///
    /// Returns true if the vehicle was newly added.
    pub(crate) fn apply_observation(&mut self, observation: &Observation) -> bool {
        match self.vehicles.get_mut(&observation.id) {
            Some(vehicle) => {
                vehicle.advance_to(observation.position);
                debug!(
                    vehicle = %vehicle.id,
                    from = %vehicle.previous_position,
                    to = %vehicle.position,
                    "vehicle_moved"
                );
                false
            }
            None => {
                self.insert_new(observation);
                true
            }
        }
    }

    fn insert_new(&mut self, observation: &Observation) {
        info!(vehicle = %observation.id, position = %observation.position, "vehicle_tracked");
        self.vehicles
            .insert(observation.id.clone(), TrackedVehicle::from_observation(observation));
    }
}
