//! Vehicle tracking across feed snapshots
//!
//! The Tracker owns the authoritative set of tracked vehicles and reconciles
//! it against each snapshot's observations:
//! - Empty snapshot: the whole set is dropped (hard reset)
//! - Vehicles absent from the snapshot are removed immediately
//! - Vehicles still present move, keeping their previous position
//! - Newly seen vehicles start with no movement history

mod handlers;

use crate::domain::types::{Observation, TrackedVehicle, VehicleId};
use std::collections::HashMap;
use tracing::debug;

/// What one reconciliation changed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub added: usize,
    pub removed: usize,
    pub updated: usize,
}

/// Set of tracked vehicles, at most one per id
#[derive(Debug, Default)]
pub struct Tracker {
    /// Active vehicles by feed id
    pub(crate) vehicles: HashMap<VehicleId, TrackedVehicle>,
}

impl Tracker {
    pub fn new() -> Self {
        Self { vehicles: HashMap::new() }
    }

    /// Bring the tracked set in line with one snapshot's observations
    ///
    /// Afterwards the tracked ids equal the observed ids exactly. When the
    /// same id is observed more than once, the last observation wins.
    pub fn reconcile(&mut self, observed: &[Observation]) -> ReconcileStats {
        if observed.is_empty() {
            return self.reset();
        }

        let latest = Self::latest_per_id(observed);

        let stats = if self.vehicles.is_empty() {
            self.bootstrap(&latest)
        } else {
            let removed = self.prune_missing(&latest);
            let mut stats = ReconcileStats { removed, ..Default::default() };
            for observation in &latest {
                if self.apply_observation(observation) {
                    stats.added += 1;
                } else {
                    stats.updated += 1;
                }
            }
            stats
        };

        debug!(
            tracked = %self.vehicles.len(),
            added = %stats.added,
            removed = %stats.removed,
            updated = %stats.updated,
            "tracking_reconciled"
        );

        stats
    }

    /// Get current tracked vehicle count
    pub fn len(&self) -> usize {
        self.vehicles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vehicles.is_empty()
    }

    pub fn get(&self, id: &VehicleId) -> Option<&TrackedVehicle> {
        self.vehicles.get(id)
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &TrackedVehicle> {
        self.vehicles.values()
    }

    pub fn vehicles_mut(&mut self) -> impl Iterator<Item = &mut TrackedVehicle> {
        self.vehicles.values_mut()
    }

    /// Tracked ids in sorted order, for stable logging and assertions
    pub fn ids(&self) -> Vec<VehicleId> {
        let mut ids: Vec<VehicleId> = self.vehicles.keys().cloned().collect();
        ids.sort();
        ids
    }
}
