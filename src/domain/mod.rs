//! Domain models - core types and geometry
//!
//! This module contains the canonical data types used throughout the system:
//! - `Trigger` - configured line/direction with its alert and pass-by points
//! - `Observation` - a vehicle position parsed from one feed snapshot
//! - `TrackedVehicle` - a vehicle tracked across snapshots
//! - `GlobalSignals` - per-cycle aggregate of the tracked set
//! - `geo` - great-circle distance and containment predicates

pub mod geo;
pub mod types;

// Re-export commonly used types at module level
pub use types::{BoundingBox, GeoPoint, GlobalSignals, Observation, TrackedVehicle, Trigger, VehicleId};
