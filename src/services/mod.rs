//! Services - business logic and state management
//!
//! This module contains the core business logic services:
//! - `parser` - Feed lines to trigger-tagged observations
//! - `tracker` - Tracked vehicle set, reconciled against each snapshot
//! - `evaluator` - Per-vehicle geofence and movement classification
//! - `cadence` - Poll interval state machine and alert-armed memory
//! - `monitor` - Poll loop wiring the above to a feed and an indicator

pub mod cadence;
pub mod evaluator;
pub mod monitor;
pub mod parser;
pub mod tracker;

// Re-export commonly used types
pub use cadence::{Cadence, CadenceController};
pub use evaluator::StateEvaluator;
pub use monitor::{CycleOutcome, Monitor};
pub use tracker::Tracker;
