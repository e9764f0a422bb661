//! IO modules - external system interfaces
//!
//! This module contains all external IO operations:
//! - `feed` - HTTP client for the vehicle position feed, plus recorded snapshots
//! - `indicator` - Signal rendering onto a pixel strip
//! - `blinky` - Serial pixel strip driver
//! - `prometheus` - Prometheus metrics HTTP endpoint

pub mod blinky;
pub mod feed;
pub mod indicator;
pub mod prometheus;

// Re-export commonly used types
pub use blinky::BlinkyTape;
pub use feed::{FeedClient, RecordedFeed, SnapshotSource};
pub use indicator::{Indicator, LogSink, PixelSink, StripIndicator};
