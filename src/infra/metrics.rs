//! Lock-free metrics collection and periodic reporting
//!
//! The poll loop records counters and gauges with atomics; the periodic
//! reporter and the Prometheus endpoint read them without taking locks.
//!
//! NOTE: All atomics use Relaxed ordering intentionally. These are statistical
//! counters only. Do NOT use these atomics for coordination or logic decisions.

use crate::domain::types::GlobalSignals;
use crate::services::cadence::Cadence;
use crate::services::tracker::ReconcileStats;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Feed fetch latency bucket boundaries (milliseconds)
/// Buckets: ≤25, ≤50, ≤100, ≤200, ≤400, ≤800, ≤1600, ≤3200, ≤6400, ≤12800, >12800
pub const FETCH_BUCKET_BOUNDS: [u64; 10] = [25, 50, 100, 200, 400, 800, 1600, 3200, 6400, 12800];
pub const NUM_BUCKETS: usize = 11;

/// Cadence gauge values
pub const CADENCE_INTENSIVE: u64 = 0;
pub const CADENCE_NORMAL: u64 = 1;

/// Compute bucket index for a latency value using binary search
#[inline]
fn bucket_index(latency_ms: u64) -> usize {
    FETCH_BUCKET_BOUNDS.partition_point(|&bound| bound < latency_ms)
}

/// Update an atomic max value using compare-and-swap loop
#[inline]
fn update_atomic_max(atomic_max: &AtomicU64, new_value: u64) {
    let mut current_max = atomic_max.load(Ordering::Relaxed);
    while new_value > current_max {
        match atomic_max.compare_exchange_weak(
            current_max,
            new_value,
            Ordering::Relaxed,
            Ordering::Relaxed,
        ) {
            Ok(_) => break,
            Err(actual) => current_max = actual,
        }
    }
}

/// Swap all buckets to zero and return their values
#[inline]
fn swap_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.swap(0, Ordering::Relaxed);
    }
    result
}

/// Load all bucket values without resetting
#[inline]
fn load_buckets(buckets: &[AtomicU64; NUM_BUCKETS]) -> [u64; NUM_BUCKETS] {
    let mut result = [0u64; NUM_BUCKETS];
    for (i, bucket) in buckets.iter().enumerate() {
        result[i] = bucket.load(Ordering::Relaxed);
    }
    result
}

/// Compute percentile from histogram buckets
/// Returns the upper bound of the bucket containing the percentile
fn percentile_from_buckets(buckets: &[u64; NUM_BUCKETS], percentile: f64) -> u64 {
    let total: u64 = buckets.iter().sum();
    if total == 0 {
        return 0;
    }

    let target = ((total as f64 * percentile).ceil() as u64).max(1);
    let mut cumulative = 0u64;

    // Upper bounds for each bucket (last bucket uses 2x the previous bound)
    const BUCKET_UPPER_BOUNDS: [u64; NUM_BUCKETS] =
        [25, 50, 100, 200, 400, 800, 1600, 3200, 6400, 12800, 25600];

    for (i, &count) in buckets.iter().enumerate() {
        cumulative += count;
        if cumulative >= target {
            return BUCKET_UPPER_BOUNDS[i];
        }
    }
    BUCKET_UPPER_BOUNDS[NUM_BUCKETS - 1]
}

/// Lock-free metrics collector
pub struct Metrics {
    /// Poll cycles started (monotonic)
    cycles_total: AtomicU64,
    /// Snapshots the feed failed to deliver (monotonic)
    fetch_failures_total: AtomicU64,
    /// Observations produced by the parser (monotonic)
    observations_total: AtomicU64,
    /// Malformed feed lines skipped (monotonic)
    records_skipped_total: AtomicU64,
    /// Observations dropped for lying outside the area (monotonic)
    observations_clipped_total: AtomicU64,
    /// Vehicles that started being tracked (monotonic)
    vehicles_added_total: AtomicU64,
    /// Vehicles that stopped being tracked (monotonic)
    vehicles_removed_total: AtomicU64,
    /// Current tracked vehicle count
    tracked_vehicles: AtomicU64,
    /// Current moving vehicle count
    moving_vehicles: AtomicU64,
    /// Alert-armed flag (0/1)
    alert_armed: AtomicU64,
    /// Current cadence (0=intensive, 1=normal)
    cadence: AtomicU64,
    /// Fetch latency histogram buckets since start (monotonic, exported)
    fetch_latency_total_buckets: [AtomicU64; NUM_BUCKETS],
    /// Sum of fetch latencies in ms since start (monotonic, exported)
    fetch_latency_total_sum_ms: AtomicU64,
    /// Fetch latency histogram buckets (reset on report)
    fetch_latency_buckets: [AtomicU64; NUM_BUCKETS],
    /// Sum of fetch latencies in ms (reset on report)
    fetch_latency_sum_ms: AtomicU64,
    /// Max fetch latency in ms (reset on report)
    fetch_latency_max_ms: AtomicU64,
}

/// Snapshot of metrics at report time
#[derive(Debug, Clone)]
pub struct MetricsSummary {
    pub cycles_total: u64,
    pub fetch_failures_total: u64,
    pub observations_total: u64,
    pub records_skipped_total: u64,
    pub observations_clipped_total: u64,
    pub vehicles_added_total: u64,
    pub vehicles_removed_total: u64,
    pub tracked_vehicles: u64,
    pub moving_vehicles: u64,
    pub alert_armed: bool,
    pub cadence: u64,
    /// Cumulative latency histogram, never reset
    pub fetch_total_buckets: [u64; NUM_BUCKETS],
    pub fetch_total_sum_ms: u64,
    /// Latency histogram of the current report window
    pub fetch_buckets: [u64; NUM_BUCKETS],
    pub fetches_since_report: u64,
    pub fetch_avg_ms: u64,
    pub fetch_max_ms: u64,
    pub fetch_p50_ms: u64,
    pub fetch_p99_ms: u64,
}

impl Metrics {
    pub fn new() -> Self {
        Self {
            cycles_total: AtomicU64::new(0),
            fetch_failures_total: AtomicU64::new(0),
            observations_total: AtomicU64::new(0),
            records_skipped_total: AtomicU64::new(0),
            observations_clipped_total: AtomicU64::new(0),
            vehicles_added_total: AtomicU64::new(0),
            vehicles_removed_total: AtomicU64::new(0),
            tracked_vehicles: AtomicU64::new(0),
            moving_vehicles: AtomicU64::new(0),
            alert_armed: AtomicU64::new(0),
            cadence: AtomicU64::new(CADENCE_INTENSIVE),
            fetch_latency_total_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            fetch_latency_total_sum_ms: AtomicU64::new(0),
            fetch_latency_buckets: std::array::from_fn(|_| AtomicU64::new(0)),
            fetch_latency_sum_ms: AtomicU64::new(0),
            fetch_latency_max_ms: AtomicU64::new(0),
        }
    }

    #[inline]
    pub fn record_cycle(&self) {
        self.cycles_total.fetch_add(1, Ordering::Relaxed);
    }

    /// Record a completed feed request with its latency
    #[inline]
    pub fn record_fetch(&self, latency_ms: u64) {
        let bucket = bucket_index(latency_ms);
        self.fetch_latency_total_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.fetch_latency_total_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        self.fetch_latency_sum_ms.fetch_add(latency_ms, Ordering::Relaxed);
        self.fetch_latency_buckets[bucket].fetch_add(1, Ordering::Relaxed);
        update_atomic_max(&self.fetch_latency_max_ms, latency_ms);
    }

    #[inline]
    pub fn record_fetch_failure(&self) {
        self.fetch_failures_total.fetch_add(1, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_parse(&self, observations: usize, skipped: usize, clipped: usize) {
        self.observations_total.fetch_add(observations as u64, Ordering::Relaxed);
        self.records_skipped_total.fetch_add(skipped as u64, Ordering::Relaxed);
        self.observations_clipped_total.fetch_add(clipped as u64, Ordering::Relaxed);
    }

    #[inline]
    pub fn record_reconcile(&self, stats: &ReconcileStats) {
        self.vehicles_added_total.fetch_add(stats.added as u64, Ordering::Relaxed);
        self.vehicles_removed_total.fetch_add(stats.removed as u64, Ordering::Relaxed);
    }

    /// Publish the current cycle's engine state as gauges
    #[inline]
    pub fn set_engine_state(&self, signals: &GlobalSignals, alert_armed: bool, cadence: Cadence) {
        self.tracked_vehicles.store(signals.tracked_count as u64, Ordering::Relaxed);
        self.moving_vehicles.store(signals.moving_count as u64, Ordering::Relaxed);
        self.alert_armed.store(u64::from(alert_armed), Ordering::Relaxed);
        let cadence = match cadence {
            Cadence::Intensive => CADENCE_INTENSIVE,
            Cadence::Normal => CADENCE_NORMAL,
        };
        self.cadence.store(cadence, Ordering::Relaxed);
    }

    #[inline]
    pub fn cycles_total(&self) -> u64 {
        self.cycles_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn fetch_failures_total(&self) -> u64 {
        self.fetch_failures_total.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn tracked_vehicles(&self) -> u64 {
        self.tracked_vehicles.load(Ordering::Relaxed)
    }

    /// Take a summary, resetting the since-report latency histogram
    pub fn report(&self) -> MetricsSummary {
        self.summarize(true)
    }

    /// Take a summary without disturbing the report window
    pub fn snapshot(&self) -> MetricsSummary {
        self.summarize(false)
    }

    fn summarize(&self, reset: bool) -> MetricsSummary {
        let (fetch_buckets, sum_ms, max_ms) = if reset {
            (
                swap_buckets(&self.fetch_latency_buckets),
                self.fetch_latency_sum_ms.swap(0, Ordering::Relaxed),
                self.fetch_latency_max_ms.swap(0, Ordering::Relaxed),
            )
        } else {
            (
                load_buckets(&self.fetch_latency_buckets),
                self.fetch_latency_sum_ms.load(Ordering::Relaxed),
                self.fetch_latency_max_ms.load(Ordering::Relaxed),
            )
        };
        let fetches_since_report: u64 = fetch_buckets.iter().sum();
        let fetch_avg_ms = if fetches_since_report > 0 { sum_ms / fetches_since_report } else { 0 };

        MetricsSummary {
            cycles_total: self.cycles_total.load(Ordering::Relaxed),
            fetch_failures_total: self.fetch_failures_total.load(Ordering::Relaxed),
            observations_total: self.observations_total.load(Ordering::Relaxed),
            records_skipped_total: self.records_skipped_total.load(Ordering::Relaxed),
            observations_clipped_total: self.observations_clipped_total.load(Ordering::Relaxed),
            vehicles_added_total: self.vehicles_added_total.load(Ordering::Relaxed),
            vehicles_removed_total: self.vehicles_removed_total.load(Ordering::Relaxed),
            tracked_vehicles: self.tracked_vehicles.load(Ordering::Relaxed),
            moving_vehicles: self.moving_vehicles.load(Ordering::Relaxed),
            alert_armed: self.alert_armed.load(Ordering::Relaxed) != 0,
            cadence: self.cadence.load(Ordering::Relaxed),
            fetch_total_buckets: load_buckets(&self.fetch_latency_total_buckets),
            fetch_total_sum_ms: self.fetch_latency_total_sum_ms.load(Ordering::Relaxed),
            fetch_buckets,
            fetches_since_report,
            fetch_avg_ms,
            fetch_max_ms: max_ms,
            fetch_p50_ms: percentile_from_buckets(&fetch_buckets, 0.50),
            fetch_p99_ms: percentile_from_buckets(&fetch_buckets, 0.99),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl MetricsSummary {
    pub fn log(&self) {
        info!(
            cycles = %self.cycles_total,
            fetch_failures = %self.fetch_failures_total,
            fetches = %self.fetches_since_report,
            fetch_avg_ms = %self.fetch_avg_ms,
            fetch_p99_ms = %self.fetch_p99_ms,
            fetch_max_ms = %self.fetch_max_ms,
            skipped_records = %self.records_skipped_total,
            tracked = %self.tracked_vehicles,
            moving = %self.moving_vehicles,
            alert_armed = %self.alert_armed,
            "metrics"
        );
    }
}
