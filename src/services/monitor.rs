//! Poll loop
//!
//! One cycle: fetch -> parse -> clip to area -> reconcile -> evaluate ->
//! cadence -> render. A failed fetch shows the failure color and leaves the
//! tracked set and cadence untouched; the loop then waits out the cooldown.
//! Device errors end the loop since nothing can be shown any more.

use crate::domain::geo::inside_bounding_box;
use crate::domain::types::{BoundingBox, GlobalSignals, Trigger};
use crate::infra::config::Config;
use crate::infra::error::DeviceError;
use crate::infra::metrics::Metrics;
use crate::io::feed::SnapshotSource;
use crate::io::indicator::Indicator;
use crate::services::cadence::CadenceController;
use crate::services::evaluator::StateEvaluator;
use crate::services::parser::parse_snapshot;
use crate::services::tracker::Tracker;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::watch;
use tracing::{error, info};

/// What a cycle did and how long to wait before the next one
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    Rendered { next: Duration },
    FetchFailed { cooldown: Duration },
}

impl CycleOutcome {
    pub fn wait(&self) -> Duration {
        match *self {
            CycleOutcome::Rendered { next } => next,
            CycleOutcome::FetchFailed { cooldown } => cooldown,
        }
    }
}

pub struct Monitor<F: SnapshotSource, I: Indicator> {
    source: F,
    indicator: I,
    triggers: Vec<Trigger>,
    area: BoundingBox,
    tracker: Tracker,
    evaluator: StateEvaluator,
    cadence: CadenceController,
    metrics: Arc<Metrics>,
    failure_cooldown: Duration,
    tick: u64,
    last_signals: GlobalSignals,
}

impl<F: SnapshotSource, I: Indicator> Monitor<F, I> {
    pub fn new(config: &Config, source: F, indicator: I, metrics: Arc<Metrics>) -> Self {
        Self::started_at(config, source, indicator, metrics, Instant::now())
    }

    /// Create a monitor whose alert hold clock starts at `started_at`
    pub fn started_at(
        config: &Config,
        source: F,
        indicator: I,
        metrics: Arc<Metrics>,
        started_at: Instant,
    ) -> Self {
        Self {
            source,
            indicator,
            triggers: config.triggers().to_vec(),
            area: *config.area(),
            tracker: Tracker::new(),
            evaluator: StateEvaluator::new(config),
            cadence: CadenceController::new(config, started_at),
            metrics,
            failure_cooldown: Duration::from_secs(config.failure_cooldown_secs()),
            tick: 0,
            last_signals: GlobalSignals::default(),
        }
    }

    /// Run one poll cycle
    pub async fn run_cycle(&mut self, now: Instant) -> Result<CycleOutcome, DeviceError> {
        self.tick += 1;
        self.metrics.record_cycle();

        let fetch_start = Instant::now();
        let lines = match self.source.fetch_snapshot().await {
            Ok(lines) => lines,
            Err(e) => {
                self.metrics.record_fetch_failure();
                error!(
                    tick = %self.tick,
                    error = %e.report(),
                    cooldown_secs = %self.failure_cooldown.as_secs(),
                    "feed_fetch_failed"
                );
                self.indicator.render_failure().await?;
                return Ok(CycleOutcome::FetchFailed { cooldown: self.failure_cooldown });
            }
        };
        self.metrics.record_fetch(fetch_start.elapsed().as_millis() as u64);

        let mut parsed = parse_snapshot(&lines, &self.triggers);
        let before_clip = parsed.observations.len();
        let area = self.area;
        parsed.observations.retain(|o| inside_bounding_box(o.position, &area));
        let clipped = before_clip - parsed.observations.len();
        self.metrics.record_parse(parsed.observations.len(), parsed.skipped, clipped);

        let stats = self.tracker.reconcile(&parsed.observations);
        self.metrics.record_reconcile(&stats);

        let signals = self.evaluator.evaluate(&mut self.tracker);
        let next = self.cadence.update(&signals, now);
        let alert_armed = self.cadence.alert_armed();
        self.metrics.set_engine_state(&signals, alert_armed, self.cadence.state());

        self.indicator.render(&signals, alert_armed).await?;
        self.last_signals = signals;

        info!(
            tick = %self.tick,
            records = %lines.len(),
            skipped = %parsed.skipped,
            clipped = %clipped,
            tracked = %signals.tracked_count,
            moving = %signals.moving_count,
            alert_stationary = %signals.alert_and_not_moving,
            alert_moving = %signals.alert_and_moving,
            passby = %signals.passby_and_moving,
            alert_armed = %alert_armed,
            cadence = %self.cadence.state().as_str(),
            next_secs = %next.as_secs(),
            "cycle_complete"
        );

        Ok(CycleOutcome::Rendered { next })
    }

    /// Poll until shutdown is signalled or the indicator fails
    pub async fn run(&mut self, mut shutdown: watch::Receiver<bool>) -> Result<(), DeviceError> {
        info!(triggers = %self.triggers.len(), "monitor_started");

        loop {
            if *shutdown.borrow() {
                break;
            }

            let outcome = self.run_cycle(Instant::now()).await?;

            tokio::select! {
                _ = tokio::time::sleep(outcome.wait()) => {}
                changed = shutdown.changed() => {
                    // A dropped sender also ends the loop
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(cycles = %self.tick, "monitor_stopped");
        Ok(())
    }

    pub fn tracker(&self) -> &Tracker {
        &self.tracker
    }

    pub fn cadence(&self) -> &CadenceController {
        &self.cadence
    }

    pub fn indicator(&self) -> &I {
        &self.indicator
    }

    pub fn source(&self) -> &F {
        &self.source
    }

    /// Signals from the last rendered cycle
    pub fn last_signals(&self) -> &GlobalSignals {
        &self.last_signals
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::{GeoPoint, VehicleId};
    use crate::infra::error::FetchError;
    use crate::io::feed::RecordedFeed;
    use crate::services::cadence::Cadence;
    use async_trait::async_trait;

    /// Indicator that records what it was asked to show
    #[derive(Default)]
    struct RecordingIndicator {
        rendered: Vec<(GlobalSignals, bool)>,
        failures: usize,
    }

    #[async_trait]
    impl Indicator for RecordingIndicator {
        async fn render(
            &mut self,
            signals: &GlobalSignals,
            alert_armed: bool,
        ) -> Result<(), DeviceError> {
            self.rendered.push((*signals, alert_armed));
            Ok(())
        }

        async fn render_failure(&mut self) -> Result<(), DeviceError> {
            self.failures += 1;
            Ok(())
        }
    }

    /// Indicator whose device has gone away
    struct BrokenIndicator;

    #[async_trait]
    impl Indicator for BrokenIndicator {
        async fn render(&mut self, _: &GlobalSignals, _: bool) -> Result<(), DeviceError> {
            Err(DeviceError::Write(std::io::Error::from(std::io::ErrorKind::BrokenPipe)))
        }

        async fn render_failure(&mut self) -> Result<(), DeviceError> {
            Err(DeviceError::Write(std::io::Error::from(std::io::ErrorKind::BrokenPipe)))
        }
    }

    // Default alert point is 24.924765,60.161483
    const AT_ALERT: &str = "v1;1006;24.924765;60.161483;0;1";
    const NEAR_ALERT: &str = "v1;1006;24.925065;60.161483;0;1";

    fn monitor(feed: RecordedFeed) -> Monitor<RecordedFeed, RecordingIndicator> {
        Monitor::new(
            &Config::default(),
            feed,
            RecordingIndicator::default(),
            Arc::new(Metrics::new()),
        )
    }

    #[tokio::test]
    async fn test_cycle_tracks_and_renders() {
        let mut feed = RecordedFeed::new();
        feed.push_snapshot(&[AT_ALERT]);
        let mut monitor = monitor(feed);

        let outcome = monitor.run_cycle(Instant::now()).await.unwrap();

        assert_eq!(outcome, CycleOutcome::Rendered { next: Duration::from_secs(5) });
        assert_eq!(monitor.tracker().len(), 1);
        assert!(monitor.last_signals().alert_and_not_moving);
        assert!(monitor.cadence().alert_armed());
        assert_eq!(monitor.indicator().rendered.len(), 1);
        assert!(monitor.indicator().rendered[0].1);
    }

    #[tokio::test]
    async fn test_fetch_failure_keeps_state() {
        let mut feed = RecordedFeed::new();
        feed.push_snapshot(&[AT_ALERT]).push_failure(FetchError::Status(503));
        let mut monitor = monitor(feed);
        let now = Instant::now();

        monitor.run_cycle(now).await.unwrap();
        let outcome = monitor.run_cycle(now).await.unwrap();

        assert_eq!(outcome, CycleOutcome::FetchFailed { cooldown: Duration::from_secs(120) });
        assert_eq!(monitor.tracker().ids(), vec![VehicleId::from("v1")]);
        assert!(monitor.cadence().alert_armed());
        assert_eq!(monitor.cadence().state(), Cadence::Intensive);
        assert_eq!(monitor.indicator().failures, 1);
        assert_eq!(monitor.indicator().rendered.len(), 1);
        assert_eq!(monitor.metrics.fetch_failures_total(), 1);
        assert_eq!(monitor.tick(), 2);
    }

    #[tokio::test]
    async fn test_movement_detected_across_cycles() {
        let mut feed = RecordedFeed::new();
        feed.push_snapshot(&[AT_ALERT]).push_snapshot(&[NEAR_ALERT]);
        let mut monitor = monitor(feed);
        let now = Instant::now();

        monitor.run_cycle(now).await.unwrap();
        monitor.run_cycle(now).await.unwrap();

        let signals = monitor.last_signals();
        assert_eq!(signals.moving_count, 1);
        assert!(signals.alert_and_moving);
        assert!(!signals.alert_and_not_moving);
        let vehicle = monitor.tracker().get(&VehicleId::from("v1")).unwrap();
        assert_eq!(vehicle.previous_position, GeoPoint::new(24.924765, 60.161483));
    }

    #[tokio::test]
    async fn test_observations_outside_area_are_clipped() {
        let mut feed = RecordedFeed::new();
        feed.push_snapshot(&[AT_ALERT, "v2;1006;25.5;60.161483;0;1"]);
        let mut monitor = monitor(feed);

        monitor.run_cycle(Instant::now()).await.unwrap();

        assert_eq!(monitor.tracker().ids(), vec![VehicleId::from("v1")]);
        assert_eq!(monitor.metrics.snapshot().observations_clipped_total, 1);
    }

    #[tokio::test]
    async fn test_cadence_drops_to_normal_after_hold() {
        let mut feed = RecordedFeed::new();
        feed.push_snapshot::<&str>(&[]).push_snapshot::<&str>(&[]);
        let start = Instant::now();
        let mut monitor = Monitor::started_at(
            &Config::default(),
            feed,
            RecordingIndicator::default(),
            Arc::new(Metrics::new()),
            start,
        );

        let first = monitor.run_cycle(start + Duration::from_secs(30)).await.unwrap();
        let second = monitor.run_cycle(start + Duration::from_secs(61)).await.unwrap();

        assert_eq!(first.wait(), Duration::from_secs(5));
        assert_eq!(second.wait(), Duration::from_secs(30));
        assert_eq!(monitor.cadence().state(), Cadence::Normal);
    }

    #[tokio::test]
    async fn test_device_error_is_fatal() {
        let mut feed = RecordedFeed::new();
        feed.push_snapshot(&[AT_ALERT]);
        let mut monitor =
            Monitor::new(&Config::default(), feed, BrokenIndicator, Arc::new(Metrics::new()));

        let result = monitor.run_cycle(Instant::now()).await;
        assert!(matches!(result, Err(DeviceError::Write(_))));
    }

    #[tokio::test]
    async fn test_run_stops_on_shutdown() {
        let mut feed = RecordedFeed::new();
        feed.push_snapshot(&[AT_ALERT]);
        let mut monitor = monitor(feed);
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let stopper = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = shutdown_tx.send(true);
        });

        monitor.run(shutdown_rx).await.unwrap();
        stopper.await.unwrap();
        assert_eq!(monitor.tick(), 1);
    }
}
