//! Poll cadence and alert-armed memory
//!
//! Two-state machine over the polling interval:
//! - Any vehicle inside the alert geofence: Intensive, alert clock restarted
//! - No alert for longer than the hold time: Normal
//! - Otherwise: unchanged
//!
//! The alert-armed flag is orthogonal to the cadence. It is set whenever an
//! alert signal is seen and cleared only when a vehicle moves through the
//! pass-by geofence, so the alert color survives cycles in which no vehicle
//! is inside the alert geofence.

use crate::domain::types::GlobalSignals;
use crate::infra::config::Config;
use std::time::{Duration, Instant};
use tracing::info;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cadence {
    Intensive,
    Normal,
}

impl Cadence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Cadence::Intensive => "intensive",
            Cadence::Normal => "normal",
        }
    }
}

pub struct CadenceController {
    state: Cadence,
    /// Last time an alert signal was seen (process start until the first one)
    last_alert: Instant,
    alert_armed: bool,
    intensive_interval: Duration,
    normal_interval: Duration,
    alert_hold: Duration,
}

impl CadenceController {
    pub fn new(config: &Config, started_at: Instant) -> Self {
        Self::with_intervals(
            Duration::from_secs(config.intensive_secs()),
            Duration::from_secs(config.normal_secs()),
            Duration::from_secs(config.alert_hold_secs()),
            started_at,
        )
    }

    pub fn with_intervals(
        intensive_interval: Duration,
        normal_interval: Duration,
        alert_hold: Duration,
        started_at: Instant,
    ) -> Self {
        Self {
            state: Cadence::Intensive,
            last_alert: started_at,
            alert_armed: false,
            intensive_interval,
            normal_interval,
            alert_hold,
        }
    }

    /// Apply one cycle's signals and return how long to sleep before the next poll
    pub fn update(&mut self, signals: &GlobalSignals, now: Instant) -> Duration {
        let previous = self.state;

        if signals.has_alert() {
            self.state = Cadence::Intensive;
            self.last_alert = now;
            self.alert_armed = true;
        } else if now.saturating_duration_since(self.last_alert) > self.alert_hold {
            self.state = Cadence::Normal;
        }

        if signals.passby_and_moving {
            self.alert_armed = false;
        }

        if previous != self.state {
            info!(
                from = %previous.as_str(),
                to = %self.state.as_str(),
                interval_secs = %self.interval().as_secs(),
                "cadence_changed"
            );
        }

        self.interval()
    }

    pub fn state(&self) -> Cadence {
        self.state
    }

    pub fn alert_armed(&self) -> bool {
        self.alert_armed
    }

    /// Sleep length for the current state
    pub fn interval(&self) -> Duration {
        match self.state {
            Cadence::Intensive => self.intensive_interval,
            Cadence::Normal => self.normal_interval,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn secs(s: u64) -> Duration {
        Duration::from_secs(s)
    }

    fn controller(start: Instant) -> CadenceController {
        CadenceController::with_intervals(secs(5), secs(30), secs(60), start)
    }

    fn quiet() -> GlobalSignals {
        GlobalSignals { tracked_count: 1, ..Default::default() }
    }

    fn alert() -> GlobalSignals {
        GlobalSignals { alert_and_not_moving: true, tracked_count: 1, ..Default::default() }
    }

    fn passby() -> GlobalSignals {
        GlobalSignals {
            passby_and_moving: true,
            moving_count: 1,
            tracked_count: 1,
            ..Default::default()
        }
    }

    #[test]
    fn test_starts_intensive_and_disarmed() {
        let c = controller(Instant::now());
        assert_eq!(c.state(), Cadence::Intensive);
        assert!(!c.alert_armed());
        assert_eq!(c.interval(), secs(5));
    }

    #[test]
    fn test_default_config_intervals() {
        let c = CadenceController::new(&Config::default(), Instant::now());
        assert_eq!(c.interval(), secs(5));
    }

    #[test]
    fn test_quiet_within_hold_stays_intensive() {
        let start = Instant::now();
        let mut c = controller(start);
        assert_eq!(c.update(&quiet(), start + secs(30)), secs(5));
        assert_eq!(c.update(&quiet(), start + secs(60)), secs(5));
        assert_eq!(c.state(), Cadence::Intensive);
    }

    #[test]
    fn test_quiet_past_hold_goes_normal_then_alert_returns_intensive() {
        let start = Instant::now();
        let mut c = controller(start);

        assert_eq!(c.update(&quiet(), start + secs(61)), secs(30));
        assert_eq!(c.state(), Cadence::Normal);

        assert_eq!(c.update(&alert(), start + secs(91)), secs(5));
        assert_eq!(c.state(), Cadence::Intensive);
    }

    #[test]
    fn test_alert_restarts_hold_clock() {
        let start = Instant::now();
        let mut c = controller(start);

        c.update(&alert(), start + secs(50));
        // 100s since start but only 50s since the alert
        assert_eq!(c.update(&quiet(), start + secs(100)), secs(5));
        assert_eq!(c.update(&quiet(), start + secs(111)), secs(30));
    }

    #[test]
    fn test_alert_and_moving_also_arms() {
        let start = Instant::now();
        let mut c = controller(start);
        let signals = GlobalSignals { alert_and_moving: true, ..Default::default() };
        c.update(&signals, start + secs(5));
        assert!(c.alert_armed());
    }

    #[test]
    fn test_alert_armed_persists_until_passby() {
        let start = Instant::now();
        let mut c = controller(start);

        // Cycle 1: alert seen
        c.update(&alert(), start + secs(5));
        assert!(c.alert_armed());

        // Cycle 2: nothing happening, still armed
        c.update(&quiet(), start + secs(10));
        assert!(c.alert_armed());

        // Cycle 3: vehicle moving through pass-by clears it
        c.update(&passby(), start + secs(15));
        assert!(!c.alert_armed());
    }

    #[test]
    fn test_alert_armed_survives_normal_cadence() {
        let start = Instant::now();
        let mut c = controller(start);
        c.update(&alert(), start);
        c.update(&quiet(), start + secs(120));
        assert_eq!(c.state(), Cadence::Normal);
        assert!(c.alert_armed());
    }

    #[test]
    fn test_alert_rearms_after_passby() {
        let start = Instant::now();
        let mut c = controller(start);

        c.update(&alert(), start + secs(5));
        c.update(&passby(), start + secs(10));
        assert!(!c.alert_armed());

        // Another vehicle reaches the alert point in the same session
        c.update(&alert(), start + secs(15));
        assert!(c.alert_armed());
    }

    #[test]
    fn test_alert_and_passby_same_cycle_clears() {
        let start = Instant::now();
        let mut c = controller(start);
        let both = GlobalSignals {
            alert_and_not_moving: true,
            passby_and_moving: true,
            ..Default::default()
        };
        c.update(&both, start + secs(5));
        assert!(!c.alert_armed());
        assert_eq!(c.state(), Cadence::Intensive);
    }

    #[test]
    fn test_cadence_as_str() {
        assert_eq!(Cadence::Intensive.as_str(), "intensive");
        assert_eq!(Cadence::Normal.as_str(), "normal");
    }
}
