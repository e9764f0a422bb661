//! Configuration loading from TOML files
//!
//! Config file is selected via:
//! 1. --config <path> command line argument
//! 2. CONFIG_FILE environment variable
//! 3. Default: config/dev.toml

use crate::domain::types::{BoundingBox, GeoPoint, Trigger};
use anyhow::{bail, Context};
use serde::Deserialize;
use std::env;
use std::fs;
use std::path::Path;

const DEFAULT_CONFIG_PATH: &str = "config/dev.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct FeedConfig {
    pub url: String,
    #[serde(default = "default_feed_timeout_ms")]
    pub timeout_ms: u64,
    #[serde(default = "default_failure_cooldown_secs")]
    pub failure_cooldown_secs: u64,
}

fn default_feed_timeout_ms() -> u64 {
    10_000
}

fn default_failure_cooldown_secs() -> u64 {
    120
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeofenceConfig {
    /// Radius around alert and pass-by points (meters)
    pub search_radius_m: f64,
    /// Minimum displacement between polls to count as moving (meters)
    pub move_threshold_m: f64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CadenceConfig {
    pub normal_secs: u64,
    pub intensive_secs: u64,
    /// Quiet time after the last alert before dropping to the normal cadence
    #[serde(default = "default_alert_hold_secs")]
    pub alert_hold_secs: u64,
}

fn default_alert_hold_secs() -> u64 {
    60
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct IndicatorConfig {
    /// Serial device of the pixel strip (empty = log only)
    #[serde(default)]
    pub device: String,
    #[serde(default = "default_baud")]
    pub baud: u32,
    #[serde(default = "default_pixel_count")]
    pub pixel_count: usize,
    /// Global brightness multiplier, 0 ... 1
    #[serde(default = "default_brightness")]
    pub brightness: f64,
    #[serde(default = "default_blink_interval_ms")]
    pub blink_interval_ms: u64,
    #[serde(default = "default_startup_sweep")]
    pub startup_sweep: bool,
}

fn default_baud() -> u32 {
    115_200
}

fn default_pixel_count() -> usize {
    60
}

fn default_brightness() -> f64 {
    0.2
}

fn default_blink_interval_ms() -> u64 {
    500
}

fn default_startup_sweep() -> bool {
    true
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_interval_secs")]
    pub interval_secs: u64,
    /// Prometheus metrics HTTP port (0 to disable)
    #[serde(default)]
    pub prometheus_port: u16,
}

fn default_metrics_interval_secs() -> u64 {
    300
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { interval_secs: default_metrics_interval_secs(), prometheus_port: 0 }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct TomlConfig {
    pub feed: FeedConfig,
    pub area: BoundingBox,
    pub triggers: Vec<Trigger>,
    pub geofence: GeofenceConfig,
    pub cadence: CadenceConfig,
    #[serde(default)]
    pub indicator: IndicatorConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Main configuration struct used throughout the application
#[derive(Debug, Clone)]
pub struct Config {
    feed_url: String,
    feed_timeout_ms: u64,
    failure_cooldown_secs: u64,
    area: BoundingBox,
    triggers: Vec<Trigger>,
    search_radius_m: f64,
    move_threshold_m: f64,
    normal_secs: u64,
    intensive_secs: u64,
    alert_hold_secs: u64,
    indicator_device: String,
    indicator_baud: u32,
    pixel_count: usize,
    brightness: f64,
    blink_interval_ms: u64,
    startup_sweep: bool,
    metrics_interval_secs: u64,
    prometheus_port: u16,
    config_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            feed_url: "http://83.145.232.209:10001/".to_string(),
            feed_timeout_ms: default_feed_timeout_ms(),
            failure_cooldown_secs: default_failure_cooldown_secs(),
            area: BoundingBox {
                lower_left: GeoPoint::new(24.9140367, 60.1444105),
                upper_right: GeoPoint::new(24.9437070, 60.1666600),
            },
            triggers: Self::default_triggers(),
            search_radius_m: 75.0,
            move_threshold_m: 15.0,
            normal_secs: 30,
            intensive_secs: 5,
            alert_hold_secs: default_alert_hold_secs(),
            indicator_device: String::new(),
            indicator_baud: default_baud(),
            pixel_count: default_pixel_count(),
            brightness: default_brightness(),
            blink_interval_ms: default_blink_interval_ms(),
            startup_sweep: default_startup_sweep(),
            metrics_interval_secs: default_metrics_interval_secs(),
            prometheus_port: 0,
            config_file: "default".to_string(),
        }
    }
}

impl Config {
    fn default_triggers() -> Vec<Trigger> {
        let alert_point = GeoPoint::new(24.924765, 60.161483);
        let passby_point = GeoPoint::new(24.928901, 60.161841);
        ["1006", "1006T"]
            .into_iter()
            .map(|line| Trigger {
                line: line.to_string(),
                direction: "1".to_string(),
                alert_point,
                passby_point,
            })
            .collect()
    }

    /// Determine the config file path: CLI value, else `CONFIG_FILE`, else the default
    pub fn resolve_config_path(cli_path: Option<&str>) -> String {
        Self::pick_config_path(cli_path, env::var("CONFIG_FILE").ok())
    }

    fn pick_config_path(cli_path: Option<&str>, env_path: Option<String>) -> String {
        if let Some(path) = cli_path {
            return path.to_string();
        }
        env_path
            .filter(|path| !path.is_empty())
            .unwrap_or_else(|| DEFAULT_CONFIG_PATH.to_string())
    }

    /// Load configuration from a TOML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let toml_config: TomlConfig = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        let config = Self::from_toml(toml_config, path.display().to_string());
        config
            .validate()
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    fn from_toml(toml_config: TomlConfig, config_file: String) -> Self {
        Self {
            feed_url: toml_config.feed.url,
            feed_timeout_ms: toml_config.feed.timeout_ms,
            failure_cooldown_secs: toml_config.feed.failure_cooldown_secs,
            area: toml_config.area,
            triggers: toml_config.triggers,
            search_radius_m: toml_config.geofence.search_radius_m,
            move_threshold_m: toml_config.geofence.move_threshold_m,
            normal_secs: toml_config.cadence.normal_secs,
            intensive_secs: toml_config.cadence.intensive_secs,
            alert_hold_secs: toml_config.cadence.alert_hold_secs,
            indicator_device: toml_config.indicator.device,
            indicator_baud: toml_config.indicator.baud,
            pixel_count: toml_config.indicator.pixel_count,
            brightness: toml_config.indicator.brightness.clamp(0.0, 1.0),
            blink_interval_ms: toml_config.indicator.blink_interval_ms,
            startup_sweep: toml_config.indicator.startup_sweep,
            metrics_interval_secs: toml_config.metrics.interval_secs,
            prometheus_port: toml_config.metrics.prometheus_port,
            config_file,
        }
    }

    /// Reject settings the engine cannot run with
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.triggers.is_empty() {
            bail!("at least one trigger is required");
        }
        for trigger in &self.triggers {
            if !trigger.alert_point.is_finite() || !trigger.passby_point.is_finite() {
                bail!("trigger {}/{} has a non-finite point", trigger.line, trigger.direction);
            }
        }
        if !self.area.lower_left.is_finite() || !self.area.upper_right.is_finite() {
            bail!("area corners must be finite");
        }
        if !(self.search_radius_m.is_finite() && self.search_radius_m > 0.0) {
            bail!("search_radius_m must be positive, got {}", self.search_radius_m);
        }
        if !self.brightness.is_finite() {
            bail!("brightness must be a number between 0 and 1, got {}", self.brightness);
        }
        if !(self.move_threshold_m.is_finite() && self.move_threshold_m > 0.0) {
            bail!("move_threshold_m must be positive, got {}", self.move_threshold_m);
        }
        if self.normal_secs == 0 || self.intensive_secs == 0 {
            bail!("refresh intervals must be at least one second");
        }
        if self.pixel_count == 0 {
            bail!("pixel_count must be positive");
        }
        if self.metrics_interval_secs == 0 {
            bail!("metrics interval_secs must be positive");
        }
        Ok(())
    }

    /// Load configuration - tries TOML file first, falls back to defaults
    pub fn load(cli_path: Option<&str>) -> Self {
        Self::load_from_path(&Self::resolve_config_path(cli_path))
    }

    /// Load configuration from an explicit path, falling back to defaults
    pub fn load_from_path(path: &str) -> Self {
        match Self::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Warning: {:#}. Using defaults.", e);
                Self::default()
            }
        }
    }

    /// Feed request URL with the area as query parameters
    pub fn feed_request_url(&self) -> String {
        format!(
            "{}?type=vehicles&lng1={}&lat1={}&lng2={}&lat2={}",
            self.feed_url,
            self.area.lower_left.lon,
            self.area.lower_left.lat,
            self.area.upper_right.lon,
            self.area.upper_right.lat
        )
    }

    // Getters for all config fields
    pub fn feed_url(&self) -> &str {
        &self.feed_url
    }

    pub fn feed_timeout_ms(&self) -> u64 {
        self.feed_timeout_ms
    }

    pub fn failure_cooldown_secs(&self) -> u64 {
        self.failure_cooldown_secs
    }

    pub fn area(&self) -> &BoundingBox {
        &self.area
    }

    pub fn triggers(&self) -> &[Trigger] {
        &self.triggers
    }

    pub fn search_radius_m(&self) -> f64 {
        self.search_radius_m
    }

    pub fn move_threshold_m(&self) -> f64 {
        self.move_threshold_m
    }

    pub fn normal_secs(&self) -> u64 {
        self.normal_secs
    }

    pub fn intensive_secs(&self) -> u64 {
        self.intensive_secs
    }

    pub fn alert_hold_secs(&self) -> u64 {
        self.alert_hold_secs
    }

    pub fn indicator_device(&self) -> &str {
        &self.indicator_device
    }

    pub fn indicator_baud(&self) -> u32 {
        self.indicator_baud
    }

    pub fn pixel_count(&self) -> usize {
        self.pixel_count
    }

    pub fn brightness(&self) -> f64 {
        self.brightness
    }

    pub fn blink_interval_ms(&self) -> u64 {
        self.blink_interval_ms
    }

    pub fn startup_sweep(&self) -> bool {
        self.startup_sweep
    }

    pub fn metrics_interval_secs(&self) -> u64 {
        self.metrics_interval_secs
    }

    pub fn prometheus_port(&self) -> u16 {
        self.prometheus_port
    }

    pub fn config_file(&self) -> &str {
        &self.config_file
    }

    /// Builder method for tests to replace the triggers
    pub fn with_triggers(mut self, triggers: Vec<Trigger>) -> Self {
        self.triggers = triggers;
        self
    }

    /// Builder method for tests to point the feed elsewhere
    pub fn with_feed_url(mut self, url: impl Into<String>) -> Self {
        self.feed_url = url.into();
        self
    }

    /// Builder method for tests to speed up blink sequences
    pub fn with_blink_interval_ms(mut self, ms: u64) -> Self {
        self.blink_interval_ms = ms;
        self
    }
}
