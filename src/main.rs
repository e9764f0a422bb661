//! Transit beacon - shows approaching transit vehicles on an LED strip
//!
//! Polls a vehicle position feed, tracks vehicles of the configured lines,
//! and lights the strip when one is about to reach the configured stop.
//!
//! Module structure:
//! - `domain/` - Core types (GeoPoint, Trigger, TrackedVehicle) and geometry
//! - `io/` - External interfaces (feed client, pixel strip, Prometheus)
//! - `services/` - Business logic (Parser, Tracker, Evaluator, Cadence, Monitor)
//! - `infra/` - Infrastructure (Config, Errors, Metrics)

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use transit_beacon::infra::{Config, Metrics};
use transit_beacon::io::{BlinkyTape, FeedClient, Indicator, LogSink, PixelSink, StripIndicator};
use transit_beacon::services::Monitor;

/// Transit beacon - vehicle proximity indicator
#[derive(Parser, Debug)]
#[command(name = "transit-beacon", version, about)]
struct Args {
    /// Path to TOML configuration file [default: $CONFIG_FILE, else config/dev.toml]
    #[arg(short, long)]
    config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long)]
    json_logs: bool,
}

fn init_logging(json: bool) {
    // Default: INFO, use RUST_LOG=debug for per-vehicle classification
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    init_logging(args.json_logs);

    info!(version = env!("CARGO_PKG_VERSION"), git = env!("GIT_HASH"), "transit-beacon starting");

    let config = Config::load(args.config.as_deref());

    info!(
        config_file = %config.config_file(),
        feed_url = %config.feed_url(),
        area_lower_left = %config.area().lower_left,
        area_upper_right = %config.area().upper_right,
        search_radius_m = %config.search_radius_m(),
        move_threshold_m = %config.move_threshold_m(),
        normal_secs = %config.normal_secs(),
        intensive_secs = %config.intensive_secs(),
        indicator_device = %config.indicator_device(),
        prometheus_port = %config.prometheus_port(),
        "config_loaded"
    );
    for trigger in config.triggers() {
        info!(
            line = %trigger.line,
            direction = %trigger.direction,
            alert_point = %trigger.alert_point,
            passby_point = %trigger.passby_point,
            "trigger_configured"
        );
    }

    // Create shutdown signal
    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let metrics = Arc::new(Metrics::new());

    // Start Prometheus metrics HTTP server (if port > 0)
    let prometheus_port = config.prometheus_port();
    if prometheus_port > 0 {
        let prom_metrics = metrics.clone();
        let prom_shutdown = shutdown_rx.clone();
        tokio::spawn(async move {
            if let Err(e) = transit_beacon::io::prometheus::start_metrics_server(
                prometheus_port,
                prom_metrics,
                prom_shutdown,
            )
            .await
            {
                error!(error = %e, "Prometheus metrics server error");
            }
        });
    }

    // Start metrics reporter
    let metrics_clone = metrics.clone();
    let metrics_interval = config.metrics_interval_secs();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(Duration::from_secs(metrics_interval));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            metrics_clone.report().log();
        }
    });

    // Handle shutdown on Ctrl+C
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("shutdown_signal_received");
        let _ = shutdown_tx.send(true);
    });

    let feed = match FeedClient::new(&config) {
        Ok(feed) => feed,
        Err(e) => {
            error!(error = %e.report(), "feed_client_failed");
            std::process::exit(1);
        }
    };

    let result = if config.indicator_device().is_empty() {
        warn!("no indicator device configured, frames are only logged");
        let indicator = StripIndicator::new(LogSink::new(), &config);
        run_monitor(&config, feed, indicator, metrics, shutdown_rx).await
    } else {
        let tape = match BlinkyTape::open(config.indicator_device(), config.indicator_baud()) {
            Ok(tape) => tape,
            Err(e) => {
                error!(error = %e, "indicator_failed");
                std::process::exit(1);
            }
        };
        let indicator = StripIndicator::new(tape, &config);
        run_monitor(&config, feed, indicator, metrics, shutdown_rx).await
    };

    if let Err(e) = result {
        error!(error = %e, "indicator_failed");
        std::process::exit(1);
    }

    info!("transit-beacon shutdown complete");
}

async fn run_monitor<S: PixelSink>(
    config: &Config,
    feed: FeedClient,
    mut indicator: StripIndicator<S>,
    metrics: Arc<Metrics>,
    shutdown: watch::Receiver<bool>,
) -> Result<(), transit_beacon::infra::DeviceError> {
    if config.startup_sweep() {
        indicator.startup_sweep(60).await?;
    }
    // Start from a dark strip until the first snapshot arrives
    indicator.render(&Default::default(), false).await?;

    let mut monitor = Monitor::new(config, feed, indicator, metrics);
    monitor.run(shutdown).await
}
