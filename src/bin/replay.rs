//! Beacon Replay - run recorded feed snapshots through the engine
//!
//! Each file in the recording directory is one feed response body, replayed
//! in file name order. The strip is simulated; the signals of every cycle are
//! printed so a recording can be checked without hardware or network.
//!
//! Usage:
//!   beacon-replay --recording recordings/morning --config config/dev.toml
//!   beacon-replay -r recordings/morning --interval-secs 5

use clap::Parser;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::info;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;
use transit_beacon::infra::{Config, Metrics};
use transit_beacon::io::{LogSink, RecordedFeed, StripIndicator};
use transit_beacon::services::{CycleOutcome, Monitor};

/// Beacon Replay - offline engine runs over recorded snapshots
#[derive(Parser, Debug)]
#[command(name = "beacon-replay", version, about, long_about = None)]
struct Args {
    /// Directory of recorded feed responses, one file per poll
    #[arg(short, long)]
    recording: String,

    /// Path to TOML configuration file [default: $CONFIG_FILE, else config/dev.toml]
    #[arg(short, long)]
    config: Option<String>,

    /// Simulated seconds between recorded polls
    ///
    /// Drives the cadence hold clock; the replay itself does not sleep.
    #[arg(short, long, default_value_t = 5)]
    interval_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .init();

    let args = Args::parse();
    let config = Config::load(args.config.as_deref()).with_blink_interval_ms(0);
    let feed = RecordedFeed::from_dir(&args.recording)?;
    let snapshots = feed.remaining();

    info!(recording = %args.recording, snapshots = %snapshots, "replay_starting");

    let start = Instant::now();
    let indicator = StripIndicator::new(LogSink::new(), &config);
    let metrics = Arc::new(Metrics::new());
    let mut monitor = Monitor::started_at(&config, feed, indicator, metrics.clone(), start);

    for cycle in 0..snapshots {
        let now = start + Duration::from_secs(args.interval_secs * cycle as u64);
        let outcome = monitor.run_cycle(now).await?;
        let signals = monitor.last_signals();

        match outcome {
            CycleOutcome::Rendered { next } => println!(
                "{:>4} tracked={} moving={} alert_stationary={} alert_moving={} passby={} \
                 armed={} cadence={} next={}s",
                cycle + 1,
                signals.tracked_count,
                signals.moving_count,
                signals.alert_and_not_moving,
                signals.alert_and_moving,
                signals.passby_and_moving,
                monitor.cadence().alert_armed(),
                monitor.cadence().state().as_str(),
                next.as_secs()
            ),
            CycleOutcome::FetchFailed { cooldown } => {
                println!("{:>4} fetch failed, cooldown={}s", cycle + 1, cooldown.as_secs())
            }
        }
    }

    let summary = metrics.report();
    println!(
        "cycles={} skipped_records={} clipped={} vehicles_added={} vehicles_removed={}",
        summary.cycles_total,
        summary.records_skipped_total,
        summary.observations_clipped_total,
        summary.vehicles_added_total,
        summary.vehicles_removed_total
    );

    Ok(())
}
