//! Prometheus metrics HTTP endpoint
//!
//! Exposes beacon metrics in Prometheus text format at /metrics.
//! Uses hyper for the HTTP server.

use crate::infra::metrics::{Metrics, MetricsSummary, FETCH_BUCKET_BOUNDS, NUM_BUCKETS};
use bytes::Bytes;
use http_body_util::Full;
use hyper::header::{HeaderValue, CONTENT_TYPE};
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use std::fmt::Write;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Prometheus metric type
enum MetricType {
    Counter,
    Gauge,
}

impl MetricType {
    fn as_str(&self) -> &'static str {
        match self {
            MetricType::Counter => "counter",
            MetricType::Gauge => "gauge",
        }
    }
}

/// Write a simple metric (counter or gauge)
fn write_metric(output: &mut String, name: &str, help: &str, typ: MetricType, val: u64) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} {}", typ.as_str());
    let _ = writeln!(output, "{name} {val}");
}

/// Write a histogram metric with buckets, sum, and count
fn write_histogram(
    output: &mut String,
    name: &str,
    help: &str,
    buckets: &[u64; NUM_BUCKETS],
    bounds: &[u64; 10],
    sum: u64,
) {
    let _ = writeln!(output, "# HELP {name} {help}");
    let _ = writeln!(output, "# TYPE {name} histogram");

    let mut cumulative = 0u64;
    for (i, &bound) in bounds.iter().enumerate() {
        cumulative += buckets[i];
        let _ = writeln!(output, "{name}_bucket{{le=\"{bound}\"}} {cumulative}");
    }
    cumulative += buckets[NUM_BUCKETS - 1];
    let _ = writeln!(output, "{name}_bucket{{le=\"+Inf\"}} {cumulative}");

    let count: u64 = buckets.iter().sum();
    let _ = writeln!(output, "{name}_sum {sum}");
    let _ = writeln!(output, "{name}_count {count}");
}

/// Format metrics in Prometheus text exposition format
pub fn format_prometheus_metrics(summary: &MetricsSummary) -> String {
    let mut output = String::with_capacity(4096);

    write_metric(
        &mut output,
        "beacon_cycles_total",
        "Poll cycles started",
        MetricType::Counter,
        summary.cycles_total,
    );
    write_metric(
        &mut output,
        "beacon_fetch_failures_total",
        "Snapshots the feed failed to deliver",
        MetricType::Counter,
        summary.fetch_failures_total,
    );
    write_histogram(
        &mut output,
        "beacon_fetch_latency_ms",
        "Feed request latency in milliseconds",
        &summary.fetch_total_buckets,
        &FETCH_BUCKET_BOUNDS,
        summary.fetch_total_sum_ms,
    );
    write_metric(
        &mut output,
        "beacon_observations_total",
        "Observations matched to a trigger",
        MetricType::Counter,
        summary.observations_total,
    );
    write_metric(
        &mut output,
        "beacon_records_skipped_total",
        "Malformed feed lines skipped",
        MetricType::Counter,
        summary.records_skipped_total,
    );
    write_metric(
        &mut output,
        "beacon_observations_clipped_total",
        "Observations outside the configured area",
        MetricType::Counter,
        summary.observations_clipped_total,
    );
    write_metric(
        &mut output,
        "beacon_vehicles_added_total",
        "Vehicles that started being tracked",
        MetricType::Counter,
        summary.vehicles_added_total,
    );
    write_metric(
        &mut output,
        "beacon_vehicles_removed_total",
        "Vehicles that stopped being tracked",
        MetricType::Counter,
        summary.vehicles_removed_total,
    );
    write_metric(
        &mut output,
        "beacon_tracked_vehicles",
        "Vehicles currently tracked",
        MetricType::Gauge,
        summary.tracked_vehicles,
    );
    write_metric(
        &mut output,
        "beacon_moving_vehicles",
        "Tracked vehicles that moved since the last poll",
        MetricType::Gauge,
        summary.moving_vehicles,
    );
    write_metric(
        &mut output,
        "beacon_alert_armed",
        "Alert armed (1) until a vehicle passes by",
        MetricType::Gauge,
        u64::from(summary.alert_armed),
    );
    write_metric(
        &mut output,
        "beacon_cadence",
        "Poll cadence (0=intensive, 1=normal)",
        MetricType::Gauge,
        summary.cadence,
    );

    output
}

fn text_response(status: StatusCode, content_type: &'static str, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

async fn handle_request(
    req: Request<hyper::body::Incoming>,
    metrics: Arc<Metrics>,
) -> Result<Response<Full<Bytes>>, Infallible> {
    let response = match (req.method(), req.uri().path()) {
        (&Method::GET, "/metrics") => text_response(
            StatusCode::OK,
            "text/plain; version=0.0.4; charset=utf-8",
            format_prometheus_metrics(&metrics.snapshot()),
        ),
        (&Method::GET, "/health") => {
            text_response(StatusCode::OK, "text/plain", "ok".to_string())
        }
        _ => text_response(StatusCode::NOT_FOUND, "text/plain", "not found".to_string()),
    };
    Ok(response)
}

/// Serve /metrics and /health until shutdown
pub async fn start_metrics_server(
    port: u16,
    metrics: Arc<Metrics>,
    mut shutdown: watch::Receiver<bool>,
) -> anyhow::Result<()> {
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = TcpListener::bind(addr).await?;

    info!(port = %port, "prometheus_metrics_server_started");

    loop {
        tokio::select! {
            result = listener.accept() => {
                match result {
                    Ok((stream, _addr)) => {
                        let io = TokioIo::new(stream);
                        let metrics = metrics.clone();

                        tokio::spawn(async move {
                            let service = service_fn(move |req| {
                                let metrics = metrics.clone();
                                async move { handle_request(req, metrics).await }
                            });

                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .await
                            {
                                error!(error = %e, "prometheus_http_error");
                            }
                        });
                    }
                    Err(e) => {
                        error!(error = %e, "prometheus_accept_error");
                    }
                }
            }
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    info!("prometheus_metrics_server_shutdown");
                    return Ok(());
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::types::GlobalSignals;
    use crate::services::cadence::Cadence;

    #[test]
    fn test_format_prometheus_metrics() {
        let metrics = Metrics::new();
        metrics.record_cycle();
        metrics.record_fetch(150);
        metrics.record_fetch_failure();
        let signals = GlobalSignals { tracked_count: 2, moving_count: 1, ..Default::default() };
        metrics.set_engine_state(&signals, true, Cadence::Intensive);

        let output = format_prometheus_metrics(&metrics.snapshot());

        assert!(output.contains("beacon_cycles_total 1"));
        assert!(output.contains("beacon_fetch_failures_total 1"));
        assert!(output.contains("beacon_fetch_latency_ms_bucket{le=\"200\"} 1"));
        assert!(output.contains("beacon_fetch_latency_ms_bucket{le=\"+Inf\"} 1"));
        assert!(output.contains("beacon_tracked_vehicles 2"));
        assert!(output.contains("beacon_alert_armed 1"));
        assert!(output.contains("# TYPE beacon_cadence gauge"));
    }

    #[test]
    fn test_histogram_is_cumulative() {
        let metrics = Metrics::new();
        metrics.record_fetch(10);
        metrics.record_fetch(90);

        let output = format_prometheus_metrics(&metrics.snapshot());

        assert!(output.contains("beacon_fetch_latency_ms_bucket{le=\"25\"} 1"));
        assert!(output.contains("beacon_fetch_latency_ms_bucket{le=\"100\"} 2"));
        assert!(output.contains("beacon_fetch_latency_ms_count 2"));
    }

    #[test]
    fn test_histogram_survives_periodic_report() {
        let metrics = Metrics::new();
        metrics.record_fetch(10);
        metrics.record_fetch(91);
        metrics.report();
        metrics.record_fetch(7);

        let output = format_prometheus_metrics(&metrics.snapshot());

        assert!(output.contains("beacon_fetch_latency_ms_bucket{le=\"25\"} 2"));
        assert!(output.contains("beacon_fetch_latency_ms_count 3"));
        assert!(output.contains("beacon_fetch_latency_ms_sum 108"));
    }
}
