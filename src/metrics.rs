//! Prometheus metrics for scan cycles.
//!
//! The scanner runs as a short-lived job, so there is no scrape endpoint.
//! When a textfile path is configured the recorder is rendered to disk at
//! the end of the cycle (node_exporter textfile collector format).

use std::path::Path;
use std::time::Instant;

use metrics::{counter, describe_counter, describe_histogram, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use tracing::{debug, warn};

// === Metric Name Constants ===

/// Per-competition odds fetch latency metric name.
pub const METRIC_ODDS_FETCH_LATENCY: &str = "odds_fetch_latency_ms";
/// Full scan (normalize, detect, rank) latency metric name.
pub const METRIC_SCAN_LATENCY: &str = "scan_latency_ms";
/// Notification send latency metric name.
pub const METRIC_NOTIFY_LATENCY: &str = "notify_latency_ms";
/// Failed competition fetches counter metric name.
pub const METRIC_FETCH_FAILURES: &str = "odds_fetch_failures_total";
/// Market snapshots scanned counter metric name.
pub const METRIC_SNAPSHOTS_SCANNED: &str = "snapshots_scanned_total";
/// Markets skipped on calculation error counter metric name.
pub const METRIC_MARKETS_FAILED: &str = "markets_failed_total";
/// Opportunities detected counter metric name.
pub const METRIC_OPPORTUNITIES_DETECTED: &str = "opportunities_detected_total";
/// Notifications sent counter metric name.
pub const METRIC_NOTIFICATIONS_SENT: &str = "notifications_sent_total";
/// Notifications failed counter metric name.
pub const METRIC_NOTIFICATIONS_FAILED: &str = "notifications_failed_total";

/// Initialize all metric descriptions.
/// Call this once at startup, after the recorder is installed.
pub fn init_metrics() {
    describe_histogram!(
        METRIC_ODDS_FETCH_LATENCY,
        "Odds provider request latency per competition in milliseconds"
    );
    describe_histogram!(
        METRIC_SCAN_LATENCY,
        "Time to normalize, detect and rank one feed in milliseconds"
    );
    describe_histogram!(
        METRIC_NOTIFY_LATENCY,
        "Notification send latency in milliseconds"
    );

    describe_counter!(
        METRIC_FETCH_FAILURES,
        "Total number of competition fetches that failed"
    );
    describe_counter!(
        METRIC_SNAPSHOTS_SCANNED,
        "Total number of market snapshots evaluated"
    );
    describe_counter!(
        METRIC_MARKETS_FAILED,
        "Total number of markets skipped because of malformed data"
    );
    describe_counter!(
        METRIC_OPPORTUNITIES_DETECTED,
        "Total number of arbitrage opportunities detected"
    );
    describe_counter!(
        METRIC_NOTIFICATIONS_SENT,
        "Total number of alert messages delivered"
    );
    describe_counter!(
        METRIC_NOTIFICATIONS_FAILED,
        "Total number of alert messages that failed to send"
    );

    debug!("Metrics initialized");
}

/// Install the Prometheus recorder as the global recorder.
///
/// Returns `None` when another recorder is already installed.
pub fn install_recorder() -> Option<PrometheusHandle> {
    let recorder = PrometheusBuilder::new().build_recorder();
    let handle = recorder.handle();

    match metrics::set_global_recorder(recorder) {
        Ok(()) => {
            init_metrics();
            Some(handle)
        }
        Err(e) => {
            warn!(error = %e, "Metrics recorder already installed");
            None
        }
    }
}

/// Render the recorder into a textfile, replacing it atomically.
pub fn write_textfile(handle: &PrometheusHandle, path: &Path) -> std::io::Result<()> {
    let tmp = path.with_extension("prom.tmp");
    std::fs::write(&tmp, handle.render())?;
    std::fs::rename(&tmp, path)?;
    debug!(path = %path.display(), "Metrics textfile written");
    Ok(())
}

/// Increment failed competition fetches.
pub fn inc_fetch_failures(sport_key: &str) {
    counter!(METRIC_FETCH_FAILURES, "sport_key" => sport_key.to_string()).increment(1);
}

/// Increment snapshots scanned counter.
pub fn inc_snapshots_scanned() {
    counter!(METRIC_SNAPSHOTS_SCANNED).increment(1);
}

/// Increment markets failed counter.
pub fn inc_markets_failed() {
    counter!(METRIC_MARKETS_FAILED).increment(1);
}

/// Increment opportunities detected counter.
pub fn inc_opportunities_detected() {
    counter!(METRIC_OPPORTUNITIES_DETECTED).increment(1);
}

/// Increment notifications sent counter.
pub fn inc_notifications_sent() {
    counter!(METRIC_NOTIFICATIONS_SENT).increment(1);
}

/// Increment notifications failed counter.
pub fn inc_notifications_failed() {
    counter!(METRIC_NOTIFICATIONS_FAILED).increment(1);
}

/// RAII guard for timing operations.
/// Automatically records latency when dropped.
pub struct LatencyTimer {
    start: Instant,
    metric_name: &'static str,
}

impl LatencyTimer {
    /// Create a new latency timer for the given metric.
    pub fn new(metric_name: &'static str) -> Self {
        Self {
            start: Instant::now(),
            metric_name,
        }
    }

    /// Get elapsed time in milliseconds (without recording).
    pub fn elapsed_ms(&self) -> f64 {
        self.start.elapsed().as_secs_f64() * 1000.0
    }
}

impl Drop for LatencyTimer {
    fn drop(&mut self) {
        histogram!(self.metric_name).record(self.elapsed_ms());
    }
}

/// Create a latency timer for an odds fetch.
pub fn timer_odds_fetch() -> LatencyTimer {
    LatencyTimer::new(METRIC_ODDS_FETCH_LATENCY)
}

/// Create a latency timer for a feed scan.
pub fn timer_scan() -> LatencyTimer {
    LatencyTimer::new(METRIC_SCAN_LATENCY)
}

/// Create a latency timer for a notification send.
pub fn timer_notify() -> LatencyTimer {
    LatencyTimer::new(METRIC_NOTIFY_LATENCY)
}
