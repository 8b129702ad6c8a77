// Prometheus metrics for the recon gateway
//
// Exposed on the /metrics endpoint of the HTTP server:
// - Scan outcomes by tool and status (counter)
// - Scan durations by tool (histogram)
// - Scans currently running (gauge)
// - Validation rejections and output truncations (counters)

use crate::gateway::ExecutionResult;
use lazy_static::lazy_static;
use prometheus::{CounterVec, Encoder, HistogramVec, IntCounter, IntGauge, Registry, TextEncoder};
use std::sync::{Arc, Once};

lazy_static! {
    pub static ref REGISTRY: Arc<Registry> = Arc::new(Registry::new());

    pub static ref SCANS_TOTAL: CounterVec = CounterVec::new(
        prometheus::Opts::new("scans_total", "Total number of tool invocations"),
        &["tool", "status"]
    ).expect("Failed to create scans total metric");

    pub static ref SCAN_DURATION_SECONDS: HistogramVec = HistogramVec::new(
        prometheus::HistogramOpts::new("scan_duration_seconds", "Tool invocation wall-clock duration")
            .buckets(vec![0.1, 0.5, 1.0, 5.0, 15.0, 60.0, 300.0, 900.0, 1800.0]),
        &["tool"]
    ).expect("Failed to create scan duration metric");

    pub static ref ACTIVE_SCANS: IntGauge = IntGauge::new(
        "active_scans",
        "Number of tool processes currently running"
    ).expect("Failed to create active scans metric");

    pub static ref VALIDATION_REJECTIONS_TOTAL: IntCounter = IntCounter::new(
        "validation_rejections_total",
        "Total number of requests rejected by input validation"
    ).expect("Failed to create validation rejections metric");

    pub static ref OUTPUT_TRUNCATIONS_TOTAL: IntCounter = IntCounter::new(
        "output_truncations_total",
        "Total number of invocations whose output hit the size cap"
    ).expect("Failed to create output truncations metric");
}

static INIT: Once = Once::new();

/// Register all metrics with the registry. Safe to call more than once.
pub fn init() -> prometheus::Result<()> {
    let mut result = Ok(());
    INIT.call_once(|| {
        result = register_all();
    });
    result
}

fn register_all() -> prometheus::Result<()> {
    REGISTRY.register(Box::new(SCANS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(SCAN_DURATION_SECONDS.clone()))?;
    REGISTRY.register(Box::new(ACTIVE_SCANS.clone()))?;
    REGISTRY.register(Box::new(VALIDATION_REJECTIONS_TOTAL.clone()))?;
    REGISTRY.register(Box::new(OUTPUT_TRUNCATIONS_TOTAL.clone()))?;
    Ok(())
}

/// Record the outcome of one invocation
pub fn record_scan(tool: &str, result: &ExecutionResult) {
    SCANS_TOTAL
        .with_label_values(&[tool, result.status.as_str()])
        .inc();
    SCAN_DURATION_SECONDS
        .with_label_values(&[tool])
        .observe(result.duration_ms / 1000.0);
}

/// Keeps `ACTIVE_SCANS` raised while a process runs, including when the
/// surrounding future is dropped.
pub struct ActiveScan(());

impl ActiveScan {
    pub fn start() -> Self {
        ACTIVE_SCANS.inc();
        Self(())
    }
}

impl Drop for ActiveScan {
    fn drop(&mut self) {
        ACTIVE_SCANS.dec();
    }
}

/// Gather all metrics in Prometheus text format
pub fn gather_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder
        .encode(&metric_families, &mut buffer)
        .map_err(|e| anyhow::anyhow!("Failed to encode metrics: {}", e))?;
    String::from_utf8(buffer).map_err(|e| anyhow::anyhow!("Invalid UTF-8 in metrics: {}", e))
}
