use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use lazy_static::lazy_static;
use prometheus::{
    core::Collector, histogram_opts, Encoder, HistogramVec, IntCounterVec, Registry, TextEncoder,
};
use tracing::error;

#[derive(Default, Clone, Copy, Debug, PartialEq, Eq)]
pub struct DriverMetricsSnapshot {
    pub commands: u64,
    pub command_failures: u64,
    pub command_latency_total_us: u64,
}

static COMMANDS: AtomicU64 = AtomicU64::new(0);
static COMMAND_FAILURES: AtomicU64 = AtomicU64::new(0);
static COMMAND_LATENCY_TOTAL_US: AtomicU64 = AtomicU64::new(0);

lazy_static! {
    static ref CDP_COMMANDS_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new("refpilot_cdp_commands_total", "Total CDP commands executed"),
        &["method"]
    )
    .unwrap();
    static ref CDP_COMMAND_FAILURES_TOTAL: IntCounterVec = IntCounterVec::new(
        prometheus::Opts::new(
            "refpilot_cdp_command_failures_total",
            "Total CDP command failures"
        ),
        &["method"]
    )
    .unwrap();
    static ref CDP_COMMAND_DURATION: HistogramVec = HistogramVec::new(
        histogram_opts!(
            "refpilot_cdp_command_duration_seconds",
            "CDP command latency",
            vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.0, 5.0]
        ),
        &["method"]
    )
    .unwrap();
    static ref REGISTRY: Registry = {
        let registry = Registry::new();
        register(&registry, CDP_COMMANDS_TOTAL.clone());
        register(&registry, CDP_COMMAND_FAILURES_TOTAL.clone());
        register(&registry, CDP_COMMAND_DURATION.clone());
        registry
    };
}

fn register<C>(registry: &Registry, collector: C)
where
    C: Collector + Clone + Send + Sync + 'static,
{
    if let Err(err) = registry.register(Box::new(collector)) {
        if !matches!(err, prometheus::Error::AlreadyReg) {
            error!(?err, "failed to register cdp metric");
        }
    }
}

pub fn record_command(method: &str, duration: Duration, ok: bool) {
    COMMANDS.fetch_add(1, Ordering::Relaxed);
    CDP_COMMANDS_TOTAL.with_label_values(&[method]).inc();
    let micros = duration.as_micros().min(u64::MAX as u128) as u64;
    COMMAND_LATENCY_TOTAL_US.fetch_add(micros, Ordering::Relaxed);
    CDP_COMMAND_DURATION
        .with_label_values(&[method])
        .observe(duration.as_secs_f64());
    if !ok {
        COMMAND_FAILURES.fetch_add(1, Ordering::Relaxed);
        CDP_COMMAND_FAILURES_TOTAL.with_label_values(&[method]).inc();
    }
}

pub fn snapshot() -> DriverMetricsSnapshot {
    DriverMetricsSnapshot {
        commands: COMMANDS.load(Ordering::Relaxed),
        command_failures: COMMAND_FAILURES.load(Ordering::Relaxed),
        command_latency_total_us: COMMAND_LATENCY_TOTAL_US.load(Ordering::Relaxed),
    }
}

/// Prometheus text exposition of the driver metrics.
pub fn gather_text() -> String {
    let mut buffer = Vec::new();
    if let Err(err) = TextEncoder::new().encode(&REGISTRY.gather(), &mut buffer) {
        error!(?err, "failed to encode metrics");
        return String::new();
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

pub fn reset() {
    COMMANDS.store(0, Ordering::Relaxed);
    COMMAND_FAILURES.store(0, Ordering::Relaxed);
    COMMAND_LATENCY_TOTAL_US.store(0, Ordering::Relaxed);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_success_and_failure_metrics() {
        let before = snapshot();
        record_command("Page.navigate", Duration::from_micros(150), true);
        record_command("Page.navigate", Duration::from_micros(50), false);
        let after = snapshot();
        assert!(after.commands >= before.commands + 2);
        assert!(after.command_failures > before.command_failures);
        assert!(gather_text().contains("refpilot_cdp_commands_total"));
    }
}
