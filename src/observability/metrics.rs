use lazy_static::lazy_static;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, Opts, Registry,
};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // Source metrics
    pub static ref SOURCE_FETCH_SUCCESS: IntCounterVec = IntCounterVec::new(
        Opts::new("source_fetch_success_total", "Successful fetches per source"),
        &["source"]
    ).unwrap();

    pub static ref SOURCE_FETCH_FAILURES: IntCounterVec = IntCounterVec::new(
        Opts::new("source_fetch_failures_total", "Failed fetches per source and error kind"),
        &["source", "kind"]
    ).unwrap();

    pub static ref FETCH_LATENCY: HistogramVec = HistogramVec::new(
        HistogramOpts::new(
            "source_fetch_latency_seconds",
            "Upstream fetch latency"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
        &["source"]
    ).unwrap();

    // Aggregator metrics
    pub static ref AGGREGATE_FAILURES: IntCounter = IntCounter::new(
        "aggregate_failures_total",
        "Snapshot requests where every source failed"
    ).unwrap();

    // Signal metrics
    pub static ref SIGNALS_GENERATED: IntCounterVec = IntCounterVec::new(
        Opts::new("signals_generated_total", "Signals generated per type"),
        &["type"]
    ).unwrap();

    pub static ref WHALE_TRANSACTIONS_DETECTED: IntCounter = IntCounter::new(
        "whale_transactions_detected_total",
        "Whale transactions newly seen by the dashboard"
    ).unwrap();
}

/// Registers every collector with `REGISTRY`. Safe to call more than once.
pub fn register_metrics() -> prometheus::Result<()> {
    let collectors: Vec<Box<dyn prometheus::core::Collector>> = vec![
        Box::new(SOURCE_FETCH_SUCCESS.clone()),
        Box::new(SOURCE_FETCH_FAILURES.clone()),
        Box::new(FETCH_LATENCY.clone()),
        Box::new(AGGREGATE_FAILURES.clone()),
        Box::new(SIGNALS_GENERATED.clone()),
        Box::new(WHALE_TRANSACTIONS_DETECTED.clone()),
    ];

    for collector in collectors {
        match REGISTRY.register(collector) {
            Ok(()) | Err(prometheus::Error::AlreadyReg) => {}
            Err(e) => return Err(e),
        }
    }
    Ok(())
}

/// Prometheus text exposition of `REGISTRY`
pub fn render() -> String {
    use prometheus::Encoder;

    let encoder = prometheus::TextEncoder::new();
    let mut buffer = Vec::new();
    if let Err(e) = encoder.encode(&REGISTRY.gather(), &mut buffer) {
        tracing::error!(error = %e, "Failed to encode metrics");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_idempotent() {
        register_metrics().unwrap();
        register_metrics().unwrap();

        SOURCE_FETCH_SUCCESS.with_label_values(&["Binance"]).inc();
        assert!(render().contains("source_fetch_success_total"));
    }
}
