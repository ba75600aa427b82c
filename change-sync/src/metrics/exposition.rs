//! Prometheus text exposition of a metrics snapshot.

use prometheus::{Encoder, Gauge, IntCounter, Opts, Registry, TextEncoder};

use crate::metrics::collector::MetricsSnapshot;

const NAMESPACE: &str = "change_sync";

/// Render a snapshot in the Prometheus text exposition format.
///
/// A fresh registry is built per call so collectors stay injectable and
/// independent of the process-wide default registry.
pub fn render(snapshot: &MetricsSnapshot) -> Result<String, prometheus::Error> {
    let registry = Registry::new();

    for (name, help, value) in [
        ("events_received_total", "Raw events received", snapshot.received),
        ("events_processed_total", "Events applied to the index", snapshot.processed),
        ("events_failed_total", "Events that failed normalization or indexing", snapshot.failed),
    ] {
        let counter = IntCounter::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
        counter.inc_by(value);
        registry.register(Box::new(counter))?;
    }

    let stats = &snapshot.processing_time;
    for (name, help, value) in [
        ("error_rate", "failed / (processed + failed)", snapshot.error_rate),
        ("processing_time_avg_ms", "Average processing time", stats.average_ms),
        ("processing_time_median_ms", "Median processing time", stats.median_ms),
        ("processing_time_p95_ms", "95th percentile processing time", stats.p95_ms),
        ("processing_time_p99_ms", "99th percentile processing time", stats.p99_ms),
        ("processing_time_samples", "Samples in the duration window", stats.samples as f64),
    ] {
        let gauge = Gauge::with_opts(Opts::new(name, help).namespace(NAMESPACE))?;
        gauge.set(value);
        registry.register(Box::new(gauge))?;
    }

    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&registry.gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
