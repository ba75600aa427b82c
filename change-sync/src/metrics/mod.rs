//! Pipeline metrics: counters, a sliding window of processing durations, and
//! Prometheus exposition.

mod collector;
mod exposition;

pub use collector::{
    error_rate, DurationStats, MetricsCollector, MetricsSnapshot, DURATION_WINDOW_CAPACITY,
};

impl MetricsCollector {
    /// Render the current snapshot in the Prometheus text format.
    pub fn render_prometheus(&self) -> Result<String, prometheus::Error> {
        exposition::render(&self.snapshot())
    }
}
