//! Prometheus metrics for pursuit observability
//!
//! Everything is registered in the default registry on first use.
//! [`render`] produces the text exposition format for scraping or dumping
//! to a file at exit.

use lazy_static::lazy_static;
use prometheus::{
    register_counter, register_counter_vec, register_histogram, register_histogram_vec, Counter,
    CounterVec, Encoder, Histogram, HistogramVec, TextEncoder,
};

lazy_static! {
    // ─────────────────────────────────────────────────────────────────────────────
    // Pursuit Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Finished pursuits by outcome.
    ///
    /// Labels:
    /// - outcome: "reached", "exhausted" or "aborted"
    pub static ref PURSUITS: CounterVec = register_counter_vec!(
        "robogo_pursuits_total",
        "Finished pursuits by outcome",
        &["outcome"]
    ).expect("failed to register PURSUITS metric");

    /// Steps consumed per pursuit.
    pub static ref PURSUIT_STEPS: Histogram = register_histogram!(
        "robogo_pursuit_steps",
        "Steps consumed per pursuit",
        vec![1.0, 2.0, 5.0, 10.0, 20.0, 40.0, 80.0]
    ).expect("failed to register PURSUIT_STEPS metric");

    /// Frames the camera could not deliver.
    pub static ref CAPTURE_FAILURES: Counter = register_counter!(
        "robogo_capture_failures_total",
        "Empty or missing camera captures"
    ).expect("failed to register CAPTURE_FAILURES metric");

    /// Advice texts whose visibility line could not be parsed.
    pub static ref PARSE_INCOMPLETE: Counter = register_counter!(
        "robogo_parse_incomplete_total",
        "Advice texts with an undetermined goal visibility"
    ).expect("failed to register PARSE_INCOMPLETE metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Vision Model Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Wall time of individual model requests.
    ///
    /// Labels:
    /// - model: model name (e.g., "gemini-1.5-flash")
    pub static ref VISION_CALL_TIME: HistogramVec = register_histogram_vec!(
        "robogo_vision_call_seconds",
        "Vision model request duration in seconds",
        &["model"],
        vec![0.25, 0.5, 1.0, 2.0, 4.0, 8.0, 16.0]
    ).expect("failed to register VISION_CALL_TIME metric");

    /// Failed model requests.
    ///
    /// Labels:
    /// - kind: "unauthorized", "transient" or "no_answer"
    pub static ref VISION_FAILURES: CounterVec = register_counter_vec!(
        "robogo_vision_failures_total",
        "Failed vision model requests by kind",
        &["kind"]
    ).expect("failed to register VISION_FAILURES metric");

    // ─────────────────────────────────────────────────────────────────────────────
    // Actuation Metrics
    // ─────────────────────────────────────────────────────────────────────────────

    /// Motor commands issued, including stops.
    ///
    /// Labels:
    /// - direction: "forward", "backward", "left", "right", "none" or "stop"
    pub static ref MOTOR_COMMANDS: CounterVec = register_counter_vec!(
        "robogo_motor_commands_total",
        "Motor commands issued by direction",
        &["direction"]
    ).expect("failed to register MOTOR_COMMANDS metric");
}

/// Render all registered metrics in the Prometheus text format
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let families = prometheus::gather();
    let mut buffer = Vec::new();
    encoder.encode(&families, &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_includes_touched_metrics() {
        MOTOR_COMMANDS.with_label_values(&["left"]).inc();
        CAPTURE_FAILURES.inc();

        let text = render().unwrap();
        assert!(text.contains("robogo_motor_commands_total"));
        assert!(text.contains("robogo_capture_failures_total"));
    }
}
