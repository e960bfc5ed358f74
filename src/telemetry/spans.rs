//! Span helpers for insight generation.

use tracing::{info_span, Span};

/// Records an operation's outcome on a span.
pub trait SpanExt {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display;
}

impl SpanExt for Span {
    fn record_result<T, E>(&self, result: &Result<T, E>)
    where
        E: std::fmt::Display,
    {
        match result {
            Ok(_) => {
                self.record("status", "ok");
            }
            Err(e) => {
                self.record("status", "error");
                self.record("error.message", e.to_string().as_str());
            }
        }
    }
}

/// Factory for generation spans.
pub struct GenerationSpan;

impl GenerationSpan {
    /// Span for one pass through the coordinator.
    ///
    /// `source`, `status`, `error.message` and `latency_ms` are filled in
    /// as the pass completes.
    pub fn new(model: &str, focus: Option<&str>, forced: bool) -> Span {
        info_span!(
            "insight_generation",
            model = %model,
            focus = focus.unwrap_or("general"),
            forced,
            source = tracing::field::Empty,
            status = tracing::field::Empty,
            error.message = tracing::field::Empty,
            latency_ms = tracing::field::Empty,
        )
    }
}
