//! Metric recording through the `metrics` facade.
//!
//! No exporter is installed here; embedders attach whichever recorder they
//! use. Without one every call is a no-op.

use std::time::Duration;

use crate::insights::{FallbackReason, InsightSource, ParsedInsightResponse};
use crate::models::DownloadOutcome;

pub fn record_download(outcome: &DownloadOutcome) {
    metrics::counter!("insight_model_downloads_total", "outcome" => outcome.label()).increment(1);
}

/// One completed generation, by the source that produced the stored set.
pub fn record_generation(source: InsightSource, latency: Duration) {
    metrics::counter!("insight_generations_total", "source" => source.as_str()).increment(1);
    metrics::histogram!("insight_generation_latency_seconds", "source" => source.as_str())
        .record(latency.as_secs_f64());
}

pub fn record_fallback(reason: FallbackReason) {
    metrics::counter!("insight_fallbacks_total", "reason" => reason.as_str()).increment(1);
}

pub fn record_sanitizer(parsed: &ParsedInsightResponse) {
    if !parsed.is_valid {
        metrics::counter!("insight_sanitizer_corrections_total")
            .increment(parsed.validation_issues.len() as u64);
    }
}

/// Generation request dropped at the single-flight guard.
pub fn record_coalesced() {
    metrics::counter!("insight_generations_coalesced_total").increment(1);
}
