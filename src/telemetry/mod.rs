//! Telemetry for the insight runtime.
//!
//! Structured logging, generation spans and metric recording. All output
//! is local; nothing here talks to the network.

mod logging;
mod metrics;
mod spans;

pub use logging::{init_logging, LogConfig, LogError, LogFormat};
pub use metrics::{
    record_coalesced, record_download, record_fallback, record_generation, record_sanitizer,
};
pub use spans::{GenerationSpan, SpanExt};
