//! Insight generation coordinator.
//!
//! Decision order for one pass: reuse a fresh cache entry; otherwise claim
//! the single-flight slot, try the model path when the device and asset
//! allow it, sanitize the text, and fall back to the rule-based generator
//! on anything else. Every pass that claims the slot ends with a stored
//! `CachedInsightSet`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::ser::{Serialize, SerializeStruct, Serializer};
use tracing::Instrument;
use uuid::Uuid;

use super::cache::InsightCache;
use super::fallback;
use super::nutrition::{NutritionSnapshot, NutritionSource};
use super::prompt;
use super::sanitizer::ResponseSanitizer;
use super::types::{Insight, InsightCategory, InsightRequest, InsightSource};
use crate::device::{DeviceCapabilities, DeviceProbe};
use crate::engine::{InferenceError, InferenceProvider, ProviderStatus};
use crate::models::DownloadOutcome;
use crate::telemetry::{self, GenerationSpan, SpanExt};

/// Default bound on one model pass, initialization included.
pub const DEFAULT_GENERATION_TIMEOUT: Duration = Duration::from_secs(90);

const MAX_ERROR_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceConfig {
    pub generation_timeout: Duration,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self { generation_timeout: DEFAULT_GENERATION_TIMEOUT }
    }
}

/// Availability of the model path, as shown to settings and home screens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InsightStatus {
    Ready { provider: String },
    DownloadRequired { download_size_mb: u64, model_name: String },
    Unsupported { message: String },
}

impl InsightStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, InsightStatus::Ready { .. })
    }
}

impl Serialize for InsightStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            InsightStatus::Ready { provider } => {
                let mut s = serializer.serialize_struct("InsightStatus", 2)?;
                s.serialize_field("ready", &true)?;
                s.serialize_field("provider", provider)?;
                s.end()
            }
            InsightStatus::DownloadRequired { download_size_mb, model_name } => {
                let mut s = serializer.serialize_struct("InsightStatus", 4)?;
                s.serialize_field("ready", &false)?;
                s.serialize_field("reason", "model-download-required")?;
                s.serialize_field("downloadSizeMB", download_size_mb)?;
                s.serialize_field("modelName", model_name)?;
                s.end()
            }
            InsightStatus::Unsupported { message } => {
                let mut s = serializer.serialize_struct("InsightStatus", 3)?;
                s.serialize_field("ready", &false)?;
                s.serialize_field("reason", "unsupported")?;
                s.serialize_field("message", message)?;
                s.end()
            }
        }
    }
}

/// Why a pass ended on the rule-based generator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FallbackReason {
    Unsupported,
    ModelNotDownloaded,
    ModelError,
    EmptyResponse,
    Timeout,
}

impl FallbackReason {
    pub fn as_str(self) -> &'static str {
        match self {
            FallbackReason::Unsupported => "unsupported",
            FallbackReason::ModelNotDownloaded => "model_not_downloaded",
            FallbackReason::ModelError => "model_error",
            FallbackReason::EmptyResponse => "empty_response",
            FallbackReason::Timeout => "timeout",
        }
    }
}

struct Fallback {
    reason: FallbackReason,
    /// Stored as the generation error; `None` for expected conditions.
    error: Option<String>,
}

impl Fallback {
    fn expected(reason: FallbackReason) -> Self {
        Self { reason, error: None }
    }

    fn failed(reason: FallbackReason, message: impl Into<String>) -> Self {
        let message: String = message.into();
        Self { reason, error: Some(message.chars().take(MAX_ERROR_CHARS).collect()) }
    }
}

/// Coordinates the cache, the model path and the fallback generator.
pub struct InsightService {
    provider: Arc<InferenceProvider>,
    cache: Arc<InsightCache>,
    nutrition: Arc<dyn NutritionSource>,
    sanitizer: ResponseSanitizer,
    capabilities: DeviceCapabilities,
    unsupported: Option<String>,
    config: ServiceConfig,
}

impl InsightService {
    /// Probes the device once; the answer holds for the service's lifetime.
    pub fn new(
        provider: Arc<InferenceProvider>,
        cache: Arc<InsightCache>,
        nutrition: Arc<dyn NutritionSource>,
        probe: &dyn DeviceProbe,
    ) -> Self {
        let capabilities = probe.capabilities();
        let unsupported = capabilities.unsupported_reason(provider.model_config(), provider.backend());
        if let Some(reason) = &unsupported {
            tracing::info!(reason = %reason, "on-device insights unsupported; using rule-based insights");
        }
        Self {
            provider,
            cache,
            nutrition,
            sanitizer: ResponseSanitizer::default(),
            capabilities,
            unsupported,
            config: ServiceConfig::default(),
        }
    }

    pub fn with_sanitizer(mut self, sanitizer: ResponseSanitizer) -> Self {
        self.sanitizer = sanitizer;
        self
    }

    pub fn with_config(mut self, config: ServiceConfig) -> Self {
        self.config = config;
        self
    }

    pub fn cache(&self) -> &Arc<InsightCache> {
        &self.cache
    }

    pub fn provider(&self) -> &Arc<InferenceProvider> {
        &self.provider
    }

    pub fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    pub fn status(&self) -> InsightStatus {
        if let Some(message) = &self.unsupported {
            return InsightStatus::Unsupported { message: message.clone() };
        }
        let model = self.provider.model_config();
        if !self.provider.assets().is_downloaded() {
            return InsightStatus::DownloadRequired {
                download_size_mb: model.download_size_mb(),
                model_name: model.display_name.clone(),
            };
        }
        InsightStatus::Ready { provider: self.provider.backend_name().to_string() }
    }

    /// Cached insights when fresh, otherwise a new pass.
    pub async fn generate(&self, request: InsightRequest) -> Vec<Insight> {
        if !self.cache.should_regenerate() {
            tracing::debug!("insight cache fresh");
            return self.cache.insights();
        }
        self.run(request, false).await
    }

    /// A new pass regardless of cache freshness.
    pub async fn refresh(&self, request: InsightRequest) -> Vec<Insight> {
        self.run(request, true).await
    }

    pub async fn download_model(&self) -> DownloadOutcome {
        self.provider.assets().download().await
    }

    pub fn cancel_download(&self) {
        self.provider.assets().cancel_download();
    }

    /// Release the native handle and remove the model file.
    pub async fn delete_model(&self) {
        self.provider.delete_model().await;
    }

    /// Release the native handle. The cache is left as is.
    pub async fn shutdown(&self) {
        self.provider.cleanup().await;
    }

    async fn run(&self, request: InsightRequest, forced: bool) -> Vec<Insight> {
        let Some(_guard) = self.cache.try_begin_generation() else {
            telemetry::record_coalesced();
            tracing::debug!(forced, "generation already in flight; serving cached insights");
            return self.cache.insights();
        };

        let span = GenerationSpan::new(
            &self.provider.model_config().family,
            request.focus.map(InsightCategory::as_str),
            forced,
        );
        self.run_claimed(request).instrument(span).await
    }

    async fn run_claimed(&self, request: InsightRequest) -> Vec<Insight> {
        let started = Instant::now();
        let snapshot = self.nutrition.snapshot();

        let outcome = match self.status() {
            InsightStatus::Unsupported { .. } => Err(Fallback::expected(FallbackReason::Unsupported)),
            InsightStatus::DownloadRequired { .. } => {
                Err(Fallback::expected(FallbackReason::ModelNotDownloaded))
            }
            InsightStatus::Ready { .. } => self.model_insight(&request, &snapshot).await,
        };

        let span = tracing::Span::current();
        let set = match outcome {
            Ok(insight) => {
                span.record_result::<(), String>(&Ok(()));
                self.cache.set_insights(vec![insight], InsightSource::Model)
            }
            Err(fallback) => {
                telemetry::record_fallback(fallback.reason);
                match &fallback.error {
                    Some(message) => span.record_result::<(), _>(&Err(message)),
                    None => span.record_result::<(), String>(&Ok(())),
                }
                tracing::info!(reason = fallback.reason.as_str(), "using rule-based insights");
                let insights = fallback::generate_focused(&snapshot, request.focus);
                self.cache.set_fallback(insights, fallback.error)
            }
        };

        let source = set.source;
        let elapsed = started.elapsed();
        span.record("source", source.as_str());
        span.record("latency_ms", elapsed.as_millis() as u64);
        telemetry::record_generation(source, elapsed);
        tracing::info!(source = source.as_str(), count = set.insights.len(), "insights generated");
        set.insights
    }

    async fn model_insight(
        &self,
        request: &InsightRequest,
        snapshot: &NutritionSnapshot,
    ) -> Result<Insight, Fallback> {
        if let ProviderStatus::Error(previous) = self.provider.status() {
            tracing::info!(error = %previous, "resetting failed provider before a new attempt");
            self.provider.cleanup().await;
        }

        let system = prompt::system_prompt(request);
        let user = prompt::user_message(snapshot);
        let timeout = self.config.generation_timeout;
        let raw = match tokio::time::timeout(timeout, self.provider.generate(&system, &user)).await {
            Ok(Ok(text)) => text,
            Ok(Err(e)) => {
                tracing::warn!(error = %e, kind = e.kind(), "model generation failed");
                return Err(Fallback::failed(FallbackReason::ModelError, e.to_string()));
            }
            Err(_) => {
                let e = InferenceError::Timeout(timeout.as_millis() as u64);
                tracing::warn!(error = %e, kind = e.kind(), "model generation timed out");
                return Err(Fallback::failed(FallbackReason::Timeout, e.to_string()));
            }
        };

        let parsed = self.sanitizer.sanitize(&raw);
        telemetry::record_sanitizer(&parsed);
        if !parsed.is_valid {
            tracing::debug!(issues = ?parsed.validation_issues, "model output corrected");
        }
        if parsed.narrative.is_empty() {
            return Err(Fallback::failed(FallbackReason::EmptyResponse, "model returned an empty response"));
        }

        let category = request.focus.unwrap_or(InsightCategory::General);
        Ok(Insight {
            id: format!("model:{}", Uuid::new_v4()),
            category,
            icon: parsed.leading_glyph,
            title: category.title().to_string(),
            body: parsed.narrative,
            source: InsightSource::Model,
        })
    }
}
