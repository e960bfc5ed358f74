//! Insight CORE
//!
//! On-device nutrition insight pipeline. Turns a day of food-log
//! aggregates into a few short, gentle observations, either from a small
//! local language model or from a deterministic rule set.
//!
//! # Components
//!
//! - [`models`]: catalog, download transport and the on-disk model asset
//! - [`engine`]: the inference provider wrapping one native model handle
//! - [`insights`]: response sanitizer, fallback generator, cache and the
//!   coordinating [`InsightService`](insights::InsightService)
//! - [`device`]: memory and restricted-runtime probe
//!
//! # Guarantees
//!
//! - Model failures never surface as errors to callers; the worst case is
//!   a rule-based insight set.
//! - One generation in flight at a time; concurrent requests are served
//!   from the cache.
//! - Model text is always sanitized before it is cached.

pub mod cli;
pub mod config;
pub mod device;
pub mod engine;
pub mod insights;
pub mod models;
pub mod telemetry;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use device::{DeviceProbe, SystemProbe};
use engine::{default_backend, DecodeParams, InferenceProvider, NativeBackend};
use insights::{
    Clock, FileStore, InsightCache, InsightService, KeyValueStore, NutritionSource, ServiceConfig,
    SystemClock,
};
use models::{default_transport, ModelAssetStore, ModelTier, Transport};

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    pub model_dir: PathBuf,
    pub state_dir: PathBuf,
    pub tier: ModelTier,
    pub cache_ttl: chrono::Duration,
    pub generation_timeout: Duration,
    pub n_predict: u32,
    pub restricted_runtime: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("./models"),
            state_dir: PathBuf::from("./state"),
            tier: ModelTier::Compact,
            cache_ttl: chrono::Duration::hours(insights::CACHE_TTL_HOURS),
            generation_timeout: insights::service::DEFAULT_GENERATION_TIMEOUT,
            n_predict: config::DEFAULT_N_PREDICT,
            restricted_runtime: false,
        }
    }
}

impl From<&config::EnvConfig> for RuntimeConfig {
    fn from(env: &config::EnvConfig) -> Self {
        Self {
            model_dir: env.model_dir.clone(),
            state_dir: env.state_dir.clone(),
            tier: env.tier,
            cache_ttl: chrono::Duration::hours(i64::from(env.cache_ttl_hours)),
            generation_timeout: env.generation_timeout,
            n_predict: env.n_predict,
            restricted_runtime: env.restricted_runtime,
        }
    }
}

/// Collaborators behind the runtime's trait seams.
pub struct RuntimeParts {
    pub transport: Arc<dyn Transport>,
    pub backend: Arc<dyn NativeBackend>,
    pub probe: Box<dyn DeviceProbe>,
    pub store: Arc<dyn KeyValueStore>,
    pub clock: Arc<dyn Clock>,
}

impl RuntimeParts {
    /// HTTP transport, the compiled-in backend, the system probe and a
    /// file store under `config.state_dir`.
    pub fn defaults(config: &RuntimeConfig) -> Self {
        Self {
            transport: default_transport(),
            backend: default_backend(),
            probe: Box::new(SystemProbe::new().restricted(config.restricted_runtime)),
            store: Arc::new(FileStore::new(&config.state_dir)),
            clock: Arc::new(SystemClock),
        }
    }
}

/// A wired insight pipeline.
pub struct InsightRuntime {
    pub config: RuntimeConfig,
    pub service: Arc<InsightService>,
}

impl InsightRuntime {
    pub fn new(config: RuntimeConfig, nutrition: Arc<dyn NutritionSource>) -> Self {
        let parts = RuntimeParts::defaults(&config);
        Self::with_parts(config, nutrition, parts)
    }

    /// Build with explicit collaborators. Restores the persisted cache.
    pub fn with_parts(config: RuntimeConfig, nutrition: Arc<dyn NutritionSource>, parts: RuntimeParts) -> Self {
        let model = config.tier.config();
        let decode = DecodeParams::for_model(&model).with_n_predict(config.n_predict);
        let assets = Arc::new(ModelAssetStore::new(model, &config.model_dir, parts.transport));
        let provider = Arc::new(InferenceProvider::with_decode(assets, parts.backend, decode));

        let cache = Arc::new(
            InsightCache::new(parts.clock)
                .with_ttl(config.cache_ttl)
                .with_store(parts.store),
        );
        match cache.restore() {
            Ok(true) => tracing::info!("restored cached insights"),
            Ok(false) => {}
            Err(e) => tracing::warn!(error = %e, "ignoring unreadable insight cache"),
        }

        let service = InsightService::new(provider, cache, nutrition, parts.probe.as_ref()).with_config(
            ServiceConfig { generation_timeout: config.generation_timeout },
        );

        Self { config, service: Arc::new(service) }
    }
}
