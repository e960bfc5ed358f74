//! Runtime configuration from `INSIGHT_CORE_*` environment variables and an
//! optional TOML file.
//!
//! Precedence: environment, then file, then defaults. Invalid values fall
//! back to the next source without crashing.
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |---|---|---|
//! | `INSIGHT_CORE_MODEL_DIR` | `./models` | Directory holding model files |
//! | `INSIGHT_CORE_STATE_DIR` | `./state` | Directory for the persisted cache |
//! | `INSIGHT_CORE_MODEL_TIER` | `compact` | `compact`, `standard` or `extended` |
//! | `INSIGHT_CORE_CACHE_TTL_HOURS` | 4 | Validity window of cached insights |
//! | `INSIGHT_CORE_GENERATION_TIMEOUT` | 90 | Model pass watchdog (secs) |
//! | `INSIGHT_CORE_N_PREDICT` | 512 | Completion token budget |
//! | `INSIGHT_CORE_RESTRICTED_RUNTIME` | false | Report on-device models as unsupported |
//! | `INSIGHT_CORE_LOG_LEVEL` | `info` | `EnvFilter` directive |
//! | `INSIGHT_CORE_LOG_FORMAT` | `json` | `json` or `pretty` |
//! | `INSIGHT_CORE_LOG_FILE` | unset | Log to a file instead of stderr |

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::ModelTier;
use crate::telemetry::{LogConfig, LogFormat};

pub const DEFAULT_CACHE_TTL_HOURS: u32 = 4;
pub const DEFAULT_GENERATION_TIMEOUT_SECS: u64 = 90;
pub const DEFAULT_N_PREDICT: u32 = 512;

/// Every variable read by [`load`].
pub const ENV_KEYS: &[&str] = &[
    "INSIGHT_CORE_MODEL_DIR",
    "INSIGHT_CORE_STATE_DIR",
    "INSIGHT_CORE_MODEL_TIER",
    "INSIGHT_CORE_CACHE_TTL_HOURS",
    "INSIGHT_CORE_GENERATION_TIMEOUT",
    "INSIGHT_CORE_N_PREDICT",
    "INSIGHT_CORE_RESTRICTED_RUNTIME",
    "INSIGHT_CORE_LOG_LEVEL",
    "INSIGHT_CORE_LOG_FORMAT",
    "INSIGHT_CORE_LOG_FILE",
];

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid config file {path}: {message}")]
    Parse { path: String, message: String },
}

/// Optional overlay read from TOML. Every key may be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub model_dir: Option<PathBuf>,
    pub state_dir: Option<PathBuf>,
    pub model_tier: Option<String>,
    pub cache_ttl_hours: Option<u32>,
    pub generation_timeout_secs: Option<u64>,
    pub n_predict: Option<u32>,
    pub restricted_runtime: Option<bool>,
    pub log_level: Option<String>,
    pub log_format: Option<String>,
    pub log_file: Option<PathBuf>,
}

/// Resolved configuration.
#[derive(Debug, Clone)]
pub struct EnvConfig {
    pub model_dir: PathBuf,
    pub state_dir: PathBuf,
    pub tier: ModelTier,
    pub cache_ttl_hours: u32,
    pub generation_timeout: Duration,
    pub n_predict: u32,
    pub restricted_runtime: bool,
    pub log: LogConfig,
}

/// Flat, printable view of [`EnvConfig`].
#[derive(Debug, Clone, Serialize)]
pub struct EffectiveConfig {
    pub model_dir: String,
    pub state_dir: String,
    pub model_tier: &'static str,
    pub cache_ttl_hours: u32,
    pub generation_timeout_secs: u64,
    pub n_predict: u32,
    pub restricted_runtime: bool,
    pub log_level: String,
    pub log_format: &'static str,
    pub log_file: Option<String>,
}

fn env_value<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.trim().parse::<T>().ok())
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

fn env_bool(key: &str) -> Option<bool> {
    env_string(key).and_then(|v| match v.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    })
}

/// Load from the environment only.
pub fn load() -> EnvConfig {
    resolve(&FileConfig::default())
}

/// Load with a TOML overlay; the environment still wins.
pub fn load_file(path: &Path) -> Result<EnvConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let file = parse_file(&raw).map_err(|message| ConfigError::Parse {
        path: path.display().to_string(),
        message,
    })?;
    Ok(resolve(&file))
}

/// Parse TOML text into an overlay.
pub fn parse_file(raw: &str) -> Result<FileConfig, String> {
    toml::from_str(raw).map_err(|e| e.to_string())
}

fn resolve(file: &FileConfig) -> EnvConfig {
    let tier = env_string("INSIGHT_CORE_MODEL_TIER")
        .and_then(|v| ModelTier::parse(&v))
        .or_else(|| file.model_tier.as_deref().and_then(ModelTier::parse))
        .unwrap_or(ModelTier::Compact);

    let cache_ttl_hours = env_value("INSIGHT_CORE_CACHE_TTL_HOURS")
        .or(file.cache_ttl_hours)
        .unwrap_or(DEFAULT_CACHE_TTL_HOURS)
        .clamp(1, 24);

    let timeout_secs = env_value("INSIGHT_CORE_GENERATION_TIMEOUT")
        .or(file.generation_timeout_secs)
        .unwrap_or(DEFAULT_GENERATION_TIMEOUT_SECS)
        .max(5);

    let n_predict = env_value("INSIGHT_CORE_N_PREDICT")
        .or(file.n_predict)
        .unwrap_or(DEFAULT_N_PREDICT)
        .clamp(16, 2048);

    let format = env_string("INSIGHT_CORE_LOG_FORMAT")
        .and_then(|v| LogFormat::parse(&v))
        .or_else(|| file.log_format.as_deref().and_then(LogFormat::parse))
        .unwrap_or_default();

    EnvConfig {
        model_dir: env_string("INSIGHT_CORE_MODEL_DIR")
            .map(PathBuf::from)
            .or_else(|| file.model_dir.clone())
            .unwrap_or_else(|| PathBuf::from("./models")),
        state_dir: env_string("INSIGHT_CORE_STATE_DIR")
            .map(PathBuf::from)
            .or_else(|| file.state_dir.clone())
            .unwrap_or_else(|| PathBuf::from("./state")),
        tier,
        cache_ttl_hours,
        generation_timeout: Duration::from_secs(timeout_secs),
        n_predict,
        restricted_runtime: env_bool("INSIGHT_CORE_RESTRICTED_RUNTIME")
            .or(file.restricted_runtime)
            .unwrap_or(false),
        log: LogConfig {
            format,
            level: env_string("INSIGHT_CORE_LOG_LEVEL")
                .or_else(|| file.log_level.clone())
                .unwrap_or_else(|| "info".to_string()),
            output_path: env_string("INSIGHT_CORE_LOG_FILE")
                .map(PathBuf::from)
                .or_else(|| file.log_file.clone()),
        },
    }
}

impl EnvConfig {
    pub fn effective_config(&self) -> EffectiveConfig {
        EffectiveConfig {
            model_dir: self.model_dir.display().to_string(),
            state_dir: self.state_dir.display().to_string(),
            model_tier: self.tier.as_str(),
            cache_ttl_hours: self.cache_ttl_hours,
            generation_timeout_secs: self.generation_timeout.as_secs(),
            n_predict: self.n_predict,
            restricted_runtime: self.restricted_runtime,
            log_level: self.log.level.clone(),
            log_format: self.log.format.as_str(),
            log_file: self.log.output_path.as_ref().map(|p| p.display().to_string()),
        }
    }
}

// Serializes env-mutating tests across modules.
#[cfg(test)]
pub(crate) static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());
