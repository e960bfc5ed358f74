//! Device capability probe.
//!
//! Consulted once when the insight service is built. Restricted runtimes,
//! builds without a native backend and devices below the model's memory
//! floor report a stable `unsupported` status instead of attempting
//! download or initialization.

use serde::Serialize;
use sysinfo::System;

use crate::engine::NativeBackend;
use crate::models::ModelConfig;

/// Environment flag marking a sandboxed or restricted runtime.
pub const RESTRICTED_ENV: &str = "INSIGHT_CORE_RESTRICTED_RUNTIME";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceCapabilities {
    pub total_memory_bytes: u64,
    pub available_memory_bytes: u64,
    pub restricted: bool,
    pub restriction_reason: Option<String>,
}

impl DeviceCapabilities {
    /// Why `model` cannot run here on `backend`, or `None` when it can.
    pub fn unsupported_reason(&self, model: &ModelConfig, backend: &dyn NativeBackend) -> Option<String> {
        if self.restricted {
            return Some(
                self.restriction_reason
                    .clone()
                    .unwrap_or_else(|| "on-device models are not available in this runtime".to_string()),
            );
        }
        if !backend.is_available() {
            return Some(format!(
                "on-device insights are not built into this app (backend: {})",
                backend.name()
            ));
        }
        if self.total_memory_bytes < model.min_memory_bytes {
            return Some(format!(
                "{} needs {} MB of memory, this device has {} MB",
                model.display_name,
                model.min_memory_bytes / (1024 * 1024),
                self.total_memory_bytes / (1024 * 1024)
            ));
        }
        None
    }
}

pub trait DeviceProbe: Send + Sync {
    fn capabilities(&self) -> DeviceCapabilities;
}

/// Reads memory through `sysinfo` and the restricted-runtime flag from the
/// environment.
#[derive(Debug, Clone, Default)]
pub struct SystemProbe {
    force_restricted: bool,
}

impl SystemProbe {
    pub fn new() -> Self {
        Self::default()
    }

    /// Treat the runtime as restricted regardless of the environment.
    pub fn restricted(mut self, restricted: bool) -> Self {
        self.force_restricted = restricted;
        self
    }
}

impl DeviceProbe for SystemProbe {
    fn capabilities(&self) -> DeviceCapabilities {
        let mut system = System::new();
        system.refresh_memory();

        let from_env = std::env::var(RESTRICTED_ENV)
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(false);
        let restricted = self.force_restricted || from_env;

        let caps = DeviceCapabilities {
            total_memory_bytes: system.total_memory(),
            available_memory_bytes: system.available_memory(),
            restricted,
            restriction_reason: restricted
                .then(|| "on-device models are disabled in this restricted runtime".to_string()),
        };
        tracing::debug!(
            total_mb = caps.total_memory_bytes / (1024 * 1024),
            available_mb = caps.available_memory_bytes / (1024 * 1024),
            restricted = caps.restricted,
            "device probed"
        );
        caps
    }
}

/// Fixed answer, for tests and embedders that know their platform.
#[derive(Debug, Clone)]
pub struct StaticProbe(pub DeviceCapabilities);

impl StaticProbe {
    pub fn with_memory(total_memory_bytes: u64) -> Self {
        Self(DeviceCapabilities {
            total_memory_bytes,
            available_memory_bytes: total_memory_bytes / 2,
            restricted: false,
            restriction_reason: None,
        })
    }

    pub fn restricted(reason: impl Into<String>) -> Self {
        Self(DeviceCapabilities {
            total_memory_bytes: 0,
            available_memory_bytes: 0,
            restricted: true,
            restriction_reason: Some(reason.into()),
        })
    }
}

impl DeviceProbe for StaticProbe {
    fn capabilities(&self) -> DeviceCapabilities {
        self.0.clone()
    }
}
