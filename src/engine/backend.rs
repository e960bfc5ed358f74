//! Native inference handle seam.
//!
//! A [`NativeBackend`] turns a verified model file into exactly one
//! [`NativeSession`]. Sessions are blocking and not reentrant; the provider
//! serializes access and runs them on the blocking pool.

use std::path::Path;
use std::sync::Arc;

use super::config::DecodeParams;
use super::error::InferenceError;

/// Construction parameters for a native session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub context_size: u32,
    /// Inference threads (0 = auto).
    pub threads: u32,
}

/// One loaded model handle.
pub trait NativeSession: Send {
    /// Drop any decode state left by the previous completion.
    fn reset(&mut self) -> Result<(), InferenceError>;

    /// Run one completion. `Ok(None)` means the model produced nothing.
    fn complete(&mut self, prompt: &str, params: &DecodeParams) -> Result<Option<String>, InferenceError>;

    /// Free native resources. The session is unusable afterwards.
    fn release(&mut self) -> Result<(), InferenceError>;
}

/// Factory for native sessions.
pub trait NativeBackend: Send + Sync {
    fn name(&self) -> &str;

    /// False when this build cannot load models at all.
    fn is_available(&self) -> bool {
        true
    }

    fn load(&self, model_path: &Path, params: &SessionParams) -> Result<Box<dyn NativeSession>, InferenceError>;
}

/// Backend for builds without a native inference engine.
pub struct UnavailableBackend;

impl NativeBackend for UnavailableBackend {
    fn name(&self) -> &str {
        "unavailable"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn load(&self, _model_path: &Path, _params: &SessionParams) -> Result<Box<dyn NativeSession>, InferenceError> {
        Err(InferenceError::Initialization(
            "built without a native inference backend (enable the `gguf` feature)".into(),
        ))
    }
}

/// Backend for this build.
pub fn default_backend() -> Arc<dyn NativeBackend> {
    #[cfg(feature = "gguf")]
    {
        Arc::new(super::gguf::GgufBackend)
    }
    #[cfg(not(feature = "gguf"))]
    {
        Arc::new(UnavailableBackend)
    }
}

/// Byte offset of the earliest stop sequence in `text`.
pub fn find_stop(text: &str, stops: &[String]) -> Option<usize> {
    stops
        .iter()
        .filter(|s| !s.is_empty())
        .filter_map(|s| text.find(s.as_str()))
        .min()
}

/// Resolve a thread count, 0 meaning "pick for this machine".
pub fn resolve_threads(n: u32) -> i32 {
    if n == 0 {
        // Memory-bound workload; cap to avoid diminishing returns on big machines.
        let logical = num_cpus::get();
        let optimal = logical.clamp(1, 8);
        i32::try_from(optimal).unwrap_or(4)
    } else {
        i32::try_from(n).unwrap_or(4)
    }
}
