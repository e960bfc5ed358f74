//! Inference engine module for the insight runtime.
//!
//! Owns the native model handle lifecycle, prompt templating and context
//! budgeting. Provides the `NativeBackend` seam and the `InferenceProvider`.

pub mod backend;
pub mod config;
pub mod error;
#[cfg(feature = "gguf")]
pub mod gguf;
pub mod provider;
pub mod template;
pub mod truncate;

pub use backend::{default_backend, NativeBackend, NativeSession, SessionParams, UnavailableBackend};
pub use config::DecodeParams;
pub use error::InferenceError;
pub use provider::{InferenceProvider, ProviderStatus};
pub use template::{TemplateFn, TemplateKind, TemplateRegistry};
pub use truncate::{fit_tokens, FittedPrompt, PromptBudget};

// Backend re-exports
#[cfg(feature = "gguf")]
pub use gguf::{GgufBackend, GgufSession};
