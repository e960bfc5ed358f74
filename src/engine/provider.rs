//! Inference provider: owns the single native handle for one model.
//!
//! State machine: `Uninitialized -> Ready -> Uninitialized` via `cleanup()`,
//! and `Uninitialized -> Error` when initialization fails. All transitions
//! happen under one async mutex, so initialization always finishes before a
//! generation proceeds and concurrent callers load the model once.
//!
//! Initialization runs on a task the provider owns. A caller that stops
//! waiting (a watchdog, a dropped request) never abandons a half-built
//! handle: the load still lands in the state and `cleanup()` can reach it.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::{Mutex, RwLock};
use serde::Serialize;

use super::backend::{NativeBackend, NativeSession, SessionParams};
use super::config::DecodeParams;
use super::error::InferenceError;
use super::template::TemplateRegistry;
use super::truncate::PromptBudget;
use crate::models::{ModelAssetStore, ModelConfig};

/// Lifecycle state of a provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "message", rename_all = "snake_case")]
pub enum ProviderStatus {
    Uninitialized,
    Ready,
    Error(String),
}

type SharedSession = Arc<Mutex<Box<dyn NativeSession>>>;

struct ProviderState {
    status: ProviderStatus,
    session: Option<SharedSession>,
}

/// Wraps one native inference handle for the configured model.
pub struct InferenceProvider {
    shared: Arc<ProviderShared>,
    templates: TemplateRegistry,
}

/// Everything an initialization task needs once its caller is gone.
struct ProviderShared {
    assets: Arc<ModelAssetStore>,
    backend: Arc<dyn NativeBackend>,
    decode: DecodeParams,
    state: tokio::sync::Mutex<ProviderState>,
    status_view: RwLock<ProviderStatus>,
    loads: AtomicU32,
}

impl InferenceProvider {
    pub fn new(assets: Arc<ModelAssetStore>, backend: Arc<dyn NativeBackend>) -> Self {
        let decode = DecodeParams::for_model(assets.config());
        Self::with_decode(assets, backend, decode)
    }

    pub fn with_decode(
        assets: Arc<ModelAssetStore>,
        backend: Arc<dyn NativeBackend>,
        decode: DecodeParams,
    ) -> Self {
        Self {
            shared: Arc::new(ProviderShared {
                assets,
                backend,
                decode,
                state: tokio::sync::Mutex::new(ProviderState {
                    status: ProviderStatus::Uninitialized,
                    session: None,
                }),
                status_view: RwLock::new(ProviderStatus::Uninitialized),
                loads: AtomicU32::new(0),
            }),
            templates: TemplateRegistry::builtin(),
        }
    }

    /// Replace the template table.
    pub fn with_templates(mut self, templates: TemplateRegistry) -> Self {
        self.templates = templates;
        self
    }

    pub fn status(&self) -> ProviderStatus {
        self.shared.status_view.read().clone()
    }

    pub fn model_config(&self) -> &ModelConfig {
        self.shared.assets.config()
    }

    pub fn assets(&self) -> &Arc<ModelAssetStore> {
        &self.shared.assets
    }

    pub fn backend_name(&self) -> &str {
        self.shared.backend.name()
    }

    pub fn backend(&self) -> &dyn NativeBackend {
        self.shared.backend.as_ref()
    }

    pub fn decode_params(&self) -> &DecodeParams {
        &self.shared.decode
    }

    /// Number of native handles constructed so far.
    pub fn init_count(&self) -> u32 {
        self.shared.loads.load(Ordering::SeqCst)
    }

    /// Download the asset if needed and construct the native handle.
    /// No-op when already ready; retries a failed provider.
    pub async fn initialize(&self) -> Result<(), InferenceError> {
        self.ready_session(true).await.map(|_| ())
    }

    /// Generate a completion for one system + user turn.
    ///
    /// Auto-initializes an uninitialized provider. A provider in `Error`
    /// stays there until `cleanup()` or an explicit `initialize()`.
    pub async fn generate(&self, system_prompt: &str, user_message: &str) -> Result<String, InferenceError> {
        let session = self.ready_session(false).await?;

        let prompt = self.build_prompt(system_prompt, user_message)?;
        let params = self.shared.decode.clone();
        let started = Instant::now();
        let completion = tokio::task::spawn_blocking(move || {
            let mut session = session.lock();
            session.reset()?;
            session.complete(&prompt, &params)
        })
        .await
        .map_err(|e| InferenceError::ModelError(format!("generation task failed: {e}")))??;

        let text = completion.unwrap_or_default();
        tracing::debug!(
            model = %self.model_config().family,
            latency_ms = started.elapsed().as_millis() as u64,
            chars = text.chars().count(),
            "generation complete"
        );
        Ok(text)
    }

    /// Format and truncate a prompt for the configured template.
    pub fn build_prompt(&self, system_prompt: &str, user_message: &str) -> Result<String, InferenceError> {
        let config = self.model_config();
        let decode = &self.shared.decode;
        let budget = PromptBudget::new(config.context_size, decode.n_predict, decode.chars_per_token);
        let overhead = self.templates.overhead_chars(config.template)?;
        let fitted = budget.fit(system_prompt, user_message, overhead);
        if fitted.truncated {
            tracing::debug!(
                budget = budget.max_chars(),
                system_chars = system_prompt.chars().count(),
                user_chars = user_message.chars().count(),
                "prompt truncated to fit context"
            );
        }
        self.templates.format(config.template, &fitted.system, &fitted.user)
    }

    /// Release the native handle. Errors are logged, never returned.
    ///
    /// Waits for an in-flight initialization, so a handle that is still
    /// loading is released too.
    pub async fn cleanup(&self) {
        let mut state = self.shared.state.lock().await;
        if let Some(session) = state.session.take() {
            release_session(session);
            tracing::info!(model = %self.model_config().family, "native handle released");
        }
        self.shared.set_status(&mut state, ProviderStatus::Uninitialized);
    }

    /// Release the handle and delete the model file.
    pub async fn delete_model(&self) {
        self.cleanup().await;
        self.shared.assets.delete();
    }

    async fn ready_session(&self, retry_failed: bool) -> Result<SharedSession, InferenceError> {
        let shared = Arc::clone(&self.shared);
        tokio::spawn(async move { shared.ready_session(retry_failed).await })
            .await
            .map_err(|e| InferenceError::Initialization(format!("initialization task failed: {e}")))?
    }
}

impl ProviderShared {
    async fn ready_session(&self, retry_failed: bool) -> Result<SharedSession, InferenceError> {
        let mut state = self.state.lock().await;
        match (&state.status, &state.session) {
            (ProviderStatus::Ready, Some(session)) => return Ok(Arc::clone(session)),
            (ProviderStatus::Error(message), _) if !retry_failed => {
                return Err(InferenceError::NotReady(message.clone()))
            }
            _ => {}
        }
        if let Some(stale) = state.session.take() {
            release_session(stale);
        }

        match self.load_session().await {
            Ok(session) => {
                let session: SharedSession = Arc::new(Mutex::new(session));
                state.session = Some(Arc::clone(&session));
                self.set_status(&mut state, ProviderStatus::Ready);
                tracing::info!(
                    model = %self.assets.config().family,
                    backend = self.backend.name(),
                    "provider ready"
                );
                Ok(session)
            }
            Err(e) => {
                self.set_status(&mut state, ProviderStatus::Error(e.to_string()));
                tracing::warn!(model = %self.assets.config().family, error = %e, "provider initialization failed");
                Err(e)
            }
        }
    }

    async fn load_session(&self) -> Result<Box<dyn NativeSession>, InferenceError> {
        if !self.assets.is_downloaded() {
            self.assets.download().await.into_result()?;
        }
        let config = self.assets.config();
        self.decode.validate(config.context_size)?;

        let backend = Arc::clone(&self.backend);
        let path = self.assets.path();
        let params = SessionParams {
            context_size: config.context_size,
            threads: config.threads,
        };
        self.loads.fetch_add(1, Ordering::SeqCst);
        tokio::task::spawn_blocking(move || backend.load(&path, &params))
            .await
            .map_err(|e| InferenceError::Initialization(format!("load task failed: {e}")))?
    }

    fn set_status(&self, state: &mut ProviderState, status: ProviderStatus) {
        state.status = status.clone();
        *self.status_view.write() = status;
    }
}

impl Drop for ProviderShared {
    fn drop(&mut self) {
        if let Some(session) = self.state.get_mut().session.take() {
            release_session(session);
        }
    }
}

fn release_session(session: SharedSession) {
    match session.try_lock() {
        Some(mut guard) => {
            if let Err(e) = guard.release() {
                tracing::warn!(error = %e, "failed to release native handle");
            }
        }
        // The in-flight call holds the last reference; the handle drops with it.
        None => tracing::warn!("generation in flight during release; handle freed when it completes"),
    }
}
