//! llama-cpp-2 backend for GGUF inference.
//!
//! Model loading, context creation, and token generation
//! via the llama-cpp-2 Rust bindings.

use std::num::NonZeroU32;
use std::path::Path;

use llama_cpp_2::context::params::LlamaContextParams;
use llama_cpp_2::context::LlamaContext;
use llama_cpp_2::llama_backend::LlamaBackend;
use llama_cpp_2::llama_batch::LlamaBatch;
use llama_cpp_2::model::params::LlamaModelParams;
use llama_cpp_2::model::{AddBos, LlamaModel};
use llama_cpp_2::sampling::LlamaSampler;
use llama_cpp_2::token::LlamaToken;

use crate::engine::backend::{find_stop, resolve_threads, NativeBackend, NativeSession, SessionParams};
use crate::engine::{fit_tokens, DecodeParams, InferenceError};

/// Loads GGUF files into [`GgufSession`]s.
pub struct GgufBackend;

impl NativeBackend for GgufBackend {
    fn name(&self) -> &str {
        "llama.cpp"
    }

    fn load(&self, model_path: &Path, params: &SessionParams) -> Result<Box<dyn NativeSession>, InferenceError> {
        let inner = LlamaInner::load(model_path, params)?;
        Ok(Box::new(GgufSession { inner: Some(inner) }))
    }
}

/// One loaded llama.cpp model.
pub struct GgufSession {
    inner: Option<LlamaInner>,
}

impl NativeSession for GgufSession {
    fn reset(&mut self) -> Result<(), InferenceError> {
        // Contexts are created per completion, so no KV state survives a call.
        match &self.inner {
            Some(_) => Ok(()),
            None => Err(InferenceError::NotReady("session released".into())),
        }
    }

    fn complete(&mut self, prompt: &str, params: &DecodeParams) -> Result<Option<String>, InferenceError> {
        let inner = self
            .inner
            .as_ref()
            .ok_or_else(|| InferenceError::NotReady("session released".into()))?;
        let text = inner.complete(prompt, params)?;
        Ok(if text.is_empty() { None } else { Some(text) })
    }

    fn release(&mut self) -> Result<(), InferenceError> {
        self.inner = None;
        Ok(())
    }
}

/// Holds the loaded llama-cpp-2 model and backend.
struct LlamaInner {
    backend: LlamaBackend,
    model: LlamaModel,
    n_ctx: u32,
    n_threads: i32,
}

// SAFETY: LlamaModel and LlamaBackend are Send+Sync in llama-cpp-2.
unsafe impl Send for LlamaInner {}

impl LlamaInner {
    fn load(path: &Path, params: &SessionParams) -> Result<Self, InferenceError> {
        let backend = LlamaBackend::init()
            .map_err(|e| InferenceError::Initialization(format!("backend init: {e}")))?;
        let model_params = LlamaModelParams::default();
        let model = LlamaModel::load_from_file(&backend, path, &model_params)
            .map_err(|e| InferenceError::Initialization(format!("load: {e}")))?;
        let n_threads = resolve_threads(params.threads);
        Ok(Self { backend, model, n_ctx: params.context_size, n_threads })
    }

    fn complete(&self, prompt: &str, params: &DecodeParams) -> Result<String, InferenceError> {
        let tokens = self.tokenize(prompt)?;
        let limit = self.n_ctx.saturating_sub(params.n_predict) as usize;
        if tokens.len() > limit {
            tracing::debug!(tokens = tokens.len(), limit, "prompt over token budget; eliding middle");
        }
        let tokens = fit_tokens(tokens, limit);
        if tokens.is_empty() {
            return Err(InferenceError::InputValidation("no token budget left for the prompt".into()));
        }
        let mut ctx = self.create_context()?;
        self.sample_loop(&mut ctx, &tokens, params)
    }

    fn tokenize(&self, text: &str) -> Result<Vec<LlamaToken>, InferenceError> {
        self.model
            .str_to_token(text, AddBos::Always)
            .map_err(|e| InferenceError::InputValidation(format!("tokenize: {e}")))
    }

    fn create_context(&self) -> Result<LlamaContext<'_>, InferenceError> {
        let p = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.n_ctx))
            .with_n_threads(self.n_threads)
            .with_n_threads_batch(self.n_threads);
        self.model
            .new_context(&self.backend, p)
            .map_err(|e| InferenceError::ModelError(format!("ctx: {e}")))
    }

    fn sample_loop(
        &self,
        ctx: &mut LlamaContext<'_>,
        tokens: &[LlamaToken],
        params: &DecodeParams,
    ) -> Result<String, InferenceError> {
        let mut batch = LlamaBatch::new(tokens.len().max(1), 1);
        add_seq(&mut batch, tokens)?;
        decode(ctx, &mut batch)?;
        let mut sampler = build_sampler(params);
        sampler.accept_many(tokens.iter().copied());

        let mut dec = encoding_rs::UTF_8.new_decoder();
        let mut text = String::new();
        let mut pos = tokens.len() as i32;
        for _ in 0..params.n_predict {
            // -1 samples from the last token that had logits computed
            let tok = sampler.sample(ctx, -1);
            sampler.accept(tok);
            if self.model.is_eog_token(tok) {
                break;
            }
            let piece = self
                .model
                .token_to_piece(tok, &mut dec, false, None)
                .map_err(|e| InferenceError::ModelError(format!("detok: {e}")))?;
            text.push_str(&piece);
            if let Some(cut) = find_stop(&text, &params.stop_sequences) {
                text.truncate(cut);
                break;
            }
            batch.clear();
            add_one(&mut batch, tok, pos)?;
            decode(ctx, &mut batch)?;
            pos += 1;
        }
        Ok(text)
    }
}

fn add_seq(batch: &mut LlamaBatch, tokens: &[LlamaToken]) -> Result<(), InferenceError> {
    // Only the last prompt token needs logits.
    let n = tokens.len();
    for (i, &tok) in tokens.iter().enumerate() {
        batch
            .add(tok, i as i32, &[0], i + 1 == n)
            .map_err(|e| InferenceError::ModelError(format!("batch: {e}")))?;
    }
    Ok(())
}

fn add_one(batch: &mut LlamaBatch, tok: LlamaToken, pos: i32) -> Result<(), InferenceError> {
    batch
        .add(tok, pos, &[0], true)
        .map_err(|e| InferenceError::ModelError(format!("batch: {e}")))
}

fn decode(ctx: &mut LlamaContext<'_>, batch: &mut LlamaBatch) -> Result<(), InferenceError> {
    ctx.decode(batch)
        .map_err(|e| InferenceError::ModelError(format!("decode: {e}")))
}

fn build_sampler(params: &DecodeParams) -> LlamaSampler {
    LlamaSampler::chain_simple([
        LlamaSampler::top_p(params.top_p, 1),
        LlamaSampler::temp(params.temperature),
        LlamaSampler::dist(42),
    ])
}
