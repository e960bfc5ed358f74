//! Decoding configuration for insight generation.
//!
//! Sampling parameters are fixed per model; only the completion budget and
//! the chars-per-token estimate are tunable from runtime configuration.

use super::error::InferenceError;
use crate::models::ModelConfig;

/// Per-call decoding configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeParams {
    /// Tokens reserved for the completion (`n_predict`).
    pub n_predict: u32,
    /// Temperature for sampling (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,
    /// Top-p (nucleus) sampling threshold (0.0–1.0)
    pub top_p: f32,
    /// Character estimate per token used for prompt budgeting.
    pub chars_per_token: f32,
    /// Sequences that end the completion.
    pub stop_sequences: Vec<String>,
}

impl Default for DecodeParams {
    fn default() -> Self {
        Self {
            n_predict: 512,
            temperature: 0.7,
            top_p: 0.9,
            chars_per_token: 3.5,
            stop_sequences: Vec::new(),
        }
    }
}

impl DecodeParams {
    /// Defaults with the stop sequences of `model`.
    pub fn for_model(model: &ModelConfig) -> Self {
        Self {
            stop_sequences: model.stop_sequences.clone(),
            ..Self::default()
        }
    }

    pub fn with_n_predict(mut self, n_predict: u32) -> Self {
        self.n_predict = n_predict;
        self
    }

    /// Validate against the model's context window.
    pub fn validate(&self, context_size: u32) -> Result<(), InferenceError> {
        if self.n_predict == 0 {
            return Err(InferenceError::InputValidation("n_predict must be > 0".into()));
        }
        if self.n_predict >= context_size {
            return Err(InferenceError::InputValidation(format!(
                "n_predict ({}) must be smaller than the context window ({})",
                self.n_predict, context_size
            )));
        }
        if self.temperature < 0.0 || self.temperature > 2.0 {
            return Err(InferenceError::InputValidation(
                "temperature must be between 0.0 and 2.0".into(),
            ));
        }
        if self.top_p <= 0.0 || self.top_p > 1.0 {
            return Err(InferenceError::InputValidation(
                "top_p must be in range (0.0, 1.0]".into(),
            ));
        }
        if self.chars_per_token <= 0.0 {
            return Err(InferenceError::InputValidation(
                "chars_per_token must be > 0".into(),
            ));
        }
        Ok(())
    }
}
