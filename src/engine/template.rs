//! Prompt templates per model family.
//!
//! Each family has its own role markers. Formatting functions are stored in
//! a table keyed by [`TemplateKind`]; truncation and generation only ever
//! call [`TemplateRegistry::format`].

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::error::InferenceError;

/// Turn-delimiter convention of a model family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    ChatMl,
    Llama3,
    Phi3,
}

/// Formats a single-turn system + user prompt, ending at the assistant turn.
pub type TemplateFn = fn(system: &str, user: &str) -> String;

fn chatml(system: &str, user: &str) -> String {
    format!(
        "<|im_start|>system\n{system}<|im_end|>\n<|im_start|>user\n{user}<|im_end|>\n<|im_start|>assistant\n"
    )
}

// BOS is added by the tokenizer.
fn llama3(system: &str, user: &str) -> String {
    format!(
        "<|start_header_id|>system<|end_header_id|>\n\n{system}<|eot_id|>\
         <|start_header_id|>user<|end_header_id|>\n\n{user}<|eot_id|>\
         <|start_header_id|>assistant<|end_header_id|>\n\n"
    )
}

fn phi3(system: &str, user: &str) -> String {
    format!("<|system|>\n{system}<|end|>\n<|user|>\n{user}<|end|>\n<|assistant|>\n")
}

/// Lookup table from template kind to formatter.
#[derive(Clone)]
pub struct TemplateRegistry {
    formatters: HashMap<TemplateKind, TemplateFn>,
}

impl TemplateRegistry {
    /// Empty registry.
    pub fn empty() -> Self {
        Self { formatters: HashMap::new() }
    }

    /// Registry with every built-in family.
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        registry.register(TemplateKind::ChatMl, chatml);
        registry.register(TemplateKind::Llama3, llama3);
        registry.register(TemplateKind::Phi3, phi3);
        registry
    }

    /// Add or replace the formatter for `kind`.
    pub fn register(&mut self, kind: TemplateKind, formatter: TemplateFn) {
        self.formatters.insert(kind, formatter);
    }

    pub fn supports(&self, kind: TemplateKind) -> bool {
        self.formatters.contains_key(&kind)
    }

    pub fn format(&self, kind: TemplateKind, system: &str, user: &str) -> Result<String, InferenceError> {
        let formatter = self
            .formatters
            .get(&kind)
            .ok_or(InferenceError::UnknownTemplate(kind))?;
        Ok(formatter(system, user))
    }

    /// Characters the template adds around the system and user text.
    pub fn overhead_chars(&self, kind: TemplateKind) -> Result<usize, InferenceError> {
        Ok(self.format(kind, "", "")?.chars().count())
    }
}

impl Default for TemplateRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}
