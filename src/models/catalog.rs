// Copyright 2024-2026 Insight-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Built-in model catalog.
//!
//! Each tier names one quantized GGUF file together with everything the
//! runtime needs to download, verify, load and prompt it.

use serde::{Deserialize, Serialize};

use crate::engine::template::TemplateKind;
use crate::models::asset::IntegrityBand;

const GIB: u64 = 1024 * 1024 * 1024;

/// Static description of one downloadable model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Model family identifier (e.g., "qwen2.5-0.5b-instruct").
    pub family: String,
    /// Human-readable name shown in download prompts.
    pub display_name: String,
    /// File name inside the model directory.
    pub filename: String,
    /// Remote download location.
    pub url: String,
    /// Expected size of the file on disk.
    pub size_bytes: u64,
    /// Minimum device memory required to load the model.
    pub min_memory_bytes: u64,
    /// Context window in tokens.
    pub context_size: u32,
    /// Inference threads (0 = auto).
    pub threads: u32,
    /// Turn-delimiter convention for this family.
    pub template: TemplateKind,
    /// Sequences that end a completion.
    pub stop_sequences: Vec<String>,
    /// Optional SHA-256 (hex) checked after a fresh download.
    #[serde(default)]
    pub sha256: Option<String>,
    /// Per-model override of the size tolerance band.
    #[serde(default)]
    pub integrity: Option<IntegrityBand>,
}

impl ModelConfig {
    /// Expected download size in whole megabytes (rounded).
    pub fn download_size_mb(&self) -> u64 {
        (self.size_bytes + 512 * 1024) / (1024 * 1024)
    }

    /// Size band used by integrity verification.
    pub fn integrity_band(&self) -> IntegrityBand {
        self.integrity.unwrap_or_default()
    }
}

/// Supported model tiers, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelTier {
    Compact,
    Standard,
    Extended,
}

impl ModelTier {
    pub const ALL: [ModelTier; 3] = [ModelTier::Compact, ModelTier::Standard, ModelTier::Extended];

    pub fn as_str(self) -> &'static str {
        match self {
            ModelTier::Compact => "compact",
            ModelTier::Standard => "standard",
            ModelTier::Extended => "extended",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(ModelTier::Compact),
            "standard" => Some(ModelTier::Standard),
            "extended" => Some(ModelTier::Extended),
            _ => None,
        }
    }

    /// The catalog entry for this tier.
    pub fn config(self) -> ModelConfig {
        match self {
            ModelTier::Compact => ModelConfig {
                family: "qwen2.5-0.5b-instruct".into(),
                display_name: "Qwen2.5 0.5B Instruct".into(),
                filename: "qwen2.5-0.5b-instruct-q4_k_m.gguf".into(),
                url: "https://huggingface.co/Qwen/Qwen2.5-0.5B-Instruct-GGUF/resolve/main/qwen2.5-0.5b-instruct-q4_k_m.gguf".into(),
                size_bytes: 491_400_032,
                min_memory_bytes: 3 * GIB,
                context_size: 2048,
                threads: 4,
                template: TemplateKind::ChatMl,
                stop_sequences: vec!["<|im_end|>".into(), "<|endoftext|>".into()],
                sha256: None,
                integrity: None,
            },
            ModelTier::Standard => ModelConfig {
                family: "llama-3.2-1b-instruct".into(),
                display_name: "Llama 3.2 1B Instruct".into(),
                filename: "Llama-3.2-1B-Instruct-Q4_K_M.gguf".into(),
                url: "https://huggingface.co/bartowski/Llama-3.2-1B-Instruct-GGUF/resolve/main/Llama-3.2-1B-Instruct-Q4_K_M.gguf".into(),
                size_bytes: 807_694_464,
                min_memory_bytes: 4 * GIB,
                context_size: 2048,
                threads: 4,
                template: TemplateKind::Llama3,
                stop_sequences: vec!["<|eot_id|>".into(), "<|end_of_text|>".into()],
                sha256: None,
                integrity: None,
            },
            ModelTier::Extended => ModelConfig {
                family: "phi-3.5-mini-instruct".into(),
                display_name: "Phi-3.5 Mini Instruct".into(),
                filename: "Phi-3.5-mini-instruct-Q4_K_M.gguf".into(),
                url: "https://huggingface.co/bartowski/Phi-3.5-mini-instruct-GGUF/resolve/main/Phi-3.5-mini-instruct-Q4_K_M.gguf".into(),
                size_bytes: 2_393_232_608,
                min_memory_bytes: 8 * GIB,
                context_size: 4096,
                threads: 0,
                template: TemplateKind::Phi3,
                stop_sequences: vec!["<|end|>".into(), "<|endoftext|>".into()],
                sha256: None,
                integrity: None,
            },
        }
    }

    /// Largest tier whose memory requirement fits `total_memory_bytes`.
    pub fn best_for_memory(total_memory_bytes: u64) -> Option<Self> {
        Self::ALL
            .iter()
            .rev()
            .copied()
            .find(|tier| tier.config().min_memory_bytes <= total_memory_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tiers_use_distinct_templates() {
        let kinds: Vec<_> = ModelTier::ALL.iter().map(|t| t.config().template).collect();
        assert_eq!(kinds, vec![TemplateKind::ChatMl, TemplateKind::Llama3, TemplateKind::Phi3]);
    }

    #[test]
    fn best_for_memory_picks_largest_fitting_tier() {
        assert_eq!(ModelTier::best_for_memory(2 * GIB), None);
        assert_eq!(ModelTier::best_for_memory(3 * GIB), Some(ModelTier::Compact));
        assert_eq!(ModelTier::best_for_memory(6 * GIB), Some(ModelTier::Standard));
        assert_eq!(ModelTier::best_for_memory(16 * GIB), Some(ModelTier::Extended));
    }

    #[test]
    fn parse_round_trips_names() {
        for tier in ModelTier::ALL {
            assert_eq!(ModelTier::parse(tier.as_str()), Some(tier));
        }
        assert_eq!(ModelTier::parse(" Standard "), Some(ModelTier::Standard));
        assert_eq!(ModelTier::parse("huge"), None);
    }

    #[test]
    fn download_size_rounds_to_megabytes() {
        let config = ModelTier::Compact.config();
        assert_eq!(config.download_size_mb(), 469);
    }
}
