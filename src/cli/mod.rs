// Copyright 2024-2026 Insight-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! CLI module for Insight-CORE commands.
//!
//! ## Usage
//!
//! ```bash
//! insight-core-cli status                 # Model availability as JSON
//! insight-core-cli download               # Fetch the configured model
//! insight-core-cli generate --refresh     # Print a fresh insight set
//! insight-core-cli config validate        # Check the configuration
//! ```

pub mod config_cmd;
pub mod insights_cmd;

pub use insights_cmd::{run_delete, run_download, run_generate, run_status, GenerateArgs};

/// Config file path from `--config FILE` or `INSIGHT_CORE_CONFIG`.
pub fn config_path(args: &[String]) -> Option<std::path::PathBuf> {
    args.windows(2)
        .find(|pair| pair[0] == "--config")
        .map(|pair| std::path::PathBuf::from(&pair[1]))
        .or_else(|| std::env::var("INSIGHT_CORE_CONFIG").ok().map(std::path::PathBuf::from))
}

/// `args` with any `--config FILE` pair removed.
pub fn strip_config_flag(args: &[String]) -> Vec<String> {
    let mut out = Vec::with_capacity(args.len());
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--config" {
            iter.next();
        } else {
            out.push(arg.clone());
        }
    }
    out
}
