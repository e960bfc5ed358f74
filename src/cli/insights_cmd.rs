// Copyright 2024-2026 Insight-CORE Contributors
// SPDX-License-Identifier: Apache-2.0

//! Insight CLI subcommands: status, download, delete, generate.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::insights::{InsightCategory, InsightRequest, NutritionSnapshot};
use crate::models::DownloadOutcome;
use crate::InsightRuntime;

/// Parsed `generate` arguments.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerateArgs {
    pub refresh: bool,
    pub snapshot: Option<PathBuf>,
    pub focus: Option<InsightCategory>,
}

impl GenerateArgs {
    pub fn parse(args: &[String]) -> Result<Self, String> {
        let mut parsed = GenerateArgs::default();
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--refresh" => parsed.refresh = true,
                "--snapshot" => {
                    let path = iter.next().ok_or("Missing value for --snapshot")?;
                    parsed.snapshot = Some(PathBuf::from(path));
                }
                "--focus" => {
                    let value = iter.next().ok_or("Missing value for --focus")?;
                    let category = InsightCategory::parse(value)
                        .ok_or_else(|| format!("Unknown focus category: {}", value))?;
                    parsed.focus = Some(category);
                }
                other => return Err(format!("Unknown argument: {}", other)),
            }
        }
        Ok(parsed)
    }
}

/// Read a JSON nutrition snapshot; an absent path yields an empty day.
pub fn read_snapshot(path: Option<&Path>) -> Result<NutritionSnapshot, String> {
    let Some(path) = path else {
        return Ok(NutritionSnapshot::default());
    };
    let raw = std::fs::read_to_string(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    serde_json::from_str(&raw).map_err(|e| format!("{}: {}", path.display(), e))
}

/// Print the status record as JSON. Exit code 0 when ready, 1 otherwise.
pub fn run_status(runtime: &InsightRuntime) -> i32 {
    let status = runtime.service.status();
    match serde_json::to_string_pretty(&status) {
        Ok(json) => println!("{}", json),
        Err(e) => {
            eprintln!("Error: {}", e);
            return 1;
        }
    }
    if status.is_ready() {
        0
    } else {
        1
    }
}

/// Download the configured model with progress on stderr. Ctrl+C cancels.
pub async fn run_download(runtime: &InsightRuntime) -> i32 {
    let service = Arc::clone(&runtime.service);
    let mut progress = service.provider().assets().subscribe_progress();
    let download = service.download_model();
    tokio::pin!(download);

    let mut last_percent = None;
    let outcome = loop {
        tokio::select! {
            outcome = &mut download => break outcome,
            changed = progress.changed() => {
                if changed.is_err() {
                    continue;
                }
                let current = *progress.borrow_and_update();
                if let Some(total) = current.total_bytes.filter(|t| *t > 0) {
                    let percent = current.downloaded_bytes.saturating_mul(100) / total;
                    if last_percent != Some(percent) {
                        eprint!("\rDownloading {}: {:>3}%", service.provider().model_config().display_name, percent);
                        last_percent = Some(percent);
                    }
                }
            }
            _ = tokio::signal::ctrl_c() => {
                eprintln!("\nCancelling download...");
                service.cancel_download();
            }
        }
    };
    eprintln!();

    match outcome {
        DownloadOutcome::Success => {
            println!("Model ready at {}", service.provider().assets().path().display());
            0
        }
        DownloadOutcome::Failed(failure) => {
            eprintln!("Download failed: {}", failure);
            1
        }
    }
}

/// Release the model and remove its file. Always exits 0.
pub async fn run_delete(runtime: &InsightRuntime) -> i32 {
    runtime.service.delete_model().await;
    println!("Model removed.");
    0
}

/// Generate (or serve cached) insights and print them as JSON.
pub async fn run_generate(runtime: &InsightRuntime, args: &GenerateArgs) -> i32 {
    let request = InsightRequest { focus: args.focus };
    let insights = if args.refresh {
        runtime.service.refresh(request).await
    } else {
        runtime.service.generate(request).await
    };
    runtime.service.shutdown().await;

    match serde_json::to_string_pretty(&insights) {
        Ok(json) => {
            println!("{}", json);
            0
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            1
        }
    }
}
