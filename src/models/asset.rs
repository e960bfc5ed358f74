//! On-disk model asset: integrity checks, download, deletion.
//!
//! Integrity is an existence check plus a size tolerance band around the
//! catalog size. A SHA-256 digest, when the catalog carries one, is only
//! checked right after a download since hashing hundreds of megabytes on
//! every status query is too slow.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use super::catalog::ModelConfig;
use super::transport::{DownloadProgress, TransferError, Transport};
use crate::telemetry;

/// Accepted size range, as percentages of the expected size.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntegrityBand {
    pub min_percent: u32,
    pub max_percent: u32,
}

impl Default for IntegrityBand {
    fn default() -> Self {
        Self { min_percent: 80, max_percent: 120 }
    }
}

impl IntegrityBand {
    /// True if `actual` lies inside the band around `expected` (inclusive).
    pub fn contains(&self, actual: u64, expected: u64) -> bool {
        let actual = u128::from(actual) * 100;
        let expected = u128::from(expected);
        actual >= expected * u128::from(self.min_percent)
            && actual <= expected * u128::from(self.max_percent)
    }
}

/// Why a download did not produce a verified asset.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DownloadFailure {
    #[error("network error: {0}")]
    Network(String),

    #[error("downloaded file failed integrity check: {actual} bytes, expected about {expected}")]
    Integrity { actual: u64, expected: u64 },

    #[error("checksum mismatch: expected {expected}, got {actual}")]
    Checksum { expected: String, actual: String },

    #[error("storage error: {0}")]
    Storage(String),

    #[error("download cancelled by user")]
    Cancelled,
}

/// Result of one download attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    Success,
    Failed(DownloadFailure),
}

impl DownloadOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, DownloadOutcome::Success)
    }

    pub fn into_result(self) -> Result<(), DownloadFailure> {
        match self {
            DownloadOutcome::Success => Ok(()),
            DownloadOutcome::Failed(failure) => Err(failure),
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            DownloadOutcome::Success => "success",
            DownloadOutcome::Failed(DownloadFailure::Network(_)) => "network",
            DownloadOutcome::Failed(DownloadFailure::Integrity { .. }) => "integrity",
            DownloadOutcome::Failed(DownloadFailure::Checksum { .. }) => "checksum",
            DownloadOutcome::Failed(DownloadFailure::Storage(_)) => "storage",
            DownloadOutcome::Failed(DownloadFailure::Cancelled) => "cancelled",
        }
    }
}

/// Owns the model file for one catalog entry.
///
/// Single writer: concurrent `download()` calls queue behind one lock, and
/// the second finds the asset already verified.
pub struct ModelAssetStore {
    config: ModelConfig,
    dir: PathBuf,
    transport: Arc<dyn Transport>,
    cancel: Mutex<CancellationToken>,
    progress: watch::Sender<DownloadProgress>,
    writer: tokio::sync::Mutex<()>,
}

impl ModelAssetStore {
    pub fn new(config: ModelConfig, dir: impl Into<PathBuf>, transport: Arc<dyn Transport>) -> Self {
        let (progress, _) = watch::channel(DownloadProgress::default());
        Self {
            config,
            dir: dir.into(),
            transport,
            cancel: Mutex::new(CancellationToken::new()),
            progress,
            writer: tokio::sync::Mutex::new(()),
        }
    }

    pub fn config(&self) -> &ModelConfig {
        &self.config
    }

    /// Final location of the model file.
    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.config.filename)
    }

    /// Location of an in-progress transfer.
    pub fn partial_path(&self) -> PathBuf {
        self.dir.join(format!("{}.part", self.config.filename))
    }

    /// Watch download progress.
    pub fn subscribe_progress(&self) -> watch::Receiver<DownloadProgress> {
        self.progress.subscribe()
    }

    /// Existence plus size-band check. Filesystem errors count as absent.
    pub fn is_downloaded(&self) -> bool {
        match std::fs::metadata(self.path()) {
            Ok(meta) if meta.is_file() => self
                .config
                .integrity_band()
                .contains(meta.len(), self.config.size_bytes),
            _ => false,
        }
    }

    /// Size of the model file in bytes, 0 when absent.
    pub fn size(&self) -> u64 {
        std::fs::metadata(self.path()).map(|m| m.len()).unwrap_or(0)
    }

    /// Download the asset unless it already verifies.
    pub async fn download(&self) -> DownloadOutcome {
        let _writer = self.writer.lock().await;
        if self.is_downloaded() {
            tracing::debug!(model = %self.config.family, "model already present, skipping download");
            return DownloadOutcome::Success;
        }

        let token = CancellationToken::new();
        *self.cancel.lock() = token.clone();

        let outcome = self.fetch_and_verify(&token).await;
        telemetry::record_download(&outcome);
        match &outcome {
            DownloadOutcome::Success => {
                tracing::info!(model = %self.config.family, bytes = self.size(), "model download complete")
            }
            DownloadOutcome::Failed(failure) => {
                tracing::warn!(model = %self.config.family, error = %failure, "model download failed")
            }
        }
        outcome
    }

    /// Ask the in-flight download to stop at its next checkpoint.
    pub fn cancel_download(&self) {
        tracing::info!(model = %self.config.family, "download cancellation requested");
        self.cancel.lock().cancel();
    }

    /// Remove the model and any partial transfer. Never fails.
    pub fn delete(&self) {
        for path in [self.path(), self.partial_path()] {
            remove_quietly(&path);
        }
    }

    async fn fetch_and_verify(&self, token: &CancellationToken) -> DownloadOutcome {
        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            return DownloadOutcome::Failed(DownloadFailure::Storage(e.to_string()));
        }

        let path = self.path();
        if path.exists() {
            // Present but outside the band: start over.
            remove_quietly(&path);
        }

        let partial = self.partial_path();
        tracing::info!(model = %self.config.family, url = %self.config.url, "starting model download");
        let transfer = self
            .transport
            .fetch_to_file(&self.config.url, &partial, token, &self.progress)
            .await;

        match transfer {
            Ok(_) => {}
            Err(TransferError::Cancelled) => return DownloadOutcome::Failed(DownloadFailure::Cancelled),
            Err(TransferError::Io(e)) => {
                return DownloadOutcome::Failed(DownloadFailure::Storage(e.to_string()))
            }
            Err(e) => return DownloadOutcome::Failed(DownloadFailure::Network(e.to_string())),
        }

        if token.is_cancelled() {
            return DownloadOutcome::Failed(DownloadFailure::Cancelled);
        }

        if let Err(e) = tokio::fs::rename(&partial, &path).await {
            return DownloadOutcome::Failed(DownloadFailure::Storage(e.to_string()));
        }

        if !self.is_downloaded() {
            let actual = self.size();
            remove_quietly(&path);
            return DownloadOutcome::Failed(DownloadFailure::Integrity {
                actual,
                expected: self.config.size_bytes,
            });
        }

        if let Some(expected) = self.config.sha256.clone() {
            let digest_path = path.clone();
            let digest = tokio::task::spawn_blocking(move || sha256_file(&digest_path)).await;
            let actual = match digest {
                Ok(Ok(actual)) => actual,
                Ok(Err(e)) => return DownloadOutcome::Failed(DownloadFailure::Storage(e.to_string())),
                Err(e) => return DownloadOutcome::Failed(DownloadFailure::Storage(e.to_string())),
            };
            if !actual.eq_ignore_ascii_case(&expected) {
                remove_quietly(&path);
                return DownloadOutcome::Failed(DownloadFailure::Checksum { expected, actual });
            }
        }

        DownloadOutcome::Success
    }
}

fn remove_quietly(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::info!(path = %path.display(), "removed model file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), error = %e, "failed to remove model file"),
    }
}

/// Hex SHA-256 of a file, streamed in 1 MiB blocks.
pub fn sha256_file(path: &Path) -> std::io::Result<String> {
    let mut file = std::fs::File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = vec![0u8; 1024 * 1024];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(hex::encode(hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn band_is_inclusive_at_both_edges() {
        let band = IntegrityBand::default();
        assert!(band.contains(800, 1000));
        assert!(band.contains(1200, 1000));
        assert!(!band.contains(799, 1000));
        assert!(!band.contains(1201, 1000));
        assert!(!band.contains(0, 1000));
    }

    #[test]
    fn band_handles_large_sizes_without_overflow() {
        let band = IntegrityBand::default();
        let expected = u64::MAX / 2;
        assert!(band.contains(expected, expected));
    }

    #[test]
    fn outcome_labels_are_stable() {
        assert_eq!(DownloadOutcome::Success.label(), "success");
        assert_eq!(DownloadOutcome::Failed(DownloadFailure::Cancelled).label(), "cancelled");
    }
}
