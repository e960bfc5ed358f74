//! Remote file transfer for model downloads.
//!
//! The asset store only needs "GET this URL into that file". Transfers are
//! cooperative: the cancellation token is checked once per received chunk.

use std::path::Path;

use async_trait::async_trait;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

#[derive(Error, Debug)]
pub enum TransferError {
    #[error("network error: {0}")]
    Network(String),

    #[error("server responded with HTTP {0}")]
    Status(u16),

    #[error("transfer cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Bytes received so far for the current transfer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadProgress {
    pub downloaded_bytes: u64,
    pub total_bytes: Option<u64>,
}

/// HTTP GET-to-file capability.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Fetch `url` into `dest`.
    ///
    /// An existing file at `dest` is a partial transfer; implementations may
    /// resume it or start over. Returns the number of bytes in `dest` when
    /// the transfer ends.
    async fn fetch_to_file(
        &self,
        url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        progress: &watch::Sender<DownloadProgress>,
    ) -> Result<u64, TransferError>;
}

#[cfg(feature = "http")]
pub use http::HttpTransport;

#[cfg(feature = "http")]
mod http {
    use super::*;

    use futures::StreamExt;
    use reqwest::{header, Client, StatusCode};
    use tokio::fs::OpenOptions;
    use tokio::io::AsyncWriteExt;

    /// `reqwest`-backed transport with `Range` resume support.
    #[derive(Clone, Default)]
    pub struct HttpTransport {
        client: Client,
    }

    impl HttpTransport {
        pub fn new() -> Self {
            Self { client: Client::new() }
        }
    }

    #[async_trait]
    impl Transport for HttpTransport {
        async fn fetch_to_file(
            &self,
            url: &str,
            dest: &Path,
            cancel: &CancellationToken,
            progress: &watch::Sender<DownloadProgress>,
        ) -> Result<u64, TransferError> {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }

            let existing = tokio::fs::metadata(dest).await.map(|m| m.len()).unwrap_or(0);
            let mut request = self.client.get(url);
            if existing > 0 {
                request = request.header(header::RANGE, format!("bytes={}-", existing));
            }

            let response = tokio::select! {
                _ = cancel.cancelled() => return Err(TransferError::Cancelled),
                sent = request.send() => sent.map_err(|e| TransferError::Network(e.to_string()))?,
            };

            let status = response.status();
            if status == StatusCode::RANGE_NOT_SATISFIABLE && existing > 0 {
                // Partial file already holds the whole body.
                return Ok(existing);
            }
            if !status.is_success() {
                return Err(TransferError::Status(status.as_u16()));
            }

            let resume = existing > 0 && status == StatusCode::PARTIAL_CONTENT;
            let mut written = if resume { existing } else { 0 };
            let total = response.content_length().map(|len| len + written);
            if existing > 0 && !resume {
                tracing::info!(url, existing, "server ignored range request, restarting transfer");
            }

            let mut file = OpenOptions::new()
                .create(true)
                .write(true)
                .append(resume)
                .truncate(!resume)
                .open(dest)
                .await?;

            progress.send_replace(DownloadProgress { downloaded_bytes: written, total_bytes: total });

            let mut stream = response.bytes_stream();
            while let Some(chunk) = stream.next().await {
                if cancel.is_cancelled() {
                    file.flush().await?;
                    return Err(TransferError::Cancelled);
                }
                let chunk = chunk.map_err(|e| TransferError::Network(e.to_string()))?;
                file.write_all(&chunk).await?;
                written += chunk.len() as u64;
                progress.send_replace(DownloadProgress { downloaded_bytes: written, total_bytes: total });
            }

            file.flush().await?;
            Ok(written)
        }
    }
}

/// Transport used when the crate is built without `http`.
pub struct OfflineTransport;

#[async_trait]
impl Transport for OfflineTransport {
    async fn fetch_to_file(
        &self,
        url: &str,
        _dest: &Path,
        _cancel: &CancellationToken,
        _progress: &watch::Sender<DownloadProgress>,
    ) -> Result<u64, TransferError> {
        Err(TransferError::Network(format!(
            "no network transport compiled in; cannot fetch {}",
            url
        )))
    }
}

/// Default transport for this build.
pub fn default_transport() -> std::sync::Arc<dyn Transport> {
    #[cfg(feature = "http")]
    {
        std::sync::Arc::new(HttpTransport::new())
    }
    #[cfg(not(feature = "http"))]
    {
        std::sync::Arc::new(OfflineTransport)
    }
}
