//! Shared fakes for integration tests: a byte-writing transport and a
//! scripted native backend.

#![allow(dead_code)]

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use tokio::io::AsyncWriteExt;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use insight_core::engine::{
    DecodeParams, InferenceError, InferenceProvider, NativeBackend, NativeSession, SessionParams,
};
use insight_core::models::{DownloadProgress, ModelAssetStore, ModelConfig, ModelTier, TransferError, Transport};

pub const MODEL_BYTES: u64 = 64 * 1024;
pub const GIB: u64 = 1024 * 1024 * 1024;

/// Compact-tier config shrunk to a test-sized file.
pub fn small_model() -> ModelConfig {
    ModelConfig {
        size_bytes: MODEL_BYTES,
        sha256: None,
        ..ModelTier::Compact.config()
    }
}

// === Transport ===

/// How a failing transfer ends after writing half of its bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFault {
    /// The connection drops.
    Network,
    /// The server answers with this HTTP status.
    Status(u16),
    /// The local disk refuses the write.
    Disk,
}

pub struct FakeTransport {
    pub calls: AtomicUsize,
    pub bytes: u64,
    pub chunk: usize,
    pub chunk_delay: Option<Duration>,
    pub fault: Option<TransferFault>,
}

impl FakeTransport {
    pub fn writing(bytes: u64) -> Self {
        Self { calls: AtomicUsize::new(0), bytes, chunk: 4096, chunk_delay: None, fault: None }
    }

    pub fn failing(bytes: u64, fault: TransferFault) -> Self {
        Self { fault: Some(fault), ..Self::writing(bytes) }
    }

    pub fn slow(bytes: u64, chunk_delay: Duration) -> Self {
        Self { chunk_delay: Some(chunk_delay), ..Self::writing(bytes) }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transport for FakeTransport {
    async fn fetch_to_file(
        &self,
        _url: &str,
        dest: &Path,
        cancel: &CancellationToken,
        progress: &watch::Sender<DownloadProgress>,
    ) -> Result<u64, TransferError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut file = tokio::fs::File::create(dest).await?;
        let block = vec![7u8; self.chunk];
        let mut written = 0u64;
        while written < self.bytes {
            if cancel.is_cancelled() {
                return Err(TransferError::Cancelled);
            }
            if let Some(fault) = self.fault.filter(|_| written >= self.bytes / 2) {
                return Err(match fault {
                    TransferFault::Network => TransferError::Network("connection reset by peer".into()),
                    TransferFault::Status(code) => TransferError::Status(code),
                    TransferFault::Disk => {
                        TransferError::Io(std::io::Error::new(std::io::ErrorKind::Other, "no space left on device"))
                    }
                });
            }
            let n = (self.bytes - written).min(self.chunk as u64) as usize;
            file.write_all(&block[..n]).await?;
            written += n as u64;
            progress.send_replace(DownloadProgress { downloaded_bytes: written, total_bytes: Some(self.bytes) });
            if let Some(delay) = self.chunk_delay {
                tokio::time::sleep(delay).await;
            }
        }
        file.flush().await?;
        Ok(written)
    }
}

// === Native backend ===

#[derive(Default)]
pub struct BackendLog {
    pub loads: AtomicUsize,
    pub resets: AtomicUsize,
    pub completions: AtomicUsize,
    pub releases: AtomicUsize,
    pub prompts: Mutex<Vec<String>>,
}

impl BackendLog {
    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn completions(&self) -> usize {
        self.completions.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn last_prompt(&self) -> Option<String> {
        self.prompts.lock().last().cloned()
    }
}

/// Scripted backend. Every session answers with `reply`.
pub struct ScriptedBackend {
    pub log: Arc<BackendLog>,
    pub reply: Option<String>,
    pub load_error: Option<String>,
    pub load_delay: Duration,
    pub complete_delay: Duration,
}

impl ScriptedBackend {
    pub fn replying(reply: &str) -> Self {
        Self {
            log: Arc::new(BackendLog::default()),
            reply: Some(reply.to_string()),
            load_error: None,
            load_delay: Duration::ZERO,
            complete_delay: Duration::ZERO,
        }
    }

    pub fn silent() -> Self {
        Self { reply: None, ..Self::replying("") }
    }

    pub fn failing(message: &str) -> Self {
        Self { load_error: Some(message.to_string()), ..Self::replying("") }
    }

    pub fn with_load_delay(mut self, delay: Duration) -> Self {
        self.load_delay = delay;
        self
    }

    pub fn with_complete_delay(mut self, delay: Duration) -> Self {
        self.complete_delay = delay;
        self
    }
}

impl NativeBackend for ScriptedBackend {
    fn name(&self) -> &str {
        "scripted"
    }

    fn load(&self, _model_path: &Path, _params: &SessionParams) -> Result<Box<dyn NativeSession>, InferenceError> {
        std::thread::sleep(self.load_delay);
        if let Some(message) = &self.load_error {
            return Err(InferenceError::Initialization(message.clone()));
        }
        self.log.loads.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(ScriptedSession {
            log: Arc::clone(&self.log),
            reply: self.reply.clone(),
            delay: self.complete_delay,
        }))
    }
}

struct ScriptedSession {
    log: Arc<BackendLog>,
    reply: Option<String>,
    delay: Duration,
}

impl NativeSession for ScriptedSession {
    fn reset(&mut self) -> Result<(), InferenceError> {
        self.log.resets.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn complete(&mut self, prompt: &str, _params: &DecodeParams) -> Result<Option<String>, InferenceError> {
        std::thread::sleep(self.delay);
        self.log.completions.fetch_add(1, Ordering::SeqCst);
        self.log.prompts.lock().push(prompt.to_string());
        Ok(self.reply.clone())
    }

    fn release(&mut self) -> Result<(), InferenceError> {
        self.log.releases.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

// === Wiring ===

pub fn asset_store(dir: &Path, transport: Arc<FakeTransport>) -> Arc<ModelAssetStore> {
    Arc::new(ModelAssetStore::new(small_model(), dir, transport))
}

/// Provider over a small model; `backend.log` stays observable.
pub fn provider(dir: &Path, backend: ScriptedBackend) -> (Arc<InferenceProvider>, Arc<BackendLog>, Arc<FakeTransport>) {
    let transport = Arc::new(FakeTransport::writing(MODEL_BYTES));
    let log = Arc::clone(&backend.log);
    let assets = asset_store(dir, Arc::clone(&transport));
    (Arc::new(InferenceProvider::new(assets, Arc::new(backend))), log, transport)
}

/// Write a model file of `bytes` at the store's expected path.
pub fn place_model(assets: &ModelAssetStore, bytes: u64) {
    std::fs::create_dir_all(assets.path().parent().unwrap()).unwrap();
    std::fs::write(assets.path(), vec![1u8; bytes as usize]).unwrap();
}
