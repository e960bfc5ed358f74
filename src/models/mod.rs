//! Model asset management.
//!
//! Handles the model catalog, download transport, and the on-disk asset
//! lifecycle (verify, download, cancel, delete).

pub mod asset;
pub mod catalog;
pub mod transport;

pub use asset::{DownloadFailure, DownloadOutcome, IntegrityBand, ModelAssetStore};
pub use catalog::{ModelConfig, ModelTier};
#[cfg(feature = "http")]
pub use transport::HttpTransport;
pub use transport::{default_transport, DownloadProgress, OfflineTransport, TransferError, Transport};
