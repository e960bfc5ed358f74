//! Integration tests for the model asset store: integrity band, download,
//! cancellation and deletion.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{asset_store, place_model, small_model, FakeTransport, TransferFault, MODEL_BYTES};
use insight_core::models::{DownloadFailure, DownloadOutcome, IntegrityBand, ModelAssetStore};

// === Integrity band ===

#[test]
fn sizes_inside_band_verify() {
    let dir = tempfile::tempdir().unwrap();
    let store = asset_store(dir.path(), Arc::new(FakeTransport::writing(0)));
    let low = (MODEL_BYTES * 80).div_ceil(100);
    let high = MODEL_BYTES * 120 / 100;
    for size in [low, MODEL_BYTES * 9 / 10, MODEL_BYTES, MODEL_BYTES * 11 / 10, high] {
        place_model(&store, size);
        assert!(store.is_downloaded(), "{} bytes should verify", size);
        assert_eq!(store.size(), size);
    }
}

#[test]
fn sizes_outside_band_do_not_verify() {
    let dir = tempfile::tempdir().unwrap();
    let store = asset_store(dir.path(), Arc::new(FakeTransport::writing(0)));
    assert!(!store.is_downloaded(), "absent file");
    assert_eq!(store.size(), 0);

    let low = (MODEL_BYTES * 80).div_ceil(100) - 1;
    let high = MODEL_BYTES * 120 / 100 + 1;
    for size in [0, 1, low, high, MODEL_BYTES * 2] {
        place_model(&store, size);
        assert!(!store.is_downloaded(), "{} bytes should not verify", size);
    }
}

#[test]
fn directory_at_model_path_is_not_downloaded() {
    let dir = tempfile::tempdir().unwrap();
    let store = asset_store(dir.path(), Arc::new(FakeTransport::writing(0)));
    std::fs::create_dir_all(store.path()).unwrap();
    assert!(!store.is_downloaded());
}

#[test]
fn per_model_band_override_applies() {
    let dir = tempfile::tempdir().unwrap();
    let config = insight_core::models::ModelConfig {
        integrity: Some(IntegrityBand { min_percent: 99, max_percent: 101 }),
        ..small_model()
    };
    let store = ModelAssetStore::new(config, dir.path(), Arc::new(FakeTransport::writing(0)));
    place_model(&store, MODEL_BYTES * 9 / 10);
    assert!(!store.is_downloaded());
    place_model(&store, MODEL_BYTES);
    assert!(store.is_downloaded());
}

// === Download ===

#[tokio::test]
async fn download_when_verified_makes_no_network_calls() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(FakeTransport::writing(MODEL_BYTES));
    let store = asset_store(dir.path(), Arc::clone(&transport));
    place_model(&store, MODEL_BYTES);

    assert_eq!(store.download().await, DownloadOutcome::Success);
    assert_eq!(transport.calls(), 0);
}

#[tokio::test]
async fn download_fetches_then_verifies() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(FakeTransport::writing(MODEL_BYTES));
    let store = asset_store(dir.path(), Arc::clone(&transport));

    assert_eq!(store.download().await, DownloadOutcome::Success);
    assert!(store.is_downloaded());
    assert!(!store.partial_path().exists(), "partial file renamed into place");
    assert_eq!(store.subscribe_progress().borrow().downloaded_bytes, MODEL_BYTES);

    assert!(store.download().await.is_success());
    assert_eq!(transport.calls(), 1, "second download is a no-op");
}

#[tokio::test]
async fn concurrent_downloads_fetch_once() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(FakeTransport::writing(MODEL_BYTES));
    let store = asset_store(dir.path(), Arc::clone(&transport));

    let (a, b) = tokio::join!(store.download(), store.download());
    assert!(a.is_success() && b.is_success());
    assert_eq!(transport.calls(), 1);
}

#[tokio::test]
async fn truncated_download_reports_integrity_and_removes_file() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(FakeTransport::writing(MODEL_BYTES / 2));
    let store = asset_store(dir.path(), Arc::clone(&transport));

    let outcome = store.download().await;
    assert_eq!(
        outcome,
        DownloadOutcome::Failed(DownloadFailure::Integrity { actual: MODEL_BYTES / 2, expected: MODEL_BYTES })
    );
    assert!(!store.path().exists(), "bad file removed so the next call starts over");

    store.download().await;
    assert_eq!(transport.calls(), 2);
}

#[tokio::test]
async fn dropped_connection_is_a_network_failure() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(FakeTransport::failing(MODEL_BYTES, TransferFault::Network));
    let store = asset_store(dir.path(), Arc::clone(&transport));

    match store.download().await {
        DownloadOutcome::Failed(DownloadFailure::Network(message)) => {
            assert!(message.contains("connection reset"), "{message}")
        }
        other => panic!("expected network failure, got {:?}", other),
    }
    assert!(!store.is_downloaded());
    assert!(!store.path().exists());
    assert!(store.partial_path().exists(), "partial transfer kept for resume");
}

#[tokio::test]
async fn http_error_status_is_a_network_failure() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(FakeTransport::failing(MODEL_BYTES, TransferFault::Status(503)));
    let store = asset_store(dir.path(), transport);

    match store.download().await {
        DownloadOutcome::Failed(DownloadFailure::Network(message)) => assert!(message.contains("503")),
        other => panic!("expected network failure, got {:?}", other),
    }
}

#[tokio::test]
async fn local_write_error_is_a_storage_failure() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(FakeTransport::failing(MODEL_BYTES, TransferFault::Disk));
    let store = asset_store(dir.path(), transport);

    let outcome = store.download().await;
    assert_eq!(outcome.label(), "storage");
    match outcome {
        DownloadOutcome::Failed(DownloadFailure::Storage(message)) => {
            assert!(message.contains("no space left"), "{message}")
        }
        other => panic!("expected storage failure, got {:?}", other),
    }
    assert!(!store.is_downloaded());
}

#[tokio::test]
async fn checksum_mismatch_is_reported() {
    let dir = tempfile::tempdir().unwrap();
    let config = insight_core::models::ModelConfig {
        sha256: Some("00".repeat(32)),
        ..small_model()
    };
    let store = ModelAssetStore::new(config, dir.path(), Arc::new(FakeTransport::writing(MODEL_BYTES)));

    match store.download().await {
        DownloadOutcome::Failed(DownloadFailure::Checksum { expected, actual }) => {
            assert_eq!(expected, "00".repeat(32));
            assert_eq!(actual.len(), 64);
        }
        other => panic!("expected checksum failure, got {:?}", other),
    }
    assert!(!store.path().exists());
}

#[tokio::test]
async fn matching_checksum_is_accepted() {
    let dir = tempfile::tempdir().unwrap();
    let reference = dir.path().join("reference.bin");
    std::fs::write(&reference, vec![7u8; MODEL_BYTES as usize]).unwrap();
    let digest = insight_core::models::asset::sha256_file(&reference).unwrap();

    let config = insight_core::models::ModelConfig { sha256: Some(digest.to_uppercase()), ..small_model() };
    let store = ModelAssetStore::new(config, dir.path().join("models"), Arc::new(FakeTransport::writing(MODEL_BYTES)));
    assert!(store.download().await.is_success());
}

// === Cancellation ===

#[tokio::test]
async fn cancel_download_resolves_to_cancelled() {
    let dir = tempfile::tempdir().unwrap();
    let transport = Arc::new(FakeTransport::slow(MODEL_BYTES, Duration::from_millis(20)));
    let store = asset_store(dir.path(), transport);

    let canceller = Arc::clone(&store);
    let cancel = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(30)).await;
        canceller.cancel_download();
    });

    let outcome = store.download().await;
    cancel.await.unwrap();
    assert_eq!(outcome, DownloadOutcome::Failed(DownloadFailure::Cancelled));
    assert!(!store.is_downloaded());
}

#[tokio::test]
async fn cancel_before_download_does_not_poison_next_attempt() {
    let dir = tempfile::tempdir().unwrap();
    let store = asset_store(dir.path(), Arc::new(FakeTransport::writing(MODEL_BYTES)));
    store.cancel_download();
    assert!(store.download().await.is_success());
}

// === Deletion ===

#[test]
fn delete_without_file_is_silent() {
    let dir = tempfile::tempdir().unwrap();
    let store = asset_store(&dir.path().join("never-created"), Arc::new(FakeTransport::writing(0)));
    store.delete();
    store.delete();
}

#[test]
fn delete_removes_model_and_partial() {
    let dir = tempfile::tempdir().unwrap();
    let store = asset_store(dir.path(), Arc::new(FakeTransport::writing(0)));
    place_model(&store, MODEL_BYTES);
    std::fs::write(store.partial_path(), b"partial").unwrap();

    store.delete();
    assert!(!store.path().exists());
    assert!(!store.partial_path().exists());
    assert!(!store.is_downloaded());
}
