//! Shared helpers for the integration tests.

#![allow(dead_code)]

pub mod range_server;
pub mod scripted;

use std::sync::Arc;
use std::time::{Duration, Instant};

use sdm_core::manager::{DownloadManager, ManagerSettings};
use sdm_core::progress::{ProgressEvent, Subscription, TransferSnapshot};
use sdm_core::record::{TransferId, TransferStatus};
use sdm_core::snapshot_db::SnapshotDb;

use self::scripted::{RecordingBlobStore, ScriptedTransport};

pub const WAIT: Duration = Duration::from_secs(5);

/// Manager over a scripted transport with a fresh in-memory snapshot DB.
pub async fn manager(
    limit: usize,
    transport: &ScriptedTransport,
    blobs: &RecordingBlobStore,
) -> DownloadManager {
    let db = SnapshotDb::open_in_memory().await.unwrap();
    manager_with_db(limit, transport, blobs, db)
}

pub fn manager_with_db(
    limit: usize,
    transport: &ScriptedTransport,
    blobs: &RecordingBlobStore,
    db: SnapshotDb,
) -> DownloadManager {
    let settings = ManagerSettings {
        max_concurrent_downloads: limit,
        ..ManagerSettings::default()
    };
    DownloadManager::start(
        settings,
        Arc::new(transport.clone()),
        Arc::new(blobs.clone()),
        db,
    )
}

pub fn urls(n: usize) -> Vec<String> {
    (1..=n)
        .map(|i| format!("https://files.example.com/file{i}.bin"))
        .collect()
}

/// Polls the manager until `cond` holds for its transfer list.
pub async fn wait_until<F>(mgr: &DownloadManager, mut cond: F) -> Vec<TransferSnapshot>
where
    F: FnMut(&[TransferSnapshot]) -> bool,
{
    let deadline = Instant::now() + WAIT;
    loop {
        let snaps = mgr.transfers().await.unwrap();
        if cond(&snaps) {
            return snaps;
        }
        assert!(Instant::now() < deadline, "condition not reached: {snaps:#?}");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Waits until the transport has opened `n` sessions in total.
pub async fn wait_for_opens(transport: &ScriptedTransport, n: usize) {
    let deadline = Instant::now() + WAIT;
    while transport.open_count() < n {
        assert!(
            Instant::now() < deadline,
            "expected {n} opened sessions, saw {}",
            transport.open_count()
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Waits until the transport has been asked to discard `n` tokens.
pub async fn wait_for_discards(transport: &ScriptedTransport, n: usize) {
    let deadline = Instant::now() + WAIT;
    while transport.discarded().len() < n {
        assert!(
            Instant::now() < deadline,
            "expected {n} discarded tokens, saw {}",
            transport.discarded().len()
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

pub fn status_of(snaps: &[TransferSnapshot], id: TransferId) -> Option<TransferStatus> {
    snaps.iter().find(|s| s.id == id).map(|s| s.status)
}

pub fn running_count(snaps: &[TransferSnapshot]) -> usize {
    snaps
        .iter()
        .filter(|s| s.status == TransferStatus::Running)
        .count()
}

pub async fn next_event(sub: &mut Subscription) -> ProgressEvent {
    tokio::time::timeout(WAIT, sub.recv())
        .await
        .expect("timed out waiting for progress event")
        .expect("progress bus closed")
}

pub fn expect_snapshot(event: ProgressEvent) -> TransferSnapshot {
    match event {
        ProgressEvent::Snapshot(snapshot) => snapshot,
        other => panic!("expected snapshot, got {other:?}"),
    }
}
