//! `sdm run` – restore pending URLs and download them, printing progress.

use anyhow::Result;
use sdm_core::blob_store::FsBlobStore;
use sdm_core::config::{self, SdmConfig};
use sdm_core::manager::{DownloadManager, ManagerSettings};
use sdm_core::progress::{ProgressEvent, TransferSnapshot};
use sdm_core::record::{TransferId, TransferStatus};
use sdm_core::snapshot_db::SnapshotDb;
use sdm_core::transport::{CurlOptions, CurlTransport};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::signal::unix::{signal, Signal, SignalKind};

use crate::cli::control_socket;

/// Signals that end `sdm run` after saving pending work.
pub struct StopSignals {
    terminate: Signal,
    hangup: Signal,
}

impl StopSignals {
    /// Installs the handlers; from here on these signals no longer kill the process.
    pub fn install() -> Result<Self> {
        Ok(Self {
            terminate: signal(SignalKind::terminate())?,
            hangup: signal(SignalKind::hangup())?,
        })
    }

    /// Waits for Ctrl-C, SIGTERM or SIGHUP and names the one that arrived.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => "SIGINT",
            _ = self.terminate.recv() => "SIGTERM",
            _ = self.hangup.recv() => "SIGHUP",
        }
    }
}

/// One status line for a transfer.
pub fn progress_line(snap: &TransferSnapshot) -> String {
    let mut line = format!(
        "[{:>3}] {:<9} {:>3}%  {}",
        snap.id.0,
        snap.status.as_str(),
        snap.percent(),
        snap.display_name
    );
    if snap.bytes_expected > 0 {
        line.push_str(&format!(
            "  ({:.1} / {:.1} MiB)",
            snap.bytes_written as f64 / 1_048_576.0,
            snap.bytes_expected as f64 / 1_048_576.0
        ));
    }
    if let Some(error) = &snap.error {
        line.push_str(&format!("  error: {error}"));
    }
    line
}

fn all_finished(live: &BTreeMap<TransferId, TransferSnapshot>) -> bool {
    live.values()
        .all(|s| matches!(s.status, TransferStatus::Completed | TransferStatus::Failed))
}

pub async fn run_manager(
    db: SnapshotDb,
    cfg: &SdmConfig,
    jobs: Option<usize>,
    download_dir: Option<PathBuf>,
) -> Result<()> {
    let download_dir = match download_dir.or_else(|| cfg.download_dir.clone()) {
        Some(dir) => dir,
        None => std::env::current_dir()?,
    };
    let mut settings = ManagerSettings::from(cfg);
    if let Some(jobs) = jobs {
        settings.max_concurrent_downloads = jobs.max(1);
    }

    let transport = CurlTransport::new(
        cfg.staging_dir_or_default()?,
        CurlOptions::from(&cfg.transport),
    )?;
    let manager = DownloadManager::start(
        settings,
        Arc::new(transport),
        Arc::new(FsBlobStore::new(&download_dir)),
        db,
    );

    let mut sub = manager.subscribe().await?;
    let restored = manager.on_process_start().await?;
    if restored.is_empty() {
        println!("No pending downloads.");
        manager.shutdown().await;
        return Ok(());
    }
    tracing::info!(
        count = restored.len(),
        dir = %download_dir.display(),
        "starting downloads"
    );

    let socket_path = config::control_socket_path()?;
    let listener = match control_socket::spawn_control_listener(manager.clone(), &socket_path) {
        Ok(handle) => {
            tracing::debug!(path = %socket_path.display(), "control socket listening");
            Some(handle)
        }
        Err(e) => {
            tracing::warn!("control socket unavailable: {:#}", e);
            None
        }
    };

    // Keep the slot current while running so a crash loses nothing.
    manager.on_process_suspend().await?;

    let mut live: BTreeMap<TransferId, TransferSnapshot> = BTreeMap::new();
    let mut signals = StopSignals::install()?;
    let mut interrupted = false;
    loop {
        tokio::select! {
            event = sub.recv() => {
                let pending_changed = match event {
                    Some(ProgressEvent::Snapshot(snap)) => {
                        println!("{}", progress_line(&snap));
                        let previous = live.insert(snap.id, snap.clone());
                        previous.map_or(true, |p| p.status != snap.status)
                    }
                    Some(ProgressEvent::Removed { id }) => {
                        println!("[{:>3}] cancelled", id.0);
                        live.remove(&id);
                        true
                    }
                    None => break,
                };
                if pending_changed {
                    manager.on_process_suspend().await?;
                }
                if all_finished(&live) {
                    break;
                }
            }
            name = signals.recv() => {
                tracing::info!(signal = name, "stopping on signal");
                let saved = manager.on_process_suspend().await?;
                println!("Interrupted; {saved} download(s) saved for the next run.");
                interrupted = true;
                break;
            }
        }
    }

    manager.shutdown().await;
    if let Some(handle) = listener {
        handle.abort();
        let _ = std::fs::remove_file(&socket_path);
    }

    if !interrupted {
        let completed = live
            .values()
            .filter(|s| s.status == TransferStatus::Completed)
            .count();
        let failed = live.len() - completed;
        println!("{completed} completed, {failed} failed.");
        tracing::info!(completed, failed, "run finished");
    }
    Ok(())
}
