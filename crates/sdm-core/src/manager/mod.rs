//! Download manager façade.
//!
//! [`DownloadManager`] is a cheap, cloneable handle. The state lives in a
//! coordinator task spawned by [`DownloadManager::start`]; every call is a
//! message to that task plus a reply. Observable side effects are delivered
//! through [`subscribe`](DownloadManager::subscribe).

mod command;
mod coordinator;
mod handlers;

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::{mpsc, oneshot};

use crate::blob_store::BlobStore;
use crate::config::SdmConfig;
use crate::error::ManagerError;
use crate::progress::{Subscription, TransferSnapshot, DEFAULT_PROGRESS_THRESHOLD};
use crate::record::TransferId;
use crate::snapshot_db::SnapshotDb;
use crate::transport::Transport;

pub use command::{Ack, CancelMode};

use command::{Command, Reply};
use coordinator::Coordinator;

/// Manager tuning taken from [`SdmConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct ManagerSettings {
    pub max_concurrent_downloads: usize,
    pub progress_threshold: f64,
}

impl Default for ManagerSettings {
    fn default() -> Self {
        Self {
            max_concurrent_downloads: 3,
            progress_threshold: DEFAULT_PROGRESS_THRESHOLD,
        }
    }
}

impl From<&SdmConfig> for ManagerSettings {
    fn from(cfg: &SdmConfig) -> Self {
        Self {
            max_concurrent_downloads: cfg.concurrency_limit(),
            progress_threshold: cfg.progress_threshold,
        }
    }
}

/// Handle to a running download manager.
#[derive(Clone)]
pub struct DownloadManager {
    commands: mpsc::UnboundedSender<Command>,
    db: SnapshotDb,
}

impl DownloadManager {
    /// Spawns the coordinator on the current tokio runtime.
    pub fn start(
        settings: ManagerSettings,
        transport: Arc<dyn Transport>,
        blobs: Arc<dyn BlobStore>,
        db: SnapshotDb,
    ) -> Self {
        let (commands, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        let (persist_tx, persist_rx) = mpsc::unbounded_channel();
        let coordinator = Coordinator::new(&settings, transport, blobs, events_tx, persist_tx);
        tokio::spawn(coordinator.run(commands_rx, events_rx, persist_rx));
        Self { commands, db }
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(Reply<T>) -> Command,
    ) -> Result<T, ManagerError> {
        let (reply, rx) = oneshot::channel();
        self.commands
            .send(make(reply))
            .map_err(|_| ManagerError::Stopped)?;
        rx.await.map_err(|_| ManagerError::Stopped)
    }

    /// Creates one `Queued` transfer per URL, in order. Nothing is queued if
    /// any URL is invalid.
    pub async fn enqueue<I, S>(&self, urls: I) -> Result<Vec<TransferId>, ManagerError>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let urls = urls.into_iter().map(Into::into).collect();
        self.request(|reply| Command::Enqueue { urls, reply }).await?
    }

    /// Asks a running transfer to stop and keep its resume data. The status
    /// changes once the transport confirms.
    pub async fn pause(&self, id: TransferId) -> Result<Ack, ManagerError> {
        self.request(|reply| Command::Pause { id, reply }).await?
    }

    /// Puts a paused, failed or queued transfer back in line.
    pub async fn resume(&self, id: TransferId) -> Result<Ack, ManagerError> {
        self.request(|reply| Command::Resume { id, reply }).await?
    }

    pub async fn cancel(&self, id: TransferId, mode: CancelMode) -> Result<Ack, ManagerError> {
        self.request(|reply| Command::Cancel { id, mode, reply }).await?
    }

    /// Subscribes to progress. The current state of every transfer is delivered first.
    pub async fn subscribe(&self) -> Result<Subscription, ManagerError> {
        self.request(|reply| Command::Subscribe { reply }).await
    }

    /// Current state of every known transfer, by id.
    pub async fn transfers(&self) -> Result<Vec<TransferSnapshot>, ManagerError> {
        self.request(|reply| Command::Transfers { reply }).await
    }

    /// Saves the URLs of running and queued transfers to the snapshot slot.
    /// Sessions keep running; the transport decides whether they outlive the
    /// process. Returns the number of URLs saved.
    pub async fn on_process_suspend(&self) -> Result<usize> {
        let urls = self.request(|reply| Command::PendingUrls { reply }).await?;
        self.db
            .write_snapshot(&urls)
            .await
            .context("write pending snapshot")?;
        tracing::info!(count = urls.len(), "saved pending transfers");
        Ok(urls.len())
    }

    /// Takes the snapshot slot, queues its URLs as fresh transfers (no resume
    /// data) and reattaches to sessions that continued while the process was
    /// gone.
    pub async fn on_process_start(&self) -> Result<Vec<TransferId>> {
        let urls = self
            .db
            .take_snapshot()
            .await
            .context("read pending snapshot")?;
        let ids = self.request(|reply| Command::Restore { urls, reply }).await?;
        Ok(ids)
    }

    /// Stops every session (partial data is dropped) and ends the coordinator.
    /// Subscriptions end afterwards. Calling it again is a no-op.
    pub async fn shutdown(&self) {
        if self.request(|reply| Command::Shutdown { reply }).await.is_err() {
            tracing::debug!("download manager already stopped");
        }
    }
}
