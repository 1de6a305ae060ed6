//! The coordinator task: sole owner of records, scheduler and progress bus.
//!
//! Everything that changes manager state arrives here as a message (façade
//! commands, transport session events, blob store results) and is applied one
//! at a time. Admission runs as a follow-up pass after each message, never from
//! inside a handler.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::blob_store::BlobStore;
use crate::error::PersistError;
use crate::progress::{ProgressBus, TransferSnapshot};
use crate::record::{TransferId, TransferRecord, TransferStatus};
use crate::scheduler::Scheduler;
use crate::transport::{
    EventSink, OpenRequest, SessionEvent, SessionHandle, SessionId, Transport, TransportEvent,
};

use super::command::Command;
use super::ManagerSettings;

/// Result of one blob store placement, reported back to the coordinator.
pub(crate) struct PersistDone {
    pub(super) transfer: TransferId,
    pub(super) session: SessionId,
    pub(super) result: Result<PathBuf, PersistError>,
}

/// A session that kept running while this process was not.
pub(super) struct Detached {
    pub(super) url: String,
    pub(super) handle: Option<Box<dyn SessionHandle>>,
}

pub(crate) struct Coordinator {
    pub(super) records: BTreeMap<TransferId, TransferRecord>,
    pub(super) scheduler: Scheduler,
    pub(super) bus: ProgressBus,
    pub(super) transport: Arc<dyn Transport>,
    pub(super) blobs: Arc<dyn BlobStore>,
    pub(super) events_tx: mpsc::UnboundedSender<SessionEvent>,
    pub(super) persist_tx: mpsc::UnboundedSender<PersistDone>,
    pub(super) detached: HashMap<SessionId, Detached>,
    /// Records completed by a detached session, waiting on the blob store.
    /// They stay `Queued` (outside the queue) until the placement finishes.
    pub(super) adopted: HashSet<TransferId>,
    pub(super) next_transfer: u64,
    pub(super) next_session: u64,
    pub(super) admission_requested: bool,
}

impl Coordinator {
    pub(crate) fn new(
        settings: &ManagerSettings,
        transport: Arc<dyn Transport>,
        blobs: Arc<dyn BlobStore>,
        events_tx: mpsc::UnboundedSender<SessionEvent>,
        persist_tx: mpsc::UnboundedSender<PersistDone>,
    ) -> Self {
        Self {
            records: BTreeMap::new(),
            scheduler: Scheduler::new(settings.max_concurrent_downloads),
            bus: ProgressBus::new(settings.progress_threshold),
            transport,
            blobs,
            events_tx,
            persist_tx,
            detached: HashMap::new(),
            adopted: HashSet::new(),
            next_transfer: 0,
            next_session: 0,
            admission_requested: false,
        }
    }

    /// Runs until `Shutdown` arrives or every façade handle is dropped.
    pub(crate) async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<SessionEvent>,
        mut persisted: mpsc::UnboundedReceiver<PersistDone>,
    ) {
        tracing::debug!(limit = self.scheduler.limit(), "download coordinator started");
        loop {
            tokio::select! {
                cmd = commands.recv() => match cmd {
                    Some(Command::Shutdown { reply }) => {
                        self.stop_all();
                        let _ = reply.send(());
                        break;
                    }
                    Some(cmd) => self.handle_command(cmd),
                    None => {
                        self.stop_all();
                        break;
                    }
                },
                Some(event) = events.recv() => self.handle_session_event(event),
                Some(done) = persisted.recv() => self.handle_persisted(done),
            }
            if std::mem::take(&mut self.admission_requested) {
                self.run_admission();
            }
        }
        tracing::debug!("download coordinator stopped");
        self.drain_late_events(events).await;
    }

    /// After stop, sessions asked for a token earlier may still deliver one.
    /// The bus and our own senders are dropped first so subscriptions end and
    /// the receiver closes once the last session is gone.
    async fn drain_late_events(self, mut events: mpsc::UnboundedReceiver<SessionEvent>) {
        let transport = Arc::clone(&self.transport);
        drop(self);
        while let Some(SessionEvent { session, event }) = events.recv().await {
            release_late_event(transport.as_ref(), session, event);
        }
    }

    /// Starts queued transfers while slots are free.
    pub(super) fn run_admission(&mut self) {
        if !self.scheduler.has_capacity() || self.scheduler.queued_count() == 0 {
            return;
        }
        tracing::debug!(
            running = self.scheduler.running_count(),
            queued = self.scheduler.queued_count(),
            "admission pass"
        );
        loop {
            let batch = self.scheduler.admit();
            if batch.is_empty() {
                break;
            }
            for id in batch {
                self.start(id);
            }
        }
    }

    fn start(&mut self, id: TransferId) {
        let session = self.allocate_session();
        let Some(record) = self.records.get_mut(&id) else {
            tracing::debug!(transfer = %id, "queued transfer no longer exists");
            return;
        };
        let resume_token = match record.admit() {
            Ok(token) => token,
            Err(e) => {
                tracing::debug!(transfer = %id, "not admitting: {}", e);
                return;
            }
        };
        tracing::info!(
            transfer = %id,
            %session,
            resumed = resume_token.is_some(),
            url = record.source_url(),
            "starting transfer"
        );
        let request = OpenRequest {
            session,
            url: record.source_url().to_string(),
            resume_token,
        };
        let sink = EventSink::new(session, self.events_tx.clone());
        let handle = self.transport.open(request, sink);
        self.scheduler.start(id, session, handle);
        self.publish(id);
    }

    pub(super) fn allocate_session(&mut self) -> SessionId {
        self.next_session += 1;
        SessionId(self.next_session)
    }

    /// Creates a `Queued` record for an already validated URL. The caller decides
    /// whether it joins the queue.
    pub(super) fn create_record(&mut self, url: &str) -> TransferId {
        self.next_transfer += 1;
        let id = TransferId(self.next_transfer);
        self.records.insert(id, TransferRecord::new(id, url));
        id
    }

    pub(super) fn publish(&mut self, id: TransferId) {
        if let Some(record) = self.records.get(&id) {
            self.bus.publish(TransferSnapshot::of(record));
        }
    }

    pub(super) fn snapshots(&self) -> Vec<TransferSnapshot> {
        self.records.values().map(TransferSnapshot::of).collect()
    }

    /// Places `local_path` in the blob store off the coordinator. Staged bytes
    /// that could not be placed are removed.
    pub(super) fn spawn_persist(
        &self,
        transfer: TransferId,
        session: SessionId,
        local_path: PathBuf,
        name: String,
    ) {
        let blobs = Arc::clone(&self.blobs);
        let tx = self.persist_tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = blobs.persist(&local_path, &name);
            if result.is_err() {
                if let Err(e) = std::fs::remove_file(&local_path) {
                    tracing::debug!(path = %local_path.display(), "staged file not removed: {}", e);
                }
            }
            let _ = tx.send(PersistDone {
                transfer,
                session,
                result,
            });
        });
    }

    /// Stops every live session without keeping partial data and releases
    /// tokens nobody will resume.
    fn stop_all(&mut self) {
        for (id, entry) in self.scheduler.drain_running() {
            tracing::debug!(transfer = %id, session = %entry.session, "stopping session");
            entry.handle.cancel(false);
        }
        for (_, detached) in self.detached.drain() {
            if let Some(handle) = detached.handle {
                handle.cancel(false);
            }
        }
        for record in self.records.values_mut() {
            if record.status() == TransferStatus::Paused {
                if let Some(token) = record.resume_token.take() {
                    self.transport.discard(token);
                }
            }
        }
    }
}

/// Late event from a session nobody tracks any more. A token it carries still
/// refers to partial data, so it is released.
pub(super) fn release_late_event(
    transport: &dyn Transport,
    session: SessionId,
    event: TransportEvent,
) {
    match event {
        TransportEvent::Interrupted {
            resume_token: Some(token),
        } => {
            tracing::debug!(%session, "discarding token from finished session");
            transport.discard(token);
        }
        event => tracing::debug!(%session, ?event, "dropping event from finished session"),
    }
}
