//! Command and event handlers run on the coordinator task.

use crate::error::ManagerError;
use crate::record::{TransferId, TransferStatus};
use crate::transport::{EventSink, SessionEvent, SessionId, TransportEvent};
use crate::url_model;

use super::command::{Ack, CancelMode, Command};
use super::coordinator::{release_late_event, Coordinator, Detached, PersistDone};

impl Coordinator {
    pub(super) fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Enqueue { urls, reply } => {
                let _ = reply.send(self.enqueue(urls));
            }
            Command::Pause { id, reply } => {
                let _ = reply.send(self.pause(id));
            }
            Command::Resume { id, reply } => {
                let _ = reply.send(self.resume(id));
            }
            Command::Cancel { id, mode, reply } => {
                let _ = reply.send(self.cancel(id, mode));
            }
            Command::Subscribe { reply } => {
                let current = self.snapshots();
                let _ = reply.send(self.bus.subscribe(current));
            }
            Command::Transfers { reply } => {
                let _ = reply.send(self.snapshots());
            }
            Command::PendingUrls { reply } => {
                let _ = reply.send(self.pending_urls());
            }
            Command::Restore { urls, reply } => {
                let _ = reply.send(self.restore(urls));
            }
            // Handled by the run loop.
            Command::Shutdown { reply } => {
                let _ = reply.send(());
            }
        }
    }

    /// All URLs are validated before any record is created.
    fn enqueue(&mut self, urls: Vec<String>) -> Result<Vec<TransferId>, ManagerError> {
        for url in &urls {
            url_model::validate(url).map_err(|reason| ManagerError::InvalidUrl {
                url: url.clone(),
                reason,
            })?;
        }
        let ids = urls.iter().map(|url| self.queue_new(url)).collect();
        Ok(ids)
    }

    fn queue_new(&mut self, url: &str) -> TransferId {
        let id = self.create_record(url);
        tracing::info!(transfer = %id, url, "queued transfer");
        self.scheduler.enqueue(id);
        self.publish(id);
        self.admission_requested = true;
        id
    }

    fn pause(&mut self, id: TransferId) -> Result<Ack, ManagerError> {
        if !self.records.contains_key(&id) {
            return Err(ManagerError::UnknownTransfer(id));
        }
        let Some(entry) = self.scheduler.running_mut(id) else {
            return Ok(Ack::Unchanged);
        };
        if entry.pause_requested || entry.persisting {
            return Ok(Ack::Unchanged);
        }
        entry.pause_requested = true;
        entry.handle.cancel(true);
        tracing::info!(transfer = %id, session = %entry.session, "pause requested");
        Ok(Ack::Accepted)
    }

    fn resume(&mut self, id: TransferId) -> Result<Ack, ManagerError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(ManagerError::UnknownTransfer(id))?;
        let was = record.status();
        record
            .requeue()
            .map_err(|e| ManagerError::from_transition(id, e))?;
        if was == TransferStatus::Queued
            && (self.scheduler.is_queued(id) || self.adopted.contains(&id))
        {
            return Ok(Ack::Unchanged);
        }
        tracing::info!(transfer = %id, from = %was, "resuming transfer");
        self.scheduler.enqueue(id);
        self.publish(id);
        self.admission_requested = true;
        Ok(Ack::Accepted)
    }

    fn cancel(&mut self, id: TransferId, mode: CancelMode) -> Result<Ack, ManagerError> {
        let record = self
            .records
            .get_mut(&id)
            .ok_or(ManagerError::UnknownTransfer(id))?;
        if record.status() == TransferStatus::Completed {
            return Ok(Ack::Unchanged);
        }
        if let Some(token) = record.resume_token.take() {
            self.transport.discard(token);
        }
        if let Some(entry) = self.scheduler.finish(id) {
            entry.handle.cancel(false);
            self.admission_requested = true;
        }
        self.scheduler.remove_queued(id);
        self.adopted.remove(&id);
        tracing::info!(transfer = %id, ?mode, "cancelled transfer");

        match mode {
            CancelMode::Forget => {
                self.records.remove(&id);
                self.bus.publish_removed(id);
            }
            CancelMode::Retry => {
                if let Some(record) = self.records.get_mut(&id) {
                    record
                        .reset()
                        .map_err(|e| ManagerError::from_transition(id, e))?;
                }
                self.scheduler.enqueue(id);
                self.publish(id);
                self.admission_requested = true;
            }
        }
        Ok(Ack::Accepted)
    }

    /// Running first (admission order), then the queue head to tail.
    fn pending_urls(&self) -> Vec<String> {
        self.scheduler
            .running_in_admission_order()
            .into_iter()
            .chain(self.scheduler.queued())
            .filter_map(|id| self.records.get(&id))
            .map(|record| record.source_url().to_string())
            .collect()
    }

    fn restore(&mut self, urls: Vec<String>) -> Vec<TransferId> {
        let mut ids = Vec::with_capacity(urls.len());
        for url in urls {
            match url_model::validate(&url) {
                Ok(()) => ids.push(self.queue_new(&url)),
                Err(reason) => tracing::warn!(%url, "skipping restored URL: {}", reason),
            }
        }
        self.reattach();
        tracing::info!(
            restored = ids.len(),
            detached = self.detached.len(),
            "restored pending transfers"
        );
        ids
    }

    fn reattach(&mut self) {
        let transport = std::sync::Arc::clone(&self.transport);
        let events_tx = self.events_tx.clone();
        let mut opened: Vec<(SessionId, String)> = Vec::new();
        let next_session = &mut self.next_session;
        let handles = transport.reattach(&mut |url: &str| {
            *next_session += 1;
            let session = SessionId(*next_session);
            opened.push((session, url.to_string()));
            EventSink::new(session, events_tx.clone())
        });
        let mut handles = handles.into_iter();
        for (session, url) in opened {
            tracing::info!(%session, %url, "reattached detached session");
            self.detached.insert(
                session,
                Detached {
                    url,
                    handle: handles.next(),
                },
            );
        }
    }

    pub(super) fn handle_session_event(&mut self, SessionEvent { session, event }: SessionEvent) {
        if let Some(id) = self.scheduler.transfer_for(session) {
            self.on_transfer_event(id, session, event);
        } else if self.detached.contains_key(&session) {
            self.on_detached_event(session, event);
        } else {
            release_late_event(self.transport.as_ref(), session, event);
        }
    }

    fn on_transfer_event(&mut self, id: TransferId, session: SessionId, event: TransportEvent) {
        let Some(record) = self.records.get_mut(&id) else {
            self.scheduler.finish(id);
            return;
        };
        match event {
            TransportEvent::Progress {
                bytes_written,
                bytes_expected,
            } => {
                if record.apply_progress(bytes_written, bytes_expected).is_ok() {
                    self.publish(id);
                }
            }
            TransportEvent::Completed { local_path } => {
                let name = record.display_name().to_string();
                tracing::info!(transfer = %id, %session, "transfer received, persisting");
                self.scheduler.mark_persisting(id);
                self.spawn_persist(id, session, local_path, name);
            }
            TransportEvent::Failed(err) => {
                self.scheduler.finish(id);
                tracing::warn!(transfer = %id, %session, "transfer failed: {}", err);
                let _ = record.fail(err.to_string());
                self.publish(id);
                self.admission_requested = true;
            }
            TransportEvent::Interrupted { resume_token } => {
                let pause_requested = self
                    .scheduler
                    .finish(id)
                    .map(|entry| entry.pause_requested)
                    .unwrap_or(false);
                if resume_token.is_some() || pause_requested {
                    tracing::info!(
                        transfer = %id,
                        resumable = resume_token.is_some(),
                        "transfer paused"
                    );
                    let _ = record.interrupt(resume_token);
                } else {
                    tracing::warn!(transfer = %id, "transfer interrupted without resume data");
                    let _ = record.fail("interrupted without resume data");
                }
                self.publish(id);
                self.admission_requested = true;
            }
        }
    }

    /// Events from a session this process did not start. Progress is dropped;
    /// outcomes land on a queued record for the same URL or on a placeholder.
    fn on_detached_event(&mut self, session: SessionId, event: TransportEvent) {
        match event {
            TransportEvent::Progress { .. } => {
                tracing::debug!(%session, "dropping progress from detached session");
            }
            TransportEvent::Completed { local_path } => {
                let Some(detached) = self.detached.remove(&session) else {
                    return;
                };
                let id = self.adopt_or_create(&detached.url);
                self.adopted.insert(id);
                let name = self
                    .records
                    .get(&id)
                    .map(|r| r.display_name().to_string())
                    .unwrap_or_else(|| url_model::display_name(&detached.url));
                tracing::info!(transfer = %id, %session, "detached session completed, persisting");
                self.spawn_persist(id, session, local_path, name);
            }
            TransportEvent::Failed(err) => {
                let Some(detached) = self.detached.remove(&session) else {
                    return;
                };
                let id = self.create_record(&detached.url);
                if let Some(record) = self.records.get_mut(&id) {
                    let _ = record.admit();
                    let _ = record.fail(err.to_string());
                }
                tracing::warn!(transfer = %id, %session, "detached session failed: {}", err);
                self.publish(id);
            }
            TransportEvent::Interrupted { resume_token } => {
                self.detached.remove(&session);
                if let Some(token) = resume_token {
                    self.transport.discard(token);
                }
                tracing::info!(%session, "detached session interrupted");
            }
        }
    }

    /// A queued, not yet running record for `url` if there is one (taken out of
    /// the queue), otherwise a new placeholder record.
    fn adopt_or_create(&mut self, url: &str) -> TransferId {
        let waiting = self.scheduler.queued().find(|id| {
            self.records
                .get(id)
                .is_some_and(|r| r.source_url() == url && r.status() == TransferStatus::Queued)
        });
        match waiting {
            Some(id) => {
                self.scheduler.remove_queued(id);
                id
            }
            None => self.create_record(url),
        }
    }

    pub(super) fn handle_persisted(&mut self, done: PersistDone) {
        let PersistDone {
            transfer: id,
            session,
            result,
        } = done;

        let adopted = self.adopted.remove(&id);
        if !adopted {
            let ours = self
                .scheduler
                .running(id)
                .is_some_and(|e| e.session == session && e.persisting);
            if !ours {
                tracing::debug!(transfer = %id, %session, "dropping result for cancelled transfer");
                return;
            }
            self.scheduler.finish(id);
            self.admission_requested = true;
        }

        let Some(record) = self.records.get_mut(&id) else {
            return;
        };
        if adopted {
            // Adopted records were never admitted here.
            let _ = record.admit();
        }
        match result {
            Ok(path) => {
                let _ = record.complete();
                tracing::info!(transfer = %id, path = %path.display(), "transfer completed");
            }
            Err(e) => {
                tracing::warn!(transfer = %id, "could not persist download: {}", e);
                let _ = record.fail(e.to_string());
            }
        }
        self.publish(id);
    }
}
