//! Admission and running-set bookkeeping.

use crate::record::TransferId;
use crate::transport::{SessionHandle, SessionId};

use super::queue::Scheduler;

/// A transfer holding one of the concurrency slots.
pub struct RunningEntry {
    pub session: SessionId,
    pub handle: Box<dyn SessionHandle>,
    /// A pause was requested; a token-less interruption then means `Paused`, not `Failed`.
    pub pause_requested: bool,
    /// The transport finished and the blob store is placing the bytes.
    pub persisting: bool,
    seq: u64,
}

impl Scheduler {
    /// Pops ids from the head of the queue while slots are free. The caller must
    /// [`start`](Self::start) each returned id (or drop it) before the next pass.
    pub fn admit(&mut self) -> Vec<TransferId> {
        let free = self.limit.saturating_sub(self.running.len());
        let take = free.min(self.queue.len());
        self.queue.drain(..take).collect()
    }

    /// Records `id` as running under `session`.
    pub fn start(&mut self, id: TransferId, session: SessionId, handle: Box<dyn SessionHandle>) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.sessions.insert(session, id);
        self.running.insert(
            id,
            RunningEntry {
                session,
                handle,
                pause_requested: false,
                persisting: false,
                seq,
            },
        );
    }

    pub fn running(&self, id: TransferId) -> Option<&RunningEntry> {
        self.running.get(&id)
    }

    pub fn running_mut(&mut self, id: TransferId) -> Option<&mut RunningEntry> {
        self.running.get_mut(&id)
    }

    /// Transfer a live session belongs to.
    pub fn transfer_for(&self, session: SessionId) -> Option<TransferId> {
        self.sessions.get(&session).copied()
    }

    /// Marks `id` as persisting: its slot stays taken, but further events from
    /// its session are no longer routed.
    pub fn mark_persisting(&mut self, id: TransferId) -> bool {
        let Some(entry) = self.running.get_mut(&id) else {
            return false;
        };
        entry.persisting = true;
        self.sessions.remove(&entry.session);
        true
    }

    /// Frees the slot held by `id`.
    pub fn finish(&mut self, id: TransferId) -> Option<RunningEntry> {
        let entry = self.running.remove(&id)?;
        self.sessions.remove(&entry.session);
        Some(entry)
    }

    /// Running ids in the order they were admitted.
    pub fn running_in_admission_order(&self) -> Vec<TransferId> {
        let mut ids: Vec<(u64, TransferId)> =
            self.running.iter().map(|(id, e)| (e.seq, *id)).collect();
        ids.sort_unstable();
        ids.into_iter().map(|(_, id)| id).collect()
    }

    /// Empties the running set (shutdown).
    pub fn drain_running(&mut self) -> Vec<(TransferId, RunningEntry)> {
        self.sessions.clear();
        self.running.drain().collect()
    }
}
