//! Scheduler state and the waiting queue.

use std::collections::{HashMap, VecDeque};

use crate::record::TransferId;
use crate::transport::SessionId;

use super::admit::RunningEntry;

/// Waiting queue plus running set, bounded by `limit`.
pub struct Scheduler {
    pub(super) limit: usize,
    pub(super) queue: VecDeque<TransferId>,
    pub(super) running: HashMap<TransferId, RunningEntry>,
    /// Reverse map for routing session events; cleared as soon as a session's
    /// result is no longer wanted.
    pub(super) sessions: HashMap<SessionId, TransferId>,
    pub(super) next_seq: u64,
}

impl Scheduler {
    /// New scheduler admitting at most `limit` transfers at once (at least one).
    pub fn new(limit: usize) -> Self {
        Self {
            limit: limit.max(1),
            queue: VecDeque::new(),
            running: HashMap::new(),
            sessions: HashMap::new(),
            next_seq: 0,
        }
    }

    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn running_count(&self) -> usize {
        self.running.len()
    }

    pub fn queued_count(&self) -> usize {
        self.queue.len()
    }

    pub fn has_capacity(&self) -> bool {
        self.running.len() < self.limit
    }

    /// Appends `id` to the tail of the queue. An id already waiting keeps its place.
    pub fn enqueue(&mut self, id: TransferId) -> bool {
        if self.queue.contains(&id) || self.running.contains_key(&id) {
            return false;
        }
        self.queue.push_back(id);
        true
    }

    pub fn is_queued(&self, id: TransferId) -> bool {
        self.queue.contains(&id)
    }

    /// Removes `id` from the queue; returns whether it was waiting.
    pub fn remove_queued(&mut self, id: TransferId) -> bool {
        match self.queue.iter().position(|q| *q == id) {
            Some(pos) => {
                self.queue.remove(pos);
                true
            }
            None => false,
        }
    }

    /// Waiting ids, head first.
    pub fn queued(&self) -> impl Iterator<Item = TransferId> + '_ {
        self.queue.iter().copied()
    }
}
