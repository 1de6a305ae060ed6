//! Rate limiting of progress-only updates.

use std::collections::HashMap;

use crate::record::{TransferId, TransferStatus};

use super::snapshot::TransferSnapshot;

/// Default minimum fraction delta between two published progress-only updates.
pub const DEFAULT_PROGRESS_THRESHOLD: f64 = 0.01;

#[derive(Debug, Clone, Copy)]
struct Published {
    status: TransferStatus,
    fraction: f64,
    resumable: bool,
}

/// Remembers what was last published per transfer and decides whether a new
/// snapshot is worth publishing.
///
/// Status and resume-token changes always publish. Progress-only changes publish
/// when the fraction moved by at least the threshold, reached `1.0`, or went
/// backwards (cancel reset).
#[derive(Debug)]
pub struct Coalescer {
    threshold: f64,
    last: HashMap<TransferId, Published>,
}

impl Coalescer {
    pub fn new(threshold: f64) -> Self {
        Self {
            threshold: threshold.max(0.0),
            last: HashMap::new(),
        }
    }

    /// Returns true (and records the snapshot as published) if it should be sent.
    pub fn should_publish(&mut self, snapshot: &TransferSnapshot) -> bool {
        let next = Published {
            status: snapshot.status,
            fraction: snapshot.progress_fraction,
            resumable: snapshot.resumable,
        };
        let publish = match self.last.get(&snapshot.id) {
            None => true,
            Some(prev) => {
                prev.status != next.status
                    || prev.resumable != next.resumable
                    || next.fraction < prev.fraction
                    || next.fraction - prev.fraction >= self.threshold
                    || (next.fraction == 1.0 && prev.fraction != 1.0)
            }
        };
        if publish {
            self.last.insert(snapshot.id, next);
        }
        publish
    }

    pub fn forget(&mut self, id: TransferId) {
        self.last.remove(&id);
    }
}
