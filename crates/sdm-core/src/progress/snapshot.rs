//! Observer-facing view of a transfer.

use crate::record::{TransferId, TransferRecord, TransferStatus};

/// Point-in-time state of one transfer as delivered to observers.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferSnapshot {
    pub id: TransferId,
    pub display_name: String,
    pub status: TransferStatus,
    /// Fraction complete in `[0.0, 1.0]`; `1.0` only when completed.
    pub progress_fraction: f64,
    pub bytes_written: u64,
    /// `0` while unknown.
    pub bytes_expected: u64,
    /// True when a resume token is held, i.e. resuming will not restart from zero.
    pub resumable: bool,
    /// Failure reason for `Failed` transfers.
    pub error: Option<String>,
}

impl TransferSnapshot {
    pub fn of(record: &TransferRecord) -> Self {
        Self {
            id: record.id(),
            display_name: record.display_name().to_string(),
            status: record.status(),
            progress_fraction: record.progress_fraction(),
            bytes_written: record.bytes_written(),
            bytes_expected: record.bytes_expected(),
            resumable: record.resume_token().is_some(),
            error: record.last_error().map(str::to_string),
        }
    }

    /// Whole percent, for compact displays.
    pub fn percent(&self) -> u8 {
        (self.progress_fraction * 100.0).floor().clamp(0.0, 100.0) as u8
    }
}

/// Message delivered to bus subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressEvent {
    Snapshot(TransferSnapshot),
    /// The transfer was cancelled and forgotten; no further events follow for it.
    Removed { id: TransferId },
}

impl ProgressEvent {
    pub fn id(&self) -> TransferId {
        match self {
            ProgressEvent::Snapshot(s) => s.id,
            ProgressEvent::Removed { id } => *id,
        }
    }
}
