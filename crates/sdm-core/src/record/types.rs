//! Types describing one requested download.

use std::fmt;

use crate::url_model;

/// Transfer identifier. Assigned by the manager, never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransferId(pub u64);

impl fmt::Display for TransferId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// High-level transfer state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferStatus {
    Queued,
    Running,
    Paused,
    Completed,
    Failed,
}

impl TransferStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TransferStatus::Queued => "queued",
            TransferStatus::Running => "running",
            TransferStatus::Paused => "paused",
            TransferStatus::Completed => "completed",
            TransferStatus::Failed => "failed",
        }
    }
}

impl fmt::Display for TransferStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Opaque transport data that lets an interrupted transfer continue where it stopped.
#[derive(Clone, PartialEq, Eq)]
pub struct ResumeToken(Vec<u8>);

impl ResumeToken {
    pub fn new(bytes: Vec<u8>) -> Self {
        ResumeToken(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }
}

// Token contents are transport-private; only the size is useful in logs.
impl fmt::Debug for ResumeToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResumeToken({} bytes)", self.0.len())
    }
}

/// Highest progress a transfer may report before it is `Completed`.
pub const MAX_INCOMPLETE_FRACTION: f64 = 0.999;

/// One download's identity, status, progress, and resume state.
#[derive(Debug, Clone)]
pub struct TransferRecord {
    pub(crate) id: TransferId,
    pub(crate) source_url: String,
    pub(crate) display_name: String,
    pub(crate) status: TransferStatus,
    pub(crate) progress_fraction: f64,
    pub(crate) resume_token: Option<ResumeToken>,
    pub(crate) bytes_written: u64,
    pub(crate) bytes_expected: u64,
    pub(crate) last_error: Option<String>,
}

impl TransferRecord {
    /// New `Queued` record for `url` with no progress and no resume token.
    pub fn new(id: TransferId, url: &str) -> Self {
        Self {
            id,
            source_url: url.to_string(),
            display_name: url_model::display_name(url),
            status: TransferStatus::Queued,
            progress_fraction: 0.0,
            resume_token: None,
            bytes_written: 0,
            bytes_expected: 0,
            last_error: None,
        }
    }

    pub fn id(&self) -> TransferId {
        self.id
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn status(&self) -> TransferStatus {
        self.status
    }

    pub fn progress_fraction(&self) -> f64 {
        self.progress_fraction
    }

    pub fn resume_token(&self) -> Option<&ResumeToken> {
        self.resume_token.as_ref()
    }

    pub fn bytes_written(&self) -> u64 {
        self.bytes_written
    }

    /// Expected total size; `0` while the transport has not reported it.
    pub fn bytes_expected(&self) -> u64 {
        self.bytes_expected
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }
}
