//! Error taxonomy shared by the transport, blob store and manager.

use crate::record::{InvalidTransition, TransferId, TransferStatus};

/// Non-resumable transport failure. The transfer moves to `Failed`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransportError {
    /// Connection-level failure the transport could not turn into a resume token.
    #[error("network: {0}")]
    Network(String),
    /// Server answered with a non-success status.
    #[error("HTTP {0}")]
    Http(u32),
    /// The resume token was stale or not understood; the transfer must restart.
    #[error("resume token rejected by transport")]
    InvalidResumeToken,
    /// Local staging I/O failed.
    #[error("staging I/O: {0}")]
    Io(String),
}

/// Blob store could not place the finished bytes. The transfer moves to `Failed`.
#[derive(Debug, thiserror::Error)]
#[error("persist {name}: {source}")]
pub struct PersistError {
    pub name: String,
    #[source]
    pub source: std::io::Error,
}

/// Errors returned synchronously by the manager façade.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ManagerError {
    /// Operation not valid for the record's current status. Nothing changed.
    #[error("transfer {id}: cannot {operation} while {status}")]
    InvalidStateTransition {
        id: TransferId,
        status: TransferStatus,
        operation: &'static str,
    },
    #[error("unknown transfer {0}")]
    UnknownTransfer(TransferId),
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },
    /// The coordinator task is no longer running.
    #[error("download manager stopped")]
    Stopped,
}

impl ManagerError {
    pub(crate) fn from_transition(id: TransferId, err: InvalidTransition) -> Self {
        ManagerError::InvalidStateTransition {
            id,
            status: err.from,
            operation: err.operation,
        }
    }
}
