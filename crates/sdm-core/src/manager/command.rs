//! Messages from façade handles to the coordinator task.

use tokio::sync::oneshot;

use crate::error::ManagerError;
use crate::progress::{Subscription, TransferSnapshot};
use crate::record::TransferId;

/// Outcome of an accepted control request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ack {
    /// The request changed (or will change) the transfer.
    Accepted,
    /// Nothing to do; the transfer is already where the request would put it.
    Unchanged,
}

/// What happens to a cancelled transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelMode {
    /// Drop the transfer; observers receive `Removed`.
    Forget,
    /// Reset the transfer to a fresh `Queued` record at the tail of the queue.
    Retry,
}

pub(crate) type Reply<T> = oneshot::Sender<T>;

pub(crate) enum Command {
    Enqueue {
        urls: Vec<String>,
        reply: Reply<Result<Vec<TransferId>, ManagerError>>,
    },
    Pause {
        id: TransferId,
        reply: Reply<Result<Ack, ManagerError>>,
    },
    Resume {
        id: TransferId,
        reply: Reply<Result<Ack, ManagerError>>,
    },
    Cancel {
        id: TransferId,
        mode: CancelMode,
        reply: Reply<Result<Ack, ManagerError>>,
    },
    Subscribe {
        reply: Reply<Subscription>,
    },
    Transfers {
        reply: Reply<Vec<TransferSnapshot>>,
    },
    /// URLs worth restoring after a restart: running, then queued.
    PendingUrls {
        reply: Reply<Vec<String>>,
    },
    /// Enqueue restored URLs and reattach detached sessions.
    Restore {
        urls: Vec<String>,
        reply: Reply<Vec<TransferId>>,
    },
    Shutdown {
        reply: Reply<()>,
    },
}
