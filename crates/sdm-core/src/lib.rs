//! Core of `sdm`, a suspendable download manager.
//!
//! Transfers are queued, admitted under a global concurrency limit, driven by
//! a resumable [`transport::Transport`], and placed by a
//! [`blob_store::BlobStore`] when finished. Pending work survives process
//! suspension through [`snapshot_db::SnapshotDb`]. Everything is reached
//! through [`manager::DownloadManager`].

pub mod blob_store;
pub mod config;
pub mod error;
pub mod logging;
pub mod manager;
pub mod progress;
pub mod record;
pub mod scheduler;
pub mod snapshot_db;
pub mod transport;
pub mod url_model;

pub use error::{ManagerError, PersistError, TransportError};
pub use manager::{Ack, CancelMode, DownloadManager, ManagerSettings};
pub use progress::{ProgressEvent, Subscription, TransferSnapshot};
pub use record::{TransferId, TransferStatus};
