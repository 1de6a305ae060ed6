//! Transfer records: identity, status, progress and resume token of one download.

mod state;
mod types;

pub use state::InvalidTransition;
pub use types::{
    ResumeToken, TransferId, TransferRecord, TransferStatus, MAX_INCOMPLETE_FRACTION,
};
