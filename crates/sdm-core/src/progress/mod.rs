//! Progress bus: coalesced transfer snapshots delivered to observers.
//!
//! Observers (terminal progress lines, live-activity style widgets, list views)
//! subscribe through the manager and receive [`ProgressEvent`]s.

mod bus;
mod coalesce;
mod snapshot;

pub use bus::{ProgressBus, SubscriberId, Subscription};
pub use coalesce::{Coalescer, DEFAULT_PROGRESS_THRESHOLD};
pub use snapshot::{ProgressEvent, TransferSnapshot};
