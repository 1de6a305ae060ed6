//! Concurrency scheduler.
//!
//! FIFO admission of queued transfers under a fixed global limit. The
//! scheduler only does bookkeeping: the manager's coordinator owns it, asks it
//! which transfers to start, and tells it when a transfer stops running. A
//! transfer's running entry is removed in the same coordinator step that moves
//! its record out of `Running`.

mod admit;
mod queue;

pub use admit::RunningEntry;
pub use queue::Scheduler;
