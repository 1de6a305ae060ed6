//! Persistence slot for pending downloads (SQLite via sqlx).
//!
//! Holds the source URLs of transfers that were queued or running when the
//! process was suspended, under one fixed key. Resume tokens are never stored:
//! restored transfers start again from byte 0.

mod db;

pub use db::{SnapshotDb, PENDING_KEY};
