//! Resumable transport capability.
//!
//! A transport performs one GET per session, optionally continuing from a
//! [`ResumeToken`], and reports what happened as [`TransportEvent`]s through an
//! [`EventSink`]. Sessions run off the manager's coordinator; the sink is the
//! only way they talk back to it, so raw I/O callbacks never touch manager state.

mod classify;
mod curl;
mod token;

use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::error::TransportError;
use crate::record::ResumeToken;

pub use self::classify::{classify_curl_error, Interruption};
pub use self::curl::{CurlOptions, CurlTransport};
pub use self::token::PartialFile;

/// Transport session identifier, allocated by the manager per `open`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "s{}", self.0)
    }
}

/// Parameters for starting one session.
#[derive(Debug, Clone)]
pub struct OpenRequest {
    pub session: SessionId,
    pub url: String,
    /// Continue from this token instead of byte 0.
    pub resume_token: Option<ResumeToken>,
}

/// What a session reports. Exactly one of the last three ends a session.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// Cumulative bytes on disk and expected total (`0` = unknown).
    Progress { bytes_written: u64, bytes_expected: u64 },
    /// All bytes received into `local_path`, ready for the blob store.
    Completed { local_path: PathBuf },
    /// Non-resumable failure.
    Failed(TransportError),
    /// Stopped early. With a token the transfer can continue later.
    Interrupted { resume_token: Option<ResumeToken> },
}

impl TransportEvent {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TransportEvent::Progress { .. })
    }
}

/// A transport event tagged with the session that produced it.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionEvent {
    pub session: SessionId,
    pub event: TransportEvent,
}

/// Thread-safe handoff from a session back into the coordinator. Events from
/// one sink arrive in the order they were sent.
#[derive(Debug, Clone)]
pub struct EventSink {
    session: SessionId,
    tx: mpsc::UnboundedSender<SessionEvent>,
}

impl EventSink {
    pub fn new(session: SessionId, tx: mpsc::UnboundedSender<SessionEvent>) -> Self {
        Self { session, tx }
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Delivers `event`. Returns false once the receiving side is gone.
    pub fn send(&self, event: TransportEvent) -> bool {
        self.tx
            .send(SessionEvent {
                session: self.session,
                event,
            })
            .is_ok()
    }
}

/// Control handle for a live session.
pub trait SessionHandle: Send {
    /// Stops the session. With `produce_token` the session ends with
    /// `Interrupted { resume_token: Some(..) }` when it can; otherwise partial
    /// data is discarded.
    fn cancel(&self, produce_token: bool);
}

/// Hands out a sink for a session that kept running while the process was not
/// (one call per detached session, with that session's URL).
pub type SinkFactory<'a> = &'a mut dyn FnMut(&str) -> EventSink;

/// Resumable GET capability consumed by the manager.
pub trait Transport: Send + Sync + 'static {
    /// Starts a session. Must not block: the transfer runs elsewhere and reports
    /// through `sink`.
    fn open(&self, request: OpenRequest, sink: EventSink) -> Box<dyn SessionHandle>;

    /// Releases whatever `token` refers to; called when a paused transfer is
    /// cancelled or abandoned and its token will never be used.
    fn discard(&self, token: ResumeToken) {
        let _ = token;
    }

    /// Reconnects to sessions that continued outside this process. Their events
    /// may arrive for transfers the manager has not reconstructed yet. `sinks`
    /// is called once per detached session; handles are returned in the same
    /// order.
    fn reattach(&self, sinks: SinkFactory<'_>) -> Vec<Box<dyn SessionHandle>> {
        let _ = sinks;
        Vec::new()
    }
}
