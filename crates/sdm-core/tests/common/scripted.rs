//! In-memory transport driven by the test, and a blob store that only records.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use sdm_core::blob_store::BlobStore;
use sdm_core::error::{PersistError, TransportError};
use sdm_core::record::ResumeToken;
use sdm_core::transport::{
    EventSink, OpenRequest, SessionHandle, SessionId, SinkFactory, Transport, TransportEvent,
};

/// One `open` (or reattached session) as seen by the transport.
#[derive(Clone)]
pub struct Session {
    pub id: SessionId,
    pub url: String,
    pub resume_token: Option<ResumeToken>,
    sink: EventSink,
    cancels: Arc<Mutex<Vec<bool>>>,
}

impl Session {
    pub fn progress(&self, bytes_written: u64, bytes_expected: u64) {
        self.sink.send(TransportEvent::Progress {
            bytes_written,
            bytes_expected,
        });
    }

    pub fn complete(&self) {
        self.sink.send(TransportEvent::Completed {
            local_path: PathBuf::from(format!("/staging/{}.part", self.id)),
        });
    }

    pub fn fail(&self, err: TransportError) {
        self.sink.send(TransportEvent::Failed(err));
    }

    pub fn interrupt(&self, resume_token: Option<ResumeToken>) {
        self.sink.send(TransportEvent::Interrupted { resume_token });
    }

    /// `produce_token` flags of every cancel request, in order.
    pub fn cancels(&self) -> Vec<bool> {
        self.cancels.lock().unwrap().clone()
    }
}

struct ScriptedHandle {
    cancels: Arc<Mutex<Vec<bool>>>,
}

impl SessionHandle for ScriptedHandle {
    fn cancel(&self, produce_token: bool) {
        self.cancels.lock().unwrap().push(produce_token);
    }
}

#[derive(Default)]
struct State {
    opened: Vec<Session>,
    pending_detached: Vec<String>,
    detached: Vec<Session>,
    discarded: Vec<ResumeToken>,
}

/// Transport whose sessions only do what the test tells them to.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    state: Arc<Mutex<State>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn open_count(&self) -> usize {
        self.state.lock().unwrap().opened.len()
    }

    /// The `index`-th opened session (0-based, in open order).
    pub fn session(&self, index: usize) -> Session {
        self.state.lock().unwrap().opened[index].clone()
    }

    pub fn opened_urls(&self) -> Vec<String> {
        let state = self.state.lock().unwrap();
        state.opened.iter().map(|s| s.url.clone()).collect()
    }

    /// Sessions for these URLs are reported by the next `reattach`.
    pub fn detach_on_restart(&self, urls: &[&str]) {
        let mut state = self.state.lock().unwrap();
        state
            .pending_detached
            .extend(urls.iter().map(|u| u.to_string()));
    }

    pub fn detached(&self, index: usize) -> Session {
        self.state.lock().unwrap().detached[index].clone()
    }

    pub fn discarded(&self) -> Vec<ResumeToken> {
        self.state.lock().unwrap().discarded.clone()
    }
}

impl Transport for ScriptedTransport {
    fn open(&self, request: OpenRequest, sink: EventSink) -> Box<dyn SessionHandle> {
        let cancels = Arc::new(Mutex::new(Vec::new()));
        self.state.lock().unwrap().opened.push(Session {
            id: request.session,
            url: request.url,
            resume_token: request.resume_token,
            sink,
            cancels: Arc::clone(&cancels),
        });
        Box::new(ScriptedHandle { cancels })
    }

    fn discard(&self, token: ResumeToken) {
        self.state.lock().unwrap().discarded.push(token);
    }

    fn reattach(&self, sinks: SinkFactory<'_>) -> Vec<Box<dyn SessionHandle>> {
        let urls = std::mem::take(&mut self.state.lock().unwrap().pending_detached);
        let mut handles: Vec<Box<dyn SessionHandle>> = Vec::new();
        for url in urls {
            let sink = sinks(url.as_str());
            let cancels = Arc::new(Mutex::new(Vec::new()));
            self.state.lock().unwrap().detached.push(Session {
                id: sink.session(),
                url,
                resume_token: None,
                sink,
                cancels: Arc::clone(&cancels),
            });
            handles.push(Box::new(ScriptedHandle { cancels }));
        }
        handles
    }
}

/// Blob store that records what it was asked to persist.
#[derive(Clone, Default)]
pub struct RecordingBlobStore {
    persisted: Arc<Mutex<Vec<(PathBuf, String)>>>,
    fail: Arc<Mutex<bool>>,
}

impl RecordingBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every later `persist` fail with `PermissionDenied`.
    pub fn fail_all(&self) {
        *self.fail.lock().unwrap() = true;
    }

    pub fn persisted_names(&self) -> Vec<String> {
        let persisted = self.persisted.lock().unwrap();
        persisted.iter().map(|(_, name)| name.clone()).collect()
    }
}

impl BlobStore for RecordingBlobStore {
    fn persist(&self, local: &Path, name: &str) -> Result<PathBuf, PersistError> {
        if *self.fail.lock().unwrap() {
            return Err(PersistError {
                name: name.to_string(),
                source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only"),
            });
        }
        self.persisted
            .lock()
            .unwrap()
            .push((local.to_path_buf(), name.to_string()));
        Ok(PathBuf::from("/blobs").join(name))
    }
}
