//! Resumable HTTP GET over libcurl.
//!
//! Each session runs one `curl::easy::Easy` transfer on the blocking pool and
//! writes the body to `<staging_dir>/<pid>-<session>.part`. Cancellation is a
//! shared flag checked from curl's progress callback. Resuming uses
//! `CURLOPT_RESUME_FROM`; a server that answers `200` instead of `206` gets the
//! file rewritten from byte 0.

use std::cell::RefCell;
use std::fs::File;
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use crate::config::TransportConfig;
use crate::error::TransportError;
use crate::record::ResumeToken;

use super::classify::{classify_curl_error, Interruption};
use super::token::PartialFile;
use super::{EventSink, OpenRequest, SessionHandle, Transport, TransportEvent};

/// Per-handle curl settings derived from [`TransportConfig`].
#[derive(Debug, Clone)]
pub struct CurlOptions {
    pub connect_timeout: Duration,
    pub low_speed_limit: u32,
    pub low_speed_time: Duration,
    pub max_redirections: u32,
    pub max_recv_speed: Option<u64>,
}

impl From<&TransportConfig> for CurlOptions {
    fn from(cfg: &TransportConfig) -> Self {
        Self {
            connect_timeout: Duration::from_secs(cfg.connect_timeout_secs),
            low_speed_limit: cfg.low_speed_limit_bytes,
            low_speed_time: Duration::from_secs(cfg.low_speed_time_secs),
            max_redirections: cfg.max_redirections,
            max_recv_speed: cfg.max_bytes_per_sec,
        }
    }
}

/// Stop request shared between a [`CurlSession`] handle and its worker.
#[derive(Debug, Default)]
struct StopSignal {
    requested: AtomicBool,
    keep_partial: AtomicBool,
}

impl StopSignal {
    fn request(&self, keep_partial: bool) {
        self.keep_partial.store(keep_partial, Ordering::Relaxed);
        self.requested.store(true, Ordering::Release);
    }

    fn is_requested(&self) -> bool {
        self.requested.load(Ordering::Acquire)
    }

    fn keep_partial(&self) -> bool {
        self.keep_partial.load(Ordering::Relaxed)
    }
}

struct CurlSession {
    stop: Arc<StopSignal>,
}

impl SessionHandle for CurlSession {
    fn cancel(&self, produce_token: bool) {
        self.stop.request(produce_token);
    }
}

/// [`Transport`] backed by libcurl.
#[derive(Debug, Clone)]
pub struct CurlTransport {
    staging_dir: PathBuf,
    options: CurlOptions,
}

impl CurlTransport {
    /// Creates the transport, making sure `staging_dir` exists. Partial files
    /// left by processes that are no longer running are removed.
    pub fn new(staging_dir: impl Into<PathBuf>, options: CurlOptions) -> anyhow::Result<Self> {
        let staging_dir = staging_dir.into();
        std::fs::create_dir_all(&staging_dir)?;
        sweep_orphaned_partials(&staging_dir)?;
        Ok(Self {
            staging_dir,
            options,
        })
    }
}

impl Transport for CurlTransport {
    fn open(&self, request: OpenRequest, sink: EventSink) -> Box<dyn SessionHandle> {
        let stop = Arc::new(StopSignal::default());
        let fresh_path = self
            .staging_dir
            .join(format!("{}-{}.part", std::process::id(), request.session.0));
        let options = self.options.clone();
        let staging_dir = self.staging_dir.clone();
        let worker_stop = Arc::clone(&stop);
        tokio::task::spawn_blocking(move || {
            let event = run_session(&request, fresh_path, &staging_dir, &options, &worker_stop, &sink);
            tracing::debug!(session = %request.session, ?event, "curl session finished");
            sink.send(event);
        });
        Box::new(CurlSession { stop })
    }

    fn discard(&self, token: ResumeToken) {
        discard_staged(&token, &self.staging_dir);
    }
}

/// Mutable state shared by the curl callbacks of one transfer.
struct Staging {
    file: File,
    /// Bytes already on disk before this request.
    base: u64,
    /// Bytes written by this request.
    written: u64,
    status: Option<u32>,
    io_error: Option<std::io::Error>,
    last_reported: u64,
}

impl Staging {
    fn total(&self) -> u64 {
        self.base + self.written
    }

    fn is_success(&self) -> bool {
        matches!(self.status, Some(200..=299))
    }

    fn write(&mut self, data: &[u8]) -> std::io::Result<()> {
        // A 200 to a ranged request is the whole body again.
        if self.base > 0 && self.written == 0 && self.status == Some(200) {
            self.file.set_len(0)?;
            self.file.seek(SeekFrom::Start(0))?;
            self.base = 0;
        }
        self.file.write_all(data)?;
        self.written += data.len() as u64;
        Ok(())
    }
}

fn run_session(
    request: &OpenRequest,
    fresh_path: PathBuf,
    staging_dir: &Path,
    options: &CurlOptions,
    stop: &StopSignal,
    sink: &EventSink,
) -> TransportEvent {
    let (path, offset) = match &request.resume_token {
        Some(token) => match PartialFile::from_token(token, &request.url) {
            Ok(partial) => (partial.path, partial.offset),
            Err(e) => {
                // The record gave the token up on admission; nothing else will
                // clean up behind it.
                discard_staged(token, staging_dir);
                return TransportEvent::Failed(e);
            }
        },
        None => (fresh_path, 0),
    };

    let file = match open_staging(&path, offset) {
        Ok(f) => f,
        Err(e) => return TransportEvent::Failed(TransportError::Io(e.to_string())),
    };
    let staging = RefCell::new(Staging {
        file,
        base: offset,
        written: 0,
        status: None,
        io_error: None,
        last_reported: offset,
    });

    let mut easy = curl::easy::Easy::new();
    let performed = configure(&mut easy, &request.url, offset, options)
        .and_then(|()| perform(&mut easy, &staging, stop, sink));

    let staging = staging.into_inner();
    let total = staging.total();
    let succeeded = staging.is_success();
    let Staging { file, io_error, .. } = staging;
    if let Err(e) = file.sync_all() {
        tracing::debug!(path = %path.display(), "sync partial file: {}", e);
    }
    drop(file);

    let partial = PartialFile {
        url: request.url.clone(),
        path: path.clone(),
        offset: total,
    };

    match performed {
        Err(e) if e.is_aborted_by_callback() && stop.is_requested() => {
            if stop.keep_partial() {
                TransportEvent::Interrupted {
                    resume_token: Some(partial.to_token()),
                }
            } else {
                discard(&path);
                TransportEvent::Interrupted { resume_token: None }
            }
        }
        // libcurl refuses a `200` reply to a resumed request itself.
        Err(e) if e.is_range_error() => {
            tracing::info!(url = %request.url, "server ignored the resume range");
            discard(&path);
            TransportEvent::Failed(TransportError::InvalidResumeToken)
        }
        Err(_) if io_error.is_some() => {
            discard(&path);
            let msg = io_error.map(|e| e.to_string()).unwrap_or_default();
            TransportEvent::Failed(TransportError::Io(msg))
        }
        Err(e) => match classify_curl_error(&e) {
            Interruption::Transient if total > 0 && succeeded => {
                tracing::info!(url = %request.url, bytes = total, "transfer interrupted: {}", e);
                TransportEvent::Interrupted {
                    resume_token: Some(partial.to_token()),
                }
            }
            _ => {
                discard(&path);
                TransportEvent::Failed(TransportError::Network(e.to_string()))
            }
        },
        Ok(()) if stop.is_requested() && !stop.keep_partial() => {
            discard(&path);
            TransportEvent::Interrupted { resume_token: None }
        }
        Ok(()) => {
            let code = easy.response_code().unwrap_or(0);
            if !(200..300).contains(&code) {
                discard(&path);
                return TransportEvent::Failed(TransportError::Http(code));
            }
            TransportEvent::Completed { local_path: path }
        }
    }
}

fn open_staging(path: &Path, offset: u64) -> std::io::Result<File> {
    let mut file = File::options().create(true).write(true).open(path)?;
    file.set_len(offset)?;
    file.seek(SeekFrom::Start(offset))?;
    Ok(file)
}

fn configure(
    easy: &mut curl::easy::Easy,
    url: &str,
    offset: u64,
    options: &CurlOptions,
) -> Result<(), curl::Error> {
    easy.url(url)?;
    easy.follow_location(true)?;
    easy.max_redirections(options.max_redirections)?;
    easy.connect_timeout(options.connect_timeout)?;
    easy.low_speed_limit(options.low_speed_limit)?;
    easy.low_speed_time(options.low_speed_time)?;
    if let Some(speed) = options.max_recv_speed {
        easy.max_recv_speed(speed)?;
    }
    if offset > 0 {
        easy.resume_from(offset)?;
    }
    easy.progress(true)?;
    Ok(())
}

fn perform(
    easy: &mut curl::easy::Easy,
    staging: &RefCell<Staging>,
    stop: &StopSignal,
    sink: &EventSink,
) -> Result<(), curl::Error> {
    let mut transfer = easy.transfer();
    transfer.header_function(|line| {
        if let Some(code) = parse_status_line(line) {
            staging.borrow_mut().status = Some(code);
        }
        true
    })?;
    transfer.write_function(|data| {
        let mut st = staging.borrow_mut();
        if !st.is_success() {
            // Error bodies are not part of the file.
            return Ok(data.len());
        }
        match st.write(data) {
            Ok(()) => Ok(data.len()),
            Err(e) => {
                tracing::warn!("staging write failed: {}", e);
                st.io_error = Some(e);
                Ok(0)
            }
        }
    })?;
    transfer.progress_function(|dltotal, _dlnow, _ultotal, _ulnow| {
        if stop.is_requested() {
            return false;
        }
        let mut st = staging.borrow_mut();
        if !st.is_success() {
            return true;
        }
        let total = st.total();
        if total != st.last_reported {
            st.last_reported = total;
            let expected = if dltotal > 0.0 {
                st.base + dltotal as u64
            } else {
                0
            };
            sink.send(TransportEvent::Progress {
                bytes_written: total,
                bytes_expected: expected,
            });
        }
        true
    })?;
    transfer.perform()
}

/// Parses `HTTP/1.1 206 Partial Content` style lines into the status code.
fn parse_status_line(line: &[u8]) -> Option<u32> {
    let line = std::str::from_utf8(line).ok()?;
    if !line.starts_with("HTTP/") {
        return None;
    }
    line.split_whitespace().nth(1)?.parse().ok()
}

fn discard(path: &Path) {
    match std::fs::remove_file(path) {
        Ok(()) => tracing::debug!(path = %path.display(), "removed partial file"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(path = %path.display(), "could not remove partial file: {}", e),
    }
}

/// Removes the partial file a token names, if it lives in `staging_dir`.
/// Files elsewhere were not staged by this transport and are left alone.
fn discard_staged(token: &ResumeToken, staging_dir: &Path) {
    if let Ok(partial) = serde_json::from_slice::<PartialFile>(token.as_bytes()) {
        if partial.path.starts_with(staging_dir) {
            discard(&partial.path);
        }
    }
}

/// Pid that staged `name` (`<pid>-<session>.part`), if it follows that pattern.
fn staging_owner(name: &str) -> Option<u32> {
    let stem = name.strip_suffix(".part")?;
    let (pid, session) = stem.split_once('-')?;
    session.parse::<u64>().ok()?;
    pid.parse().ok()
}

fn sweep_orphaned_partials(staging_dir: &Path) -> anyhow::Result<()> {
    let own_pid = std::process::id();
    for entry in std::fs::read_dir(staging_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(pid) = name.to_str().and_then(staging_owner) else {
            continue;
        };
        if pid != own_pid && !Path::new("/proc").join(pid.to_string()).exists() {
            discard(&entry.path());
        }
    }
    Ok(())
}
