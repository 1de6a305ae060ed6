//! Control socket: server (during `sdm run`) and client (`sdm pause` etc.).
//! Protocol: one request line, one reply line. Requests are
//! "pause <id>", "resume <id>", "cancel <id>" or "retry <id>"; replies are
//! "accepted", "unchanged" or "error <message>".

use anyhow::{bail, Context, Result};
use sdm_core::manager::{Ack, CancelMode, DownloadManager};
use sdm_core::record::TransferId;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    Pause,
    Resume,
    Cancel,
    Retry,
}

impl ControlAction {
    pub fn as_str(self) -> &'static str {
        match self {
            ControlAction::Pause => "pause",
            ControlAction::Resume => "resume",
            ControlAction::Cancel => "cancel",
            ControlAction::Retry => "retry",
        }
    }
}

/// Parses a request line. `None` for anything malformed.
pub fn parse_line(line: &str) -> Option<(ControlAction, TransferId)> {
    let (verb, id) = line.trim().split_once(' ')?;
    let action = match verb {
        "pause" => ControlAction::Pause,
        "resume" => ControlAction::Resume,
        "cancel" => ControlAction::Cancel,
        "retry" => ControlAction::Retry,
        _ => return None,
    };
    let id = id.trim().parse::<u64>().ok()?;
    Some((action, TransferId(id)))
}

async fn apply(manager: &DownloadManager, action: ControlAction, id: TransferId) -> String {
    let result = match action {
        ControlAction::Pause => manager.pause(id).await,
        ControlAction::Resume => manager.resume(id).await,
        ControlAction::Cancel => manager.cancel(id, CancelMode::Forget).await,
        ControlAction::Retry => manager.cancel(id, CancelMode::Retry).await,
    };
    match result {
        Ok(Ack::Accepted) => "accepted".to_string(),
        Ok(Ack::Unchanged) => "unchanged".to_string(),
        Err(e) => format!("error {e}"),
    }
}

/// Binds `path` (replacing a stale socket) and serves requests against
/// `manager` until the returned task is aborted.
pub fn spawn_control_listener(
    manager: DownloadManager,
    path: impl AsRef<Path>,
) -> Result<tokio::task::JoinHandle<()>> {
    let path = path.as_ref().to_path_buf();
    let _ = std::fs::remove_file(&path);
    let listener = UnixListener::bind(&path)
        .with_context(|| format!("bind control socket {}", path.display()))?;
    let handle = tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let manager = manager.clone();
                    tokio::spawn(async move {
                        let (read, mut write) = stream.into_split();
                        let mut reader = BufReader::new(read).lines();
                        while let Ok(Some(line)) = reader.next_line().await {
                            let reply = match parse_line(&line) {
                                Some((action, id)) => {
                                    tracing::debug!(action = action.as_str(), %id, "control request");
                                    apply(&manager, action, id).await
                                }
                                None => format!("error malformed request {:?}", line.trim()),
                            };
                            if write.write_all(format!("{reply}\n").as_bytes()).await.is_err() {
                                break;
                            }
                        }
                    });
                }
                Err(e) => tracing::debug!("control socket accept: {}", e),
            }
        }
    });
    Ok(handle)
}

/// Sends one request to the socket at `socket_path` and returns the reply line.
pub async fn send(socket_path: &Path, action: ControlAction, id: u64) -> Result<String> {
    if !socket_path.exists() {
        bail!("no running `sdm run` (missing {})", socket_path.display());
    }
    let stream = UnixStream::connect(socket_path)
        .await
        .with_context(|| format!("connect to {}", socket_path.display()))?;
    let (read, mut write) = stream.into_split();
    write
        .write_all(format!("{} {}\n", action.as_str(), id).as_bytes())
        .await?;
    let reply = BufReader::new(read)
        .lines()
        .next_line()
        .await?
        .context("control socket closed without a reply")?;
    Ok(reply)
}

/// [`send`] to the default socket path.
pub async fn send_default(action: ControlAction, id: u64) -> Result<String> {
    let path = sdm_core::config::control_socket_path()?;
    send(&path, action, id).await
}
