//! mpv backend driven over its JSON IPC socket.
//!
//! Commands are written as one JSON object per line carrying a `request_id`;
//! mpv answers each with a reply holding the same id. Replies are routed back
//! to the waiting caller through a oneshot. Unsolicited `end-file` events are
//! forwarded to the orchestrator as `Event::PlaybackStopped`.
//!
//! mpv acknowledges `loadfile` as soon as the file is queued, so `start` only
//! resolves once `file-loaded` arrives. An `end-file` with reason `error` while a
//! load is pending fails that start instead of reporting a stopped video.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::UnixStream;
use tokio::net::unix::{OwnedReadHalf, OwnedWriteHalf};
use tokio::process::{Child, Command};
use tokio::sync::{Mutex, mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::{Player, PlayerError};
use crate::config::PlayerConfig;
use crate::events::Event;

const CONNECT_RETRY_DELAY: Duration = Duration::from_millis(100);

type Waiter = oneshot::Sender<Result<(), PlayerError>>;

#[derive(Default)]
struct Inflight {
    closed: bool,
    waiters: HashMap<u64, Waiter>,
    loading: Option<Waiter>,
}

pub struct MpvPlayer {
    writer: Mutex<OwnedWriteHalf>,
    inflight: Arc<Mutex<Inflight>>,
    next_request_id: AtomicU64,
    reader: JoinHandle<()>,
    process: Option<JoinHandle<()>>,
    closed: CancellationToken,
}

impl MpvPlayer {
    /// Spawns mpv in idle kiosk mode and connects to its IPC socket.
    pub async fn launch(cfg: &PlayerConfig, events: mpsc::Sender<Event>) -> Result<Self> {
        if let Some(dir) = cfg.ipc_socket.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("failed to create socket directory {}", dir.display()))?;
        }
        remove_stale_socket(&cfg.ipc_socket)?;

        let mut command = Command::new(&cfg.program);
        command
            .args(kiosk_args(&cfg.ipc_socket))
            .args(&cfg.extra_args)
            .stdin(Stdio::null())
            .kill_on_drop(true);
        let mut child = command
            .spawn()
            .with_context(|| format!("failed to launch player {}", cfg.program.display()))?;
        info!(
            program = %cfg.program.display(),
            pid = child.id(),
            socket = %cfg.ipc_socket.display(),
            "player launched"
        );

        let stream = connect_with_retry(&cfg.ipc_socket, cfg.connect_timeout, &mut child).await?;
        info!(socket = %cfg.ipc_socket.display(), "connected to player ipc");

        let mut player = Self::connect(stream, events);
        player.process = Some(tokio::spawn(supervise(child, player.closed.clone())));
        Ok(player)
    }

    /// Wraps an already connected IPC stream.
    pub fn connect(stream: UnixStream, events: mpsc::Sender<Event>) -> Self {
        let (read, write) = stream.into_split();
        let inflight = Arc::new(Mutex::new(Inflight::default()));
        let closed = CancellationToken::new();
        let reader = tokio::spawn(read_loop(
            read,
            Arc::clone(&inflight),
            events,
            closed.clone(),
        ));
        Self {
            writer: Mutex::new(write),
            inflight,
            next_request_id: AtomicU64::new(1),
            reader,
            process: None,
            closed,
        }
    }

    /// Cancelled once the player process exits or its IPC socket closes.
    /// Every command fails after that, so callers treat it as fatal.
    pub fn closed(&self) -> CancellationToken {
        self.closed.clone()
    }

    async fn send(&self, command: Vec<Value>) -> Result<(), PlayerError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let line = encode_request(request_id, &command)?;

        let (tx, rx) = oneshot::channel();
        {
            let mut inflight = self.inflight.lock().await;
            if inflight.closed {
                return Err(PlayerError::Disconnected);
            }
            inflight.waiters.insert(request_id, tx);
        }

        debug!(request_id, ?command, "player command");
        let written = {
            let mut writer = self.writer.lock().await;
            writer.write_all(line.as_bytes()).await
        };
        if let Err(err) = written {
            self.inflight.lock().await.waiters.remove(&request_id);
            return Err(err.into());
        }

        rx.await.unwrap_or(Err(PlayerError::Disconnected))
    }
}

impl Drop for MpvPlayer {
    fn drop(&mut self) {
        self.reader.abort();
        if let Some(process) = self.process.take() {
            process.abort();
        }
    }
}

#[async_trait]
impl Player for MpvPlayer {
    async fn start(&self, video: &Path) -> Result<(), PlayerError> {
        let path = video.to_str().ok_or_else(|| {
            PlayerError::Protocol(format!("video path is not UTF-8: {}", video.display()))
        })?;

        let (tx, loaded) = oneshot::channel();
        {
            let mut inflight = self.inflight.lock().await;
            if inflight.closed {
                return Err(PlayerError::Disconnected);
            }
            inflight.loading = Some(tx);
        }

        if let Err(err) = self
            .send(vec![json!("loadfile"), json!(path), json!("replace")])
            .await
        {
            self.inflight.lock().await.loading = None;
            return Err(err);
        }
        loaded.await.unwrap_or(Err(PlayerError::Disconnected))
    }

    async fn pause(&self) -> Result<(), PlayerError> {
        self.send(vec![json!("set_property"), json!("pause"), json!(true)])
            .await
    }

    async fn resume(&self) -> Result<(), PlayerError> {
        self.send(vec![json!("set_property"), json!("pause"), json!(false)])
            .await
    }

    async fn stop(&self) -> Result<(), PlayerError> {
        self.send(vec![json!("stop")]).await
    }
}

fn kiosk_args(socket: &Path) -> Vec<String> {
    vec![
        "--idle=yes".to_string(),
        "--force-window=yes".to_string(),
        "--fullscreen".to_string(),
        "--no-osc".to_string(),
        "--osd-level=0".to_string(),
        "--no-terminal".to_string(),
        // a paused video must not leave the next one paused
        "--reset-on-next-file=pause".to_string(),
        format!("--input-ipc-server={}", socket.display()),
    ]
}

fn remove_stale_socket(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => {
            debug!(socket = %path.display(), "removed stale ipc socket");
            Ok(())
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => {
            Err(err).with_context(|| format!("failed to remove stale socket {}", path.display()))
        }
    }
}

async fn connect_with_retry(
    socket: &Path,
    timeout: Duration,
    child: &mut Child,
) -> Result<UnixStream> {
    let deadline = Instant::now() + timeout;
    loop {
        match UnixStream::connect(socket).await {
            Ok(stream) => return Ok(stream),
            Err(err) => {
                if let Some(status) = child.try_wait().context("failed to poll player process")? {
                    bail!("player exited with {status} before opening {}", socket.display());
                }
                if Instant::now() >= deadline {
                    return Err(err).with_context(|| {
                        format!(
                            "player ipc socket {} not ready after {}",
                            socket.display(),
                            humantime::format_duration(timeout)
                        )
                    });
                }
                sleep(CONNECT_RETRY_DELAY).await;
            }
        }
    }
}

async fn supervise(mut child: Child, closed: CancellationToken) {
    match child.wait().await {
        Ok(status) => error!(%status, "player process exited"),
        Err(err) => error!(%err, "failed to wait on player process"),
    }
    closed.cancel();
}

async fn read_loop(
    read: OwnedReadHalf,
    inflight: Arc<Mutex<Inflight>>,
    events: mpsc::Sender<Event>,
    closed: CancellationToken,
) {
    let mut lines = BufReader::new(read).lines();
    loop {
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            Ok(None) => {
                warn!("player ipc socket closed");
                break;
            }
            Err(err) => {
                warn!(%err, "player ipc read failed");
                break;
            }
        };

        match parse_message(&line) {
            Ok(Incoming::Reply { request_id, result }) => {
                let waiter = inflight.lock().await.waiters.remove(&request_id);
                match waiter {
                    Some(tx) => {
                        let _ = tx.send(result);
                    }
                    None => debug!(request_id, "reply for unknown request"),
                }
            }
            Ok(Incoming::FileLoaded) => {
                if let Some(tx) = inflight.lock().await.loading.take() {
                    let _ = tx.send(Ok(()));
                }
            }
            Ok(Incoming::EndFile { reason, file_error }) => {
                if reason.as_deref() == Some("error") {
                    let loading = inflight.lock().await.loading.take();
                    if let Some(tx) = loading {
                        let detail = file_error.unwrap_or_else(|| "file could not be opened".into());
                        warn!(file_error = %detail, "player failed to load file");
                        let _ = tx.send(Err(PlayerError::Rejected(detail)));
                        continue;
                    }
                    warn!(
                        file_error = file_error.as_deref().unwrap_or("unknown"),
                        "player failed during playback"
                    );
                }
                info!(reason = reason.as_deref().unwrap_or("unknown"), "player reported end of file");
                if events.send(Event::PlaybackStopped).await.is_err() {
                    debug!("orchestrator queue closed; stopping player reader");
                    break;
                }
            }
            Ok(Incoming::Other) => {}
            Err(err) => warn!(%err, line = %line, "ignoring malformed player message"),
        }
    }

    let mut inflight = inflight.lock().await;
    inflight.closed = true;
    for (_, tx) in inflight.waiters.drain() {
        let _ = tx.send(Err(PlayerError::Disconnected));
    }
    if let Some(tx) = inflight.loading.take() {
        let _ = tx.send(Err(PlayerError::Disconnected));
    }
    drop(inflight);
    closed.cancel();
}

#[derive(Serialize)]
struct Request<'a> {
    command: &'a [Value],
    request_id: u64,
}

#[derive(Debug, Deserialize)]
struct Message {
    #[serde(default)]
    request_id: Option<u64>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    reason: Option<String>,
    #[serde(default)]
    file_error: Option<String>,
}

#[derive(Debug, PartialEq)]
enum Incoming {
    Reply {
        request_id: u64,
        result: Result<(), PlayerError>,
    },
    FileLoaded,
    EndFile {
        reason: Option<String>,
        file_error: Option<String>,
    },
    Other,
}

fn encode_request(request_id: u64, command: &[Value]) -> Result<String, PlayerError> {
    let mut line = serde_json::to_string(&Request {
        command,
        request_id,
    })
    .map_err(|err| PlayerError::Protocol(err.to_string()))?;
    line.push('\n');
    Ok(line)
}

fn parse_message(line: &str) -> Result<Incoming, PlayerError> {
    let msg: Message =
        serde_json::from_str(line).map_err(|err| PlayerError::Protocol(err.to_string()))?;

    if let Some(event) = msg.event {
        return Ok(match event.as_str() {
            "file-loaded" => Incoming::FileLoaded,
            "end-file" => Incoming::EndFile {
                reason: msg.reason,
                file_error: msg.file_error,
            },
            _ => Incoming::Other,
        });
    }

    match (msg.request_id, msg.error) {
        (Some(request_id), Some(error)) => {
            let result = if error == "success" {
                Ok(())
            } else {
                Err(PlayerError::Rejected(error))
            };
            Ok(Incoming::Reply { request_id, result })
        }
        _ => Err(PlayerError::Protocol(format!("unrecognised message: {line}"))),
    }
}
