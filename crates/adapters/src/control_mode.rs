// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Client for tmux's `-CC` control-mode wire protocol: a `%`-framed text
//! protocol carried over a child process's stdin/stdout.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use thiserror::Error;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::sync::{broadcast, mpsc, oneshot};

#[derive(Debug, Error)]
pub enum ControlModeError {
    #[error("control-mode command {cmd:?} failed: {detail}")]
    CommandFailed { cmd: String, detail: String },
    #[error("control-mode connection closed")]
    Closed,
    #[error("control-mode command timed out")]
    Timeout,
    #[error("control-mode internal error: {0}")]
    Internal(String),
}

/// An async `%output <paneId> <bytes>` notification, already octal-decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputEvent {
    pub pane_id: String,
    pub bytes: Vec<u8>,
}

/// Non-output, non-response `%…` lines (window-add, session-changed, …).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WireEvent {
    WindowAdd { window_id: String },
    WindowClose { window_id: String },
    SessionChanged { session_name: String },
    PaneModeChanged { pane_id: String },
    Unknown(String),
}

/// Decode tmux's `\NNN` octal-escape encoding into raw bytes.
pub fn decode_octal(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() && bytes[i + 1..i + 4].iter().all(|b| (b'0'..=b'7').contains(b)) {
            let value = (bytes[i + 1] - b'0') * 64 + (bytes[i + 2] - b'0') * 8 + (bytes[i + 3] - b'0');
            out.push(value);
            i += 4;
        } else {
            out.push(bytes[i]);
            i += 1;
        }
    }
    out
}

/// Inverse of [`decode_octal`]: escapes control bytes, backslash, and space.
pub fn encode_octal(bytes: &[u8]) -> String {
    let mut out = String::with_capacity(bytes.len());
    for &b in bytes {
        if b < 32 || b == b'\\' || b == 32 {
            out.push_str(&format!("\\{:03o}", b));
        } else {
            out.push(b as char);
        }
    }
    out
}

#[derive(Debug, PartialEq, Eq)]
enum Frame {
    Begin { cmd_id: u64 },
    Payload(String),
    End { cmd_id: u64 },
    Error { cmd_id: u64 },
    Output { pane_id: String, bytes: Vec<u8> },
    Event(WireEvent),
}

/// Parse a single line of control-mode output.
fn parse_line(line: &str) -> Frame {
    if let Some(rest) = line.strip_prefix("%begin ") {
        return Frame::Begin {
            cmd_id: extract_cmd_id(rest),
        };
    }
    if let Some(rest) = line.strip_prefix("%end ") {
        return Frame::End {
            cmd_id: extract_cmd_id(rest),
        };
    }
    if let Some(rest) = line.strip_prefix("%error ") {
        return Frame::Error {
            cmd_id: extract_cmd_id(rest),
        };
    }
    if let Some(rest) = line.strip_prefix("%output ") {
        let mut parts = rest.splitn(2, ' ');
        let pane_id = parts.next().unwrap_or_default().to_string();
        let encoded = parts.next().unwrap_or_default();
        return Frame::Output {
            pane_id,
            bytes: decode_octal(encoded),
        };
    }
    if let Some(rest) = line.strip_prefix("%window-add ") {
        return Frame::Event(WireEvent::WindowAdd {
            window_id: rest.trim().to_string(),
        });
    }
    if let Some(rest) = line.strip_prefix("%window-close ") {
        return Frame::Event(WireEvent::WindowClose {
            window_id: rest.trim().to_string(),
        });
    }
    if let Some(rest) = line.strip_prefix("%session-changed ") {
        return Frame::Event(WireEvent::SessionChanged {
            session_name: rest.trim().to_string(),
        });
    }
    if let Some(rest) = line.strip_prefix("%pane-mode-changed ") {
        return Frame::Event(WireEvent::PaneModeChanged {
            pane_id: rest.trim().to_string(),
        });
    }
    if line.starts_with('%') {
        return Frame::Event(WireEvent::Unknown(line.to_string()));
    }
    Frame::Payload(line.to_string())
}

/// `%begin <ts> <cmdId> <flags>` — the cmd id is the second token.
fn extract_cmd_id(rest: &str) -> u64 {
    rest.split_whitespace().nth(1).and_then(|s| s.parse().ok()).unwrap_or(0)
}

type Waiter = oneshot::Sender<Result<Vec<String>, String>>;

const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;

struct SubscriberRegistry {
    by_pane: HashMap<String, Vec<mpsc::Sender<OutputEvent>>>,
}

/// Concurrency-safe client for one `tmux -CC` transport.
///
/// Writes are serialized by `writer`; command ids are assigned monotonically
/// and responses are delivered to the FIFO waiter registered under that id by
/// the reader task. Output fan-out uses a copy-on-write snapshot of the
/// subscriber list so a slow subscriber never blocks the parser: when a
/// subscriber's bounded channel is full the parser drops that subscriber
/// entirely (disconnect-with-reconnect), relying on the caller to treat a
/// closed receiver as "reconnect".
pub struct ControlModeClient {
    writer: Arc<tokio::sync::Mutex<Box<dyn AsyncWrite + Unpin + Send>>>,
    next_cmd_id: AtomicU64,
    waiters: Arc<Mutex<HashMap<u64, Waiter>>>,
    subscribers: Arc<Mutex<SubscriberRegistry>>,
    events: broadcast::Sender<WireEvent>,
    reader_task: tokio::task::JoinHandle<()>,
}

impl ControlModeClient {
    /// Takes ownership of an already-spawned transport's stdin/stdout.
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: tokio::io::AsyncRead + Unpin + Send + 'static,
        W: AsyncWrite + Unpin + Send + 'static,
    {
        let waiters: Arc<Mutex<HashMap<u64, Waiter>>> = Arc::new(Mutex::new(HashMap::new()));
        let subscribers = Arc::new(Mutex::new(SubscriberRegistry { by_pane: HashMap::new() }));
        let (events_tx, _events_rx) = broadcast::channel(256);

        let reader_task = tokio::spawn(read_loop(
            BufReader::new(reader),
            waiters.clone(),
            subscribers.clone(),
            events_tx.clone(),
        ));

        Self {
            writer: Arc::new(tokio::sync::Mutex::new(Box::new(writer))),
            next_cmd_id: AtomicU64::new(1),
            waiters,
            subscribers,
            events: events_tx,
            reader_task,
        }
    }

    /// Send a command and await its `%end`/`%error` response.
    pub async fn execute(&self, cmd: &str) -> Result<Vec<String>, ControlModeError> {
        let cmd_id = self.next_cmd_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.waiters.lock().insert(cmd_id, tx);

        {
            let mut writer = self.writer.lock().await;
            if writer.write_all(cmd.as_bytes()).await.is_err() || writer.write_all(b"\n").await.is_err() {
                self.waiters.lock().remove(&cmd_id);
                return Err(ControlModeError::Closed);
            }
            if writer.flush().await.is_err() {
                self.waiters.lock().remove(&cmd_id);
                return Err(ControlModeError::Closed);
            }
        }

        match rx.await {
            Ok(Ok(payload)) => Ok(payload),
            Ok(Err(detail)) => Err(ControlModeError::CommandFailed {
                cmd: cmd.to_string(),
                detail,
            }),
            Err(_) => Err(ControlModeError::Closed),
        }
    }

    /// `new-window -n <name> -c <workdir> -P -F '#{window_id} #{pane_id}' <command>`.
    pub async fn create_window(&self, name: &str, workdir: &str, command: &str) -> Result<(String, String), ControlModeError> {
        let cmd = format!(
            "new-window -n {name} -c {workdir} -P -F '#{{window_id}} #{{pane_id}}' {command}",
        );
        let lines = self.execute(&cmd).await?;
        let first = lines.first().ok_or_else(|| ControlModeError::Internal("new-window returned no payload".into()))?;
        let mut parts = first.split_whitespace();
        let window_id = parts
            .next()
            .ok_or_else(|| ControlModeError::Internal("missing window id".into()))?
            .to_string();
        let pane_id = parts
            .next()
            .ok_or_else(|| ControlModeError::Internal("missing pane id".into()))?
            .to_string();
        Ok((window_id, pane_id))
    }

    pub async fn kill_window(&self, window_id: &str) -> Result<(), ControlModeError> {
        self.execute(&format!("kill-window -t {window_id}")).await?;
        Ok(())
    }

    /// `send-keys -l -t <paneId> -- <text>` (literal mode).
    pub async fn send_keys(&self, pane_id: &str, bytes: &[u8]) -> Result<(), ControlModeError> {
        let text = String::from_utf8_lossy(bytes);
        self.execute(&format!("send-keys -l -t {pane_id} -- {text}")).await?;
        Ok(())
    }

    pub async fn capture_pane(&self, pane_id: &str, lines: u32) -> Result<String, ControlModeError> {
        let payload = self
            .execute(&format!("capture-pane -e -p -t {pane_id} -S -{lines}"))
            .await?;
        Ok(payload.join("\n"))
    }

    /// Subscribes to `%output` notifications for `pane_id`. Returns a bounded
    /// receiver; dropping it (or letting the parser fill it) unsubscribes.
    pub fn subscribe_output(&self, pane_id: &str) -> mpsc::Receiver<OutputEvent> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        self.subscribers
            .lock()
            .by_pane
            .entry(pane_id.to_string())
            .or_default()
            .push(tx);
        rx
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WireEvent> {
        self.events.subscribe()
    }

    /// Creates a hidden window, round-trips a sentinel-delimited command
    /// through `send-keys`, polls `capture-pane` until the end sentinel
    /// appears, then tears the window down unconditionally.
    pub async fn run_command(&self, workdir: &str, command: &str) -> Result<String, ControlModeError> {
        let token = format!("{:x}", rand::random::<u64>());
        let begin = format!("SCHMUX-BEGIN-{token}");
        let end = format!("SCHMUX-END-{token}");
        let (window_id, pane_id) = self
            .create_window("schmux-runcmd", workdir, &format!("{} -d", default_shell()))
            .await?;

        let result = self.run_command_body(&pane_id, workdir, command, &begin, &end).await;
        let _ = self.kill_window(&window_id).await;
        result
    }

    async fn run_command_body(
        &self,
        pane_id: &str,
        workdir: &str,
        command: &str,
        begin: &str,
        end: &str,
    ) -> Result<String, ControlModeError> {
        let keystrokes = format!("echo {begin}; cd {workdir} && {command}; echo {end}");
        self.send_keys(pane_id, keystrokes.as_bytes()).await?;
        self.send_keys(pane_id, b"\r").await?;

        loop {
            let captured = self.capture_pane(pane_id, 2000).await?;
            if let Some(end_idx) = captured.lines().position(|l| l.trim() == end) {
                let begin_idx = captured.lines().position(|l| l.trim() == begin);
                let body: Vec<&str> = captured
                    .lines()
                    .skip(begin_idx.map(|i| i + 1).unwrap_or(0))
                    .take(end_idx.saturating_sub(begin_idx.map(|i| i + 1).unwrap_or(0)))
                    .collect();
                return Ok(body.join("\n"));
            }
            tokio::time::sleep(std::time::Duration::from_millis(200)).await;
        }
    }
}

impl Drop for ControlModeClient {
    fn drop(&mut self) {
        self.reader_task.abort();
    }
}

fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

async fn read_loop<R: tokio::io::AsyncRead + Unpin>(
    mut reader: BufReader<R>,
    waiters: Arc<Mutex<HashMap<u64, Waiter>>>,
    subscribers: Arc<Mutex<SubscriberRegistry>>,
    events: broadcast::Sender<WireEvent>,
) {
    let mut line = String::new();
    let mut pending_payload: Vec<String> = Vec::new();

    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => break,
            Ok(_) => {}
            Err(_) => break,
        }
        let trimmed = line.trim_end_matches(['\n', '\r']);
        match parse_line(trimmed) {
            Frame::Begin { .. } => pending_payload.clear(),
            Frame::Payload(p) => pending_payload.push(p),
            Frame::End { cmd_id } => {
                if let Some(tx) = waiters.lock().remove(&cmd_id) {
                    let _ = tx.send(Ok(std::mem::take(&mut pending_payload)));
                } else {
                    pending_payload.clear();
                }
            }
            Frame::Error { cmd_id } => {
                if let Some(tx) = waiters.lock().remove(&cmd_id) {
                    let _ = tx.send(Err(pending_payload.join("\n")));
                }
                pending_payload.clear();
            }
            Frame::Output { pane_id, bytes } => {
                dispatch_output(&subscribers, &pane_id, bytes);
            }
            Frame::Event(evt) => {
                let _ = events.send(evt);
            }
        }
    }
}

fn dispatch_output(subscribers: &Arc<Mutex<SubscriberRegistry>>, pane_id: &str, bytes: Vec<u8>) {
    // try_send never blocks, so this can safely run while holding the
    // registry lock: no subscriber addition is lost to a snapshot race.
    let mut registry = subscribers.lock();
    let Some(list) = registry.by_pane.get_mut(pane_id) else {
        return;
    };
    list.retain(|tx| {
        let event = OutputEvent {
            pane_id: pane_id.to_string(),
            bytes: bytes.clone(),
        };
        match tx.try_send(event) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(pane_id, "subscriber channel full, dropping subscriber");
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    });
}

#[cfg(test)]
#[path = "control_mode_tests.rs"]
mod tests;
