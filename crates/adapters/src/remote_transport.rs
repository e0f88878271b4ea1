// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY-backed transport for a remote connection's `tmux -CC` control-mode
//! session. Spawns the flavor's connect command through a real PTY (for
//! interactive auth prompts) and bridges the control-mode wire protocol
//! over it via [`ControlModeClient`].

use crate::control_mode::ControlModeClient;
use portable_pty::{native_pty_system, CommandBuilder, PtySize};
use regex::Regex;
use std::io::{Read, Write};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{broadcast, mpsc};

#[derive(Debug, Error)]
pub enum RemoteTransportError {
    #[error("failed to spawn connect command: {0}")]
    SpawnFailed(String),
    #[error("transport is closed")]
    Closed,
}

const RAW_BROADCAST_CAPACITY: usize = 1024;
const PTY_WRITE_CHANNEL_CAPACITY: usize = 64;
const PTY_READ_CHANNEL_CAPACITY: usize = 256;

/// One spawned connect-command process, bridged into a [`ControlModeClient`].
///
/// The PTY's raw output is also broadcast unmodified so a "provisioning
/// viewer" can display auth prompts alongside the parsed control-mode
/// stream.
pub struct RemoteTransport {
    control: Arc<ControlModeClient>,
    raw_output: broadcast::Sender<Vec<u8>>,
    raw_input: mpsc::Sender<Vec<u8>>,
    child: std::sync::Mutex<Box<dyn portable_pty::Child + Send + Sync>>,
}

impl RemoteTransport {
    /// Spawns `connect_command` (already template-substituted by the
    /// caller) inside a PTY of size `cols`x`rows` and starts the bridging
    /// tasks. The command runs through the user's shell so it may contain
    /// pipes or quoting.
    pub fn spawn(connect_command: &str, cols: u16, rows: u16) -> Result<Self, RemoteTransportError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| RemoteTransportError::SpawnFailed(e.to_string()))?;

        let shell = std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string());
        let mut cmd = CommandBuilder::new(shell);
        cmd.arg("-c");
        cmd.arg(connect_command);

        let child = pair
            .slave
            .spawn_command(cmd)
            .map_err(|e| RemoteTransportError::SpawnFailed(e.to_string()))?;
        drop(pair.slave);

        let mut pty_reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| RemoteTransportError::SpawnFailed(e.to_string()))?;
        let mut pty_writer = pair
            .master
            .take_writer()
            .map_err(|e| RemoteTransportError::SpawnFailed(e.to_string()))?;

        let (raw_output_tx, _) = broadcast::channel(RAW_BROADCAST_CAPACITY);
        let (to_control_tx, to_control_rx) = mpsc::channel::<Vec<u8>>(PTY_READ_CHANNEL_CAPACITY);
        let (raw_in_tx, mut raw_in_rx) = mpsc::channel::<Vec<u8>>(PTY_WRITE_CHANNEL_CAPACITY);

        // Blocking PTY reader thread: fans bytes out to the raw broadcast
        // channel and into the control-mode client's read half.
        let raw_output_tx_reader = raw_output_tx.clone();
        std::thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match pty_reader.read(&mut buf) {
                    Ok(0) => break,
                    Ok(n) => {
                        let chunk = buf[..n].to_vec();
                        let _ = raw_output_tx_reader.send(chunk.clone());
                        if to_control_tx.blocking_send(chunk).is_err() {
                            break;
                        }
                    }
                    Err(_) => break,
                }
            }
        });

        // Blocking PTY writer thread: accepts bytes from both control-mode
        // commands and raw auth input, both destined for the PTY's stdin.
        std::thread::spawn(move || {
            while let Some(data) = raw_in_rx.blocking_recv() {
                if pty_writer.write_all(&data).is_err() {
                    break;
                }
                let _ = pty_writer.flush();
            }
        });

        let control = Arc::new(ControlModeClient::new(
            ChannelReader::new(to_control_rx),
            ChannelWriter::new(raw_in_tx.clone()),
        ));

        Ok(Self {
            control,
            raw_output: raw_output_tx,
            raw_input: raw_in_tx,
            child: std::sync::Mutex::new(child),
        })
    }

    pub fn control(&self) -> Arc<ControlModeClient> {
        self.control.clone()
    }

    pub fn subscribe_raw(&self) -> broadcast::Receiver<Vec<u8>> {
        self.raw_output.subscribe()
    }

    /// Sends raw bytes (e.g. auth keystrokes) directly into the PTY,
    /// bypassing the control-mode command framing.
    pub async fn send_raw(&self, bytes: Vec<u8>) -> Result<(), RemoteTransportError> {
        self.raw_input.send(bytes).await.map_err(|_| RemoteTransportError::Closed)
    }

    /// True while the connect-command process is still running.
    pub fn is_alive(&self) -> bool {
        self.child
            .lock()
            .ok()
            .map(|mut c| matches!(c.try_wait(), Ok(None)))
            .unwrap_or(false)
    }

    pub fn kill(&self) {
        if let Ok(mut child) = self.child.lock() {
            let _ = child.kill();
        }
    }
}

/// Adapts a byte-chunk `mpsc::Receiver` into `tokio::io::AsyncRead`,
/// buffering the remainder of a chunk that didn't fit the caller's slice.
struct ChannelReader {
    rx: mpsc::Receiver<Vec<u8>>,
    pending: Vec<u8>,
    pending_offset: usize,
}

impl ChannelReader {
    fn new(rx: mpsc::Receiver<Vec<u8>>) -> Self {
        Self {
            rx,
            pending: Vec::new(),
            pending_offset: 0,
        }
    }
}

impl tokio::io::AsyncRead for ChannelReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut tokio::io::ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        if self.pending_offset >= self.pending.len() {
            match self.rx.poll_recv(cx) {
                Poll::Ready(Some(chunk)) => {
                    self.pending = chunk;
                    self.pending_offset = 0;
                }
                Poll::Ready(None) => return Poll::Ready(Ok(())),
                Poll::Pending => return Poll::Pending,
            }
        }
        let remaining = &self.pending[self.pending_offset..];
        let n = remaining.len().min(buf.remaining());
        buf.put_slice(&remaining[..n]);
        self.pending_offset += n;
        Poll::Ready(Ok(()))
    }
}

/// Adapts an `mpsc::Sender<Vec<u8>>` into `tokio::io::AsyncWrite`.
struct ChannelWriter {
    tx: mpsc::Sender<Vec<u8>>,
}

impl ChannelWriter {
    fn new(tx: mpsc::Sender<Vec<u8>>) -> Self {
        Self { tx }
    }
}

impl tokio::io::AsyncWrite for ChannelWriter {
    fn poll_write(self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<std::io::Result<usize>> {
        match self.tx.try_send(buf.to_vec()) {
            Ok(()) => Poll::Ready(Ok(buf.len())),
            Err(mpsc::error::TrySendError::Full(_)) => {
                // Backing channel is bounded and drained by the PTY writer
                // thread; reschedule immediately rather than block the
                // control-mode client's single writer mutex.
                cx.waker().wake_by_ref();
                Poll::Pending
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                Poll::Ready(Err(std::io::Error::new(std::io::ErrorKind::BrokenPipe, "transport closed")))
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

/// Scrapes PTY output for a hostname using the flavor's configured regex
/// (or a default that matches a typical ControlMaster banner).
pub fn extract_hostname(raw: &str, pattern: Option<&str>) -> Option<String> {
    let default_pattern = r"(?:Welcome to|Connected to)\s+([A-Za-z0-9._-]+)";
    let re = Regex::new(pattern.unwrap_or(default_pattern)).ok()?;
    re.captures(raw).and_then(|c| c.get(1)).map(|m| m.as_str().to_string())
}

/// Scrapes PTY output for a session UUID, e.g. one a remote dev-server
/// banner prints alongside its hostname. No config knob names a pattern for
/// this one, so a bare UUID-v4-shaped match is taken wherever it appears.
pub fn extract_session_uuid(raw: &str) -> Option<String> {
    let re = Regex::new(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}").ok()?;
    re.find(raw).map(|m| m.as_str().to_string())
}

#[cfg(test)]
#[path = "remote_transport_tests.rs"]
mod tests;
