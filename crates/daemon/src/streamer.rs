// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-viewer terminal streaming over WebSocket.
//!
//! Bootstraps a new viewer from the session's current visible state, then
//! tails incremental output for local (log-file) sessions or forwards a
//! live pane subscription for remote ones. The wire carries exactly three
//! server-to-client message kinds (`full`/`append`/`reconnect`) and three
//! client-to-server ones (`input`/`pause`/`resume`).

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path as AxumPath, State};
use axum::response::IntoResponse;
use axum::routing::get;
use axum::Router;
use futures_util::{SinkExt, StreamExt};
use schmux_core::session::SessionId;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::listener::ListenCtx;

/// Rough bytes-per-line used to convert the config's line-based
/// `seed_lines` into a byte offset for the initial seek; no field in the
/// persisted config names a byte budget directly (see DESIGN.md).
const ASSUMED_BYTES_PER_LINE: u64 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ServerMessage {
    Full { data: String },
    Append { data: String },
    Reconnect,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ClientMessage {
    Input { data: String },
    Pause,
    Resume,
}

pub fn router(ctx: Arc<ListenCtx>) -> Router {
    Router::new()
        .route("/viewer/terminal/:session_id", get(terminal_viewer))
        .route("/viewer/provisioning/:host_id", get(provisioning_viewer))
        .with_state(ctx)
}

async fn terminal_viewer(
    AxumPath(session_id): AxumPath<String>,
    State(ctx): State<Arc<ListenCtx>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_terminal_viewer(socket, ctx, SessionId::new(session_id)))
}

async fn handle_terminal_viewer(socket: WebSocket, ctx: Arc<ListenCtx>, session_id: SessionId) {
    let session = match ctx.state.snapshot().session(&session_id).cloned() {
        Some(s) => s,
        None => {
            let _ = close_with_reconnect(socket).await;
            return;
        }
    };

    if let (Some(host_id), Some(pane_id)) = (session.remote_host_id.clone(), session.remote_pane_id.clone()) {
        remote_viewer_loop(socket, &ctx, &host_id, &pane_id).await;
    } else {
        local_viewer_loop(socket, &ctx, &session_id, &session.log_path).await;
    }
}

async fn close_with_reconnect(mut socket: WebSocket) -> Result<(), axum::Error> {
    let msg = serde_json::to_string(&ServerMessage::Reconnect).unwrap_or_default();
    socket.send(Message::Text(msg)).await?;
    socket.close().await
}

/// Local path: seek to end-minus-seed_lines, send `full`, then poll mtime
/// and send `append` for whatever was written since.
async fn local_viewer_loop(mut socket: WebSocket, ctx: &ListenCtx, session_id: &SessionId, log_path: &Path) {
    let cfg = ctx.config.current();
    let seed_bytes = u64::from(cfg.terminal.seed_lines) * ASSUMED_BYTES_PER_LINE;
    let poll_interval = Duration::from_millis(cfg.xterm.mtime_poll_interval_ms);

    let mut file = match tokio::fs::File::open(log_path).await {
        Ok(f) => f,
        Err(_) => {
            let _ = close_with_reconnect(socket).await;
            return;
        }
    };

    let len = file.metadata().await.map(|m| m.len()).unwrap_or(0);
    let start = len.saturating_sub(seed_bytes);
    let tail = read_from(&mut file, start).await;
    let mut offset = start + tail.len() as u64;

    if send_full(&mut socket, &tail).await.is_err() {
        return;
    }

    if len > cfg.xterm.max_log_size_bytes() {
        if let Err(e) = ctx.sessions.rotate_log(&session_tmux_name(session_id), log_path).await {
            warn!(session = %session_id, error = %e, "rotation before viewer attach failed");
        }
        let _ = close_with_reconnect(socket).await;
        return;
    }

    let mut paused = false;
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(cmd) = serde_json::from_str::<ClientMessage>(&text) {
                            match cmd {
                                ClientMessage::Pause => paused = true,
                                ClientMessage::Resume => paused = false,
                                ClientMessage::Input { data } => {
                                    if let Err(e) = ctx.sessions.send_input(session_id, &data).await {
                                        warn!(session = %session_id, error = %e, "failed to forward input to local pane");
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(_)) => return,
                    _ => {}
                }
            }
            _ = tokio::time::sleep(poll_interval) => {
                if paused {
                    continue;
                }
                let current_len = match tokio::fs::metadata(log_path).await {
                    Ok(m) => m.len(),
                    Err(_) => { let _ = close_with_reconnect(socket).await; return; }
                };
                if current_len < offset {
                    // Shrink implies rotation or truncation; reattach from scratch.
                    let _ = close_with_reconnect(socket).await;
                    return;
                }
                if current_len > offset {
                    let chunk = read_from(&mut file, offset).await;
                    offset += chunk.len() as u64;
                    let stripped = ctx.sessions.scan_signals(session_id, &String::from_utf8_lossy(&chunk));
                    if send_append(&mut socket, stripped.as_bytes()).await.is_err() {
                        return;
                    }
                }
            }
        }
    }
}

/// Remote path: bootstrap via `capture-pane`, then forward the connection's
/// per-pane output subscription.
async fn remote_viewer_loop(mut socket: WebSocket, ctx: &ListenCtx, host_id: &schmux_core::remote::RemoteHostId, pane_id: &str) {
    let Some(handle) = ctx.remote.handle_by_host_id(host_id) else {
        let _ = close_with_reconnect(socket).await;
        return;
    };

    let bootstrap = handle.capture_pane(pane_id, ctx.config.current().terminal.bootstrap_lines).await.unwrap_or_default();
    if send_full(&mut socket, bootstrap.as_bytes()).await.is_err() {
        return;
    }

    let mut output = handle.subscribe_output(pane_id);
    let mut paused = false;
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(cmd) = serde_json::from_str::<ClientMessage>(&text) {
                            match cmd {
                                ClientMessage::Pause => paused = true,
                                ClientMessage::Resume => paused = false,
                                ClientMessage::Input { data } => {
                                    if let Err(e) = handle.send_keys(pane_id, data.as_bytes()).await {
                                        warn!(error = %e, "failed to forward input to remote pane");
                                    }
                                }
                            }
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(_)) => return,
                    _ => {}
                }
            }
            event = output.recv() => {
                match event {
                    Some(event) if !paused => {
                        if send_append(&mut socket, &event.bytes).await.is_err() {
                            return;
                        }
                    }
                    Some(_) => {}
                    None => {
                        let _ = close_with_reconnect(socket).await;
                        return;
                    }
                }
            }
        }
    }
}

async fn provisioning_viewer(
    AxumPath(host_id): AxumPath<String>,
    State(ctx): State<Arc<ListenCtx>>,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_provisioning_viewer(socket, ctx, schmux_core::remote::RemoteHostId::new(host_id)))
}

/// Raw PTY passthrough for authentication prompts during provisioning or
/// reconnection; no log tailing or signal scanning applies here.
async fn handle_provisioning_viewer(mut socket: WebSocket, ctx: Arc<ListenCtx>, host_id: schmux_core::remote::RemoteHostId) {
    let Some(handle) = ctx.remote.handle_by_host_id(&host_id) else {
        let _ = close_with_reconnect(socket).await;
        return;
    };
    let mut raw = handle.subscribe_raw();
    loop {
        tokio::select! {
            incoming = socket.recv() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        if let Ok(ClientMessage::Input { data }) = serde_json::from_str::<ClientMessage>(&text) {
                            let _ = handle.send_raw(data.into_bytes()).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return,
                    Some(Err(_)) => return,
                    _ => {}
                }
            }
            chunk = raw.recv() => {
                match chunk {
                    Ok(bytes) => {
                        if send_append(&mut socket, &bytes).await.is_err() {
                            return;
                        }
                    }
                    Err(_) => {
                        let _ = close_with_reconnect(socket).await;
                        return;
                    }
                }
            }
        }
    }
}

async fn send_full(socket: &mut WebSocket, data: &[u8]) -> Result<(), axum::Error> {
    let msg = ServerMessage::Full { data: String::from_utf8_lossy(data).into_owned() };
    socket.send(Message::Text(serde_json::to_string(&msg).unwrap_or_default())).await
}

async fn send_append(socket: &mut WebSocket, data: &[u8]) -> Result<(), axum::Error> {
    let msg = ServerMessage::Append { data: String::from_utf8_lossy(data).into_owned() };
    socket.send(Message::Text(serde_json::to_string(&msg).unwrap_or_default())).await
}

async fn read_from(file: &mut tokio::fs::File, offset: u64) -> Vec<u8> {
    use tokio::io::{AsyncReadExt, AsyncSeekExt};
    if file.seek(std::io::SeekFrom::Start(offset)).await.is_err() {
        return Vec::new();
    }
    let mut buf = Vec::new();
    let _ = file.read_to_end(&mut buf).await;
    buf
}

fn session_tmux_name(id: &SessionId) -> String {
    format!("schmux-{}", id.as_str())
}
