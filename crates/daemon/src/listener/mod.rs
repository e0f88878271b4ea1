// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Listener task: accepts Unix-socket connections and handles one
//! request/response pair per connection without blocking other clients.

mod remote;
mod session;
mod workspace;

use std::sync::Arc;

use thiserror::Error;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::Notify;
use tracing::{debug, error, warn};

use crate::lifecycle::Daemon;
use crate::protocol::{self, ProtocolError, Request, Response, Query};
use schmux_engine::{RemoteManager, SessionEngine, WorkspaceEngine};
use schmux_storage::{ConfigStore, StateStore};

/// Shared daemon context every request handler sees.
pub struct ListenCtx {
    pub config: Arc<ConfigStore>,
    pub state: Arc<StateStore>,
    pub workspaces: Arc<WorkspaceEngine>,
    pub sessions: Arc<SessionEngine>,
    pub remote: Arc<RemoteManager>,
    pub shutdown: Arc<Notify>,
}

impl ListenCtx {
    pub fn from_daemon(daemon: &Daemon, shutdown: Arc<Notify>) -> Self {
        Self {
            config: daemon.config.clone(),
            state: daemon.state.clone(),
            workspaces: daemon.workspaces.clone(),
            sessions: daemon.sessions.clone(),
            remote: daemon.remote.clone(),
            shutdown,
        }
    }
}

#[derive(Debug, Error)]
enum ConnectionError {
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
}

pub struct Listener {
    socket: UnixListener,
    ctx: Arc<ListenCtx>,
}

impl Listener {
    pub fn new(socket: UnixListener, ctx: Arc<ListenCtx>) -> Self {
        Self { socket, ctx }
    }

    pub async fn run(self) {
        loop {
            match self.socket.accept().await {
                Ok((stream, _)) => {
                    let ctx = Arc::clone(&self.ctx);
                    tokio::spawn(async move {
                        if let Err(e) = handle_connection(stream, &ctx).await {
                            match e {
                                ConnectionError::Protocol(ProtocolError::ConnectionClosed) => debug!("client disconnected"),
                                ConnectionError::Protocol(ProtocolError::Timeout) => warn!("connection timed out"),
                                other => error!(error = %other, "connection error"),
                            }
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept error"),
            }
        }
    }
}

async fn handle_connection(stream: UnixStream, ctx: &ListenCtx) -> Result<(), ConnectionError> {
    let (mut reader, mut writer) = stream.into_split();
    let request = protocol::protocol_wire::read_request(&mut reader, protocol::protocol_wire::DEFAULT_TIMEOUT).await?;

    if matches!(request, Request::Query { .. }) {
        debug!(?request, "received query");
    } else {
        tracing::info!(?request, "received request");
    }

    let response = dispatch(request, ctx).await;
    debug!(?response, "sending response");
    protocol::protocol_wire::write_response(&mut writer, &response, protocol::protocol_wire::DEFAULT_TIMEOUT).await?;
    Ok(())
}

async fn dispatch(request: Request, ctx: &ListenCtx) -> Response {
    match request {
        Request::WorkspaceCreate { repo_url, branch } => workspace::create(ctx, repo_url, branch).await,
        Request::WorkspaceDispose { id } => workspace::dispose(ctx, id).await,
        Request::WorkspaceDisposeAll { id } => workspace::dispose_all(ctx, id).await,
        Request::WorkspaceCheckBranchConflict { repo_url, branch } => workspace::check_branch_conflict(ctx, repo_url, branch).await,
        Request::WorkspaceRefreshOverlay { id } => workspace::refresh_overlay(ctx, id).await,
        Request::WorkspaceUpdateGitStatus { id } => workspace::update_git_status(ctx, id).await,
        Request::WorkspaceUpdateAllGitStatus => workspace::update_all_git_status(ctx).await,
        Request::WorkspaceScan => workspace::scan(ctx).await,

        Request::SessionSpawn { workspace_id, target, prompt } => session::spawn(ctx, workspace_id, target, prompt).await,
        Request::SessionSpawnRemote { flavor_id, workspace_id, window_name, workdir, command } => {
            session::spawn_remote(ctx, flavor_id, workspace_id, window_name, workdir, command).await
        }
        Request::SessionDispose { id } => session::dispose(ctx, id).await,
        Request::SessionRename { id, nickname } => session::rename(ctx, id, nickname).await,

        Request::RemoteConnect { flavor_id } => remote::connect(ctx, flavor_id).await,
        Request::RemoteReconnect { host_id } => remote::reconnect(ctx, host_id).await,
        Request::RemoteDisconnect { host_id } => remote::disconnect(ctx, host_id).await,

        Request::Query { query } => match query {
            Query::ListWorkspaces => workspace::list(ctx),
            Query::ListSessions => session::list(ctx),
            Query::FlavorStatuses => remote::flavor_statuses(ctx),
        },
    }
}
