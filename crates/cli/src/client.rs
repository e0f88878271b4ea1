// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon client: connects to (and, if needed, starts) `schmuxd` over its
//! Unix socket and exposes one method per wire operation.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use schmux_daemon::protocol::{self, ProtocolError};
use schmux_daemon::{FlavorStatus, Query, Request, Response, WireError};
use schmux_core::remote::ConnectionStatus;
use schmux_core::session::Session;
use schmux_core::target::Target;
use schmux_core::workspace::Workspace;
use thiserror::Error;
use tokio::net::UnixStream;

use crate::daemon_process::{
    cleanup_stale_socket, daemon_socket, probe_socket, start_daemon_background,
};

fn parse_duration_ms(var: &str) -> Option<Duration> {
    std::env::var(var).ok().and_then(|s| s.parse::<u64>().ok()).map(Duration::from_millis)
}

pub fn timeout_ipc() -> Duration {
    parse_duration_ms("SCHMUX_TIMEOUT_IPC_MS").unwrap_or(Duration::from_secs(5))
}

pub fn timeout_connect() -> Duration {
    parse_duration_ms("SCHMUX_TIMEOUT_CONNECT_MS").unwrap_or(Duration::from_secs(5))
}

pub fn poll_interval() -> Duration {
    parse_duration_ms("SCHMUX_CONNECT_POLL_MS").unwrap_or(Duration::from_millis(50))
}

#[derive(Debug, Error)]
pub enum ClientError {
    #[error("daemon not running")]
    DaemonNotRunning,
    #[error("failed to start daemon: {0}")]
    DaemonStartFailed(String),
    #[error("timed out waiting for daemon to start")]
    DaemonStartTimeout,
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),
    #[error("request rejected: {0:?}")]
    Rejected(WireError),
    #[error("unexpected response from daemon")]
    UnexpectedResponse,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not determine state directory")]
    NoStateDir,
}

pub struct DaemonClient {
    socket_path: PathBuf,
}

impl DaemonClient {
    /// Connect to an already-running daemon; fails if there isn't one.
    pub fn connect() -> Result<Self, ClientError> {
        let socket_path = daemon_socket()?;
        if !socket_path.exists() {
            return Err(ClientError::DaemonNotRunning);
        }
        Ok(Self { socket_path })
    }

    /// Connect, starting the daemon in the background if it isn't running.
    pub fn connect_or_start() -> Result<Self, ClientError> {
        match Self::connect() {
            Ok(client) => {
                if probe_socket(&client.socket_path) {
                    Ok(client)
                } else {
                    cleanup_stale_socket()?;
                    let child = start_daemon_background()?;
                    Self::connect_with_retry(timeout_connect(), child)
                }
            }
            Err(ClientError::DaemonNotRunning) => {
                let child = start_daemon_background()?;
                Self::connect_with_retry(timeout_connect(), child)
            }
            Err(e) => Err(e),
        }
    }

    fn connect_with_retry(timeout: Duration, mut child: std::process::Child) -> Result<Self, ClientError> {
        let start = Instant::now();
        while start.elapsed() < timeout {
            if let Ok(Some(status)) = child.try_wait() {
                return Err(ClientError::DaemonStartFailed(format!("exited with {status}")));
            }
            match Self::connect() {
                Ok(client) => return Ok(client),
                Err(ClientError::DaemonNotRunning) => std::thread::sleep(poll_interval()),
                Err(e) => return Err(e),
            }
        }
        Err(ClientError::DaemonStartTimeout)
    }

    async fn send_with_timeout(&self, request: &Request, timeout: Duration) -> Result<Response, ClientError> {
        let stream = UnixStream::connect(&self.socket_path).await?;
        let (mut reader, mut writer) = stream.into_split();

        let data = protocol::protocol_wire::encode(request)?;
        tokio::time::timeout(timeout, protocol::protocol_wire::write_message(&mut writer, &data))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        let response_bytes = tokio::time::timeout(timeout, protocol::protocol_wire::read_message(&mut reader))
            .await
            .map_err(|_| ProtocolError::Timeout)??;

        Ok(protocol::protocol_wire::decode(&response_bytes)?)
    }

    pub async fn send(&self, request: &Request) -> Result<Response, ClientError> {
        self.send_with_timeout(request, timeout_ipc()).await
    }

    fn reject<T>(resp: Response) -> Result<T, ClientError> {
        match resp {
            Response::Error { error } => Err(ClientError::Rejected(error)),
            _ => Err(ClientError::UnexpectedResponse),
        }
    }

    async fn send_ok(&self, request: &Request) -> Result<(), ClientError> {
        match self.send(request).await? {
            Response::Ok => Ok(()),
            other => Self::reject(other),
        }
    }

    pub async fn workspace_create(&self, repo_url: &str, branch: &str) -> Result<Workspace, ClientError> {
        let req = Request::WorkspaceCreate { repo_url: repo_url.to_string(), branch: branch.to_string() };
        match self.send(&req).await? {
            Response::Workspace { workspace } => Ok(*workspace),
            other => Self::reject(other),
        }
    }

    pub async fn workspace_dispose(&self, id: &str) -> Result<(), ClientError> {
        self.send_ok(&Request::WorkspaceDispose { id: id.to_string() }).await
    }

    pub async fn workspace_dispose_all(&self, id: &str) -> Result<(), ClientError> {
        self.send_ok(&Request::WorkspaceDisposeAll { id: id.to_string() }).await
    }

    pub async fn workspace_check_branch_conflict(&self, repo_url: &str, branch: &str) -> Result<(bool, Option<String>), ClientError> {
        let req = Request::WorkspaceCheckBranchConflict { repo_url: repo_url.to_string(), branch: branch.to_string() };
        match self.send(&req).await? {
            Response::BranchConflict { conflict, existing_workspace_id } => Ok((conflict, existing_workspace_id)),
            other => Self::reject(other),
        }
    }

    pub async fn workspace_refresh_overlay(&self, id: &str) -> Result<(), ClientError> {
        self.send_ok(&Request::WorkspaceRefreshOverlay { id: id.to_string() }).await
    }

    pub async fn workspace_update_git_status(&self, id: &str) -> Result<(), ClientError> {
        self.send_ok(&Request::WorkspaceUpdateGitStatus { id: id.to_string() }).await
    }

    pub async fn workspace_update_all_git_status(&self) -> Result<(), ClientError> {
        self.send_ok(&Request::WorkspaceUpdateAllGitStatus).await
    }

    pub async fn workspace_scan(&self) -> Result<(Vec<String>, Vec<String>, Vec<String>), ClientError> {
        match self.send(&Request::WorkspaceScan).await? {
            Response::ScanReport { added, updated, removed } => Ok((added, updated, removed)),
            other => Self::reject(other),
        }
    }

    pub async fn list_workspaces(&self) -> Result<Vec<Workspace>, ClientError> {
        match self.send(&Request::Query { query: Query::ListWorkspaces }).await? {
            Response::Workspaces { workspaces } => Ok(workspaces),
            other => Self::reject(other),
        }
    }

    pub async fn session_spawn(&self, workspace_id: &str, target: Target, prompt: Option<String>) -> Result<(Session, String), ClientError> {
        let req = Request::SessionSpawn { workspace_id: workspace_id.to_string(), target, prompt };
        match self.send(&req).await? {
            Response::Session { session, bootstrap } => Ok((*session, bootstrap)),
            other => Self::reject(other),
        }
    }

    #[allow(clippy::too_many_arguments)]
    pub async fn session_spawn_remote(
        &self,
        flavor_id: &str,
        workspace_id: &str,
        window_name: &str,
        workdir: &str,
        command: &str,
    ) -> Result<(Session, String), ClientError> {
        let req = Request::SessionSpawnRemote {
            flavor_id: flavor_id.to_string(),
            workspace_id: workspace_id.to_string(),
            window_name: window_name.to_string(),
            workdir: workdir.to_string(),
            command: command.to_string(),
        };
        match self.send(&req).await? {
            Response::Session { session, bootstrap } => Ok((*session, bootstrap)),
            other => Self::reject(other),
        }
    }

    pub async fn session_dispose(&self, id: &str) -> Result<(), ClientError> {
        self.send_ok(&Request::SessionDispose { id: id.to_string() }).await
    }

    pub async fn session_rename(&self, id: &str, nickname: &str) -> Result<(), ClientError> {
        self.send_ok(&Request::SessionRename { id: id.to_string(), nickname: nickname.to_string() }).await
    }

    pub async fn list_sessions(&self) -> Result<Vec<Session>, ClientError> {
        match self.send(&Request::Query { query: Query::ListSessions }).await? {
            Response::Sessions { sessions } => Ok(sessions),
            other => Self::reject(other),
        }
    }

    pub async fn remote_connect(&self, flavor_id: &str) -> Result<(String, ConnectionStatus), ClientError> {
        match self.send(&Request::RemoteConnect { flavor_id: flavor_id.to_string() }).await? {
            Response::RemoteHost { host_id, status } => Ok((host_id, status)),
            other => Self::reject(other),
        }
    }

    pub async fn remote_reconnect(&self, host_id: &str) -> Result<(String, ConnectionStatus), ClientError> {
        match self.send(&Request::RemoteReconnect { host_id: host_id.to_string() }).await? {
            Response::RemoteHost { host_id, status } => Ok((host_id, status)),
            other => Self::reject(other),
        }
    }

    pub async fn remote_disconnect(&self, host_id: &str) -> Result<(), ClientError> {
        self.send_ok(&Request::RemoteDisconnect { host_id: host_id.to_string() }).await
    }

    pub async fn flavor_statuses(&self) -> Result<Vec<FlavorStatus>, ClientError> {
        match self.send(&Request::Query { query: Query::FlavorStatuses }).await? {
            Response::FlavorStatuses { statuses } => Ok(statuses),
            other => Self::reject(other),
        }
    }
}
