// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Request/Query/Response shapes carried over the wire defined in
//! [`crate::protocol_wire`]. One [`Request`] in, one [`Response`] out, per
//! connection.

use schmux_core::error::CoreError;
use schmux_core::remote::ConnectionStatus;
use schmux_core::session::Session;
use schmux_core::target::Target;
use schmux_core::workspace::Workspace;
use serde::{Deserialize, Serialize};

pub use crate::protocol_wire::{self, ProtocolError};

/// Wire encoding of [`CoreError`]: carries the structured fields a caller
/// needs to branch on (e.g. `existing_workspace_id`) rather than just a
/// rendered message.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum WireError {
    NotFound { message: String },
    BranchConflict { existing_workspace_id: String },
    Dirty { reason: String },
    HasSessions { ids: Vec<String> },
    NicknameTaken { nickname: String },
    GitFailure { op: String, stderr: String },
    TmuxFailure { op: String },
    ControlModeError { cmd: String, detail: String },
    HostProvisioning,
    HostDisconnected,
    HostExpired,
    Timeout { op: String },
    Internal { message: String },
}

impl From<&CoreError> for WireError {
    fn from(err: &CoreError) -> Self {
        match err {
            CoreError::NotFound(message) => WireError::NotFound { message: message.clone() },
            CoreError::BranchConflict { existing_workspace_id } => {
                WireError::BranchConflict { existing_workspace_id: existing_workspace_id.clone() }
            }
            CoreError::Dirty { reason } => WireError::Dirty { reason: reason.to_string() },
            CoreError::HasSessions { ids } => WireError::HasSessions { ids: ids.clone() },
            CoreError::NicknameTaken(nickname) => WireError::NicknameTaken { nickname: nickname.clone() },
            CoreError::GitFailure { op, stderr } => WireError::GitFailure { op: op.clone(), stderr: stderr.clone() },
            CoreError::TmuxFailure { op } => WireError::TmuxFailure { op: op.clone() },
            CoreError::ControlModeError { cmd, detail } => {
                WireError::ControlModeError { cmd: cmd.clone(), detail: detail.clone() }
            }
            CoreError::HostProvisioning => WireError::HostProvisioning,
            CoreError::HostDisconnected => WireError::HostDisconnected,
            CoreError::HostExpired => WireError::HostExpired,
            CoreError::Timeout { op } => WireError::Timeout { op: op.clone() },
            CoreError::Internal(message) => WireError::Internal { message: message.clone() },
        }
    }
}

impl From<CoreError> for WireError {
    fn from(err: CoreError) -> Self {
        WireError::from(&err)
    }
}

/// A caller-visible summary of one remote flavor's current connection, if any.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlavorStatus {
    pub flavor_id: String,
    pub host_id: Option<String>,
    pub status: Option<ConnectionStatus>,
    pub hostname: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "query")]
pub enum Query {
    ListWorkspaces,
    ListSessions,
    FlavorStatuses,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Request {
    WorkspaceCreate { repo_url: String, branch: String },
    WorkspaceDispose { id: String },
    WorkspaceDisposeAll { id: String },
    WorkspaceCheckBranchConflict { repo_url: String, branch: String },
    WorkspaceRefreshOverlay { id: String },
    WorkspaceUpdateGitStatus { id: String },
    WorkspaceUpdateAllGitStatus,
    WorkspaceScan,

    SessionSpawn { workspace_id: String, target: Target, prompt: Option<String> },
    SessionSpawnRemote { flavor_id: String, workspace_id: String, window_name: String, workdir: String, command: String },
    SessionDispose { id: String },
    SessionRename { id: String, nickname: String },

    RemoteConnect { flavor_id: String },
    RemoteReconnect { host_id: String },
    RemoteDisconnect { host_id: String },

    Query { query: Query },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum Response {
    Ok,
    Error { error: WireError },
    Workspace { workspace: Box<Workspace> },
    Workspaces { workspaces: Vec<Workspace> },
    BranchConflict { conflict: bool, existing_workspace_id: Option<String> },
    ScanReport { added: Vec<String>, updated: Vec<String>, removed: Vec<String> },
    Session { session: Box<Session>, bootstrap: String },
    Sessions { sessions: Vec<Session> },
    RemoteHost { host_id: String, status: ConnectionStatus },
    FlavorStatuses { statuses: Vec<FlavorStatus> },
}

impl Response {
    pub fn from_core_error(err: &CoreError) -> Self {
        Response::Error { error: WireError::from(err) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_error_preserves_branch_conflict_workspace_id() {
        let err = CoreError::BranchConflict { existing_workspace_id: "repo-001".to_string() };
        let wire: WireError = (&err).into();
        match wire {
            WireError::BranchConflict { existing_workspace_id } => assert_eq!(existing_workspace_id, "repo-001"),
            other => panic!("unexpected variant: {other:?}"),
        }
    }

    #[test]
    fn request_round_trips_through_json() {
        let req = Request::WorkspaceCreate { repo_url: "git@example.com/r.git".into(), branch: "main".into() };
        let json = serde_json::to_string(&req).unwrap();
        let decoded: Request = serde_json::from_str(&json).unwrap();
        match decoded {
            Request::WorkspaceCreate { repo_url, branch } => {
                assert_eq!(repo_url, "git@example.com/r.git");
                assert_eq!(branch, "main");
            }
            other => panic!("unexpected variant: {other:?}"),
        }
    }
}
