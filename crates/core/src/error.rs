// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed error taxonomy surfaced by the core.
//!
//! Recoverable kinds are distinguished so handler layers can map them to
//! specific API responses instead of a generic 500. Background tasks never
//! propagate these: they log-and-continue (§7 propagation policy).

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Reason a workspace disposal was refused because the tree isn't clean.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DirtyReason {
    Uncommitted,
    Unpushed,
}

impl std::fmt::Display for DirtyReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DirtyReason::Uncommitted => write!(f, "uncommitted changes"),
            DirtyReason::Unpushed => write!(f, "unpushed commits"),
        }
    }
}

/// Top-level error kind surfaced by workspace/session/remote operations.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("branch conflict: branch already checked out in workspace {existing_workspace_id}")]
    BranchConflict { existing_workspace_id: String },

    #[error("workspace is dirty: {reason}")]
    Dirty { reason: DirtyReason },

    #[error("workspace has sessions: {ids:?}")]
    HasSessions { ids: Vec<String> },

    #[error("nickname already taken: {0}")]
    NicknameTaken(String),

    #[error("git {op} failed: {stderr}")]
    GitFailure { op: String, stderr: String },

    #[error("tmux {op} failed")]
    TmuxFailure { op: String },

    #[error("control mode error in {cmd}: {detail}")]
    ControlModeError { cmd: String, detail: String },

    #[error("host is still provisioning")]
    HostProvisioning,

    #[error("host is disconnected")]
    HostDisconnected,

    #[error("host connection expired")]
    HostExpired,

    #[error("{op} timed out")]
    Timeout { op: String },

    #[error("internal error: {0}")]
    Internal(String),
}

impl CoreError {
    pub fn not_found(kind: &str, id: impl std::fmt::Display) -> Self {
        CoreError::NotFound(format!("{kind} {id}"))
    }
}
