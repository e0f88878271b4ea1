// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session entity.
//!
//! A session is one agent process running inside one detached tmux pane
//! (local) or a bound remote pane, with output captured to a per-session log
//! file.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::remote::RemoteHostId;
use crate::target::Target;
use crate::workspace::WorkspaceId;

crate::define_id! {
    /// Unique identifier for a session, e.g. `myrepo-001-a1b2c3`.
    pub struct SessionId;
}

/// Closed set of signal states an agent can report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalState {
    Completed,
    NeedsInput,
    NeedsTesting,
    Error,
    Working,
}

impl SignalState {
    /// Parse the state token from a signal marker; unknown tokens are not
    /// part of the closed set and must be passed through unchanged instead.
    pub fn parse(token: &str) -> Option<Self> {
        match token {
            "completed" => Some(Self::Completed),
            "needs_input" => Some(Self::NeedsInput),
            "needs_testing" => Some(Self::NeedsTesting),
            "error" => Some(Self::Error),
            "working" => Some(Self::Working),
            _ => None,
        }
    }
}

/// A running or previously-running agent session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub workspace_id: WorkspaceId,
    pub target: Target,
    pub nickname: Option<String>,
    pub created_at_ms: u64,
    pub last_output_at_ms: u64,
    pub last_signal_state: Option<SignalState>,
    pub last_signal_at_ms: Option<u64>,
    pub remote_host_id: Option<RemoteHostId>,
    pub remote_pane_id: Option<String>,
    pub log_path: PathBuf,
}

impl Session {
    pub fn is_remote(&self) -> bool {
        self.remote_host_id.is_some()
    }

    /// tmux session name derived from the session id.
    pub fn tmux_name(&self) -> String {
        format!("schmux-{}", self.id.as_str())
    }
}

#[cfg(test)]
#[path = "session_tests.rs"]
mod tests;
