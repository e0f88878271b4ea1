// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote host entity and connection state machine states.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a remote host connection.
    pub struct RemoteHostId;
}

/// Connection lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    Provisioning,
    Authenticating,
    Connected,
    Disconnected,
    Reconnecting,
    Expired,
    /// Connect attempt failed outright; terminal, distinct from `Disconnected`
    /// (which implies a connection existed and later dropped).
    Failed,
}

impl ConnectionStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, ConnectionStatus::Failed | ConnectionStatus::Expired)
    }
}

/// A remote host a connection has been (or is being) established to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteHost {
    pub id: RemoteHostId,
    pub flavor_id: String,
    pub hostname: Option<String>,
    pub remote_session_uuid: Option<String>,
    pub connected_at_ms: Option<u64>,
    pub expires_at_ms: Option<u64>,
    pub status: ConnectionStatus,
    pub provisioned: bool,
}

impl RemoteHost {
    pub fn new(id: RemoteHostId, flavor_id: impl Into<String>) -> Self {
        Self {
            id,
            flavor_id: flavor_id.into(),
            hostname: None,
            remote_session_uuid: None,
            connected_at_ms: None,
            expires_at_ms: None,
            status: ConnectionStatus::Provisioning,
            provisioned: false,
        }
    }

    pub fn is_expired(&self, now_ms: u64) -> bool {
        matches!(self.expires_at_ms, Some(exp) if now_ms >= exp)
            && self.status == ConnectionStatus::Connected
    }
}

/// A session create request queued while its connection is provisioning.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingSession {
    pub session_id: String,
    pub window_name: String,
    pub workdir: String,
    pub command: String,
}
