// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted state document.
//!
//! A single document is loaded on daemon start and rewritten atomically
//! (write-new + rename) after
//! every successful mutation. A coarse write mutex serializes mutations;
//! readers may snapshot under a short read lock. No failed mutation is ever
//! allowed to leave a partial rewrite on disk.

use parking_lot::RwLock;
use schmux_core::{RemoteHost, RemoteHostId, Session, SessionId, Workspace, WorkspaceId};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use thiserror::Error;

const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StateError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("workspace not found: {0}")]
    WorkspaceNotFound(String),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("remote host not found: {0}")]
    RemoteHostNotFound(String),
}

impl From<StateError> for schmux_core::error::CoreError {
    fn from(err: StateError) -> Self {
        match err {
            StateError::WorkspaceNotFound(id) => schmux_core::error::CoreError::not_found("workspace", id),
            StateError::SessionNotFound(id) => schmux_core::error::CoreError::not_found("session", id),
            StateError::RemoteHostNotFound(id) => schmux_core::error::CoreError::not_found("remote host", id),
            StateError::Io(_) | StateError::Json(_) => schmux_core::error::CoreError::Internal(err.to_string()),
        }
    }
}

/// A lazily-created bare clone backing one or more worktree workspaces.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BaseRepo {
    pub repo_url: String,
    pub bare_path: PathBuf,
}

/// The full persisted document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateDocument {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub workspace_path: PathBuf,
    pub base_repos_path: PathBuf,
    #[serde(default)]
    pub workspaces: Vec<Workspace>,
    #[serde(default)]
    pub sessions: Vec<Session>,
    #[serde(default)]
    pub base_repos: Vec<BaseRepo>,
    #[serde(default)]
    pub remote_hosts: Vec<RemoteHost>,
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

impl StateDocument {
    pub fn new(workspace_path: PathBuf, base_repos_path: PathBuf) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            workspace_path,
            base_repos_path,
            workspaces: Vec::new(),
            sessions: Vec::new(),
            base_repos: Vec::new(),
            remote_hosts: Vec::new(),
        }
    }

    /// Smallest positive integer not already used as the `NNN` suffix for
    /// `repo_name`.
    pub fn next_workspace_seq(&self, repo_name: &str) -> u32 {
        let prefix = format!("{repo_name}-");
        let mut used: Vec<u32> = self
            .workspaces
            .iter()
            .filter_map(|w| w.id.as_str().strip_prefix(&prefix))
            .filter_map(|suffix| suffix.parse::<u32>().ok())
            .collect();
        used.sort_unstable();
        let mut candidate = 1;
        for n in used.drain(..) {
            if n == candidate {
                candidate += 1;
            } else if n > candidate {
                break;
            }
        }
        candidate
    }

    pub fn workspace(&self, id: &WorkspaceId) -> Option<&Workspace> {
        self.workspaces.iter().find(|w| &w.id == id)
    }

    pub fn workspace_mut(&mut self, id: &WorkspaceId) -> Option<&mut Workspace> {
        self.workspaces.iter_mut().find(|w| &w.id == id)
    }

    pub fn sessions_in_workspace(&self, id: &WorkspaceId) -> Vec<&Session> {
        self.sessions.iter().filter(|s| &s.workspace_id == id).collect()
    }

    pub fn session(&self, id: &SessionId) -> Option<&Session> {
        self.sessions.iter().find(|s| &s.id == id)
    }

    pub fn session_mut(&mut self, id: &SessionId) -> Option<&mut Session> {
        self.sessions.iter_mut().find(|s| &s.id == id)
    }

    pub fn remote_host(&self, id: &RemoteHostId) -> Option<&RemoteHost> {
        self.remote_hosts.iter().find(|h| &h.id == id)
    }

    pub fn remote_host_mut(&mut self, id: &RemoteHostId) -> Option<&mut RemoteHost> {
        self.remote_hosts.iter_mut().find(|h| &h.id == id)
    }

    pub fn base_repo(&self, repo_url: &str) -> Option<&BaseRepo> {
        self.base_repos.iter().find(|b| b.repo_url == repo_url)
    }

    /// A nickname is unique across all sessions.
    pub fn nickname_taken(&self, nickname: &str, excluding: &SessionId) -> bool {
        self.sessions
            .iter()
            .any(|s| s.id != *excluding && s.nickname.as_deref() == Some(nickname))
    }

    fn save_atomic(&self, path: &Path) -> Result<(), StateError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let tmp_path = path.with_extension("tmp");
        {
            let file = File::create(&tmp_path)?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, self)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Option<Self>, StateError> {
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(path)?;
        let reader = BufReader::new(file);
        match serde_json::from_reader(reader) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                let bak_path = path.with_extension("bak");
                tracing::warn!(error = %e, path = %path.display(), bak = %bak_path.display(), "corrupt state document, moving aside");
                fs::rename(path, &bak_path)?;
                Ok(None)
            }
        }
    }
}

/// Write-through in-memory mirror of the persisted document, guarded by a
/// coarse lock. Every mutation closure runs under the write lock and, on
/// success, triggers the atomic rewrite before the caller's operation is
/// considered complete: every mutation is followed by an atomic rewrite of
/// the persisted document before the caller sees success.
pub struct StateStore {
    path: PathBuf,
    inner: RwLock<StateDocument>,
}

impl StateStore {
    pub fn load_or_init(
        path: PathBuf,
        workspace_path: PathBuf,
        base_repos_path: PathBuf,
    ) -> Result<Self, StateError> {
        let doc = StateDocument::load(&path)?
            .unwrap_or_else(|| StateDocument::new(workspace_path, base_repos_path));
        Ok(Self {
            path,
            inner: RwLock::new(doc),
        })
    }

    /// Short read-lock snapshot; does not hold the lock across I/O.
    pub fn snapshot(&self) -> StateDocument {
        self.inner.read().clone()
    }

    /// Run `f` against a mutable copy of the document under the write lock.
    /// If `f` returns `Ok`, the mutated document replaces the in-memory
    /// mirror and is rewritten atomically before this call returns; if `f`
    /// fails, the on-disk document (and the in-memory mirror) are left
    /// byte-identical to their prior state.
    pub fn mutate<T, E>(
        &self,
        f: impl FnOnce(&mut StateDocument) -> Result<T, E>,
    ) -> Result<T, E>
    where
        E: From<StateError>,
    {
        let mut guard = self.inner.write();
        let mut candidate = guard.clone();
        let result = f(&mut candidate)?;
        candidate.save_atomic(&self.path).map_err(E::from)?;
        *guard = candidate;
        Ok(result)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
