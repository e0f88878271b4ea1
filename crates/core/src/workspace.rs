// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace entity.
//!
//! A workspace is a directory on disk containing a git working tree
//! (worktree or full clone) or a remote pane's working directory, used as an
//! agent's CWD. Workspace ids are derived `<repo>-NNN` with the lowest
//! unallocated `NNN` per repo name.

use serde::{Deserialize, Serialize};

crate::define_id! {
    /// Unique identifier for a workspace, e.g. `myrepo-001`.
    pub struct WorkspaceId;
}

/// How a workspace's on-disk tree was materialized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkspaceKind {
    /// A `git worktree` sharing a bare repo with its siblings.
    Worktree,
    /// An independent `git clone`.
    FullClone,
    /// A directory on a remote host, materialized by the remote manager.
    Remote,
}

/// Cached git status fields, refreshed by `UpdateGitStatus`/`UpdateAllGitStatus`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GitStatus {
    pub dirty: bool,
    pub ahead: u32,
    pub behind: u32,
    pub lines_added: u32,
    pub lines_removed: u32,
    pub files_changed: u32,
    pub remote_branch_url: Option<String>,
}

/// A workspace directory and its git bookkeeping.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workspace {
    pub id: WorkspaceId,
    /// Repo URL, or `local:<name>` for a pseudo-repo with no remote.
    pub repo: String,
    pub branch: String,
    pub path: std::path::PathBuf,
    pub kind: WorkspaceKind,
    pub remote_host_id: Option<crate::remote::RemoteHostId>,
    pub remote_path: Option<String>,
    pub created_at_ms: u64,
    pub updated_at_ms: u64,
    #[serde(default)]
    pub git_status: GitStatus,
}

impl Workspace {
    /// Repo name portion of `repo` (path segment before `.git`), used to
    /// derive workspace ids and the base-repo directory name.
    pub fn repo_name(repo_url: &str) -> String {
        let trimmed = repo_url.trim_end_matches('/');
        let last = trimmed.rsplit('/').next().unwrap_or(trimmed);
        last.strip_suffix(".git").unwrap_or(last).to_string()
    }

    pub fn is_local_pseudo_repo(repo_url: &str) -> bool {
        repo_url.starts_with("local:")
    }
}

/// Validate a branch name: accept `a`, `a/b`, `a-b.c_d`; reject `/a`,
/// `a//b`, `a-`, `..`.
pub fn validate_branch_name(name: &str) -> bool {
    if name.is_empty() || name.starts_with('/') || name.ends_with('/') {
        return false;
    }
    if name.contains("//") || name.contains("..") {
        return false;
    }
    if name.ends_with('-') || name.ends_with('.') {
        return false;
    }
    name.chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '/' | '-' | '.' | '_'))
}

#[cfg(test)]
#[path = "workspace_tests.rs"]
mod tests;
