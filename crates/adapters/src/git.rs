// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Git command wrapper used by the workspace engine.

use crate::process::{run_with_timeout, GIT_CLONE_TIMEOUT, GIT_STATUS_TIMEOUT};
use schmux_core::workspace::GitStatus;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum GitError {
    #[error("git {op} failed: {stderr}")]
    CommandFailed { op: String, stderr: String },
    #[error("git {op} timed out")]
    Timeout { op: String },
}

impl GitError {
    fn timeout(op: &str) -> Self {
        GitError::Timeout { op: op.to_string() }
    }

    fn failed(op: &str, stderr: impl Into<String>) -> Self {
        GitError::CommandFailed {
            op: op.to_string(),
            stderr: stderr.into(),
        }
    }
}

/// Thin wrapper over the `git` CLI. Every call is context-bound with an
/// explicit timeout (clone/fetch get the longer `GIT_CLONE_TIMEOUT`,
/// read-only calls get `GIT_STATUS_TIMEOUT`).
#[derive(Clone, Default)]
pub struct GitAdapter;

impl GitAdapter {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, op: &str, mut cmd: Command, timeout: std::time::Duration) -> Result<String, GitError> {
        let output = run_with_timeout(std::mem::replace(&mut cmd, Command::new("git")), timeout, op)
            .await
            .map_err(|_| GitError::timeout(op))?;
        if !output.status.success() {
            return Err(GitError::failed(op, String::from_utf8_lossy(&output.stderr)));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    /// `git clone --bare <url> <bare_path>`.
    pub async fn clone_bare(&self, url: &str, bare_path: &Path) -> Result<(), GitError> {
        let mut cmd = Command::new("git");
        cmd.args(["clone", "--bare", url]).arg(bare_path);
        self.run("clone --bare", cmd, GIT_CLONE_TIMEOUT).await?;
        Ok(())
    }

    /// `git --git-dir=<bare_path> fetch origin`.
    pub async fn fetch(&self, bare_path: &Path) -> Result<(), GitError> {
        let mut cmd = Command::new("git");
        cmd.arg(format!("--git-dir={}", bare_path.display()))
            .args(["fetch", "origin"]);
        self.run("fetch", cmd, GIT_CLONE_TIMEOUT).await?;
        Ok(())
    }

    /// Whether `origin/<branch>` exists in the bare repo.
    pub async fn remote_branch_exists(&self, bare_path: &Path, branch: &str) -> Result<bool, GitError> {
        let mut cmd = Command::new("git");
        cmd.arg(format!("--git-dir={}", bare_path.display())).args([
            "show-ref",
            "--verify",
            "--quiet",
            &format!("refs/remotes/origin/{branch}"),
        ]);
        let output = run_with_timeout(cmd, GIT_STATUS_TIMEOUT, "show-ref")
            .await
            .map_err(|_| GitError::timeout("show-ref"))?;
        Ok(output.status.success())
    }

    /// Whether `branch` is already checked out in some worktree of `bare_path`.
    pub async fn branch_in_use(&self, bare_path: &Path, branch: &str) -> Result<bool, GitError> {
        let mut cmd = Command::new("git");
        cmd.arg(format!("--git-dir={}", bare_path.display()))
            .args(["worktree", "list", "--porcelain"]);
        let out = self.run("worktree list", cmd, GIT_STATUS_TIMEOUT).await?;
        let target = format!("branch refs/heads/{branch}");
        Ok(out.lines().any(|l| l == target))
    }

    /// `git worktree add [--track -b <branch> origin/<branch> | -b <branch>] <path>`.
    pub async fn worktree_add(
        &self,
        bare_path: &Path,
        path: &Path,
        branch: &str,
        track_remote: bool,
    ) -> Result<(), GitError> {
        let mut cmd = Command::new("git");
        cmd.arg(format!("--git-dir={}", bare_path.display()))
            .arg("worktree")
            .arg("add");
        if track_remote {
            cmd.arg("--track")
                .arg("-b")
                .arg(branch)
                .arg(path)
                .arg(format!("origin/{branch}"));
        } else {
            cmd.arg("-b").arg(branch).arg(path);
        }
        self.run("worktree add", cmd, GIT_CLONE_TIMEOUT).await?;
        Ok(())
    }

    /// `git worktree remove --force <path>`.
    pub async fn worktree_remove(&self, bare_path: &Path, path: &Path) -> Result<(), GitError> {
        let mut cmd = Command::new("git");
        cmd.arg(format!("--git-dir={}", bare_path.display()))
            .args(["worktree", "remove", "--force"])
            .arg(path);
        self.run("worktree remove", cmd, GIT_STATUS_TIMEOUT).await?;
        Ok(())
    }

    /// `git clone <url> <path>` (full-clone mode).
    pub async fn clone_full(&self, url: &str, path: &Path) -> Result<(), GitError> {
        let mut cmd = Command::new("git");
        cmd.arg("clone").arg(url).arg(path);
        self.run("clone", cmd, GIT_CLONE_TIMEOUT).await?;
        Ok(())
    }

    /// Whether `path` would be ignored by git if it existed in the
    /// workspace rooted at `workspace_path`. Used to gate overlay writes.
    pub async fn check_ignore(&self, workspace_path: &Path, relative_path: &Path) -> Result<bool, GitError> {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(workspace_path)
            .args(["check-ignore", "-q"])
            .arg(relative_path);
        let output = run_with_timeout(cmd, GIT_STATUS_TIMEOUT, "check-ignore")
            .await
            .map_err(|_| GitError::timeout("check-ignore"))?;
        // check-ignore exits 0 when the path IS ignored, 1 when it is not.
        Ok(output.status.success())
    }

    /// Full cached git status: dirty/ahead/behind/lines/files.
    pub async fn status(&self, workspace_path: &Path) -> Result<GitStatus, GitError> {
        let mut porcelain = Command::new("git");
        porcelain.arg("-C").arg(workspace_path).args(["status", "--porcelain"]);
        let porcelain_out = self.run("status --porcelain", porcelain, GIT_STATUS_TIMEOUT).await?;
        let dirty = !porcelain_out.trim().is_empty();
        let files_changed = porcelain_out.lines().filter(|l| !l.trim().is_empty()).count() as u32;

        let (ahead, behind) = self.ahead_behind(workspace_path).await.unwrap_or((0, 0));

        let mut numstat = Command::new("git");
        numstat.arg("-C").arg(workspace_path).args(["diff", "--numstat", "HEAD"]);
        let numstat_out = self.run("diff --numstat", numstat, GIT_STATUS_TIMEOUT).await.unwrap_or_default();
        let (mut added, mut removed) = (0u32, 0u32);
        for line in numstat_out.lines() {
            let mut parts = line.split_whitespace();
            if let (Some(a), Some(r)) = (parts.next(), parts.next()) {
                added += a.parse::<u32>().unwrap_or(0);
                removed += r.parse::<u32>().unwrap_or(0);
            }
        }

        Ok(GitStatus {
            dirty,
            ahead,
            behind,
            lines_added: added,
            lines_removed: removed,
            files_changed,
            remote_branch_url: self.remote_url(workspace_path).await.ok(),
        })
    }

    async fn ahead_behind(&self, workspace_path: &Path) -> Result<(u32, u32), GitError> {
        let mut cmd = Command::new("git");
        cmd.arg("-C")
            .arg(workspace_path)
            .args(["rev-list", "--left-right", "--count", "HEAD...@{u}"]);
        let out = self.run("rev-list", cmd, GIT_STATUS_TIMEOUT).await?;
        let mut parts = out.split_whitespace();
        let ahead = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        let behind = parts.next().and_then(|s| s.parse().ok()).unwrap_or(0);
        Ok((ahead, behind))
    }

    async fn remote_url(&self, workspace_path: &Path) -> Result<String, GitError> {
        let mut cmd = Command::new("git");
        cmd.arg("-C").arg(workspace_path).args(["remote", "get-url", "origin"]);
        Ok(self.run("remote get-url", cmd, GIT_STATUS_TIMEOUT).await?.trim().to_string())
    }

    /// True if there are uncommitted changes or unpushed commits. Returns
    /// the more specific reason first.
    pub async fn has_unsafe_changes(&self, workspace_path: &Path) -> Result<Option<schmux_core::error::DirtyReason>, GitError> {
        let status = self.status(workspace_path).await?;
        if status.dirty {
            return Ok(Some(schmux_core::error::DirtyReason::Uncommitted));
        }
        if status.ahead > 0 {
            return Ok(Some(schmux_core::error::DirtyReason::Unpushed));
        }
        Ok(None)
    }
}

#[cfg(test)]
#[path = "git_tests.rs"]
mod tests;
