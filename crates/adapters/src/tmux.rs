// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Local tmux CLI adapter.
//!
//! Wraps `new-session -d`, `send-keys`, `pipe-pane`, `capture-pane`,
//! `list-sessions` and `kill-session`/`has-session`, each bounded by
//! [`crate::process::TMUX_TIMEOUT`].

use crate::process::{run_with_timeout, TMUX_TIMEOUT};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;
use tokio::process::Command;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("command failed: {0}")]
    CommandFailed(String),
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("timed out: {0}")]
    Timeout(String),
}

/// Abstraction over the local tmux CLI so the session engine can be tested
/// against a fake implementation.
#[async_trait]
pub trait SessionAdapter: Send + Sync {
    /// `tmux new-session -d -s <name> -x <width> -y <height> -c <cwd>` with
    /// the given environment, running `cmd`.
    async fn new_session(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
        env: &[(String, String)],
        width: u16,
        height: u16,
    ) -> Result<(), SessionError>;

    async fn has_session(&self, name: &str) -> Result<bool, SessionError>;

    async fn kill_session(&self, name: &str) -> Result<(), SessionError>;

    /// `send-keys -l -- <text>` (literal mode, no key-name interpretation).
    async fn send_keys_literal(&self, name: &str, text: &str) -> Result<(), SessionError>;

    async fn send_enter(&self, name: &str) -> Result<(), SessionError>;

    /// `pipe-pane -o -t <name> 'cat >> <log_path>'`.
    async fn pipe_pane_start(&self, name: &str, log_path: &Path) -> Result<(), SessionError>;

    /// `pipe-pane -t <name>` with no command, which stops piping.
    async fn pipe_pane_stop(&self, name: &str) -> Result<(), SessionError>;

    /// `capture-pane -e -p -S -<lines>`.
    async fn capture_pane(&self, name: &str, lines: u32) -> Result<String, SessionError>;

    /// Names of all tmux sessions currently known to the server.
    async fn list_sessions(&self) -> Result<Vec<String>, SessionError>;
}

/// Real tmux-backed implementation.
#[derive(Clone, Default)]
pub struct TmuxAdapter;

impl TmuxAdapter {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SessionAdapter for TmuxAdapter {
    async fn new_session(
        &self,
        name: &str,
        cwd: &Path,
        cmd: &str,
        env: &[(String, String)],
        width: u16,
        height: u16,
    ) -> Result<(), SessionError> {
        if !cwd.exists() {
            return Err(SessionError::SpawnFailed(format!(
                "working directory does not exist: {}",
                cwd.display()
            )));
        }

        let mut tmux_cmd = Command::new("tmux");
        tmux_cmd
            .arg("new-session")
            .arg("-d")
            .arg("-s")
            .arg(name)
            .arg("-c")
            .arg(cwd)
            .arg("-x")
            .arg(width.to_string())
            .arg("-y")
            .arg(height.to_string());

        for (key, value) in env {
            tmux_cmd.arg("-e").arg(format!("{key}={value}"));
        }
        tmux_cmd.arg(cmd);

        let output = run_with_timeout(tmux_cmd, TMUX_TIMEOUT, "tmux new-session")
            .await
            .map_err(SessionError::Timeout)?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            tracing::error!(name, stderr = %stderr, "tmux new-session failed");
            return Err(SessionError::SpawnFailed(stderr.to_string()));
        }
        Ok(())
    }

    async fn has_session(&self, name: &str) -> Result<bool, SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["has-session", "-t", name]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux has-session")
            .await
            .map_err(SessionError::Timeout)?;
        Ok(output.status.success())
    }

    async fn kill_session(&self, name: &str) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["kill-session", "-t", name]);
        // Idempotent: a missing session is not an error.
        let _ = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux kill-session").await;
        Ok(())
    }

    async fn send_keys_literal(&self, name: &str, text: &str) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["send-keys", "-t", name, "-l", "--", text]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux send-keys")
            .await
            .map_err(SessionError::Timeout)?;
        if !output.status.success() {
            return Err(SessionError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn send_enter(&self, name: &str) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["send-keys", "-t", name, "Enter"]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux send-keys Enter")
            .await
            .map_err(SessionError::Timeout)?;
        if !output.status.success() {
            return Err(SessionError::NotFound(name.to_string()));
        }
        Ok(())
    }

    async fn pipe_pane_start(&self, name: &str, log_path: &Path) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args([
            "pipe-pane",
            "-o",
            "-t",
            name,
            &format!("cat >> {}", shell_quote(log_path)),
        ]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux pipe-pane start")
            .await
            .map_err(SessionError::Timeout)?;
        if !output.status.success() {
            return Err(SessionError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(())
    }

    async fn pipe_pane_stop(&self, name: &str) -> Result<(), SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["pipe-pane", "-t", name]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux pipe-pane stop")
            .await
            .map_err(SessionError::Timeout)?;
        if !output.status.success() {
            return Err(SessionError::CommandFailed(
                String::from_utf8_lossy(&output.stderr).to_string(),
            ));
        }
        Ok(())
    }

    async fn capture_pane(&self, name: &str, lines: u32) -> Result<String, SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args([
            "capture-pane",
            "-e",
            "-p",
            "-t",
            name,
            "-S",
            &format!("-{lines}"),
        ]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux capture-pane")
            .await
            .map_err(SessionError::Timeout)?;
        if !output.status.success() {
            return Err(SessionError::NotFound(name.to_string()));
        }
        Ok(String::from_utf8_lossy(&output.stdout).to_string())
    }

    async fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        let mut cmd = Command::new("tmux");
        cmd.args(["list-sessions", "-F", "#{session_name}"]);
        let output = run_with_timeout(cmd, TMUX_TIMEOUT, "tmux list-sessions")
            .await
            .map_err(SessionError::Timeout)?;
        if !output.status.success() {
            // No server running yields a non-zero exit and empty list.
            return Ok(Vec::new());
        }
        Ok(String::from_utf8_lossy(&output.stdout)
            .lines()
            .map(|l| l.to_string())
            .collect())
    }
}

fn shell_quote(path: &Path) -> String {
    format!("'{}'", path.display().to_string().replace('\'', "'\\''"))
}

#[cfg(test)]
#[path = "tmux_tests.rs"]
mod tests;
