// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Subprocess execution helpers.
//!
//! Every external call in this crate (git, tmux, control-mode) goes through
//! `run_with_timeout` so cancellation and timeouts are uniform.

use std::process::Output;
use std::time::Duration;
use tokio::process::Command;

/// Default timeout for tmux CLI commands.
pub const TMUX_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for `git clone`/`git worktree add` operations.
pub const GIT_CLONE_TIMEOUT: Duration = Duration::from_secs(60);

/// Default timeout for `git status`/`git fetch` operations.
pub const GIT_STATUS_TIMEOUT: Duration = Duration::from_secs(10);

/// Default timeout for control-mode `RunCommand` hidden-window polling.
pub const RUN_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);

/// Run a subprocess command with a timeout.
///
/// Wraps `Command::output()` with `tokio::time::timeout`, converting timeout
/// expiration into a descriptive error. The child process is killed
/// automatically if the timeout elapses (tokio's `Child` drop impl).
pub async fn run_with_timeout(
    mut cmd: Command,
    timeout: Duration,
    description: &str,
) -> Result<Output, String> {
    match tokio::time::timeout(timeout, cmd.output()).await {
        Ok(Ok(output)) => Ok(output),
        Ok(Err(io_err)) => Err(format!("{description} failed: {io_err}")),
        Err(_elapsed) => Err(format!(
            "{description} timed out after {}s",
            timeout.as_secs()
        )),
    }
}
