// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Background task supervisor: periodic git-status refresh and remote
//! connection expiry checks, run alongside the listener for the life of
//! the daemon.

use std::sync::Arc;
use std::time::Duration;

use notify::{RecursiveMode, Watcher};
use schmux_storage::ConfigStore;
use tokio::task::JoinSet;
use tracing::warn;

use crate::lifecycle::Daemon;

/// No config knob names a poll interval for remote expiry checks; this is
/// a conservative default (see DESIGN.md).
const REMOTE_EXPIRY_POLL_MS: u64 = 30_000;

/// Spawns the supervised background tasks onto `tasks`, returning
/// immediately; the tasks run until the daemon process exits.
pub fn spawn(daemon: &Daemon, tasks: &mut JoinSet<()>) {
    spawn_git_status_poller(daemon, tasks);
    spawn_remote_expiry_poller(daemon, tasks);
    spawn_config_watcher(daemon, tasks);
}

fn spawn_git_status_poller(daemon: &Daemon, tasks: &mut JoinSet<()>) {
    let workspaces = daemon.workspaces.clone();
    let config = daemon.config.clone();
    tasks.spawn(async move {
        loop {
            let interval = config.current().sessions.git_status_poll_interval_ms;
            tokio::time::sleep(Duration::from_millis(interval)).await;
            if let Err(e) = workspaces.update_all_git_status().await {
                warn!(error = %e, "git status poll failed, continuing");
            }
        }
    });
}

fn spawn_remote_expiry_poller(daemon: &Daemon, tasks: &mut JoinSet<()>) {
    let remote = daemon.remote.clone();
    tasks.spawn(async move {
        loop {
            tokio::time::sleep(Duration::from_millis(REMOTE_EXPIRY_POLL_MS)).await;
            match remote.check_expiry() {
                Ok(expired) if !expired.is_empty() => {
                    tracing::info!(count = expired.len(), "remote connection(s) expired");
                }
                Ok(_) => {}
                Err(e) => warn!(error = %e, "remote expiry check failed, continuing"),
            }
        }
    });
}

/// Watches the config file's directory and reloads on any write touching
/// it, so config changes take effect without a daemon restart. `notify`'s
/// watcher callback runs on its own thread, so the loop lives in
/// `spawn_blocking` rather than the async runtime.
fn spawn_config_watcher(daemon: &Daemon, tasks: &mut JoinSet<()>) {
    let config = daemon.config.clone();
    tasks.spawn(async move {
        let _ = tokio::task::spawn_blocking(move || watch_config(config)).await;
    });
}

fn watch_config(config: Arc<ConfigStore>) {
    let path = config.path().to_path_buf();
    let Some(parent) = path.parent().map(|p| p.to_path_buf()) else {
        warn!("config path has no parent directory, not watching for reload");
        return;
    };

    let (tx, rx) = std::sync::mpsc::channel();
    let mut watcher = match notify::recommended_watcher(move |res| {
        let _ = tx.send(res);
    }) {
        Ok(w) => w,
        Err(e) => {
            warn!(error = %e, "failed to start config file watcher");
            return;
        }
    };
    if let Err(e) = watcher.watch(&parent, RecursiveMode::NonRecursive) {
        warn!(error = %e, path = %parent.display(), "failed to watch config directory");
        return;
    }

    for result in rx {
        let event = match result {
            Ok(event) => event,
            Err(e) => {
                warn!(error = %e, "config watcher error");
                continue;
            }
        };
        if !event.paths.iter().any(|p| p == &path) {
            continue;
        }
        match config.reload() {
            Ok(()) => tracing::info!(path = %path.display(), "config reloaded"),
            Err(e) => warn!(error = %e, "config reload failed, keeping previous config"),
        }
    }
}

