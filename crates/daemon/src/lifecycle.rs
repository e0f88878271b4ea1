// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon lifecycle management: startup, shutdown, recovery.
//!
//! Unlike an event-sourced daemon, `StateStore` rewrites its document
//! atomically on every mutation, so there's no WAL to replay at startup.
//! Reconciliation instead re-derives truth from the live tmux server and
//! any still-provisioning remote connections.

use std::fs::File;
use std::path::PathBuf;
use std::sync::Arc;

use fs2::FileExt;
use schmux_adapters::{GitAdapter, TmuxAdapter};
use schmux_engine::{RemoteManager, SessionEngine, WorkspaceEngine};
use schmux_storage::{ConfigError, ConfigStore, StateError, StateStore};
use thiserror::Error;
use tokio::net::UnixListener;
use tracing::{info, warn};

#[derive(Debug, Clone)]
pub struct Paths {
    pub state_dir: PathBuf,
    pub socket_path: PathBuf,
    pub lock_path: PathBuf,
    pub log_path: PathBuf,
    pub state_path: PathBuf,
    pub config_path: PathBuf,
    pub workspaces_path: PathBuf,
    pub base_repos_path: PathBuf,
    pub overlay_path: PathBuf,
    pub logs_path: PathBuf,
}

impl Paths {
    pub fn resolve() -> Result<Self, LifecycleError> {
        let state_dir = state_dir()?;
        Ok(Self {
            socket_path: state_dir.join("daemon.sock"),
            lock_path: state_dir.join("daemon.pid"),
            log_path: state_dir.join("daemon.log"),
            state_path: state_dir.join("state.json"),
            config_path: state_dir.join("config.json"),
            workspaces_path: state_dir.join("workspaces"),
            base_repos_path: state_dir.join("repos"),
            overlay_path: state_dir.join("overlays"),
            logs_path: state_dir.join("logs"),
            state_dir,
        })
    }
}

#[derive(Debug, Error)]
pub enum LifecycleError {
    #[error("could not determine state directory")]
    NoStateDir,
    #[error("failed to acquire lock: daemon already running?")]
    LockFailed(#[source] std::io::Error),
    #[error("failed to bind socket at {0}: {1}")]
    BindFailed(PathBuf, std::io::Error),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("state error: {0}")]
    State(#[from] StateError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything the listener and background tasks share, assembled once at
/// startup.
pub struct Daemon {
    pub paths: Paths,
    // Held only to maintain the exclusive file lock; released on drop.
    #[allow(dead_code)]
    lock_file: File,
    pub config: Arc<ConfigStore>,
    pub state: Arc<StateStore>,
    pub workspaces: Arc<WorkspaceEngine>,
    pub sessions: Arc<SessionEngine>,
    pub remote: Arc<RemoteManager>,
}

pub struct StartupResult {
    pub daemon: Daemon,
    pub listener: UnixListener,
}

pub async fn startup(paths: Paths) -> Result<StartupResult, LifecycleError> {
    match startup_inner(paths.clone()).await {
        Ok(result) => Ok(result),
        Err(e) => {
            // Don't clean up on a lock failure: those files belong to the
            // already-running daemon.
            if !matches!(e, LifecycleError::LockFailed(_)) {
                cleanup_on_failure(&paths);
            }
            Err(e)
        }
    }
}

async fn startup_inner(paths: Paths) -> Result<StartupResult, LifecycleError> {
    std::fs::create_dir_all(&paths.state_dir)?;

    // Acquire the lock before touching anything else so two daemons never
    // race on the same state directory.
    let lock_file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(&paths.lock_path)?;
    lock_file.try_lock_exclusive().map_err(LifecycleError::LockFailed)?;
    {
        use std::io::Write;
        let mut lock_file = &lock_file;
        lock_file.set_len(0)?;
        writeln!(lock_file, "{}", std::process::id())?;
    }

    std::fs::create_dir_all(&paths.workspaces_path)?;
    std::fs::create_dir_all(&paths.base_repos_path)?;
    std::fs::create_dir_all(&paths.logs_path)?;

    let config = Arc::new(ConfigStore::load(paths.config_path.clone())?);
    let state = Arc::new(StateStore::load_or_init(
        paths.state_path.clone(),
        paths.workspaces_path.clone(),
        paths.base_repos_path.clone(),
    )?);

    let snapshot = state.snapshot();
    info!(
        workspaces = snapshot.workspaces.len(),
        sessions = snapshot.sessions.len(),
        remote_hosts = snapshot.remote_hosts.len(),
        "recovered persisted state"
    );

    let cfg = config.current();
    let workspaces = Arc::new(WorkspaceEngine::new(GitAdapter::new(), state.clone(), paths.overlay_path.clone()));
    let sessions = Arc::new(SessionEngine::new(
        Arc::new(TmuxAdapter::new()),
        state.clone(),
        paths.logs_path.clone(),
        cfg.terminal,
        cfg.xterm,
    ));
    let remote = Arc::new(RemoteManager::new(state.clone()));

    if let Err(e) = remote.downgrade_stale_connections_on_startup() {
        warn!(error = %e, "failed to downgrade stale remote connections on startup");
    }
    match sessions.rediscover().await {
        Ok(running) => info!(count = running.len(), "rediscovered live tmux sessions"),
        Err(e) => warn!(error = %e, "session rediscovery failed"),
    }
    match workspaces.scan().await {
        Ok(report) => info!(added = report.added.len(), removed = report.removed.len(), "reconciled workspace root against disk"),
        Err(e) => warn!(error = %e, "workspace scan failed"),
    }

    // Stale-socket removal and bind happen last, only once startup can no
    // longer fail, so a half-started daemon never steals a working one's
    // socket.
    if paths.socket_path.exists() {
        std::fs::remove_file(&paths.socket_path)?;
    }
    let listener =
        UnixListener::bind(&paths.socket_path).map_err(|e| LifecycleError::BindFailed(paths.socket_path.clone(), e))?;

    info!("daemon started");

    Ok(StartupResult {
        daemon: Daemon { paths, lock_file, config, state, workspaces, sessions, remote },
        listener,
    })
}

fn cleanup_on_failure(paths: &Paths) {
    let _ = std::fs::remove_file(&paths.socket_path);
    let _ = std::fs::remove_file(&paths.lock_path);
}

impl Daemon {
    pub fn shutdown(&self) {
        info!("shutting down daemon");
        if self.paths.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.socket_path) {
                warn!(error = %e, "failed to remove socket file");
            }
        }
        if self.paths.lock_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.paths.lock_path) {
                warn!(error = %e, "failed to remove pid file");
            }
        }
        info!("daemon shutdown complete");
    }
}

fn state_dir() -> Result<PathBuf, LifecycleError> {
    if let Ok(dir) = std::env::var("SCHMUX_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("schmux"));
    }
    let home = std::env::var("HOME").map_err(|_| LifecycleError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/schmux"))
}
