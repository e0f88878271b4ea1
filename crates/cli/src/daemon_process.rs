// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Daemon process management utilities: starting, stopping, and probing
//! the schmux daemon process.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::{Duration, Instant};

use crate::client::ClientError;

pub fn start_daemon_background() -> Result<std::process::Child, ClientError> {
    let path = find_daemon_binary();
    Command::new(&path)
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .spawn()
        .map_err(|e| ClientError::DaemonStartFailed(e.to_string()))
}

pub fn stop_daemon_sync(timeout: Duration) {
    if let Ok(Some(pid)) = read_daemon_pid() {
        kill_signal("-15", pid);

        let start = Instant::now();
        while start.elapsed() < timeout {
            if !process_exists(pid) {
                break;
            }
            std::thread::sleep(Duration::from_millis(50));
        }

        if process_exists(pid) {
            force_kill_daemon(pid);
        }
    }

    if let Ok(dir) = daemon_dir() {
        cleanup_stale_pid(&dir);
    }
}

pub async fn wait_for_exit(pid: u32, timeout: Duration, poll_interval: Duration) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if !process_exists(pid) {
            return true;
        }
        tokio::time::sleep(poll_interval).await;
    }
    false
}

/// Locate the `schmuxd` binary: next to the running CLI binary, falling
/// back to `$PATH` lookup.
fn find_daemon_binary() -> PathBuf {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let sibling = dir.join("schmuxd");
            if sibling.exists() {
                return sibling;
            }
        }
    }
    PathBuf::from("schmuxd")
}

pub fn daemon_dir() -> Result<PathBuf, ClientError> {
    if let Ok(dir) = std::env::var("SCHMUX_STATE_DIR") {
        return Ok(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Ok(PathBuf::from(xdg).join("schmux"));
    }
    let home = std::env::var("HOME").map_err(|_| ClientError::NoStateDir)?;
    Ok(PathBuf::from(home).join(".local/state/schmux"))
}

pub fn daemon_socket() -> Result<PathBuf, ClientError> {
    Ok(daemon_dir()?.join("daemon.sock"))
}

pub fn cleanup_stale_pid(dir: &Path) {
    let pid_path = dir.join("daemon.pid");
    if pid_path.exists() {
        let _ = std::fs::remove_file(&pid_path);
    }
}

pub fn read_daemon_pid() -> Result<Option<u32>, ClientError> {
    let dir = daemon_dir()?;
    let pid_path = dir.join("daemon.pid");
    if !pid_path.exists() {
        return Ok(None);
    }
    match std::fs::read_to_string(&pid_path) {
        Ok(content) => Ok(content.trim().parse::<u32>().ok()),
        Err(_) => Ok(None),
    }
}

fn kill_signal(signal: &str, pid: u32) -> bool {
    Command::new("kill")
        .args([signal, &pid.to_string()])
        .stdin(std::process::Stdio::null())
        .stdout(std::process::Stdio::null())
        .stderr(std::process::Stdio::null())
        .status()
        .map(|s| s.success())
        .unwrap_or(false)
}

pub fn process_exists(pid: u32) -> bool {
    kill_signal("-0", pid)
}

pub fn force_kill_daemon(pid: u32) -> bool {
    kill_signal("-9", pid)
}

/// Probe whether a Unix socket is accepting connections.
pub fn probe_socket(socket_path: &Path) -> bool {
    std::os::unix::net::UnixStream::connect(socket_path).is_ok()
}

/// Remove stale socket/pid files left by a daemon that is no longer alive.
pub fn cleanup_stale_socket() -> Result<(), ClientError> {
    let dir = daemon_dir()?;
    let socket_path = dir.join("daemon.sock");
    let pid_path = dir.join("daemon.pid");

    let pid_is_dead = match read_daemon_pid() {
        Ok(Some(pid)) => !process_exists(pid),
        Ok(None) => true,
        Err(_) => true,
    };

    if pid_is_dead {
        let _ = std::fs::remove_file(&socket_path);
        let _ = std::fs::remove_file(&pid_path);
    }

    Ok(())
}
