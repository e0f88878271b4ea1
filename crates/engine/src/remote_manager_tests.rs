// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use schmux_core::config::VcsKind;
use schmux_core::remote::RemoteHost;
use std::process::Command as StdCommand;
use std::time::Duration;
use tempfile::tempdir;

fn tmux_available() -> bool {
    StdCommand::new("tmux").arg("-V").output().map(|o| o.status.success()).unwrap_or(false)
}

fn make_state() -> (tempfile::TempDir, Arc<schmux_storage::StateStore>) {
    let dir = tempdir().unwrap();
    let state = Arc::new(
        schmux_storage::StateStore::load_or_init(
            dir.path().join("state.json"),
            dir.path().join("workspaces"),
            dir.path().join("repos"),
        )
        .unwrap(),
    );
    (dir, state)
}

fn shell_flavor(id: &str) -> RemoteFlavor {
    RemoteFlavor {
        id: id.to_string(),
        flavor: "local-shell".to_string(),
        display_name: "Local shell".to_string(),
        vcs: VcsKind::Git,
        workspace_path: "/tmp".to_string(),
        connect_command: "/bin/sh".to_string(),
        reconnect_command: None,
        provision_command: None,
        hostname_regex: None,
        vscode_command_template: None,
    }
}

async fn wait_for_status(handle: &ConnectionHandle, target: ConnectionStatus, timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if handle.status() == target {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    false
}

#[tokio::test]
async fn connect_reaches_connected_state_through_real_tmux_control_mode() {
    if !tmux_available() {
        return;
    }
    let (_dir, state) = make_state();
    let manager = RemoteManager::new(state);
    let flavor = shell_flavor("local");

    let handle = manager.connect(&flavor, &TerminalConfig::default()).unwrap();
    assert!(wait_for_status(&handle, ConnectionStatus::Connected, Duration::from_secs(8)).await);
}

#[tokio::test]
async fn create_window_queues_during_provisioning_and_resolves_after_connect() {
    if !tmux_available() {
        return;
    }
    let (_dir, state) = make_state();
    let manager = RemoteManager::new(state);
    let flavor = shell_flavor("local-queue");

    let handle = manager.connect(&flavor, &TerminalConfig::default()).unwrap();
    let spawn_handle = handle.create_window("w1", "/tmp", "cat");

    let result = tokio::time::timeout(Duration::from_secs(10), spawn_handle.wait()).await;
    let (window_id, pane_id) = result.expect("spawn handle resolved before timeout").expect("window created");
    assert!(!window_id.is_empty());
    assert!(!pane_id.is_empty());

    let _ = handle.kill_window(&window_id).await;
}

#[tokio::test]
async fn reconnect_reconciles_sessions_against_live_panes() {
    if !tmux_available() {
        return;
    }
    use schmux_core::session::{Session, SessionId};
    use schmux_core::target::{Target, TargetKind};
    use schmux_core::workspace::WorkspaceId;

    let (_dir, state) = make_state();
    let manager = RemoteManager::new(state.clone());
    let flavor = shell_flavor("local-reconnect");

    let handle = manager.connect(&flavor, &TerminalConfig::default()).unwrap();
    assert!(wait_for_status(&handle, ConnectionStatus::Connected, Duration::from_secs(8)).await);
    let spawn_handle = handle.create_window("w1", "/tmp", "cat");
    let (_window_id, pane_id) = tokio::time::timeout(Duration::from_secs(10), spawn_handle.wait())
        .await
        .expect("spawn handle resolved before timeout")
        .expect("window created");

    let host_id = handle.host_id().clone();
    let still_bound = Session {
        id: SessionId::new("still-bound"),
        workspace_id: WorkspaceId::new("r-001"),
        target: Target { kind: TargetKind::Interactive, command_parts: vec!["cat".into()], env: Default::default(), promptable: false },
        nickname: None,
        created_at_ms: 0,
        last_output_at_ms: 0,
        last_signal_state: None,
        last_signal_at_ms: None,
        remote_host_id: Some(host_id.clone()),
        remote_pane_id: Some(pane_id.clone()),
        log_path: Default::default(),
    };
    let mut gone = still_bound.clone();
    gone.id = SessionId::new("gone");
    gone.remote_pane_id = Some("%9999".to_string());

    state
        .mutate(|doc| {
            doc.sessions.push(still_bound);
            doc.sessions.push(gone);
            Ok::<(), schmux_core::error::CoreError>(())
        })
        .unwrap();

    let reconnected = manager.reconnect(&flavor, &TerminalConfig::default()).unwrap();
    assert!(wait_for_status(&reconnected, ConnectionStatus::Connected, Duration::from_secs(8)).await);

    // Reconcile runs as part of reaching `Connected`; give the spawned task
    // a moment to finish its `list-windows` round trip and state mutation.
    tokio::time::sleep(Duration::from_millis(500)).await;

    let snapshot = state.snapshot();
    let still_bound = snapshot.session(&SessionId::new("still-bound")).unwrap();
    assert_eq!(still_bound.remote_pane_id.as_deref(), Some(pane_id.as_str()));
    let gone = snapshot.session(&SessionId::new("gone")).unwrap();
    assert!(gone.remote_pane_id.is_none());
    assert_eq!(gone.remote_host_id.as_ref(), Some(&host_id));
}

#[tokio::test]
async fn connect_is_idempotent_while_connection_is_active() {
    if !tmux_available() {
        return;
    }
    let (_dir, state) = make_state();
    let manager = RemoteManager::new(state);
    let flavor = shell_flavor("local-idempotent");

    let first = manager.connect(&flavor, &TerminalConfig::default()).unwrap();
    let second = manager.connect(&flavor, &TerminalConfig::default()).unwrap();
    assert_eq!(first.host_id(), second.host_id());
}

#[test]
fn downgrade_stale_connections_on_startup_clears_connected_and_reconnecting() {
    let (_dir, state) = make_state();
    state
        .mutate(|doc| {
            let mut connected = RemoteHost::new(RemoteHostId::new("h1"), "flavorA");
            connected.status = ConnectionStatus::Connected;
            let mut reconnecting = RemoteHost::new(RemoteHostId::new("h2"), "flavorB");
            reconnecting.status = ConnectionStatus::Reconnecting;
            let failed = RemoteHost::new(RemoteHostId::new("h3"), "flavorC");
            doc.remote_hosts.push(connected);
            doc.remote_hosts.push(reconnecting);
            doc.remote_hosts.push(failed);
            Ok::<(), CoreError>(())
        })
        .unwrap();

    let manager = RemoteManager::new(state.clone());
    manager.downgrade_stale_connections_on_startup().unwrap();

    let snap = state.snapshot();
    assert_eq!(snap.remote_host(&RemoteHostId::new("h1")).unwrap().status, ConnectionStatus::Disconnected);
    assert_eq!(snap.remote_host(&RemoteHostId::new("h2")).unwrap().status, ConnectionStatus::Disconnected);
    assert_eq!(snap.remote_host(&RemoteHostId::new("h3")).unwrap().status, ConnectionStatus::Provisioning);
}

#[test]
fn check_expiry_transitions_connected_hosts_past_ttl() {
    let (_dir, state) = make_state();
    state
        .mutate(|doc| {
            let mut host = RemoteHost::new(RemoteHostId::new("h1"), "flavorA");
            host.status = ConnectionStatus::Connected;
            host.expires_at_ms = Some(1);
            doc.remote_hosts.push(host);
            Ok::<(), CoreError>(())
        })
        .unwrap();

    let manager = RemoteManager::new(state.clone());
    let expired = manager.check_expiry().unwrap();

    assert_eq!(expired, vec![RemoteHostId::new("h1")]);
    assert_eq!(state.snapshot().remote_host(&RemoteHostId::new("h1")).unwrap().status, ConnectionStatus::Expired);
}

#[test]
fn check_expiry_leaves_non_expired_hosts_alone() {
    let (_dir, state) = make_state();
    state
        .mutate(|doc| {
            let mut host = RemoteHost::new(RemoteHostId::new("h1"), "flavorA");
            host.status = ConnectionStatus::Connected;
            host.expires_at_ms = Some(u64::MAX);
            doc.remote_hosts.push(host);
            Ok::<(), CoreError>(())
        })
        .unwrap();

    let manager = RemoteManager::new(state.clone());
    let expired = manager.check_expiry().unwrap();
    assert!(expired.is_empty());
}

#[tokio::test]
async fn operations_on_disconnected_connection_fail_fast() {
    if !tmux_available() {
        return;
    }
    let (_dir, state) = make_state();
    let manager = RemoteManager::new(state);
    let flavor = shell_flavor("local-killed");
    let handle = manager.connect(&flavor, &TerminalConfig::default()).unwrap();
    assert!(wait_for_status(&handle, ConnectionStatus::Connected, Duration::from_secs(8)).await);

    handle.0.transport.kill();
    assert!(wait_for_status(&handle, ConnectionStatus::Disconnected, Duration::from_secs(3)).await);

    let err = handle.send_keys("%0", b"hi").await.unwrap_err();
    assert!(matches!(err, CoreError::HostDisconnected));
}
