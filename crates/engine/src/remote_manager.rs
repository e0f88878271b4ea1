// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Maintains at most one [`Connection`] per remote flavor and maps the
//! session engine's operations onto the control-mode multiplexer running
//! over that connection's PTY transport.

use parking_lot::Mutex as PLMutex;
use schmux_adapters::control_mode::{ControlModeClient, OutputEvent, WireEvent};
use schmux_adapters::remote_transport::{extract_hostname, extract_session_uuid, RemoteTransport};
use schmux_core::config::{RemoteFlavor, TerminalConfig};
use schmux_core::error::CoreError;
use schmux_core::remote::{ConnectionStatus, RemoteHost, RemoteHostId};
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, oneshot};

pub type RemoteManagerError = CoreError;

/// Connection expires this long after reaching `Connected`. No config knob
/// names this value so a conservative default is picked here (see DESIGN.md).
const CONNECTION_TTL_MS: u64 = 6 * 60 * 60 * 1000;

/// How long to accumulate raw PTY bytes while scraping for a hostname
/// banner before giving up and proceeding without one.
const BANNER_SCRAPE_WINDOW_MS: u64 = 3_000;

struct PendingSpawn {
    window_name: String,
    workdir: String,
    command: String,
    responder: oneshot::Sender<Result<(String, String), CoreError>>,
}

/// One live (or provisioning/disconnected) connection to a remote host.
pub struct Connection {
    host_id: RemoteHostId,
    flavor: RemoteFlavor,
    transport: Arc<RemoteTransport>,
    status: PLMutex<ConnectionStatus>,
    pending: PLMutex<VecDeque<PendingSpawn>>,
}

impl Connection {
    fn status(&self) -> ConnectionStatus {
        *self.status.lock()
    }

    fn require_connected(&self) -> Result<(), CoreError> {
        match self.status() {
            ConnectionStatus::Connected => Ok(()),
            ConnectionStatus::Provisioning | ConnectionStatus::Authenticating => Err(CoreError::HostProvisioning),
            ConnectionStatus::Expired => Err(CoreError::HostExpired),
            ConnectionStatus::Disconnected | ConnectionStatus::Reconnecting | ConnectionStatus::Failed => {
                Err(CoreError::HostDisconnected)
            }
        }
    }

    fn control(&self) -> Arc<ControlModeClient> {
        self.transport.control()
    }
}

/// Result of reconciling persisted pane bindings against a live
/// `list-windows` after a reconnect.
#[derive(Debug, Default, Clone)]
pub struct ReconcileReport {
    pub still_bound: Vec<String>,
    pub missing: Vec<String>,
}

/// Cheaply cloneable reference to one connection, used by callers (the
/// session engine's remote path, the terminal streamer) to drive it
/// without reaching back into the manager's connection registry.
#[derive(Clone)]
pub struct ConnectionHandle(Arc<Connection>);

impl ConnectionHandle {
    pub fn host_id(&self) -> &RemoteHostId {
        &self.0.host_id
    }

    pub fn status(&self) -> ConnectionStatus {
        self.0.status()
    }

    /// Maps onto `CreateWindow`. Queues behind provisioning if the
    /// connection isn't connected yet; otherwise dispatches immediately.
    pub fn create_window(&self, window_name: &str, workdir: &str, command: &str) -> SpawnHandle {
        match self.0.status() {
            ConnectionStatus::Connected => {
                let control = self.0.control();
                let window_name = window_name.to_string();
                let workdir = workdir.to_string();
                let command = command.to_string();
                let (tx, rx) = oneshot::channel();
                tokio::spawn(async move {
                    let result = control
                        .create_window(&window_name, &workdir, &command)
                        .await
                        .map_err(|e| CoreError::ControlModeError {
                            cmd: "new-window".to_string(),
                            detail: e.to_string(),
                        });
                    let _ = tx.send(result);
                });
                SpawnHandle(SpawnHandleInner::Pending(rx))
            }
            ConnectionStatus::Provisioning | ConnectionStatus::Authenticating => {
                let (tx, rx) = oneshot::channel();
                self.0.pending.lock().push_back(PendingSpawn {
                    window_name: window_name.to_string(),
                    workdir: workdir.to_string(),
                    command: command.to_string(),
                    responder: tx,
                });
                SpawnHandle(SpawnHandleInner::Pending(rx))
            }
            _ => SpawnHandle(SpawnHandleInner::Immediate(Err(self.0.require_connected().unwrap_err()))),
        }
    }

    pub async fn kill_window(&self, window_id: &str) -> Result<(), CoreError> {
        self.0.require_connected()?;
        self.0.control().kill_window(window_id).await.map_err(|e| CoreError::ControlModeError {
            cmd: "kill-window".to_string(),
            detail: e.to_string(),
        })
    }

    pub async fn send_keys(&self, pane_id: &str, bytes: &[u8]) -> Result<(), CoreError> {
        self.0.require_connected()?;
        self.0.control().send_keys(pane_id, bytes).await.map_err(|e| CoreError::ControlModeError {
            cmd: "send-keys".to_string(),
            detail: e.to_string(),
        })
    }

    pub async fn capture_pane(&self, pane_id: &str, lines: u32) -> Result<String, CoreError> {
        self.0.require_connected()?;
        self.0.control().capture_pane(pane_id, lines).await.map_err(|e| CoreError::ControlModeError {
            cmd: "capture-pane".to_string(),
            detail: e.to_string(),
        })
    }

    pub fn subscribe_output(&self, pane_id: &str) -> mpsc::Receiver<OutputEvent> {
        self.0.control().subscribe_output(pane_id)
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<WireEvent> {
        self.0.control().subscribe_events()
    }

    /// Raw PTY passthrough for the "provisioning terminal" viewer.
    pub fn subscribe_raw(&self) -> broadcast::Receiver<Vec<u8>> {
        self.0.transport.subscribe_raw()
    }

    pub async fn send_raw(&self, bytes: Vec<u8>) -> Result<(), CoreError> {
        self.0
            .transport
            .send_raw(bytes)
            .await
            .map_err(|e| CoreError::ControlModeError { cmd: "raw-input".to_string(), detail: e.to_string() })
    }

    /// Runs a VCS/diagnostic command via the hidden-window `RunCommand`
    /// primitive.
    pub async fn run_command(&self, workdir: &str, command: &str) -> Result<String, CoreError> {
        self.0.require_connected()?;
        self.0.control().run_command(workdir, command).await.map_err(|e| CoreError::ControlModeError {
            cmd: "run-command".to_string(),
            detail: e.to_string(),
        })
    }

    /// `list-windows -F '#{window_id} #{window_name} #{pane_id}'`,
    /// reconciled against the caller-supplied set of pane ids it expects
    /// to still be bound.
    pub async fn reconcile(&self, expected_pane_ids: &[String]) -> Result<ReconcileReport, CoreError> {
        self.0.require_connected()?;
        let lines = self
            .0
            .control()
            .execute("list-windows -F '#{window_id} #{window_name} #{pane_id}'")
            .await
            .map_err(|e| CoreError::ControlModeError { cmd: "list-windows".to_string(), detail: e.to_string() })?;
        let live_panes: Vec<String> = lines
            .iter()
            .filter_map(|line| line.split_whitespace().nth(2))
            .map(|s| s.to_string())
            .collect();

        let mut report = ReconcileReport::default();
        for pane_id in expected_pane_ids {
            if live_panes.contains(pane_id) {
                report.still_bound.push(pane_id.clone());
            } else {
                report.missing.push(pane_id.clone());
            }
        }
        Ok(report)
    }

    fn drain_pending(&self) {
        let pending: Vec<PendingSpawn> = {
            let mut queue = self.0.pending.lock();
            queue.drain(..).collect()
        };
        if pending.is_empty() {
            return;
        }
        let control = self.0.control();
        tokio::spawn(async move {
            for item in pending {
                let result = control
                    .create_window(&item.window_name, &item.workdir, &item.command)
                    .await
                    .map_err(|e| CoreError::ControlModeError { cmd: "new-window".to_string(), detail: e.to_string() });
                let _ = item.responder.send(result);
            }
        });
    }
}

enum SpawnHandleInner {
    Immediate(Result<(String, String), CoreError>),
    Pending(oneshot::Receiver<Result<(String, String), CoreError>>),
}

/// A handle to a `CreateWindow` call that may have been queued behind
/// provisioning; the caller awaits it once the connection is ready.
pub struct SpawnHandle(SpawnHandleInner);

impl SpawnHandle {
    pub async fn wait(self) -> Result<(String, String), CoreError> {
        match self.0 {
            SpawnHandleInner::Immediate(result) => result,
            SpawnHandleInner::Pending(rx) => rx.await.unwrap_or(Err(CoreError::HostDisconnected)),
        }
    }
}

/// Owns every active `Connection`, keyed by remote flavor id; at most one
/// live connection is kept per flavor.
pub struct RemoteManager {
    connections: PLMutex<HashMap<String, Arc<Connection>>>,
    state: Arc<schmux_storage::StateStore>,
}

impl RemoteManager {
    pub fn new(state: Arc<schmux_storage::StateStore>) -> Self {
        Self {
            connections: PLMutex::new(HashMap::new()),
            state,
        }
    }

    pub fn handle(&self, flavor_id: &str) -> Option<ConnectionHandle> {
        self.connections.lock().get(flavor_id).cloned().map(ConnectionHandle)
    }

    pub fn handle_by_host_id(&self, host_id: &RemoteHostId) -> Option<ConnectionHandle> {
        self.connections.lock().values().find(|c| &c.host_id == host_id).cloned().map(ConnectionHandle)
    }

    /// Kills the connection's transport; the process monitor observes the
    /// dead child and flips persisted state to `Disconnected`.
    pub fn disconnect(&self, host_id: &RemoteHostId) -> Result<(), CoreError> {
        let connection = self
            .connections
            .lock()
            .values()
            .find(|c| &c.host_id == host_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("remote host", host_id.as_str()))?;
        connection.transport.kill();
        Ok(())
    }

    /// Spawns the flavor's connect command through a PTY and starts the
    /// multiplexer; returns a handle usable immediately (operations queue
    /// or refuse appropriately until the background task reaches
    /// `Connected`).
    pub fn connect(&self, flavor: &RemoteFlavor, terminal: &TerminalConfig) -> Result<ConnectionHandle, CoreError> {
        if let Some(existing) = self.handle(&flavor.id) {
            if !matches!(existing.status(), ConnectionStatus::Failed | ConnectionStatus::Expired) {
                return Ok(existing);
            }
        }

        let rendered = flavor.connect_command.replace("{{.Flavor}}", &flavor.flavor);
        let transport = RemoteTransport::spawn(&rendered, terminal.width, terminal.height)
            .map_err(|e| CoreError::Internal(format!("failed to spawn connect command: {e}")))?;

        let host_id = RemoteHostId::new(format!("remote-{}", short_uuid()));
        self.state.mutate(|doc| {
            doc.remote_hosts.push(RemoteHost::new(host_id.clone(), flavor.id.clone()));
            Ok::<(), CoreError>(())
        })?;

        let connection = Arc::new(Connection {
            host_id: host_id.clone(),
            flavor: flavor.clone(),
            transport: Arc::new(transport),
            status: PLMutex::new(ConnectionStatus::Provisioning),
            pending: PLMutex::new(VecDeque::new()),
        });
        self.connections.lock().insert(flavor.id.clone(), connection.clone());

        let handle = ConnectionHandle(connection.clone());
        self.spawn_provisioning_task(connection.clone(), handle.clone(), false);
        self.spawn_process_monitor(connection);

        Ok(handle)
    }

    /// Reconnect is always user-initiated; uses `reconnect_command` when
    /// set, else falls back to `connect_command`.
    pub fn reconnect(&self, flavor: &RemoteFlavor, terminal: &TerminalConfig) -> Result<ConnectionHandle, CoreError> {
        let command_template = flavor.reconnect_command.as_deref().unwrap_or(&flavor.connect_command);
        let existing_hostname = self
            .state
            .snapshot()
            .remote_hosts
            .iter()
            .find(|h| h.flavor_id == flavor.id)
            .and_then(|h| h.hostname.clone())
            .unwrap_or_default();
        let rendered = command_template
            .replace("{{.Flavor}}", &flavor.flavor)
            .replace("{{.Hostname}}", &existing_hostname);

        let transport = RemoteTransport::spawn(&rendered, terminal.width, terminal.height)
            .map_err(|e| CoreError::Internal(format!("failed to spawn reconnect command: {e}")))?;

        let host_id = self
            .state
            .snapshot()
            .remote_hosts
            .iter()
            .find(|h| h.flavor_id == flavor.id)
            .map(|h| h.id.clone())
            .unwrap_or_else(|| RemoteHostId::new(format!("remote-{}", short_uuid())));

        self.set_status(&host_id, ConnectionStatus::Reconnecting)?;

        let connection = Arc::new(Connection {
            host_id: host_id.clone(),
            flavor: flavor.clone(),
            transport: Arc::new(transport),
            status: PLMutex::new(ConnectionStatus::Reconnecting),
            pending: PLMutex::new(VecDeque::new()),
        });
        self.connections.lock().insert(flavor.id.clone(), connection.clone());

        let handle = ConnectionHandle(connection.clone());
        self.spawn_provisioning_task(connection.clone(), handle.clone(), true);
        self.spawn_process_monitor(connection);

        Ok(handle)
    }

    fn spawn_provisioning_task(&self, connection: Arc<Connection>, handle: ConnectionHandle, is_reconnect: bool) {
        let state = self.state.clone();
        tokio::spawn(async move {
            let mut raw = connection.transport.subscribe_raw();
            let mut banner = Vec::new();
            let deadline = tokio::time::Instant::now() + std::time::Duration::from_millis(BANNER_SCRAPE_WINDOW_MS);
            while tokio::time::Instant::now() < deadline {
                match tokio::time::timeout(deadline - tokio::time::Instant::now(), raw.recv()).await {
                    Ok(Ok(chunk)) => banner.extend_from_slice(&chunk),
                    _ => break,
                }
            }
            let banner_text = String::from_utf8_lossy(&banner).to_string();
            let hostname = extract_hostname(&banner_text, connection.flavor.hostname_regex.as_deref());
            let session_uuid = extract_session_uuid(&banner_text);

            // Control mode starts once the remote shell is reached: attach
            // with the daemon-supplied suffix.
            let _ = connection.transport.send_raw(b"tmux -CC new-session -A -s schmux\n".to_vec()).await;

            // Probe: any successful command confirms the control channel is live.
            let probed = connection.control().execute("list-sessions").await.is_ok();
            if !probed {
                *connection.status.lock() = ConnectionStatus::Failed;
                let _ = state.mutate(|doc| {
                    if let Some(host) = doc.remote_host_mut(&connection.host_id) {
                        host.status = ConnectionStatus::Failed;
                    }
                    Ok::<(), CoreError>(())
                });
                return;
            }

            let now = now_ms();
            *connection.status.lock() = ConnectionStatus::Connected;
            let expires_at = now + CONNECTION_TTL_MS;
            let provision_command = connection.flavor.provision_command.clone();
            let needs_provision = {
                let snap = state.snapshot();
                snap.remote_host(&connection.host_id).map(|h| !h.provisioned).unwrap_or(true)
            };

            if needs_provision {
                if let Some(cmd) = provision_command {
                    let workspace_path = connection.flavor.workspace_path.clone();
                    let _ = connection.control().run_command(&workspace_path, &cmd).await;
                }
            }

            let _ = state.mutate(|doc| {
                if let Some(host) = doc.remote_host_mut(&connection.host_id) {
                    host.status = ConnectionStatus::Connected;
                    host.hostname = hostname.clone();
                    host.remote_session_uuid = session_uuid.clone();
                    host.connected_at_ms = Some(now);
                    host.expires_at_ms = Some(expires_at);
                    host.provisioned = true;
                }
                Ok::<(), CoreError>(())
            });

            handle.drain_pending();

            if is_reconnect {
                reconcile_sessions(&state, &connection.host_id, &handle).await;
            }
        });
    }

    fn spawn_process_monitor(&self, connection: Arc<Connection>) {
        let state = self.state.clone();
        tokio::spawn(async move {
            loop {
                if !connection.transport.is_alive() {
                    *connection.status.lock() = ConnectionStatus::Disconnected;
                    let _ = state.mutate(|doc| {
                        if let Some(host) = doc.remote_host_mut(&connection.host_id) {
                            host.status = ConnectionStatus::Disconnected;
                        }
                        Ok::<(), CoreError>(())
                    });
                    return;
                }
                tokio::time::sleep(std::time::Duration::from_millis(500)).await;
            }
        });
    }

    fn set_status(&self, host_id: &RemoteHostId, status: ConnectionStatus) -> Result<(), CoreError> {
        self.state.mutate(|doc| {
            if let Some(host) = doc.remote_host_mut(host_id) {
                host.status = status;
            }
            Ok::<(), CoreError>(())
        })
    }

    /// Daemon startup: every persisted connected/reconnecting host is
    /// immediately downgraded to disconnected.
    pub fn downgrade_stale_connections_on_startup(&self) -> Result<(), CoreError> {
        self.state.mutate(|doc| {
            for host in doc.remote_hosts.iter_mut() {
                if matches!(host.status, ConnectionStatus::Connected | ConnectionStatus::Reconnecting | ConnectionStatus::Authenticating) {
                    host.status = ConnectionStatus::Disconnected;
                }
            }
            Ok::<(), CoreError>(())
        })
    }

    /// Transitions any connection past its TTL to `Expired`. Intended to be
    /// polled periodically by the daemon's background task supervisor.
    pub fn check_expiry(&self) -> Result<Vec<RemoteHostId>, CoreError> {
        let now = now_ms();
        let mut expired = Vec::new();
        self.state.mutate(|doc| {
            for host in doc.remote_hosts.iter_mut() {
                if host.is_expired(now) {
                    host.status = ConnectionStatus::Expired;
                    expired.push(host.id.clone());
                }
            }
            Ok::<(), CoreError>(())
        })?;
        for host_id in &expired {
            if let Some(connection) = self.connections.lock().values().find(|c| &c.host_id == host_id).cloned() {
                *connection.status.lock() = ConnectionStatus::Expired;
            }
        }
        Ok(expired)
    }
}

/// Runs `ConnectionHandle::reconcile` against every session persisted
/// against `host_id` once a reconnect reaches `Connected`: panes
/// `list-windows` still reports stay bound untouched, the rest are marked
/// disconnected but retained by clearing their pane id (the session record,
/// and its tie to the host, survive for the user to inspect or dispose).
async fn reconcile_sessions(state: &Arc<schmux_storage::StateStore>, host_id: &RemoteHostId, handle: &ConnectionHandle) {
    let expected: Vec<String> = state
        .snapshot()
        .sessions
        .iter()
        .filter(|s| s.remote_host_id.as_ref() == Some(host_id))
        .filter_map(|s| s.remote_pane_id.clone())
        .collect();
    if expected.is_empty() {
        return;
    }
    let Ok(report) = handle.reconcile(&expected).await else {
        return;
    };
    let _ = state.mutate(|doc| {
        for session in doc.sessions.iter_mut() {
            if session.remote_host_id.as_ref() != Some(host_id) {
                continue;
            }
            if let Some(pane_id) = &session.remote_pane_id {
                if report.missing.contains(pane_id) {
                    session.remote_pane_id = None;
                }
            }
        }
        Ok::<(), CoreError>(())
    });
}

fn short_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "remote_manager_tests.rs"]
mod tests;
