// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Runs one agent process inside a detached tmux session whose lifetime is
//! decoupled from the daemon, capturing terminal output into a per-session
//! log file the streamer can tail.

use regex::Regex;
use schmux_adapters::tmux::SessionAdapter;
use schmux_core::config::{TerminalConfig, XtermConfig};
use schmux_core::error::CoreError;
use schmux_core::session::{Session, SessionId, SignalState};
use schmux_core::target::Target;
use schmux_core::workspace::WorkspaceId;
use schmux_storage::StateStore;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

pub type SessionEngineError = CoreError;

/// Options accompanying a `Spawn` call.
#[derive(Debug, Clone, Default)]
pub struct SessionOpts {
    pub prompt: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SpawnOutcome {
    pub session: Session,
    /// Bootstrap header appended to the log before the live stream began;
    /// non-empty only on rediscovery of a preexisting pane of this name.
    pub bootstrap: String,
}

/// Result of scanning an appended output chunk for signal markers.
#[derive(Debug, Clone, Default)]
struct ScanResult {
    stripped: String,
    last_state: Option<SignalState>,
}

const MARKER_PATTERN: &str = r"--<\[schmux:([a-z_]+):([^\]]*)\]>--|\x1b\]777\s*;\s*notify\s*;\s*([a-z_]+)\s*;\s*([^\x07]*)\x07";

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MARKER_PATTERN).expect("static signal marker regex is valid"))
}

pub struct SessionEngine {
    adapter: Arc<dyn SessionAdapter>,
    state: Arc<StateStore>,
    logs_root: PathBuf,
    terminal: TerminalConfig,
    xterm: XtermConfig,
}

impl SessionEngine {
    pub fn new(
        adapter: Arc<dyn SessionAdapter>,
        state: Arc<StateStore>,
        logs_root: PathBuf,
        terminal: TerminalConfig,
        xterm: XtermConfig,
    ) -> Self {
        Self {
            adapter,
            state,
            logs_root,
            terminal,
            xterm,
        }
    }

    fn log_path(&self, id: &SessionId) -> PathBuf {
        self.logs_root.join(format!("{}.log", id.as_str()))
    }

    /// `Spawn(workspaceId, target, opts)`.
    pub async fn spawn(&self, workspace_id: &WorkspaceId, target: Target, opts: SessionOpts) -> Result<SpawnOutcome, CoreError> {
        if target.promptable && opts.prompt.is_none() {
            return Err(CoreError::Internal("promptable target requires opts.prompt".to_string()));
        }

        let workspace = {
            let snapshot = self.state.snapshot();
            snapshot
                .workspace(workspace_id)
                .cloned()
                .ok_or_else(|| CoreError::not_found("workspace", workspace_id.as_str()))?
        };

        let id = SessionId::new(format!("{}-{}", workspace_id.as_str(), short_uuid()));
        let tmux_name = tmux_name_of(&id);

        if self.adapter.has_session(&tmux_name).await.map_err(tmux_err)? {
            return Err(CoreError::Internal(format!("tmux session name collision: {tmux_name}")));
        }

        let log_path = self.log_path(&id);
        std::fs::create_dir_all(&self.logs_root).map_err(|e| CoreError::Internal(e.to_string()))?;

        if let Err(e) = self.ensure_log_file(&log_path) {
            return Err(e);
        }

        if self.log_exceeds_threshold(&log_path) {
            if let Err(e) = self.rotate_log(&tmux_name, &log_path).await {
                tracing::warn!(session = %id, error = %e, "pre-rotate before spawn failed, continuing");
            }
        }

        // On rediscovery this captures a preexisting pane's history; on a
        // fresh spawn the pane doesn't exist yet and capture fails silently.
        let bootstrap = self.adapter.capture_pane(&tmux_name, self.terminal.bootstrap_lines).await.unwrap_or_default();
        if !bootstrap.is_empty() {
            if let Err(e) = append_to_log(&log_path, bootstrap.as_bytes()) {
                tracing::warn!(session = %id, error = %e, "failed to append bootstrap header");
            }
        }

        let env: Vec<(String, String)> = target.env.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
        let command_line = target.command_line();

        if let Err(e) = self
            .adapter
            .new_session(&tmux_name, &workspace.path, &command_line, &env, self.terminal.width, self.terminal.height)
            .await
        {
            return Err(self.rollback_spawn(&tmux_name, &log_path, CoreError::TmuxFailure { op: format!("new-session: {e}") }).await);
        }

        if let Err(e) = self.adapter.pipe_pane_start(&tmux_name, &log_path).await {
            return Err(self.rollback_spawn(&tmux_name, &log_path, CoreError::TmuxFailure { op: format!("pipe-pane: {e}") }).await);
        }

        if target.promptable {
            let prompt = opts.prompt.clone().unwrap_or_default();
            if let Err(e) = self.adapter.send_keys_literal(&tmux_name, &prompt).await {
                return Err(self.rollback_spawn(&tmux_name, &log_path, CoreError::TmuxFailure { op: format!("send-keys: {e}") }).await);
            }
            if let Err(e) = self.adapter.send_enter(&tmux_name).await {
                return Err(self.rollback_spawn(&tmux_name, &log_path, CoreError::TmuxFailure { op: format!("send-keys Enter: {e}") }).await);
            }
        }

        let session = Session {
            id: id.clone(),
            workspace_id: workspace_id.clone(),
            target,
            nickname: None,
            created_at_ms: now_ms(),
            last_output_at_ms: now_ms(),
            last_signal_state: None,
            last_signal_at_ms: None,
            remote_host_id: None,
            remote_pane_id: None,
            log_path,
        };

        self.state.mutate(|doc| {
            doc.sessions.push(session.clone());
            Ok::<(), CoreError>(())
        })?;

        Ok(SpawnOutcome { session, bootstrap })
    }

    async fn rollback_spawn(&self, tmux_name: &str, log_path: &Path, err: CoreError) -> CoreError {
        let _ = self.adapter.kill_session(tmux_name).await;
        let _ = std::fs::remove_file(log_path);
        err
    }

    fn ensure_log_file(&self, log_path: &Path) -> Result<(), CoreError> {
        if !log_path.exists() {
            std::fs::File::create(log_path).map_err(|e| CoreError::Internal(e.to_string()))?;
        }
        Ok(())
    }

    fn log_exceeds_threshold(&self, log_path: &Path) -> bool {
        std::fs::metadata(log_path).map(|m| m.len() > self.xterm.max_log_size_bytes()).unwrap_or(false)
    }

    /// `Dispose(sessionId)`.
    pub async fn dispose(&self, id: &SessionId) -> Result<(), CoreError> {
        let session = {
            let snapshot = self.state.snapshot();
            snapshot.session(id).cloned().ok_or_else(|| CoreError::not_found("session", id.as_str()))?
        };
        let tmux_name = tmux_name_of(id);
        // Idempotent: a missing tmux session is not an error.
        self.adapter.kill_session(&tmux_name).await.map_err(tmux_err)?;
        let _ = std::fs::remove_file(&session.log_path);

        self.state.mutate(|doc| {
            doc.sessions.retain(|s| &s.id != id);
            Ok::<(), CoreError>(())
        })
    }

    /// `Rename(sessionId, nickname)`.
    pub async fn rename(&self, id: &SessionId, nickname: &str) -> Result<(), CoreError> {
        self.state.mutate(|doc| {
            if doc.nickname_taken(nickname, id) {
                return Err(CoreError::NicknameTaken(nickname.to_string()));
            }
            let session = doc.session_mut(id).ok_or_else(|| CoreError::not_found("session", id.as_str()))?;
            session.nickname = Some(nickname.to_string());
            Ok(())
        })
    }

    /// `IsRunning(sessionId)`.
    pub async fn is_running(&self, id: &SessionId) -> Result<bool, CoreError> {
        let tmux_name = tmux_name_of(id);
        self.adapter.has_session(&tmux_name).await.map_err(tmux_err)
    }

    /// Forwards raw bytes typed into a viewer to the pane's tmux session,
    /// the local-session counterpart to sending keys over a remote
    /// connection's control-mode multiplexer.
    pub async fn send_input(&self, id: &SessionId, data: &str) -> Result<(), CoreError> {
        let tmux_name = tmux_name_of(id);
        self.adapter.send_keys_literal(&tmux_name, data).await.map_err(tmux_err)
    }

    /// On daemon start, reconciles persisted sessions against the live tmux
    /// server. Absent sessions are retained in state for review, not deleted.
    pub async fn rediscover(&self) -> Result<Vec<SessionId>, CoreError> {
        let ids: Vec<SessionId> = self.state.snapshot().sessions.iter().map(|s| s.id.clone()).collect();
        let mut running = Vec::new();
        for id in ids {
            let tmux_name = tmux_name_of(&id);
            if self.adapter.has_session(&tmux_name).await.map_err(tmux_err)? {
                running.push(id);
            }
        }
        Ok(running)
    }

    /// Rotation sequence: stop piping, truncate to the last
    /// `rotated_log_size` bytes, restart piping. Called by the streamer
    /// when a new viewer attaches to an over-threshold log.
    pub async fn rotate_log(&self, tmux_name: &str, log_path: &Path) -> Result<(), CoreError> {
        self.adapter.pipe_pane_stop(tmux_name).await.map_err(tmux_err)?;
        truncate_to_tail(log_path, self.xterm.rotated_log_size_bytes())?;
        self.adapter.pipe_pane_start(tmux_name, log_path).await.map_err(tmux_err)?;
        Ok(())
    }

    /// Scans an appended output chunk for signal markers, updating the
    /// session's last-signal state and returning the stream with valid
    /// markers stripped (unknown-state markers pass through unchanged).
    pub fn scan_signals(&self, id: &SessionId, chunk: &str) -> String {
        let result = scan_for_signals(chunk);
        if let Some(state) = result.last_state {
            let id = id.clone();
            let now = now_ms();
            let _ = self.state.mutate(|doc| {
                if let Some(session) = doc.session_mut(&id) {
                    session.last_signal_state = Some(state);
                    session.last_signal_at_ms = Some(now);
                }
                Ok::<(), CoreError>(())
            });
        }
        result.stripped
    }
}

fn tmux_err(e: schmux_adapters::tmux::SessionError) -> CoreError {
    CoreError::TmuxFailure { op: e.to_string() }
}

fn tmux_name_of(id: &SessionId) -> String {
    format!("schmux-{}", id.as_str())
}

fn short_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

fn append_to_log(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    let mut file = std::fs::OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(bytes)
}

fn truncate_to_tail(path: &Path, keep_bytes: u64) -> Result<(), CoreError> {
    use std::io::{Read, Seek, SeekFrom, Write};
    let mut file = std::fs::OpenOptions::new().read(true).write(true).open(path).map_err(|e| CoreError::Internal(e.to_string()))?;
    let len = file.metadata().map_err(|e| CoreError::Internal(e.to_string()))?.len();
    if len <= keep_bytes {
        return Ok(());
    }
    let start = len - keep_bytes;
    file.seek(SeekFrom::Start(start)).map_err(|e| CoreError::Internal(e.to_string()))?;
    let mut tail = Vec::with_capacity(keep_bytes as usize);
    file.read_to_end(&mut tail).map_err(|e| CoreError::Internal(e.to_string()))?;
    file.set_len(0).map_err(|e| CoreError::Internal(e.to_string()))?;
    file.seek(SeekFrom::Start(0)).map_err(|e| CoreError::Internal(e.to_string()))?;
    file.write_all(&tail).map_err(|e| CoreError::Internal(e.to_string()))?;
    Ok(())
}

fn scan_for_signals(chunk: &str) -> ScanResult {
    let re = marker_regex();
    let mut last_state = None;
    let mut stripped = String::with_capacity(chunk.len());
    let mut last_end = 0;
    for caps in re.captures_iter(chunk) {
        let whole = caps.get(0).unwrap();
        stripped.push_str(&chunk[last_end..whole.start()]);
        last_end = whole.end();

        let token = caps.get(1).or_else(|| caps.get(3)).map(|m| m.as_str()).unwrap_or("");
        match SignalState::parse(token) {
            Some(state) => {
                last_state = Some(state);
                // valid marker: stripped from the forwarded stream
            }
            None => {
                // unknown state: pass through unchanged
                stripped.push_str(whole.as_str());
            }
        }
    }
    stripped.push_str(&chunk[last_end..]);
    ScanResult { stripped, last_state }
}

#[cfg(test)]
#[path = "session_engine_tests.rs"]
mod tests;
