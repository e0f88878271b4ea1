// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory `SessionAdapter` for engine unit tests (feature `test-support`).

use crate::tmux::{SessionAdapter, SessionError};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
struct FakeSession {
    alive: bool,
    piping: bool,
    log_path: Option<PathBuf>,
    captured: String,
}

#[derive(Clone, Default)]
pub struct FakeSessionAdapter {
    sessions: Arc<Mutex<HashMap<String, FakeSession>>>,
}

impl FakeSessionAdapter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn inject_capture(&self, name: &str, text: &str) {
        let mut sessions = self.sessions.lock();
        sessions.entry(name.to_string()).or_default().captured = text.to_string();
    }

    pub fn kill_externally(&self, name: &str) {
        if let Some(s) = self.sessions.lock().get_mut(name) {
            s.alive = false;
        }
    }
}

#[async_trait]
impl SessionAdapter for FakeSessionAdapter {
    async fn new_session(
        &self,
        name: &str,
        _cwd: &Path,
        _cmd: &str,
        _env: &[(String, String)],
        _width: u16,
        _height: u16,
    ) -> Result<(), SessionError> {
        self.sessions.lock().insert(
            name.to_string(),
            FakeSession {
                alive: true,
                ..Default::default()
            },
        );
        Ok(())
    }

    async fn has_session(&self, name: &str) -> Result<bool, SessionError> {
        Ok(self.sessions.lock().get(name).map(|s| s.alive).unwrap_or(false))
    }

    async fn kill_session(&self, name: &str) -> Result<(), SessionError> {
        self.sessions.lock().remove(name);
        Ok(())
    }

    async fn send_keys_literal(&self, name: &str, _text: &str) -> Result<(), SessionError> {
        self.require_alive(name)
    }

    async fn send_enter(&self, name: &str) -> Result<(), SessionError> {
        self.require_alive(name)
    }

    async fn pipe_pane_start(&self, name: &str, log_path: &Path) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(name)
            .ok_or_else(|| SessionError::NotFound(name.to_string()))?;
        session.piping = true;
        session.log_path = Some(log_path.to_path_buf());
        Ok(())
    }

    async fn pipe_pane_stop(&self, name: &str) -> Result<(), SessionError> {
        let mut sessions = self.sessions.lock();
        let session = sessions
            .get_mut(name)
            .ok_or_else(|| SessionError::NotFound(name.to_string()))?;
        session.piping = false;
        Ok(())
    }

    async fn capture_pane(&self, name: &str, _lines: u32) -> Result<String, SessionError> {
        let sessions = self.sessions.lock();
        sessions
            .get(name)
            .map(|s| s.captured.clone())
            .ok_or_else(|| SessionError::NotFound(name.to_string()))
    }

    async fn list_sessions(&self) -> Result<Vec<String>, SessionError> {
        Ok(self
            .sessions
            .lock()
            .iter()
            .filter(|(_, s)| s.alive)
            .map(|(name, _)| name.clone())
            .collect())
    }
}

impl FakeSessionAdapter {
    fn require_alive(&self, name: &str) -> Result<(), SessionError> {
        if self.sessions.lock().get(name).map(|s| s.alive).unwrap_or(false) {
            Ok(())
        } else {
            Err(SessionError::NotFound(name.to_string()))
        }
    }
}
