// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Reloadable configuration store.
//!
//! Holds the current `Config` plus per-workspace `.schmux/config.json`
//! overlays. Reload is explicit (`reload()`) rather than restart-triggered;
//! `schmux_daemon::tasks` wires a `notify` watcher on the config path to
//! call it whenever the file changes.

use parking_lot::RwLock;
use schmux_core::config::WorkspaceConfigOverlay;
use schmux_core::Config;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(String),
}

pub struct ConfigStore {
    path: PathBuf,
    current: RwLock<Config>,
}

impl ConfigStore {
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let config = Self::read_config(&path)?;
        Ok(Self {
            path,
            current: RwLock::new(config),
        })
    }

    fn read_config(path: &Path) -> Result<Config, ConfigError> {
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("toml") => toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string())),
            _ => serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string())),
        }
    }

    /// Re-read the config document from disk without restarting the daemon.
    pub fn reload(&self) -> Result<(), ConfigError> {
        let config = Self::read_config(&self.path)?;
        *self.current.write() = config;
        Ok(())
    }

    pub fn current(&self) -> Config {
        self.current.read().clone()
    }

    /// The config document this store reads and reloads from, used by the
    /// daemon to point a filesystem watcher at the right file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load a workspace's `.schmux/config.json` overlay, if present.
    pub fn workspace_overlay(workspace_path: &Path) -> WorkspaceConfigOverlay {
        let overlay_path = workspace_path.join(".schmux").join("config.json");
        let Ok(content) = fs::read_to_string(&overlay_path) else {
            return WorkspaceConfigOverlay::default();
        };
        serde_json::from_str(&content).unwrap_or_default()
    }

    /// Effective `quick_launch` list for a workspace: global entries merged
    /// with that workspace's overlay.
    pub fn quick_launch_for_workspace(&self, workspace_path: &Path) -> Vec<schmux_core::config::QuickLaunch> {
        let overlay = Self::workspace_overlay(workspace_path);
        self.current.read().quick_launch_with_overlay(&overlay)
    }
}
