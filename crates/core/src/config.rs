// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! User configuration schema.
//!
//! Loaded by `schmux-storage::config_store` from a user-editable JSON/TOML
//! document plus per-workspace `.schmux/config.json` overlays for
//! `quick_launch`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ScmMode {
    GitWorktree,
    Git,
}

impl Default for ScmMode {
    fn default() -> Self {
        ScmMode::GitWorktree
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepoDef {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunTargetKind {
    Promptable,
    Command,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTarget {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: RunTargetKind,
    pub command: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDef {
    pub name: String,
    pub tool: String,
    #[serde(default)]
    pub env: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuickLaunch {
    pub name: String,
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub prompt: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VcsKind {
    Git,
    Sapling,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteFlavor {
    pub id: String,
    pub flavor: String,
    pub display_name: String,
    pub vcs: VcsKind,
    pub workspace_path: String,
    pub connect_command: String,
    #[serde(default)]
    pub reconnect_command: Option<String>,
    #[serde(default)]
    pub provision_command: Option<String>,
    #[serde(default)]
    pub hostname_regex: Option<String>,
    #[serde(default)]
    pub vscode_command_template: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct TerminalConfig {
    pub width: u16,
    pub height: u16,
    pub seed_lines: u32,
    pub bootstrap_lines: u32,
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            width: 220,
            height: 50,
            seed_lines: 200,
            bootstrap_lines: 2000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct SessionsConfig {
    pub dashboard_poll_interval_ms: u64,
    pub git_status_poll_interval_ms: u64,
    pub git_clone_timeout_ms: u64,
    pub git_status_timeout_ms: u64,
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            dashboard_poll_interval_ms: 1_000,
            git_status_poll_interval_ms: 5_000,
            git_clone_timeout_ms: 60_000,
            git_status_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct XtermConfig {
    pub mtime_poll_interval_ms: u64,
    pub query_timeout_ms: u64,
    pub operation_timeout_ms: u64,
    pub max_log_size_mb: u64,
    pub rotated_log_size_mb: u64,
}

impl Default for XtermConfig {
    fn default() -> Self {
        Self {
            mtime_poll_interval_ms: 150,
            query_timeout_ms: 5_000,
            operation_timeout_ms: 10_000,
            max_log_size_mb: 10,
            rotated_log_size_mb: 2,
        }
    }
}

impl XtermConfig {
    pub fn max_log_size_bytes(&self) -> u64 {
        self.max_log_size_mb * 1024 * 1024
    }

    pub fn rotated_log_size_bytes(&self) -> u64 {
        self.rotated_log_size_mb * 1024 * 1024
    }
}

/// Top-level user configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub workspace_path: PathBuf,
    #[serde(default)]
    pub source_code_management: ScmMode,
    #[serde(default)]
    pub repos: Vec<RepoDef>,
    #[serde(default)]
    pub run_targets: Vec<RunTarget>,
    #[serde(default)]
    pub models: Vec<ModelDef>,
    #[serde(default)]
    pub quick_launch: Vec<QuickLaunch>,
    #[serde(default)]
    pub external_diff_commands: HashMap<String, String>,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default)]
    pub sessions: SessionsConfig,
    #[serde(default)]
    pub xterm: XtermConfig,
    #[serde(default)]
    pub remote_flavors: Vec<RemoteFlavor>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            workspace_path: PathBuf::from("~/schmux/workspaces"),
            source_code_management: ScmMode::default(),
            repos: Vec::new(),
            run_targets: Vec::new(),
            models: Vec::new(),
            quick_launch: Vec::new(),
            external_diff_commands: HashMap::new(),
            terminal: TerminalConfig::default(),
            sessions: SessionsConfig::default(),
            xterm: XtermConfig::default(),
            remote_flavors: Vec::new(),
        }
    }
}

/// Per-workspace `.schmux/config.json` overlay: adds/overrides
/// `quick_launch` entries by name.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WorkspaceConfigOverlay {
    #[serde(default)]
    pub quick_launch: Vec<QuickLaunch>,
}

impl Config {
    /// Merge a workspace overlay's `quick_launch` entries into the global
    /// list, overriding global entries that share a name.
    pub fn quick_launch_with_overlay(&self, overlay: &WorkspaceConfigOverlay) -> Vec<QuickLaunch> {
        let mut by_name: HashMap<String, QuickLaunch> = self
            .quick_launch
            .iter()
            .cloned()
            .map(|q| (q.name.clone(), q))
            .collect();
        for entry in &overlay.quick_launch {
            by_name.insert(entry.name.clone(), entry.clone());
        }
        let mut merged: Vec<QuickLaunch> = by_name.into_values().collect();
        merged.sort_by(|a, b| a.name.cmp(&b.name));
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn overlay_overrides_by_name() {
        let mut config = Config::default();
        config.quick_launch.push(QuickLaunch {
            name: "fix".into(),
            target: Some("claude".into()),
            prompt: Some("fix it".into()),
            command: None,
        });
        let overlay = WorkspaceConfigOverlay {
            quick_launch: vec![QuickLaunch {
                name: "fix".into(),
                target: Some("claude".into()),
                prompt: Some("fix it better".into()),
                command: None,
            }],
        };
        let merged = config.quick_launch_with_overlay(&overlay);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].prompt.as_deref(), Some("fix it better"));
    }

    #[test]
    fn overlay_adds_new_entries() {
        let config = Config::default();
        let overlay = WorkspaceConfigOverlay {
            quick_launch: vec![QuickLaunch {
                name: "local-only".into(),
                target: None,
                prompt: None,
                command: Some("echo hi".into()),
            }],
        };
        let merged = config.quick_launch_with_overlay(&overlay);
        assert_eq!(merged.len(), 1);
        assert_eq!(merged[0].name, "local-only");
    }
}
