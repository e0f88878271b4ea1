// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Spawn target.
//!
//! Represented as a tagged variant rather than duck-typed per-caller
//! branching: the session engine dispatches on `kind` alone, and adding a
//! new kind is a table edit, not a new code path threaded through callers.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// How the agent process should be invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetKind {
    /// A long-lived interactive agent the user drives from the terminal.
    Interactive,
    /// A single invocation expected to exit, typically with JSON output.
    Oneshot,
    /// Reattach/continue a previous invocation (e.g. `claude --resume`).
    Resume,
}

/// A fully-resolved command to spawn inside a pane.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub command_parts: Vec<String>,
    #[serde(default)]
    pub env: HashMap<String, String>,
    /// Whether a prompt must be typed into the pane after spawn (§4.2 step 7).
    #[serde(default)]
    pub promptable: bool,
}

impl Target {
    /// Render the command as a single shell-ready string, joining the
    /// resolved parts with spaces. Individual parts are expected to already
    /// be shell-safe (callers quote user-controlled segments before adding
    /// them to `command_parts`).
    pub fn command_line(&self) -> String {
        self.command_parts.join(" ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_joins_parts() {
        let target = Target {
            kind: TargetKind::Oneshot,
            command_parts: vec!["claude".into(), "--output-format".into(), "json".into()],
            env: HashMap::new(),
            promptable: false,
        };
        assert_eq!(target.command_line(), "claude --output-format json");
    }
}
