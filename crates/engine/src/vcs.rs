// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Thin VCS command-string abstraction used by the remote read path.
//!
//! The remote manager runs these command strings through `RunCommand`
//! inside the control-mode multiplexer rather than spawning a local
//! process, so the only VCS-specific code lives here: building the
//! command and parsing its pipe-delimited output.

use schmux_core::config::VcsKind;

/// One entry of a pipe-delimited `hash|short|subject|author|iso-date|parents`
/// log line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitEntry {
    pub hash: String,
    pub short: String,
    pub subject: String,
    pub author: String,
    pub date: String,
    pub parents: Vec<String>,
}

const LOG_FORMAT: &str = "%H|%h|%s|%an|%aI|%P";

/// Builds command strings for one VCS flavor; implementations never spawn a
/// process themselves, they only produce the string the caller runs via
/// `ControlModeClient::run_command`.
pub trait VcsCommands: Send + Sync {
    fn log_command(&self, max_count: u32) -> String;
    fn diff_command(&self, rev: Option<&str>) -> String;
    fn status_command(&self) -> String;

    /// Parses the stdout of `log_command` into commit entries, skipping
    /// any blank or malformed lines rather than failing the whole batch.
    fn parse_log(&self, output: &str) -> Vec<CommitEntry> {
        output.lines().filter_map(parse_log_line).collect()
    }
}

fn parse_log_line(line: &str) -> Option<CommitEntry> {
    if line.trim().is_empty() {
        return None;
    }
    let mut fields = line.splitn(6, '|');
    let hash = fields.next()?.to_string();
    let short = fields.next()?.to_string();
    let subject = fields.next()?.to_string();
    let author = fields.next()?.to_string();
    let date = fields.next()?.to_string();
    let parents = fields
        .next()
        .unwrap_or("")
        .split_whitespace()
        .map(|p| p.to_string())
        .collect();
    Some(CommitEntry {
        hash,
        short,
        subject,
        author,
        date,
        parents,
    })
}

/// `git log --format=...`.
pub struct GitVcs;

impl VcsCommands for GitVcs {
    fn log_command(&self, max_count: u32) -> String {
        format!("git log -n {max_count} --format='{LOG_FORMAT}'")
    }

    fn diff_command(&self, rev: Option<&str>) -> String {
        match rev {
            Some(rev) => format!("git diff {rev}"),
            None => "git diff HEAD".to_string(),
        }
    }

    fn status_command(&self) -> String {
        "git status --porcelain=v1".to_string()
    }
}

/// `sl log --template=...` (Sapling's format string uses the same
/// field order, joined with `|`, one commit per line).
pub struct SaplingVcs;

impl VcsCommands for SaplingVcs {
    fn log_command(&self, max_count: u32) -> String {
        format!(
            "sl log -l {max_count} -T '{{node}}|{{node|short}}|{{desc|firstline}}|{{author}}|{{date|isodate}}|{{parents % \"{{node}} \"}}\\n'"
        )
    }

    fn diff_command(&self, rev: Option<&str>) -> String {
        match rev {
            Some(rev) => format!("sl diff -r {rev}"),
            None => "sl diff".to_string(),
        }
    }

    fn status_command(&self) -> String {
        "sl status".to_string()
    }
}

pub fn for_kind(kind: VcsKind) -> Box<dyn VcsCommands> {
    match kind {
        VcsKind::Git => Box::new(GitVcs),
        VcsKind::Sapling => Box::new(SaplingVcs),
    }
}

#[cfg(test)]
#[path = "vcs_tests.rs"]
mod tests;
