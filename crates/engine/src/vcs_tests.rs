// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn git_log_command_includes_max_count_and_format() {
    let cmd = GitVcs.log_command(20);
    assert!(cmd.contains("-n 20"));
    assert!(cmd.contains("%H|%h|%s|%an|%aI|%P"));
}

#[test]
fn parse_log_splits_pipe_delimited_fields() {
    let output = "abcdef1234|abcdef1|fix bug|Jane Doe|2026-07-01T10:00:00+00:00|parent1 parent2";
    let entries = GitVcs.parse_log(output);
    assert_eq!(entries.len(), 1);
    let entry = &entries[0];
    assert_eq!(entry.hash, "abcdef1234");
    assert_eq!(entry.short, "abcdef1");
    assert_eq!(entry.subject, "fix bug");
    assert_eq!(entry.author, "Jane Doe");
    assert_eq!(entry.parents, vec!["parent1", "parent2"]);
}

#[test]
fn parse_log_skips_blank_lines() {
    let output = "a|b|c|d|e|f\n\n\ng|h|i|j|k|l";
    let entries = GitVcs.parse_log(output);
    assert_eq!(entries.len(), 2);
}

#[test]
fn parse_log_handles_commit_with_no_parents() {
    let output = "a|b|initial commit|jane|2026-01-01|";
    let entries = GitVcs.parse_log(output);
    assert_eq!(entries.len(), 1);
    assert!(entries[0].parents.is_empty());
}

#[test]
fn sapling_diff_command_uses_rev_flag() {
    assert_eq!(SaplingVcs.diff_command(Some("abc123")), "sl diff -r abc123");
    assert_eq!(SaplingVcs.diff_command(None), "sl diff");
}

#[test]
fn for_kind_dispatches_to_correct_implementation() {
    assert!(for_kind(VcsKind::Git).status_command().starts_with("git"));
    assert!(for_kind(VcsKind::Sapling).status_command().starts_with("sl"));
}
