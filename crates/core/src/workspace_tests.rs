// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn repo_name_strips_git_suffix() {
    assert_eq!(Workspace::repo_name("git@host:u/r.git"), "r");
    assert_eq!(Workspace::repo_name("https://host/u/r"), "r");
    assert_eq!(Workspace::repo_name("https://host/u/r/"), "r");
}

#[test]
fn local_pseudo_repo_detected() {
    assert!(Workspace::is_local_pseudo_repo("local:scratch"));
    assert!(!Workspace::is_local_pseudo_repo("git@host:u/r.git"));
}

#[test]
fn branch_names_accepted() {
    for name in ["a", "a/b", "a-b.c_d"] {
        assert!(validate_branch_name(name), "{name} should be accepted");
    }
}

#[test]
fn branch_names_rejected() {
    for name in ["/a", "a//b", "a-", "..", "a.."] {
        assert!(!validate_branch_name(name), "{name} should be rejected");
    }
}
