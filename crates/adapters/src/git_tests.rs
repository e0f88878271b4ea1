// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::process::Command as StdCommand;
use tempfile::tempdir;

fn git_available() -> bool {
    StdCommand::new("git").arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
}

#[tokio::test]
async fn clone_bare_then_worktree_add_round_trips() {
    if !git_available() {
        return;
    }
    let origin_dir = tempdir().unwrap();
    let origin_path = origin_dir.path().join("origin");
    assert!(StdCommand::new("git")
        .args(["init", "--initial-branch=main"])
        .arg(&origin_path)
        .status()
        .unwrap()
        .success());
    std::fs::write(origin_path.join("README.md"), "hi").unwrap();
    assert!(StdCommand::new("git")
        .current_dir(&origin_path)
        .args(["-c", "user.email=a@b.c", "-c", "user.name=a", "add", "."])
        .status()
        .unwrap()
        .success());
    assert!(StdCommand::new("git")
        .current_dir(&origin_path)
        .args(["-c", "user.email=a@b.c", "-c", "user.name=a", "commit", "-m", "init"])
        .status()
        .unwrap()
        .success());

    let bare_dir = tempdir().unwrap();
    let bare_path = bare_dir.path().join("repo.git");
    let adapter = GitAdapter::new();
    adapter
        .clone_bare(&format!("file://{}", origin_path.display()), &bare_path)
        .await
        .unwrap();

    assert!(adapter.remote_branch_exists(&bare_path, "main").await.unwrap());
    assert!(!adapter.branch_in_use(&bare_path, "main").await.unwrap());

    let worktree_dir = tempdir().unwrap();
    let worktree_path = worktree_dir.path().join("wt");
    adapter
        .worktree_add(&bare_path, &worktree_path, "feature/x", false)
        .await
        .unwrap();
    assert!(worktree_path.join("README.md").exists());

    adapter.worktree_remove(&bare_path, &worktree_path).await.unwrap();
}

#[tokio::test]
async fn status_reports_clean_repo() {
    if !git_available() {
        return;
    }
    let dir = tempdir().unwrap();
    assert!(StdCommand::new("git")
        .args(["init", "--initial-branch=main"])
        .arg(dir.path())
        .status()
        .unwrap()
        .success());
    std::fs::write(dir.path().join("a.txt"), "hi").unwrap();
    StdCommand::new("git")
        .current_dir(dir.path())
        .args(["-c", "user.email=a@b.c", "-c", "user.name=a", "add", "."])
        .status()
        .unwrap();
    StdCommand::new("git")
        .current_dir(dir.path())
        .args(["-c", "user.email=a@b.c", "-c", "user.name=a", "commit", "-m", "init"])
        .status()
        .unwrap();

    let adapter = GitAdapter::new();
    let status = adapter.status(dir.path()).await.unwrap();
    assert!(!status.dirty);
    assert_eq!(status.files_changed, 0);
}
