//! Scenario 1: worktree create then conflict.

use crate::prelude::*;

#[tokio::test]
async fn create_then_branch_conflict_reports_existing_workspace() {
    if !git_available() {
        eprintln!("skipping: git not available");
        return;
    }
    let fixture = make_workspace_fixture();

    let first = fixture.engine.create(&fixture.origin_url, "main", scm_mode_worktree()).await.unwrap();
    assert!(first.id.as_str().ends_with("-001"));

    let (conflict, existing) =
        fixture.engine.check_branch_conflict(&fixture.origin_url, "main", scm_mode_worktree()).await.unwrap();
    assert!(conflict);
    assert_eq!(existing.as_ref().map(|id| id.as_str()), Some(first.id.as_str()));

    let err = fixture.engine.create(&fixture.origin_url, "main", scm_mode_worktree()).await.unwrap_err();
    match err {
        schmux_core::error::CoreError::BranchConflict { existing_workspace_id } => {
            assert_eq!(existing_workspace_id, first.id.as_str());
        }
        other => panic!("expected BranchConflict, got {other:?}"),
    }
}

#[tokio::test]
async fn full_clone_mode_does_not_conflict_on_reused_branch() {
    if !git_available() {
        eprintln!("skipping: git not available");
        return;
    }
    let fixture = make_workspace_fixture();

    let first = fixture.engine.create(&fixture.origin_url, "main", schmux_core::config::ScmMode::Git).await.unwrap();
    let second = fixture.engine.create(&fixture.origin_url, "main", schmux_core::config::ScmMode::Git).await.unwrap();
    assert_ne!(first.id.as_str(), second.id.as_str());
}

#[tokio::test]
async fn check_branch_conflict_is_mode_gated() {
    if !git_available() {
        eprintln!("skipping: git not available");
        return;
    }
    let fixture = make_workspace_fixture();

    // A worktree workspace leaves a bare repo on disk that a later
    // full-clone-mode check must not treat as a conflict.
    fixture.engine.create(&fixture.origin_url, "main", scm_mode_worktree()).await.unwrap();

    let (conflict, existing) = fixture
        .engine
        .check_branch_conflict(&fixture.origin_url, "main", schmux_core::config::ScmMode::Git)
        .await
        .unwrap();
    assert!(!conflict);
    assert!(existing.is_none());
}
