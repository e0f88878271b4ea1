// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use schmux_core::{GitStatus, WorkspaceKind};

fn workspace(id: &str) -> Workspace {
    Workspace {
        id: WorkspaceId::new(id),
        repo: "git@host:u/r.git".into(),
        branch: "main".into(),
        path: PathBuf::from(format!("/tmp/{id}")),
        kind: WorkspaceKind::Worktree,
        remote_host_id: None,
        remote_path: None,
        created_at_ms: 0,
        updated_at_ms: 0,
        git_status: GitStatus::default(),
    }
}

#[test]
fn next_workspace_seq_starts_at_one() {
    let doc = StateDocument::new(PathBuf::from("/tmp/ws"), PathBuf::from("/tmp/base"));
    assert_eq!(doc.next_workspace_seq("r"), 1);
}

#[test]
fn next_workspace_seq_fills_gaps() {
    let mut doc = StateDocument::new(PathBuf::from("/tmp/ws"), PathBuf::from("/tmp/base"));
    doc.workspaces.push(workspace("r-001"));
    doc.workspaces.push(workspace("r-003"));
    assert_eq!(doc.next_workspace_seq("r"), 2);
}

#[test]
fn next_workspace_seq_is_per_repo_name() {
    let mut doc = StateDocument::new(PathBuf::from("/tmp/ws"), PathBuf::from("/tmp/base"));
    doc.workspaces.push(workspace("r-001"));
    assert_eq!(doc.next_workspace_seq("other"), 1);
}

#[test]
fn save_and_load_round_trips() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let store =
        StateStore::load_or_init(path.clone(), PathBuf::from("/tmp/ws"), PathBuf::from("/tmp/base"))
            .unwrap();
    store
        .mutate::<_, StateError>(|doc| {
            doc.workspaces.push(workspace("r-001"));
            Ok(())
        })
        .unwrap();

    let reloaded =
        StateStore::load_or_init(path, PathBuf::from("/tmp/ws"), PathBuf::from("/tmp/base"))
            .unwrap();
    let snap = reloaded.snapshot();
    assert_eq!(snap.workspaces.len(), 1);
    assert_eq!(snap.workspaces[0].id, WorkspaceId::new("r-001"));
}

#[test]
fn failed_mutation_leaves_document_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.json");
    let store =
        StateStore::load_or_init(path, PathBuf::from("/tmp/ws"), PathBuf::from("/tmp/base"))
            .unwrap();
    store
        .mutate::<_, StateError>(|doc| {
            doc.workspaces.push(workspace("r-001"));
            Ok(())
        })
        .unwrap();

    let before = store.snapshot();
    let result: Result<(), StateError> = store.mutate(|doc| {
        doc.workspaces.push(workspace("r-002"));
        Err(StateError::WorkspaceNotFound("boom".into()))
    });
    assert!(result.is_err());
    let after = store.snapshot();
    assert_eq!(before.workspaces.len(), after.workspaces.len());
    assert_eq!(after.workspaces.len(), 1);
}

#[test]
fn nickname_uniqueness_excludes_self() {
    let mut doc = StateDocument::new(PathBuf::from("/tmp/ws"), PathBuf::from("/tmp/base"));
    let session = make_session("r-001-aaa", Some("bob"));
    doc.sessions.push(session);
    assert!(doc.nickname_taken("bob", &SessionId::new("other")));
    assert!(!doc.nickname_taken("bob", &SessionId::new("r-001-aaa")));
}

fn make_session(id: &str, nickname: Option<&str>) -> Session {
    Session {
        id: SessionId::new(id),
        workspace_id: WorkspaceId::new("r-001"),
        target: schmux_core::Target {
            kind: schmux_core::target::TargetKind::Interactive,
            command_parts: vec!["claude".into()],
            env: Default::default(),
            promptable: false,
        },
        nickname: nickname.map(|s| s.to_string()),
        created_at_ms: 0,
        last_output_at_ms: 0,
        last_signal_state: None,
        last_signal_at_ms: None,
        remote_host_id: None,
        remote_pane_id: None,
        log_path: PathBuf::from("/tmp/r-001-aaa.log"),
    }
}
