// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use schmux_adapters::FakeSessionAdapter;
use schmux_core::target::TargetKind;
use schmux_core::workspace::{GitStatus, Workspace, WorkspaceKind};
use tempfile::tempdir;

fn make_target(promptable: bool) -> Target {
    Target {
        kind: TargetKind::Interactive,
        command_parts: vec!["claude".to_string()],
        env: Default::default(),
        promptable,
    }
}

struct Fixture {
    _root: tempfile::TempDir,
    adapter: Arc<FakeSessionAdapter>,
    engine: SessionEngine,
    workspace_id: WorkspaceId,
}

fn make_fixture() -> Fixture {
    let root = tempdir().unwrap();
    let state = Arc::new(
        StateStore::load_or_init(
            root.path().join("state.json"),
            root.path().join("workspaces"),
            root.path().join("repos"),
        )
        .unwrap(),
    );

    let workspace_id = WorkspaceId::new("repo-001");
    let workspace_path = root.path().join("workspaces").join("repo-001");
    std::fs::create_dir_all(&workspace_path).unwrap();
    state
        .mutate(|doc| {
            doc.workspaces.push(Workspace {
                id: workspace_id.clone(),
                repo: "git@host:u/repo.git".into(),
                branch: "main".into(),
                path: workspace_path,
                kind: WorkspaceKind::Worktree,
                remote_host_id: None,
                remote_path: None,
                created_at_ms: 0,
                updated_at_ms: 0,
                git_status: GitStatus::default(),
            });
            Ok::<(), CoreError>(())
        })
        .unwrap();

    let adapter = Arc::new(FakeSessionAdapter::new());
    let engine = SessionEngine::new(
        adapter.clone(),
        state,
        root.path().join("logs"),
        TerminalConfig::default(),
        XtermConfig::default(),
    );

    Fixture {
        _root: root,
        adapter,
        engine,
        workspace_id,
    }
}

#[tokio::test]
async fn spawn_persists_session_and_starts_piping() {
    let fx = make_fixture();
    let outcome = fx.engine.spawn(&fx.workspace_id, make_target(false), SessionOpts::default()).await.unwrap();

    assert!(fx.engine.is_running(&outcome.session.id).await.unwrap());
    assert!(outcome.session.log_path.exists());
}

#[tokio::test]
async fn spawn_requires_prompt_for_promptable_target() {
    let fx = make_fixture();
    let err = fx.engine.spawn(&fx.workspace_id, make_target(true), SessionOpts::default()).await.unwrap_err();
    assert!(matches!(err, CoreError::Internal(_)));
}

#[tokio::test]
async fn spawn_sends_prompt_for_promptable_target() {
    let fx = make_fixture();
    let opts = SessionOpts { prompt: Some("do the thing".to_string()) };
    let outcome = fx.engine.spawn(&fx.workspace_id, make_target(true), opts).await.unwrap();
    assert!(fx.engine.is_running(&outcome.session.id).await.unwrap());
}

#[tokio::test]
async fn spawn_rejects_unknown_workspace() {
    let fx = make_fixture();
    let err = fx
        .engine
        .spawn(&WorkspaceId::new("missing"), make_target(false), SessionOpts::default())
        .await
        .unwrap_err();
    assert!(matches!(err, CoreError::NotFound(_)));
}

#[tokio::test]
async fn dispose_kills_session_and_removes_log_and_state() {
    let fx = make_fixture();
    let outcome = fx.engine.spawn(&fx.workspace_id, make_target(false), SessionOpts::default()).await.unwrap();
    let log_path = outcome.session.log_path.clone();

    fx.engine.dispose(&outcome.session.id).await.unwrap();

    assert!(!fx.engine.is_running(&outcome.session.id).await.unwrap());
    assert!(!log_path.exists());
    assert!(fx.engine.state.snapshot().sessions.is_empty());
}

#[tokio::test]
async fn dispose_is_idempotent_on_missing_tmux_session() {
    let fx = make_fixture();
    let outcome = fx.engine.spawn(&fx.workspace_id, make_target(false), SessionOpts::default()).await.unwrap();
    fx.adapter.kill_externally(&tmux_name_of(&outcome.session.id));

    fx.engine.dispose(&outcome.session.id).await.unwrap();
    assert!(fx.engine.state.snapshot().sessions.is_empty());
}

#[tokio::test]
async fn send_input_forwards_to_running_session() {
    let fx = make_fixture();
    let outcome = fx.engine.spawn(&fx.workspace_id, make_target(false), SessionOpts::default()).await.unwrap();
    fx.engine.send_input(&outcome.session.id, "echo hi\n").await.unwrap();
}

#[tokio::test]
async fn send_input_fails_once_session_is_gone() {
    let fx = make_fixture();
    let outcome = fx.engine.spawn(&fx.workspace_id, make_target(false), SessionOpts::default()).await.unwrap();
    fx.adapter.kill_externally(&tmux_name_of(&outcome.session.id));

    let err = fx.engine.send_input(&outcome.session.id, "echo hi\n").await.unwrap_err();
    assert!(matches!(err, CoreError::TmuxFailure { .. }));
}

#[tokio::test]
async fn rename_rejects_duplicate_nickname() {
    let fx = make_fixture();
    let a = fx.engine.spawn(&fx.workspace_id, make_target(false), SessionOpts::default()).await.unwrap();
    let b = fx.engine.spawn(&fx.workspace_id, make_target(false), SessionOpts::default()).await.unwrap();

    fx.engine.rename(&a.session.id, "nickname").await.unwrap();
    let err = fx.engine.rename(&b.session.id, "nickname").await.unwrap_err();
    assert!(matches!(err, CoreError::NicknameTaken(_)));
}

#[tokio::test]
async fn rediscover_keeps_live_sessions_and_skips_dead_ones() {
    let fx = make_fixture();
    let alive = fx.engine.spawn(&fx.workspace_id, make_target(false), SessionOpts::default()).await.unwrap();
    let dead = fx.engine.spawn(&fx.workspace_id, make_target(false), SessionOpts::default()).await.unwrap();
    fx.adapter.kill_externally(&tmux_name_of(&dead.session.id));

    let running = fx.engine.rediscover().await.unwrap();
    assert_eq!(running, vec![alive.session.id]);
    // Dead session is retained in state for review, not removed.
    assert_eq!(fx.engine.state.snapshot().sessions.len(), 2);
}

#[test]
fn scan_signals_strips_valid_marker_and_updates_state() {
    let fx = make_fixture();
    let chunk = "hello --<[schmux:completed:all done]>-- world";
    // No session exists yet; exercise the pure parsing path directly.
    let result = scan_for_signals(chunk);
    assert_eq!(result.stripped, "hello  world");
    assert_eq!(result.last_state, Some(SignalState::Completed));
    let _ = fx;
}

#[test]
fn scan_signals_passes_through_unknown_state_marker() {
    let chunk = "--<[schmux:frobnicating:x]>--";
    let result = scan_for_signals(chunk);
    assert_eq!(result.stripped, chunk);
    assert_eq!(result.last_state, None);
}

#[test]
fn scan_signals_recognizes_osc_777() {
    let chunk = "before \x1b]777;notify;needs_input;waiting\x07 after";
    let result = scan_for_signals(chunk);
    assert_eq!(result.stripped, "before  after");
    assert_eq!(result.last_state, Some(SignalState::NeedsInput));
}

#[test]
fn truncate_to_tail_keeps_last_n_bytes() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");
    std::fs::write(&path, "0123456789").unwrap();
    truncate_to_tail(&path, 4).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "6789");
}

#[test]
fn truncate_to_tail_is_noop_when_already_short() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("log.txt");
    std::fs::write(&path, "abc").unwrap();
    truncate_to_tail(&path, 10).unwrap();
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "abc");
}
