//! Shared fixtures for the root-level end-to-end specs.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, dead_code)]

use std::path::Path;
use std::process::Command as StdCommand;
use std::sync::Arc;

use schmux_adapters::{FakeSessionAdapter, GitAdapter};
use schmux_core::config::{ScmMode, TerminalConfig, XtermConfig};
use schmux_engine::{SessionEngine, WorkspaceEngine};
use schmux_storage::StateStore;
use tempfile::TempDir;

pub fn git_available() -> bool {
    StdCommand::new("git").arg("--version").output().map(|o| o.status.success()).unwrap_or(false)
}

pub fn run_git(dir: &Path, args: &[&str]) {
    assert!(StdCommand::new("git").current_dir(dir).args(args).status().unwrap().success());
}

/// A bare-bones origin repo with one commit on `main` and a `.gitignore`
/// naming `env_file` (the overlay scenario needs something git already
/// ignores to stand in for `.env`).
pub fn make_origin() -> TempDir {
    let origin_dir = tempfile::tempdir().unwrap();
    run_git(origin_dir.path(), &["init", "--initial-branch=main"]);
    std::fs::write(origin_dir.path().join("README.md"), "hi").unwrap();
    std::fs::write(origin_dir.path().join(".gitignore"), "env_file\n").unwrap();
    run_git(origin_dir.path(), &["-c", "user.email=a@b.c", "-c", "user.name=a", "add", "."]);
    run_git(origin_dir.path(), &["-c", "user.email=a@b.c", "-c", "user.name=a", "commit", "-m", "init"]);
    origin_dir
}

pub struct WorkspaceFixture {
    pub _origin: TempDir,
    pub _root: TempDir,
    pub origin_url: String,
    pub overlay_root: std::path::PathBuf,
    pub engine: WorkspaceEngine,
}

pub fn make_workspace_fixture() -> WorkspaceFixture {
    let origin = make_origin();
    let origin_url = format!("file://{}", origin.path().display());

    let root = tempfile::tempdir().unwrap();
    let workspace_path = root.path().join("workspaces");
    let base_repos_path = root.path().join("repos");
    let overlay_root = root.path().join("overlays");
    std::fs::create_dir_all(&workspace_path).unwrap();
    std::fs::create_dir_all(&base_repos_path).unwrap();
    std::fs::create_dir_all(&overlay_root).unwrap();

    let state =
        Arc::new(StateStore::load_or_init(root.path().join("state.json"), workspace_path, base_repos_path).unwrap());
    let engine = WorkspaceEngine::new(GitAdapter::new(), state, overlay_root.clone());

    WorkspaceFixture { _origin: origin, _root: root, origin_url, overlay_root, engine }
}

pub struct SessionFixture {
    pub _root: TempDir,
    pub logs_path: std::path::PathBuf,
    pub state: Arc<StateStore>,
    pub adapter: FakeSessionAdapter,
    pub engine: SessionEngine,
}

impl SessionFixture {
    pub fn engine_log_path(&self, file_name: &str) -> std::path::PathBuf {
        self.logs_path.join(file_name)
    }
}

pub fn make_session_fixture() -> SessionFixture {
    let root = tempfile::tempdir().unwrap();
    let workspace_path = root.path().join("workspaces");
    let base_repos_path = root.path().join("repos");
    let logs_path = root.path().join("logs");
    std::fs::create_dir_all(&workspace_path).unwrap();
    std::fs::create_dir_all(&base_repos_path).unwrap();
    std::fs::create_dir_all(&logs_path).unwrap();

    let state =
        Arc::new(StateStore::load_or_init(root.path().join("state.json"), workspace_path, base_repos_path).unwrap());
    let adapter = FakeSessionAdapter::new();
    let engine = SessionEngine::new(
        Arc::new(adapter.clone()),
        state.clone(),
        logs_path.clone(),
        TerminalConfig::default(),
        XtermConfig::default(),
    );

    SessionFixture { _root: root, logs_path, state, adapter, engine }
}

pub fn scm_mode_worktree() -> ScmMode {
    ScmMode::GitWorktree
}
