//! Scenario 2: overlay files are gated on the workspace's `.gitignore`.

use crate::prelude::*;

#[tokio::test]
async fn overlay_only_copies_gitignored_files() {
    if !git_available() {
        eprintln!("skipping: git not available");
        return;
    }
    let fixture = make_workspace_fixture();

    let repo_name = schmux_core::workspace::Workspace::repo_name(&fixture.origin_url);
    let overlay_dir = fixture.overlay_root.join(&repo_name);
    std::fs::create_dir_all(&overlay_dir).unwrap();
    std::fs::write(overlay_dir.join("env_file"), "SECRET=1\n").unwrap();
    std::fs::write(overlay_dir.join("secret.txt"), "should not be copied\n").unwrap();

    let workspace = fixture.engine.create(&fixture.origin_url, "main", scm_mode_worktree()).await.unwrap();

    assert!(workspace.path.join("env_file").exists(), "ignored overlay file should be copied");
    assert_eq!(std::fs::read_to_string(workspace.path.join("env_file")).unwrap(), "SECRET=1\n");
    assert!(!workspace.path.join("secret.txt").exists(), "non-ignored overlay file must not be copied");
}
