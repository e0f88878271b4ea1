// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Idempotent, crash-safe creation and disposal of git worktrees and full
//! clones over a shared bare repository.

use schmux_adapters::GitAdapter;
use schmux_core::config::ScmMode;
use schmux_core::error::{CoreError, DirtyReason};
use schmux_core::workspace::{validate_branch_name, GitStatus, Workspace, WorkspaceId, WorkspaceKind};
use schmux_storage::state::BaseRepo;
use schmux_storage::StateStore;
use std::path::{Path, PathBuf};
use std::sync::Arc;

pub type WorkspaceEngineError = CoreError;

/// Result of reconciling persisted workspaces against the on-disk root.
#[derive(Debug, Default, Clone)]
pub struct ScanReport {
    pub added: Vec<WorkspaceId>,
    pub updated: Vec<WorkspaceId>,
    pub removed: Vec<WorkspaceId>,
}

pub struct WorkspaceEngine {
    git: GitAdapter,
    state: Arc<StateStore>,
    overlay_root: PathBuf,
}

impl WorkspaceEngine {
    pub fn new(git: GitAdapter, state: Arc<StateStore>, overlay_root: PathBuf) -> Self {
        Self { git, state, overlay_root }
    }

    fn bare_path(base_repos_path: &Path, repo_url: &str) -> PathBuf {
        base_repos_path.join(format!("{}.git", Workspace::repo_name(repo_url)))
    }

    /// `CheckBranchConflict(repoURL, branch)`. Conflicts are only possible in
    /// worktree mode, where branches are pinned one-to-one to a workspace; a
    /// full clone never shares the branch lock.
    pub async fn check_branch_conflict(
        &self,
        repo_url: &str,
        branch: &str,
        scm_mode: ScmMode,
    ) -> Result<(bool, Option<WorkspaceId>), CoreError> {
        if scm_mode != ScmMode::GitWorktree {
            return Ok((false, None));
        }
        let snapshot = self.state.snapshot();
        let bare_path = Self::bare_path(Path::new(&snapshot.base_repos_path), repo_url);
        if !bare_path.exists() {
            return Ok((false, None));
        }
        if !self.git.branch_in_use(&bare_path, branch).await.map_err(|e| CoreError::GitFailure {
            op: "worktree list".to_string(),
            stderr: e.to_string(),
        })? {
            return Ok((false, None));
        }
        let existing = snapshot
            .workspaces
            .iter()
            .find(|w| w.kind == WorkspaceKind::Worktree && w.repo == repo_url && w.branch == branch)
            .map(|w| w.id.clone());
        Ok((true, existing))
    }

    /// `Create(repoURL, branch)`.
    pub async fn create(&self, repo_url: &str, branch: &str, scm_mode: ScmMode) -> Result<Workspace, CoreError> {
        if !validate_branch_name(branch) {
            return Err(CoreError::Internal(format!("invalid branch name: {branch}")));
        }

        let (workspace_root, base_repos_path) = {
            let snapshot = self.state.snapshot();
            (
                PathBuf::from(snapshot.workspace_path.clone()),
                PathBuf::from(snapshot.base_repos_path.clone()),
            )
        };

        let repo_name = Workspace::repo_name(repo_url);
        let bare_path = Self::bare_path(&base_repos_path, repo_url);

        if scm_mode == ScmMode::GitWorktree {
            if let (true, Some(existing)) = self.check_branch_conflict(repo_url, branch, scm_mode).await? {
                return Err(CoreError::BranchConflict {
                    existing_workspace_id: existing.to_string(),
                });
            }
        }

        let kind = match scm_mode {
            ScmMode::GitWorktree => WorkspaceKind::Worktree,
            ScmMode::Git => WorkspaceKind::FullClone,
        };
        // Reserve the sequence number and placeholder entry atomically so
        // two concurrent creates for the same repo never race on the id.
        let reserved = self.reserve_workspace(&repo_name, repo_url, branch, kind, &workspace_root)?;

        let created = match scm_mode {
            ScmMode::GitWorktree => self.create_worktree(repo_url, branch, &bare_path, &reserved).await,
            ScmMode::Git => self.create_full_clone(repo_url, &reserved).await,
        };

        let workspace = match created {
            Ok(w) => w,
            Err(e) => {
                let id = reserved.id.clone();
                self.state.mutate(|doc| {
                    doc.workspaces.retain(|w| w.id != id);
                    Ok::<(), CoreError>(())
                })?;
                return Err(e);
            }
        };

        self.apply_overlay(&workspace).await;

        let final_workspace = workspace.clone();
        self.state.mutate(|doc| {
            if let Some(w) = doc.workspace_mut(&final_workspace.id) {
                *w = final_workspace.clone();
            }
            Ok::<(), CoreError>(())
        })?;

        Ok(workspace)
    }

    fn reserve_workspace(
        &self,
        repo_name: &str,
        repo_url: &str,
        branch: &str,
        kind: WorkspaceKind,
        workspace_root: &Path,
    ) -> Result<Workspace, CoreError> {
        self.state.mutate(|doc| {
            let seq = doc.next_workspace_seq(repo_name);
            let id = WorkspaceId::new(format!("{repo_name}-{seq:03}"));
            let workspace = Workspace {
                id,
                repo: repo_url.to_string(),
                branch: branch.to_string(),
                path: workspace_root.join(format!("{repo_name}-{seq:03}")),
                kind,
                remote_host_id: None,
                remote_path: None,
                created_at_ms: now_ms(),
                updated_at_ms: now_ms(),
                git_status: GitStatus::default(),
            };
            doc.workspaces.push(workspace.clone());
            Ok::<Workspace, CoreError>(workspace)
        })
    }

    async fn create_worktree(&self, repo_url: &str, branch: &str, bare_path: &Path, reserved: &Workspace) -> Result<Workspace, CoreError> {
        let path = &reserved.path;

        if !bare_path.exists() {
            if let Err(e) = self.git.clone_bare(repo_url, bare_path).await {
                return Err(CoreError::GitFailure {
                    op: "clone --bare".to_string(),
                    stderr: e.to_string(),
                });
            }
            self.state.mutate(|doc| {
                doc.base_repos.push(BaseRepo {
                    repo_url: repo_url.to_string(),
                    bare_path: bare_path.display().to_string(),
                });
                Ok::<(), CoreError>(())
            })?;
        } else if let Err(e) = self.git.fetch(bare_path).await {
            return Err(CoreError::GitFailure {
                op: "fetch".to_string(),
                stderr: e.to_string(),
            });
        }

        let track_remote = self.git.remote_branch_exists(bare_path, branch).await.unwrap_or(false);
        if let Err(e) = self.git.worktree_add(bare_path, path, branch, track_remote).await {
            let _ = std::fs::remove_dir_all(path);
            return Err(CoreError::GitFailure {
                op: "worktree add".to_string(),
                stderr: e.to_string(),
            });
        }

        Ok(reserved.clone())
    }

    async fn create_full_clone(&self, repo_url: &str, reserved: &Workspace) -> Result<Workspace, CoreError> {
        let path = &reserved.path;

        if let Err(e) = self.git.clone_full(repo_url, path).await {
            let _ = std::fs::remove_dir_all(path);
            return Err(CoreError::GitFailure {
                op: "clone".to_string(),
                stderr: e.to_string(),
            });
        }

        Ok(reserved.clone())
    }

    /// Copies overlay files gated on the target workspace's `.gitignore`.
    async fn apply_overlay(&self, workspace: &Workspace) {
        let repo_name = Workspace::repo_name(&workspace.repo);
        let overlay_dir = self.overlay_root.join(&repo_name);
        if !overlay_dir.exists() {
            return;
        }
        self.copy_overlay_tree(&overlay_dir, &overlay_dir, workspace).await;
    }

    fn copy_overlay_tree<'a>(
        &'a self,
        root: &'a Path,
        dir: &'a Path,
        workspace: &'a Workspace,
    ) -> std::pin::Pin<Box<dyn std::future::Future<Output = ()> + 'a>> {
        Box::pin(async move {
            let entries = match std::fs::read_dir(dir) {
                Ok(e) => e,
                Err(_) => return,
            };
            for entry in entries.flatten() {
                let src = entry.path();
                let relative = match src.strip_prefix(root) {
                    Ok(r) => r.to_path_buf(),
                    Err(_) => continue,
                };
                let file_type = match entry.file_type() {
                    Ok(t) => t,
                    Err(_) => continue,
                };

                if file_type.is_dir() {
                    self.copy_overlay_tree(root, &src, workspace).await;
                    continue;
                }

                let ignored = self.git.check_ignore(&workspace.path, &relative).await.unwrap_or(false);
                if !ignored {
                    tracing::warn!(path = %relative.display(), "overlay file not ignored by git, skipping");
                    continue;
                }

                let dest = workspace.path.join(&relative);
                if let Some(parent) = dest.parent() {
                    let _ = std::fs::create_dir_all(parent);
                }

                if file_type.is_symlink() {
                    if let Ok(target) = std::fs::read_link(&src) {
                        let _ = std::fs::remove_file(&dest);
                        #[cfg(unix)]
                        let _ = std::os::unix::fs::symlink(&target, &dest);
                        #[cfg(not(unix))]
                        let _ = std::fs::copy(&src, &dest);
                    }
                } else if file_type.is_file() {
                    if let Err(e) = std::fs::copy(&src, &dest) {
                        tracing::warn!(path = %relative.display(), error = %e, "failed to copy overlay file");
                    }
                } else {
                    tracing::warn!(path = %relative.display(), "skipping unsupported file type in overlay");
                }
            }
        })
    }

    pub async fn refresh_overlay(&self, workspace_id: &WorkspaceId) -> Result<(), CoreError> {
        let workspace = {
            let snapshot = self.state.snapshot();
            let sessions_running = snapshot.sessions.iter().any(|s| &s.workspace_id == workspace_id);
            if sessions_running {
                return Err(CoreError::HasSessions { ids: vec![] });
            }
            snapshot
                .workspace(workspace_id)
                .cloned()
                .ok_or_else(|| CoreError::not_found("workspace", workspace_id.as_str()))?
        };
        self.apply_overlay(&workspace).await;
        Ok(())
    }

    /// `Dispose(workspaceId)`.
    pub async fn dispose(&self, workspace_id: &WorkspaceId) -> Result<(), CoreError> {
        let workspace = {
            let snapshot = self.state.snapshot();
            if snapshot.sessions.iter().any(|s| &s.workspace_id == workspace_id) {
                let ids: Vec<String> = snapshot
                    .sessions
                    .iter()
                    .filter(|s| &s.workspace_id == workspace_id)
                    .map(|s| s.id.to_string())
                    .collect();
                return Err(CoreError::HasSessions { ids });
            }
            snapshot
                .workspace(workspace_id)
                .cloned()
                .ok_or_else(|| CoreError::not_found("workspace", workspace_id.as_str()))?
        };

        if workspace.kind != WorkspaceKind::Remote {
            if let Some(reason) = self.git.has_unsafe_changes(&workspace.path).await.map_err(|e| CoreError::GitFailure {
                op: "status".to_string(),
                stderr: e.to_string(),
            })? {
                return Err(CoreError::Dirty { reason });
            }
        }

        match workspace.kind {
            WorkspaceKind::Worktree => {
                let snapshot = self.state.snapshot();
                let bare_path = Self::bare_path(Path::new(&snapshot.base_repos_path), &workspace.repo);
                self.git
                    .worktree_remove(&bare_path, &workspace.path)
                    .await
                    .map_err(|e| CoreError::GitFailure {
                        op: "worktree remove".to_string(),
                        stderr: e.to_string(),
                    })?;
            }
            WorkspaceKind::FullClone => {
                let _ = std::fs::remove_dir_all(&workspace.path);
            }
            WorkspaceKind::Remote => {}
        }

        self.state.mutate(|doc| {
            doc.workspaces.retain(|w| &w.id != workspace_id);
            Ok::<(), CoreError>(())
        })
    }

    pub async fn update_git_status(&self, workspace_id: &WorkspaceId) -> Result<(), CoreError> {
        let workspace = self
            .state
            .snapshot()
            .workspace(workspace_id)
            .cloned()
            .ok_or_else(|| CoreError::not_found("workspace", workspace_id.as_str()))?;
        if workspace.kind == WorkspaceKind::Remote {
            return Ok(());
        }
        let status = self.git.status(&workspace.path).await.map_err(|e| CoreError::GitFailure {
            op: "status".to_string(),
            stderr: e.to_string(),
        })?;
        self.state.mutate(|doc| {
            if let Some(w) = doc.workspace_mut(workspace_id) {
                w.git_status = status;
                w.updated_at_ms = now_ms();
            }
            Ok::<(), CoreError>(())
        })
    }

    pub async fn update_all_git_status(&self) -> Result<(), CoreError> {
        let ids: Vec<WorkspaceId> = self.state.snapshot().workspaces.iter().map(|w| w.id.clone()).collect();
        for id in ids {
            if let Err(e) = self.update_git_status(&id).await {
                tracing::warn!(workspace = %id, error = %e, "git status refresh failed, continuing");
            }
        }
        Ok(())
    }

    /// Reconciles persisted workspaces against the on-disk workspace root.
    pub async fn scan(&self) -> Result<ScanReport, CoreError> {
        let workspace_root = PathBuf::from(self.state.snapshot().workspace_path.clone());
        let mut report = ScanReport::default();

        let on_disk: Vec<String> = std::fs::read_dir(&workspace_root)
            .into_iter()
            .flatten()
            .flatten()
            .filter(|e| e.file_type().map(|t| t.is_dir()).unwrap_or(false))
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();

        let persisted_ids: Vec<WorkspaceId> = self.state.snapshot().workspaces.iter().map(|w| w.id.clone()).collect();

        for id in &persisted_ids {
            if !on_disk.contains(&id.to_string()) {
                report.removed.push(id.clone());
            }
        }
        if !report.removed.is_empty() {
            let removed = report.removed.clone();
            self.state.mutate(|doc| {
                doc.workspaces.retain(|w| !removed.contains(&w.id));
                Ok::<(), CoreError>(())
            })?;
        }

        for name in &on_disk {
            if !persisted_ids.iter().any(|id| id.as_str() == name) {
                report.added.push(WorkspaceId::new(name.clone()));
            }
        }

        Ok(report)
    }
}

fn now_ms() -> u64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
#[path = "workspace_engine_tests.rs"]
mod tests;
