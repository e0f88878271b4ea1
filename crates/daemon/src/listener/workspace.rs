// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace operation handlers.

use schmux_core::error::CoreError;
use schmux_core::workspace::WorkspaceId;

use crate::listener::session;
use crate::protocol::Response;
use crate::ListenCtx;

fn err(e: CoreError) -> Response {
    Response::from_core_error(&e)
}

pub async fn create(ctx: &ListenCtx, repo_url: String, branch: String) -> Response {
    let scm_mode = ctx.config.current().source_code_management;
    match ctx.workspaces.create(&repo_url, &branch, scm_mode).await {
        Ok(workspace) => Response::Workspace { workspace: Box::new(workspace) },
        Err(e) => err(e),
    }
}

pub async fn dispose(ctx: &ListenCtx, id: String) -> Response {
    match ctx.workspaces.dispose(&WorkspaceId::new(id)).await {
        Ok(()) => Response::Ok,
        Err(e) => err(e),
    }
}

/// Disposes every session in the workspace first, then the workspace
/// itself. Routes each session through `session::dispose` rather than
/// `SessionEngine::dispose` directly, so remote-bound sessions (which have
/// no local tmux pane) get their own disposal path instead of erroring.
pub async fn dispose_all(ctx: &ListenCtx, id: String) -> Response {
    let workspace_id = WorkspaceId::new(id);
    let session_ids: Vec<String> = ctx
        .state
        .snapshot()
        .sessions_in_workspace(&workspace_id)
        .into_iter()
        .map(|s| s.id.to_string())
        .collect();
    for session_id in session_ids {
        let response = session::dispose(ctx, session_id).await;
        if matches!(response, Response::Error { .. }) {
            return response;
        }
    }
    match ctx.workspaces.dispose(&workspace_id).await {
        Ok(()) => Response::Ok,
        Err(e) => err(e),
    }
}

pub async fn check_branch_conflict(ctx: &ListenCtx, repo_url: String, branch: String) -> Response {
    let scm_mode = ctx.config.current().source_code_management;
    match ctx.workspaces.check_branch_conflict(&repo_url, &branch, scm_mode).await {
        Ok((conflict, existing_workspace_id)) => {
            Response::BranchConflict { conflict, existing_workspace_id: existing_workspace_id.map(|id| id.to_string()) }
        }
        Err(e) => err(e),
    }
}

pub async fn refresh_overlay(ctx: &ListenCtx, id: String) -> Response {
    match ctx.workspaces.refresh_overlay(&WorkspaceId::new(id)).await {
        Ok(()) => Response::Ok,
        Err(e) => err(e),
    }
}

pub async fn update_git_status(ctx: &ListenCtx, id: String) -> Response {
    match ctx.workspaces.update_git_status(&WorkspaceId::new(id)).await {
        Ok(()) => Response::Ok,
        Err(e) => err(e),
    }
}

pub async fn update_all_git_status(ctx: &ListenCtx) -> Response {
    match ctx.workspaces.update_all_git_status().await {
        Ok(()) => Response::Ok,
        Err(e) => err(e),
    }
}

pub async fn scan(ctx: &ListenCtx) -> Response {
    match ctx.workspaces.scan().await {
        Ok(report) => Response::ScanReport {
            added: report.added.iter().map(|id| id.to_string()).collect(),
            updated: report.updated.iter().map(|id| id.to_string()).collect(),
            removed: report.removed.iter().map(|id| id.to_string()).collect(),
        },
        Err(e) => err(e),
    }
}

pub fn list(ctx: &ListenCtx) -> Response {
    Response::Workspaces { workspaces: ctx.state.snapshot().workspaces }
}
