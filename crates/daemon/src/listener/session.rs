// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Session operation handlers.

use schmux_core::error::CoreError;
use schmux_core::session::{Session, SessionId};
use schmux_core::target::{Target, TargetKind};
use schmux_core::workspace::WorkspaceId;
use schmux_engine::SessionOpts;

use crate::protocol::Response;
use crate::ListenCtx;

fn err(e: CoreError) -> Response {
    Response::from_core_error(&e)
}

pub async fn spawn(ctx: &ListenCtx, workspace_id: String, target: Target, prompt: Option<String>) -> Response {
    let opts = SessionOpts { prompt };
    match ctx.sessions.spawn(&WorkspaceId::new(workspace_id), target, opts).await {
        Ok(outcome) => Response::Session { session: Box::new(outcome.session), bootstrap: outcome.bootstrap },
        Err(e) => err(e),
    }
}

/// Binds a session to a window on an already-connected (or still
/// provisioning) remote host. Unlike `spawn`, this doesn't go through
/// `SessionEngine` — there's no local tmux pane to create, just a
/// `CreateWindow` call against the remote's control-mode multiplexer and a
/// session record pointing at the resulting pane.
pub async fn spawn_remote(
    ctx: &ListenCtx,
    flavor_id: String,
    workspace_id: String,
    window_name: String,
    workdir: String,
    command: String,
) -> Response {
    let handle = match ctx.remote.handle(&flavor_id) {
        Some(h) => h,
        None => return err(CoreError::HostDisconnected),
    };

    let (window_id, pane_id) = match handle.create_window(&window_name, &workdir, &command).wait().await {
        Ok(ids) => ids,
        Err(e) => return err(e),
    };
    let _ = window_id;

    let session = Session {
        id: SessionId::new(format!("{workspace_id}-{}", short_uuid())),
        workspace_id: WorkspaceId::new(workspace_id),
        target: Target { kind: TargetKind::Interactive, command_parts: vec![command], env: Default::default(), promptable: false },
        nickname: None,
        created_at_ms: now_ms(),
        last_output_at_ms: now_ms(),
        last_signal_state: None,
        last_signal_at_ms: None,
        remote_host_id: Some(handle.host_id().clone()),
        remote_pane_id: Some(pane_id),
        log_path: Default::default(),
    };

    let result = ctx.state.mutate(|doc| {
        doc.sessions.push(session.clone());
        Ok::<(), CoreError>(())
    });
    match result {
        Ok(()) => Response::Session { session: Box::new(session), bootstrap: String::new() },
        Err(e) => err(e),
    }
}

pub async fn dispose(ctx: &ListenCtx, id: String) -> Response {
    let session_id = SessionId::new(id);
    let is_remote = ctx.state.snapshot().session(&session_id).map(|s| s.is_remote()).unwrap_or(false);
    if is_remote {
        return dispose_remote(ctx, session_id).await;
    }
    match ctx.sessions.dispose(&session_id).await {
        Ok(()) => Response::Ok,
        Err(e) => err(e),
    }
}

async fn dispose_remote(ctx: &ListenCtx, id: SessionId) -> Response {
    let session = match ctx.state.snapshot().session(&id).cloned() {
        Some(s) => s,
        None => return err(CoreError::not_found("session", id.as_str())),
    };
    if let (Some(host_id), Some(pane_id)) = (session.remote_host_id.clone(), session.remote_pane_id.clone()) {
        if let Some(handle) = ctx.remote.handle_by_host_id(&host_id) {
            let _ = handle.kill_window(&pane_id).await;
        }
    }
    match ctx.state.mutate(|doc| {
        doc.sessions.retain(|s| s.id != id);
        Ok::<(), CoreError>(())
    }) {
        Ok(()) => Response::Ok,
        Err(e) => err(e),
    }
}

pub async fn rename(ctx: &ListenCtx, id: String, nickname: String) -> Response {
    match ctx.sessions.rename(&SessionId::new(id), &nickname).await {
        Ok(()) => Response::Ok,
        Err(e) => err(e),
    }
}

pub fn list(ctx: &ListenCtx) -> Response {
    Response::Sessions { sessions: ctx.state.snapshot().sessions }
}

fn short_uuid() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..6].to_string()
}

fn now_ms() -> u64 {
    std::time::SystemTime::now().duration_since(std::time::UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}
