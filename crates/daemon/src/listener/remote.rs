// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Remote-host operation handlers.

use schmux_core::error::CoreError;
use schmux_core::remote::RemoteHostId;

use crate::protocol::{FlavorStatus, Response};
use crate::ListenCtx;

fn err(e: CoreError) -> Response {
    Response::from_core_error(&e)
}

fn find_flavor(ctx: &ListenCtx, flavor_id: &str) -> Result<schmux_core::config::RemoteFlavor, CoreError> {
    ctx.config
        .current()
        .remote_flavors
        .into_iter()
        .find(|f| f.id == flavor_id)
        .ok_or_else(|| CoreError::not_found("remote flavor", flavor_id))
}

pub async fn connect(ctx: &ListenCtx, flavor_id: String) -> Response {
    let flavor = match find_flavor(ctx, &flavor_id) {
        Ok(f) => f,
        Err(e) => return err(e),
    };
    let terminal = ctx.config.current().terminal;
    match ctx.remote.connect(&flavor, &terminal) {
        Ok(handle) => Response::RemoteHost { host_id: handle.host_id().to_string(), status: handle.status() },
        Err(e) => err(e),
    }
}

pub async fn reconnect(ctx: &ListenCtx, host_id: String) -> Response {
    let flavor_id = match ctx.state.snapshot().remote_host(&RemoteHostId::new(host_id)).map(|h| h.flavor_id.clone()) {
        Some(id) => id,
        None => return err(CoreError::not_found("remote host", "")),
    };
    let flavor = match find_flavor(ctx, &flavor_id) {
        Ok(f) => f,
        Err(e) => return err(e),
    };
    let terminal = ctx.config.current().terminal;
    match ctx.remote.reconnect(&flavor, &terminal) {
        Ok(handle) => Response::RemoteHost { host_id: handle.host_id().to_string(), status: handle.status() },
        Err(e) => err(e),
    }
}

pub async fn disconnect(ctx: &ListenCtx, host_id: String) -> Response {
    match ctx.remote.disconnect(&RemoteHostId::new(host_id)) {
        Ok(()) => Response::Ok,
        Err(e) => err(e),
    }
}

/// Cross-references configured flavors with any persisted connection state;
/// the engine only tracks live connections by flavor id, so a flavor with
/// no current `Connection` still gets a status entry from its last
/// persisted `RemoteHost`, if any.
pub fn flavor_statuses(ctx: &ListenCtx) -> Response {
    let snapshot = ctx.state.snapshot();
    let statuses = ctx
        .config
        .current()
        .remote_flavors
        .into_iter()
        .map(|flavor| {
            let persisted = snapshot.remote_hosts.iter().filter(|h| h.flavor_id == flavor.id).last();
            FlavorStatus {
                flavor_id: flavor.id,
                host_id: persisted.map(|h| h.id.to_string()),
                status: persisted.map(|h| h.status),
                hostname: persisted.and_then(|h| h.hostname.clone()),
            }
        })
        .collect();
    Response::FlavorStatuses { statuses }
}
