// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! schmuxd: background daemon that owns tmux sessions, workspaces, and
//! remote connections, and exposes them over a Unix socket and a
//! WebSocket terminal-streaming endpoint.
//!
//! Typically started by the `schmux` CLI and should not be invoked
//! directly.

#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use std::sync::Arc;

use schmux_daemon::lifecycle::{self, LifecycleError, Paths, StartupResult};
use schmux_daemon::listener::{ListenCtx, Listener};
use schmux_daemon::{streamer, tasks};
use tokio::signal::unix::{signal, SignalKind};
use tokio::sync::Notify;
use tokio::task::JoinSet;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("schmuxd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("schmuxd {}", env!("CARGO_PKG_VERSION"));
                println!("schmux daemon - owns tmux sessions, workspaces, and remote connections");
                println!();
                println!("The daemon is typically started by the `schmux` CLI and should not");
                println!("be invoked directly. It listens on a Unix socket for commands and");
                println!("serves terminal output over WebSocket.");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: schmuxd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let paths = Paths::resolve()?;
    let log_guard = setup_logging(&paths)?;

    info!("starting schmux daemon");

    let StartupResult { daemon, listener: unix_listener } = match lifecycle::startup(paths.clone()).await {
        Ok(r) => r,
        Err(LifecycleError::LockFailed(_)) => {
            let pid = std::fs::read_to_string(&paths.lock_path).unwrap_or_default();
            eprintln!("schmuxd is already running");
            if !pid.trim().is_empty() {
                eprintln!("  pid: {}", pid.trim());
            }
            std::process::exit(1);
        }
        Err(e) => {
            error!(error = %e, "failed to start daemon");
            drop(log_guard);
            return Err(e.into());
        }
    };

    let shutdown_notify = Arc::new(Notify::new());
    let ctx = Arc::new(ListenCtx::from_daemon(&daemon, shutdown_notify.clone()));

    let listener = Listener::new(unix_listener, ctx.clone());
    tokio::spawn(listener.run());

    let ws_app = streamer::router(ctx.clone());
    let ws_listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let ws_addr = ws_listener.local_addr()?;
    tokio::spawn(async move {
        if let Err(e) = axum::serve(ws_listener, ws_app).await {
            error!(error = %e, "terminal streaming server exited");
        }
    });

    let mut background = JoinSet::new();
    tasks::spawn(&daemon, &mut background);

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    info!(socket = %daemon.paths.socket_path.display(), ws_addr = %ws_addr, "daemon ready");
    println!("READY");
    println!("SOCKET {}", daemon.paths.socket_path.display());
    println!("WS_ADDR {ws_addr}");

    tokio::select! {
        _ = shutdown_notify.notified() => info!("shutdown requested via command"),
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    background.shutdown().await;
    daemon.shutdown();
    info!("daemon stopped");
    Ok(())
}

fn setup_logging(paths: &Paths) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    if let Some(parent) = paths.log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let file_appender = tracing_appender::rolling::never(
        paths.log_path.parent().ok_or(LifecycleError::NoStateDir)?,
        paths.log_path.file_name().ok_or(LifecycleError::NoStateDir)?,
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
