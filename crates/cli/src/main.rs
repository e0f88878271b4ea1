// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! schmux: thin command-line front end over the daemon's Unix-socket
//! protocol.
//!
//! Command surface/UX is intentionally minimal here; the daemon owns all
//! orchestration logic and this binary is just a dispatcher over
//! [`client::DaemonClient`].

mod client;
mod daemon_process;

use clap::{Parser, Subcommand};
use client::{ClientError, DaemonClient};

#[derive(Parser)]
#[command(name = "schmux", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the daemon if it isn't already running.
    Start,
    /// Stop the daemon.
    Stop,
    /// List workspaces.
    Workspaces,
    /// List sessions.
    Sessions,
    /// Show remote flavor connection statuses.
    Remotes,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli.command).await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run(command: Command) -> Result<(), ClientError> {
    match command {
        Command::Start => {
            let _ = DaemonClient::connect_or_start()?;
            println!("daemon running");
            Ok(())
        }
        Command::Stop => {
            daemon_process::stop_daemon_sync(std::time::Duration::from_secs(2));
            println!("daemon stopped");
            Ok(())
        }
        Command::Workspaces => {
            let client = DaemonClient::connect_or_start()?;
            for workspace in client.list_workspaces().await? {
                println!("{}\t{}\t{}", workspace.id, workspace.repo, workspace.branch);
            }
            Ok(())
        }
        Command::Sessions => {
            let client = DaemonClient::connect_or_start()?;
            for session in client.list_sessions().await? {
                println!("{}\t{}", session.id, session.nickname.unwrap_or_default());
            }
            Ok(())
        }
        Command::Remotes => {
            let client = DaemonClient::connect_or_start()?;
            for status in client.flavor_statuses().await? {
                println!("{}\t{:?}", status.flavor_id, status.status);
            }
            Ok(())
        }
    }
}
