// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! schmux-adapters: process execution, the local tmux CLI wrapper, the git
//! command wrapper, and the tmux control-mode wire protocol.

pub mod control_mode;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod git;
pub mod process;
pub mod remote_transport;
pub mod tmux;

pub use control_mode::{ControlModeClient, ControlModeError, OutputEvent, WireEvent};
pub use git::{GitAdapter, GitError};
pub use process::run_with_timeout;
pub use remote_transport::{extract_hostname, RemoteTransport, RemoteTransportError};
pub use tmux::{SessionAdapter, SessionError, TmuxAdapter};

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeSessionAdapter;
