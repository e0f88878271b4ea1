// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn signal_state_parses_closed_set() {
    assert_eq!(SignalState::parse("completed"), Some(SignalState::Completed));
    assert_eq!(SignalState::parse("needs_input"), Some(SignalState::NeedsInput));
    assert_eq!(SignalState::parse("needs_testing"), Some(SignalState::NeedsTesting));
    assert_eq!(SignalState::parse("error"), Some(SignalState::Error));
    assert_eq!(SignalState::parse("working"), Some(SignalState::Working));
}

#[test]
fn signal_state_rejects_unknown_tokens() {
    assert_eq!(SignalState::parse("unknown"), None);
    assert_eq!(SignalState::parse(""), None);
}

#[test]
fn tmux_name_is_derived_from_session_id() {
    let session = Session {
        id: SessionId::new("repo-001-abc123"),
        workspace_id: WorkspaceId::new("repo-001"),
        target: Target {
            kind: crate::target::TargetKind::Interactive,
            command_parts: vec!["claude".into()],
            env: Default::default(),
            promptable: false,
        },
        nickname: None,
        created_at_ms: 0,
        last_output_at_ms: 0,
        last_signal_state: None,
        last_signal_at_ms: None,
        remote_host_id: None,
        remote_pane_id: None,
        log_path: PathBuf::from("/tmp/repo-001-abc123.log"),
    };
    assert_eq!(session.tmux_name(), "schmux-repo-001-abc123");
    assert!(!session.is_remote());
}
