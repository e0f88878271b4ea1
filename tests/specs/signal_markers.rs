//! Scenario 4: signal markers are stripped from the viewer stream and
//! update session state; unknown markers pass through unchanged.

use crate::prelude::*;
use schmux_core::session::{Session, SessionId};
use schmux_core::target::{Target, TargetKind};
use schmux_core::workspace::WorkspaceId;

fn seed_session(fixture: &SessionFixture, id: &str) {
    let session = Session {
        id: SessionId::new(id),
        workspace_id: WorkspaceId::new("r-001"),
        target: Target { kind: TargetKind::Interactive, command_parts: vec!["bash".into()], env: Default::default(), promptable: false },
        nickname: None,
        created_at_ms: 0,
        last_output_at_ms: 0,
        last_signal_state: None,
        last_signal_at_ms: None,
        remote_host_id: None,
        remote_pane_id: None,
        log_path: Default::default(),
    };
    fixture
        .state
        .mutate(|doc| {
            doc.sessions.push(session.clone());
            Ok::<(), schmux_core::error::CoreError>(())
        })
        .unwrap();
}

#[test]
fn known_marker_is_stripped_and_updates_state() {
    let fixture = make_session_fixture();
    let id = SessionId::new("sess-1");
    seed_session(&fixture, id.as_str());

    let stripped = fixture.engine.scan_signals(&id, "--<[schmux:completed:done]>--\n");
    assert_eq!(stripped, "");

    let snapshot = fixture.state.snapshot();
    let session = snapshot.session(&id).unwrap();
    assert!(session.last_signal_state.is_some());
}

#[test]
fn unknown_marker_passes_through_and_does_not_change_state() {
    let fixture = make_session_fixture();
    let id = SessionId::new("sess-2");
    seed_session(&fixture, id.as_str());

    let chunk = "--<[schmux:unknown:x]>--\n";
    let stripped = fixture.engine.scan_signals(&id, chunk);
    assert_eq!(stripped, chunk);

    let snapshot = fixture.state.snapshot();
    let session = snapshot.session(&id).unwrap();
    assert!(session.last_signal_state.is_none());
}
