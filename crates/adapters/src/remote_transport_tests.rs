// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn extract_hostname_matches_default_banner() {
    let raw = "Welcome to build-box-7\nauthenticating...\n";
    assert_eq!(extract_hostname(raw, None), Some("build-box-7".to_string()));
}

#[test]
fn extract_hostname_respects_custom_pattern() {
    let raw = "host=dev-42 ready";
    assert_eq!(extract_hostname(raw, Some(r"host=([a-z0-9-]+)")), Some("dev-42".to_string()));
}

#[test]
fn extract_hostname_returns_none_when_no_match() {
    assert_eq!(extract_hostname("nothing interesting here", None), None);
}

#[test]
fn extract_session_uuid_finds_bare_uuid() {
    let raw = "session id: 4f9e6f3a-1b2c-4d5e-8f90-abc123def456\n";
    assert_eq!(extract_session_uuid(raw), Some("4f9e6f3a-1b2c-4d5e-8f90-abc123def456".to_string()));
}

#[test]
fn extract_session_uuid_returns_none_when_no_match() {
    assert_eq!(extract_session_uuid("no uuid banner here"), None);
}

#[tokio::test]
async fn spawn_and_kill_real_pty_process() {
    // Requires a shell on PATH (true in CI and dev containers alike).
    let transport = RemoteTransport::spawn("sleep 5", 80, 24).unwrap();
    assert!(transport.is_alive());
    transport.kill();
    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
    assert!(!transport.is_alive());
}

#[tokio::test]
async fn raw_output_is_observable_by_subscribers() {
    let transport = RemoteTransport::spawn("printf hello", 80, 24).unwrap();
    let mut rx = transport.subscribe_raw();
    let chunk = tokio::time::timeout(std::time::Duration::from_secs(5), rx.recv()).await;
    assert!(chunk.is_ok());
}
