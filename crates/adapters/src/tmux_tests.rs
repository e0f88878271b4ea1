// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn shell_quote_escapes_single_quotes() {
    let path = Path::new("/tmp/it's a log.log");
    assert_eq!(shell_quote(path), "'/tmp/it'\\''s a log.log'");
}

#[tokio::test]
async fn has_session_false_when_tmux_missing_server() {
    // Exercises the real adapter against a name that can't exist; tmux
    // either reports "no server running" (exit != 0) or "not found".
    let adapter = TmuxAdapter::new();
    let result = adapter.has_session("schmux-definitely-not-a-real-session").await;
    assert!(matches!(result, Ok(false) | Err(_)));
}
