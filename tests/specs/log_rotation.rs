//! Boundary scenario: a log file sitting right at `max_log_size` gets
//! rotated down to roughly `rotated_log_size` on the next viewer pass.

use crate::prelude::*;
use schmux_core::config::XtermConfig;

#[tokio::test]
async fn rotation_shrinks_oversized_log_to_rotated_size() {
    let fixture = make_session_fixture();
    let xterm = XtermConfig::default();

    let log_path = fixture.engine_log_path("demo.log");
    let line = "x".repeat(199);
    let line = format!("{line}\n");
    let line_len = line.len() as u64;

    let mut content = String::new();
    while content.len() as u64 <= xterm.max_log_size_bytes() {
        content.push_str(&line);
    }
    std::fs::write(&log_path, content.as_bytes()).unwrap();

    fixture.engine.rotate_log("schmux-demo", &log_path).await.unwrap();

    let rotated_len = std::fs::metadata(&log_path).unwrap().len();
    assert!(rotated_len <= xterm.rotated_log_size_bytes() + line_len);
    assert!(rotated_len >= xterm.rotated_log_size_bytes() - line_len);
}

#[tokio::test]
async fn rotation_is_noop_when_log_already_short() {
    let fixture = make_session_fixture();
    let xterm = XtermConfig::default();

    let log_path = fixture.engine_log_path("small.log");
    std::fs::write(&log_path, b"hello\n").unwrap();

    fixture.engine.rotate_log("schmux-small", &log_path).await.unwrap();

    let len = std::fs::metadata(&log_path).unwrap().len();
    assert_eq!(len, 6);
    assert!(len < xterm.rotated_log_size_bytes());
}
