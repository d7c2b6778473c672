// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use std::time::Duration;
use tempfile::tempdir;

fn adapter() -> ClaudeAgentAdapter {
    ClaudeAgentAdapter::new(Arc::new(ProcessManager::new()), None, None).with_poll_interval(Duration::from_millis(10))
}

fn script_writing(transcript_path: &std::path::Path, lines: &[&str]) -> RunConfig {
    let mut shell = String::from("sleep 0.05;");
    for line in lines {
        shell.push_str(&format!(" echo '{line}' >> {:?};", transcript_path));
    }
    shell.push_str(" sleep 0.2");

    RunConfig {
        cmd: "sh".to_string(),
        args: vec!["-c".to_string(), shell],
        env: Vec::new(),
        cwd: std::env::temp_dir(),
        prompt: String::new(),
        transcript_path: transcript_path.to_path_buf(),
    }
}

#[tokio::test]
async fn run_streams_mapped_trajectory_entries() {
    let dir = tempdir().expect("tempdir");
    let transcript = dir.path().join("session.jsonl");
    std::fs::write(&transcript, "").expect("create transcript");

    let adapter = adapter();
    let config = script_writing(
        &transcript,
        &[r#"{"type":"system","subtype":"init","session_id":"sess-1"}"#],
    );
    let mut stream = adapter.run(config).await.expect("run");
    let first = tokio::time::timeout(Duration::from_secs(2), stream.recv())
        .await
        .expect("no timeout")
        .expect("payload");
    match first {
        LogPayload::SystemMessage { session_id, .. } => assert_eq!(session_id.as_deref(), Some("sess-1")),
        other => panic!("expected system_message, got {other:?}"),
    }
}

#[tokio::test]
async fn cancel_without_an_active_session_errors() {
    let adapter = adapter();
    let err = adapter.cancel().await.expect_err("should fail");
    assert!(matches!(err, AgentError::SessionError(_)));
}

#[tokio::test]
async fn respond_to_permission_requires_a_pending_request() {
    let adapter = adapter();
    let err = adapter
        .respond_to_permission("req-1", "allow")
        .await
        .expect_err("should fail");
    assert!(matches!(err, AgentError::NoPendingPermission(id) if id == "req-1"));
}

#[tokio::test]
async fn fork_derives_a_new_session_id_from_the_parent() {
    let adapter = adapter();
    let forked = adapter.fork("session-a").await.expect("fork");
    assert!(forked.starts_with("session-a-fork-"));
    assert_ne!(forked, "session-a");
}

#[tokio::test]
async fn interrupt_with_requires_an_established_session() {
    let adapter = adapter();
    let err = adapter.interrupt_with("new prompt").await.expect_err("should fail");
    assert!(matches!(err, AgentError::SessionError(_)));
}
