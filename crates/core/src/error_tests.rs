// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn tag_is_stable_and_unique_for_timeout_subkinds() {
    let idle = ErrorKind::Timeout(TimeoutKind::Idle).tag();
    let hard = ErrorKind::Timeout(TimeoutKind::Hard).tag();
    let shutdown = ErrorKind::Timeout(TimeoutKind::Shutdown).tag();
    assert_ne!(idle, hard);
    assert_ne!(hard, shutdown);
}

#[test]
fn classified_error_displays_kind_and_message() {
    let err = ClassifiedError::new(ErrorKind::Conflict, "execution already running");
    assert_eq!(err.to_string(), "[conflict] execution already running");
}

#[test]
fn serializes_to_snake_case() {
    let json = serde_json::to_string(&ErrorKind::AgentSpawnFailure).expect("serialize");
    assert_eq!(json, "\"agent_spawn_failure\"");
}
