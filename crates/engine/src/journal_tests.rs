// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use loom_core::execution::{AgentType, Execution, ExecutionId, ExecutionMode, ExecutionStatus};

use super::*;

fn execution(id: &str) -> Execution {
    Execution {
        id: ExecutionId::new(id),
        issue_id: None,
        agent_type: AgentType::Fake,
        mode: ExecutionMode::Local,
        status: ExecutionStatus::Running,
        prompt: "go".into(),
        worktree_path: None,
        branch_name: None,
        target_branch: None,
        base_commit: None,
        after_commit: None,
        exit_code: None,
        error: None,
        files_changed: vec![],
        parent_execution_id: None,
        workflow_execution_id: None,
        session_id: None,
        created_at: 0,
        started_at: None,
        completed_at: None,
        updated_at: 0,
    }
}

#[test]
fn loading_a_journal_that_was_never_written_returns_empty_state() {
    let dir = tempfile::tempdir().expect("tempdir");
    let journal = Journal::new(dir.path().join("state.json"));
    let state = journal.load().expect("load succeeds");
    assert!(state.executions.is_empty());
}

#[test]
fn a_saved_state_round_trips_through_load() {
    let dir = tempfile::tempdir().expect("tempdir");
    let journal = Journal::new(dir.path().join("state.json"));

    let mut state = EngineState::new();
    state.insert_execution(execution("e-1"));
    journal.save(&state).expect("save succeeds");

    let loaded = journal.load().expect("load succeeds");
    assert_eq!(loaded.executions.len(), 1);
    assert!(loaded.executions.contains_key(&ExecutionId::new("e-1")));
}

#[test]
fn saving_twice_replaces_the_previous_snapshot_rather_than_appending() {
    let dir = tempfile::tempdir().expect("tempdir");
    let journal = Journal::new(dir.path().join("state.json"));

    let mut first = EngineState::new();
    first.insert_execution(execution("e-1"));
    journal.save(&first).expect("save succeeds");

    let mut second = EngineState::new();
    second.insert_execution(execution("e-2"));
    journal.save(&second).expect("save succeeds");

    let loaded = journal.load().expect("load succeeds");
    assert_eq!(loaded.executions.len(), 1);
    assert!(loaded.executions.contains_key(&ExecutionId::new("e-2")));
}
