// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn prefix_distinguishes_workflow_and_execution() {
    let wf = OwnerId::workflow(WorkflowId::new("wf-1"));
    let ex = OwnerId::execution(ExecutionId::new("ex-1"));
    assert_eq!(wf.prefix(), "wf");
    assert_eq!(ex.prefix(), "ex");
}

#[test]
fn owner_id_round_trips_through_json() {
    let owner = OwnerId::execution(ExecutionId::new("ex-7"));
    let json = serde_json::to_string(&owner).expect("serialize");
    let back: OwnerId = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(owner, back);
}
