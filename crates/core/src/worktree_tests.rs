// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn worktree_record_round_trips_through_json() {
    let record = WorktreeRecord::new(
        ExecutionId::new("ex-1"),
        "/repo/.loom/worktrees/ex-1",
        "loom/ex-1",
        "main",
        0,
    );
    let json = serde_json::to_string(&record).expect("serialize");
    let back: WorktreeRecord = serde_json::from_str(&json).expect("deserialize");
    assert_eq!(record, back);
}
