// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `WorktreeRecord`: what the Worktree Manager (C2) tracks about each
//! worktree it has created, for orphan cleanup and `list()`.

use serde::{Deserialize, Serialize};

use crate::execution::ExecutionId;

/// One registered git worktree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorktreeRecord {
    pub execution_id: ExecutionId,
    pub path: String,
    pub branch_name: String,
    pub base_branch: String,
    pub created_at: i64,
}

impl WorktreeRecord {
    pub fn new(
        execution_id: ExecutionId,
        path: impl Into<String>,
        branch_name: impl Into<String>,
        base_branch: impl Into<String>,
        created_at: i64,
    ) -> Self {
        Self {
            execution_id,
            path: path.into(),
            branch_name: branch_name.into(),
            base_branch: base_branch.into(),
            created_at,
        }
    }
}

#[cfg(test)]
#[path = "worktree_tests.rs"]
mod tests;
