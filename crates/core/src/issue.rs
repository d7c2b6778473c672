// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Issue` entity: a unit of work tracked in the entity store and the
//! input to an execution. The entity store itself lives outside this
//! crate (out of scope per the purpose statement); `loom-core` only
//! defines the shape callers hand us.

use serde::{Deserialize, Serialize};

use crate::define_id;

define_id! {
    /// Stable identifier for an [`Issue`].
    pub struct IssueId;
}

/// Lifecycle status of an issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueStatus {
    Open,
    InProgress,
    Blocked,
    Review,
    Closed,
    Cancelled,
}

/// Priority tier; ordering is ascending urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Low,
    Medium,
    High,
    Urgent,
}

/// Directed relationship between two issues. `Blocks` and `DependsOn`
/// induce the DAG validated at workflow submission (invariant 7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RelationshipKind {
    Blocks,
    DependsOn,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relationship {
    pub kind: RelationshipKind,
    pub target: IssueId,
}

/// A unit of work tracked by the entity store and consumed by the
/// Execution Engine when rendering a prompt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    pub id: IssueId,
    pub title: String,
    pub content: String,
    pub status: IssueStatus,
    pub priority: Priority,
    #[serde(default)]
    pub relationships: Vec<Relationship>,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Issue {
    /// Returns the ids this issue depends on (must complete first).
    pub fn dependency_ids(&self) -> impl Iterator<Item = &IssueId> {
        self.relationships
            .iter()
            .filter(|r| r.kind == RelationshipKind::DependsOn)
            .map(|r| &r.target)
    }
}

#[cfg(test)]
#[path = "issue_tests.rs"]
mod tests;
