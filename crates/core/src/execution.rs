// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Execution` entity: a single run of an agent against one issue in
//! one worktree, owned end-to-end by the Execution Engine (C6).

use serde::{Deserialize, Serialize};

use crate::define_id;
use crate::error::ClassifiedError;
use crate::issue::IssueId;
use crate::workflow::WorkflowId;

define_id! {
    /// Stable identifier for an [`Execution`].
    pub struct ExecutionId;
}

/// Which agent variant drives this execution. Extensible per Design
/// Note 1 (tagged-variant adapter dispatch, keyed by this enum).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    Claude,
    /// Deterministic in-process agent used by tests and the scenario
    /// suite; never selected in production.
    Fake,
}

/// Whether the execution runs against an isolated worktree or the
/// caller's working directory directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionMode {
    Local,
    Worktree,
}

/// Lifecycle status of an execution. See §3.3: `pending → preparing →
/// running (→ paused → running)* → {completed, failed, stopped}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Pending,
    Preparing,
    Running,
    Paused,
    Completed,
    Failed,
    Stopped,
}

impl ExecutionStatus {
    /// Non-terminal statuses count toward invariant 1 (at most one
    /// active execution per issue).
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Stopped
        )
    }

    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

/// A single run of an agent against one issue in one worktree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Execution {
    pub id: ExecutionId,
    pub issue_id: Option<IssueId>,
    pub agent_type: AgentType,
    pub mode: ExecutionMode,
    pub status: ExecutionStatus,
    /// Frozen at creation; never re-rendered after the execution starts.
    pub prompt: String,
    pub worktree_path: Option<String>,
    pub branch_name: Option<String>,
    pub target_branch: Option<String>,
    pub base_commit: Option<String>,
    pub after_commit: Option<String>,
    pub exit_code: Option<i32>,
    pub error: Option<ClassifiedError>,
    #[serde(default)]
    pub files_changed: Vec<String>,
    pub parent_execution_id: Option<ExecutionId>,
    pub workflow_execution_id: Option<WorkflowId>,
    /// Opaque agent resumption handle. Invariant 3: set exactly once,
    /// from the first system trajectory entry that carries one.
    pub session_id: Option<String>,
    pub created_at: i64,
    pub started_at: Option<i64>,
    pub completed_at: Option<i64>,
    pub updated_at: i64,
}

impl Execution {
    /// Builds a new `pending` execution with a prompt frozen at creation
    /// time, per §4.6 step 1.
    pub fn new(
        id: ExecutionId,
        issue_id: Option<IssueId>,
        agent_type: AgentType,
        mode: ExecutionMode,
        prompt: impl Into<String>,
        now: i64,
    ) -> Self {
        Self {
            id,
            issue_id,
            agent_type,
            mode,
            status: ExecutionStatus::Pending,
            prompt: prompt.into(),
            worktree_path: None,
            branch_name: None,
            target_branch: None,
            base_commit: None,
            after_commit: None,
            exit_code: None,
            error: None,
            files_changed: Vec::new(),
            parent_execution_id: None,
            workflow_execution_id: None,
            session_id: None,
            created_at: now,
            started_at: None,
            completed_at: None,
            updated_at: now,
        }
    }

    /// Sets `session_id` if not already set. Invariant 3: once set, a
    /// session id is never overwritten. Returns `true` if this call
    /// actually set the value (the caller uses this to distinguish a
    /// first observation from a diverging resume, per the session-id
    /// divergence Open Question decision).
    pub fn try_set_session_id(&mut self, session_id: impl Into<String>) -> bool {
        if self.session_id.is_some() {
            return false;
        }
        self.session_id = Some(session_id.into());
        true
    }

    /// Moves the execution into a terminal state, stamping
    /// `completed_at` and recording an optional classified error.
    pub fn finish(
        &mut self,
        status: ExecutionStatus,
        exit_code: Option<i32>,
        error: Option<ClassifiedError>,
        now: i64,
    ) {
        debug_assert!(status.is_terminal(), "finish() requires a terminal status");
        self.status = status;
        self.exit_code = exit_code;
        self.error = error;
        self.completed_at = Some(now);
        self.updated_at = now;
    }
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    use super::*;

    /// Builder for [`Execution`] fixtures, mirroring the adapter-trait
    /// builder pattern used throughout this crate's test support.
    pub struct ExecutionBuilder {
        execution: Execution,
    }

    impl ExecutionBuilder {
        pub fn new(id: impl Into<String>) -> Self {
            Self {
                execution: Execution::new(
                    ExecutionId::new(id.into()),
                    None,
                    AgentType::Fake,
                    ExecutionMode::Worktree,
                    "noop",
                    0,
                ),
            }
        }

        pub fn issue_id(mut self, id: impl Into<String>) -> Self {
            self.execution.issue_id = Some(IssueId::new(id.into()));
            self
        }

        pub fn status(mut self, status: ExecutionStatus) -> Self {
            self.execution.status = status;
            self
        }

        pub fn mode(mut self, mode: ExecutionMode) -> Self {
            self.execution.mode = mode;
            self
        }

        pub fn prompt(mut self, prompt: impl Into<String>) -> Self {
            self.execution.prompt = prompt.into();
            self
        }

        pub fn parent(mut self, id: impl Into<String>) -> Self {
            self.execution.parent_execution_id = Some(ExecutionId::new(id.into()));
            self
        }

        pub fn build(self) -> Execution {
            self.execution
        }
    }
}

#[cfg(test)]
#[path = "execution_tests.rs"]
mod tests;
