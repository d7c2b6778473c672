// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Workflow` and `WorkflowStep` entities driven by the Workflow
//! Engine (C7): a dependency-ordered group of executions sharing one
//! pause/resume/recover lifecycle.

use serde::{Deserialize, Serialize};

use crate::define_id;
use crate::execution::ExecutionId;
use crate::issue::IssueId;

define_id! {
    /// Stable identifier for a [`Workflow`].
    pub struct WorkflowId;
}

define_id! {
    /// Stable identifier for a [`WorkflowStep`], unique within its
    /// owning workflow.
    pub struct StepId;
}

/// How a workflow's steps were sourced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WorkflowSource {
    Issues { issue_ids: Vec<IssueId> },
    SpecDerived { spec_id: String },
}

/// Lifecycle status of a workflow. See §3.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Paused,
    Completed,
    Failed,
    Cancelled,
}

impl WorkflowStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            WorkflowStatus::Completed | WorkflowStatus::Failed | WorkflowStatus::Cancelled
        )
    }
}

/// Lifecycle status of a single step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    Ready,
    Running,
    Completed,
    Failed,
    Skipped,
}

impl StepStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Skipped
        )
    }
}

/// Policy applied when a step fails, per §6's `workflow.onFailure`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OnFailure {
    Pause,
    Continue,
    Abort,
}

/// How many steps may run concurrently, per §6's `workflow.parallelism`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Parallelism {
    Sequential,
    Parallel(u32),
}

impl Parallelism {
    /// Maximum number of steps that may be `running` at once.
    pub fn slot_count(&self) -> u32 {
        match self {
            Parallelism::Sequential => 1,
            Parallelism::Parallel(n) => (*n).max(1),
        }
    }
}

/// Autonomy level for escalation handling, per §6.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AutonomyLevel {
    HumanInTheLoop,
    Autonomous,
}

/// Narrow workflow-level configuration recognized by the core (§6).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    pub parallelism: Parallelism,
    pub on_failure: OnFailure,
    pub default_agent_type: crate::execution::AgentType,
    pub autonomy_level: AutonomyLevel,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            parallelism: Parallelism::Sequential,
            on_failure: OnFailure::Pause,
            default_agent_type: crate::execution::AgentType::Claude,
            autonomy_level: AutonomyLevel::HumanInTheLoop,
        }
    }
}

/// One node of a workflow; binds to at most one execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowStep {
    pub id: StepId,
    pub issue_id: IssueId,
    pub index: u32,
    #[serde(default)]
    pub depends_on: Vec<StepId>,
    pub status: StepStatus,
    pub execution_id: Option<ExecutionId>,
}

impl WorkflowStep {
    pub fn new(id: StepId, issue_id: IssueId, index: u32, depends_on: Vec<StepId>) -> Self {
        Self {
            id,
            issue_id,
            index,
            depends_on,
            status: StepStatus::Pending,
            execution_id: None,
        }
    }
}

/// An ordered, dependency-constrained group of executions with shared
/// policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Workflow {
    pub id: WorkflowId,
    pub title: String,
    pub status: WorkflowStatus,
    pub source: WorkflowSource,
    pub steps: Vec<WorkflowStep>,
    pub worktree_path: Option<String>,
    pub branch_name: Option<String>,
    pub base_branch: Option<String>,
    /// Only ever advances (invariant 5); failed steps leave it alone
    /// unless `config.on_failure == Continue`.
    pub current_step_index: u32,
    pub orchestrator_execution_id: Option<ExecutionId>,
    pub config: WorkflowConfig,
    pub created_at: i64,
    pub updated_at: i64,
}

impl Workflow {
    /// Steps whose dependencies are all `Completed` and which are
    /// themselves still `Pending`/`Ready`: the engine's ready-set.
    pub fn ready_steps(&self) -> Vec<&WorkflowStep> {
        self.steps
            .iter()
            .filter(|step| {
                matches!(step.status, StepStatus::Pending | StepStatus::Ready)
                    && step.depends_on.iter().all(|dep_id| {
                        self.steps
                            .iter()
                            .find(|s| &s.id == dep_id)
                            .map(|s| s.status == StepStatus::Completed)
                            .unwrap_or(false)
                    })
            })
            .collect()
    }

    /// Steps that directly depend on `step_id`.
    pub fn dependents_of(&self, step_id: &StepId) -> Vec<&WorkflowStep> {
        self.steps
            .iter()
            .filter(|s| s.depends_on.contains(step_id))
            .collect()
    }

    pub fn all_steps_terminal(&self) -> bool {
        self.steps.iter().all(|s| s.status.is_terminal())
    }

    pub fn any_step_failed(&self) -> bool {
        self.steps.iter().any(|s| s.status == StepStatus::Failed)
    }
}

#[cfg(test)]
#[path = "workflow_tests.rs"]
mod tests;
