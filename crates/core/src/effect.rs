// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Side-effect commands emitted by the engine's pure state-transition
//! logic. Keeping `Effect` as plain data (rather than calling adapters
//! directly from the reducer) means the decision of *what* to do next
//! can be unit-tested without touching a filesystem, a subprocess, or a
//! clock; a separate executor task performs each effect.

use crate::execution::{AgentType, ExecutionId, ExecutionMode};
use crate::owner::OwnerId;
use crate::project::ProjectId;
use crate::workflow::{StepId, WorkflowId};
use crate::workflow_event::WorkflowEventId;

/// A command to be carried out by an executor, produced by a reducer
/// reacting to an incoming command or adapter event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Provision a worktree for an execution about to enter `preparing`.
    CreateWorktree {
        project_id: ProjectId,
        execution_id: ExecutionId,
        mode: ExecutionMode,
    },
    /// Remove a worktree after its execution has reached a terminal
    /// state and explicit cleanup was requested.
    RemoveWorktree {
        project_id: ProjectId,
        execution_id: ExecutionId,
        delete_branch: bool,
    },
    /// Spawn the agent subprocess/PTY and begin streaming its
    /// trajectory.
    SpawnAgent {
        project_id: ProjectId,
        execution_id: ExecutionId,
        agent_type: AgentType,
        prompt: String,
        resume_session_id: Option<String>,
    },
    /// Request the adapter cancel the in-flight prompt, falling back to
    /// process termination per §5's cancellation cascade.
    CancelAgent {
        project_id: ProjectId,
        execution_id: ExecutionId,
    },
    /// Forward a permission response to the adapter awaiting it.
    RespondToPermission {
        execution_id: ExecutionId,
        request_id: String,
        option_id: String,
    },
    /// Persist a normalized log entry via the Logs Store (C4).
    PersistLogEntry {
        execution_id: ExecutionId,
        index: u64,
    },
    /// Publish a message on the Transport / Fan-out Bus (C5).
    PublishToBus {
        project_id: ProjectId,
        channel: BusChannel,
    },
    /// Schedule a durable timer with the Wakeup / Await Service (C8).
    ScheduleTimer {
        owner: OwnerId,
        timeout_at_millis: i64,
    },
    /// Mark a previously scheduled timer's backing event processed
    /// without running its fire action (an explicit `clear`).
    ClearTimer { event_id: WorkflowEventId },
    /// Bind a ready workflow step to a new execution via C6.
    BindStepExecution {
        workflow_id: WorkflowId,
        step_id: StepId,
        execution_id: ExecutionId,
    },
    /// Recursively mark a step and its dependents skipped under
    /// `onFailure = continue`.
    SkipDependents {
        workflow_id: WorkflowId,
        step_id: StepId,
    },
}

/// A fan-out bus channel key, per C5's `(projectId, executionId)` /
/// `(projectId, workflowId)` scheme.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BusChannel {
    Execution(ExecutionId),
    Workflow(WorkflowId),
}

impl Effect {
    /// Stable name for structured log fields, independent of payload
    /// contents.
    pub fn name(&self) -> &'static str {
        match self {
            Effect::CreateWorktree { .. } => "create_worktree",
            Effect::RemoveWorktree { .. } => "remove_worktree",
            Effect::SpawnAgent { .. } => "spawn_agent",
            Effect::CancelAgent { .. } => "cancel_agent",
            Effect::RespondToPermission { .. } => "respond_to_permission",
            Effect::PersistLogEntry { .. } => "persist_log_entry",
            Effect::PublishToBus { .. } => "publish_to_bus",
            Effect::ScheduleTimer { .. } => "schedule_timer",
            Effect::ClearTimer { .. } => "clear_timer",
            Effect::BindStepExecution { .. } => "bind_step_execution",
            Effect::SkipDependents { .. } => "skip_dependents",
        }
    }

    /// Structured fields for a `tracing::debug!` call site, as key-value
    /// pairs. Kept to strings so callers can feed them to `tracing`
    /// without matching on the enum themselves.
    pub fn fields(&self) -> Vec<(&'static str, String)> {
        match self {
            Effect::CreateWorktree {
                execution_id,
                mode,
                ..
            } => vec![
                ("execution_id", execution_id.to_string()),
                ("mode", format!("{mode:?}")),
            ],
            Effect::RemoveWorktree {
                execution_id,
                delete_branch,
                ..
            } => vec![
                ("execution_id", execution_id.to_string()),
                ("delete_branch", delete_branch.to_string()),
            ],
            Effect::SpawnAgent {
                execution_id,
                agent_type,
                resume_session_id,
                ..
            } => vec![
                ("execution_id", execution_id.to_string()),
                ("agent_type", format!("{agent_type:?}")),
                (
                    "resume_session_id",
                    resume_session_id.clone().unwrap_or_default(),
                ),
            ],
            Effect::CancelAgent { execution_id, .. } => {
                vec![("execution_id", execution_id.to_string())]
            }
            Effect::RespondToPermission {
                execution_id,
                request_id,
                ..
            } => vec![
                ("execution_id", execution_id.to_string()),
                ("request_id", request_id.clone()),
            ],
            Effect::PersistLogEntry {
                execution_id,
                index,
            } => vec![
                ("execution_id", execution_id.to_string()),
                ("index", index.to_string()),
            ],
            Effect::PublishToBus { channel, .. } => match channel {
                BusChannel::Execution(id) => vec![("channel", format!("execution:{id}"))],
                BusChannel::Workflow(id) => vec![("channel", format!("workflow:{id}"))],
            },
            Effect::ScheduleTimer {
                owner,
                timeout_at_millis,
            } => vec![
                ("owner_prefix", owner.prefix().to_string()),
                ("timeout_at_millis", timeout_at_millis.to_string()),
            ],
            Effect::ClearTimer { event_id } => vec![("event_id", event_id.to_string())],
            Effect::BindStepExecution {
                step_id,
                execution_id,
                ..
            } => vec![
                ("step_id", step_id.to_string()),
                ("execution_id", execution_id.to_string()),
            ],
            Effect::SkipDependents { step_id, .. } => vec![("step_id", step_id.to_string())],
        }
    }
}

#[cfg(test)]
#[path = "effect_tests.rs"]
mod tests;
