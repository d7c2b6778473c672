// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Interprets [`Effect`] values against the live adapters. Grounded on
//! the teacher's `Executor<S,A,N,C>` — one `execute()` match arm per
//! effect variant, each wrapped in its own `tracing::info_span!`, all
//! mutating one shared, lockable state.
//!
//! `Effect::PersistLogEntry` is the one variant this interpreter treats
//! as a tracing no-op rather than a literal action: the payload it
//! would persist never travels with the effect (only `execution_id` and
//! `index` do), because the Execution Engine's streaming loop already
//! holds that payload live and calls `LogStore::append` directly as it
//! consumes the adapter's trajectory stream. Emitting the effect keeps
//! that persistence visible in the same structured-tracing shape as
//! every other side effect without requiring a second, lossy hop of the
//! payload through this interpreter.

use std::sync::Arc;

use loom_core::effect::{BusChannel, Effect};
use loom_core::interfaces::{EventEmitter, GitBackend};
use loom_core::project::ProjectId;
use loom_core::workflow::StepStatus;
use parking_lot::Mutex;
use tracing::info_span;

use crate::error::EngineError;
use crate::state::EngineState;

/// Executes [`Effect`]s that do not require a live, in-flight agent
/// session: worktree provisioning/teardown, bus publication, and
/// workflow/step bookkeeping. `SpawnAgent`, `CancelAgent`, and
/// `RespondToPermission` are routed by the Execution Engine directly to
/// the session it already holds — those variants exist primarily so a
/// reducer can describe "spawn" or "cancel" as data; this interpreter
/// only logs them here (see module docs on `PersistLogEntry`).
pub struct Executor {
    state: Arc<Mutex<EngineState>>,
    git: Arc<dyn GitBackend>,
    events: Arc<dyn EventEmitter>,
    /// The project's single repository root. One [`Executor`] is scoped
    /// to one open project (C9 gives each project its own instance).
    repo_path: String,
}

impl Executor {
    pub fn new(
        state: Arc<Mutex<EngineState>>,
        git: Arc<dyn GitBackend>,
        events: Arc<dyn EventEmitter>,
        repo_path: impl Into<String>,
    ) -> Self {
        Self { state, git, events, repo_path: repo_path.into() }
    }

    pub async fn execute(&self, project: &ProjectId, effect: Effect) -> Result<(), EngineError> {
        let span = info_span!("effect", name = effect.name());
        let _enter = span.enter();
        for (key, value) in effect.fields() {
            tracing::debug!(%key, %value, "effect field");
        }

        match effect {
            Effect::CreateWorktree { .. } => {
                // Provisioned synchronously by the Execution Engine's
                // `create()` before this effect would be reachable;
                // kept as a variant for symmetry and future callers
                // that want to re-request worktree creation via the
                // generic effect path.
                Ok(())
            }
            Effect::RemoveWorktree {
                execution_id,
                delete_branch,
                ..
            } => {
                let record = {
                    let mut state = self.state.lock();
                    state.remove_worktree(&execution_id)
                };
                if let Some(record) = record {
                    self.git
                        .remove_worktree(&self.repo_path, &record.path, delete_branch)
                        .await
                        .map_err(EngineError::from)?;
                }
                Ok(())
            }
            Effect::SpawnAgent { .. } | Effect::CancelAgent { .. } | Effect::RespondToPermission { .. } => {
                // Owned by the live session in the Execution Engine;
                // see module docs.
                Ok(())
            }
            Effect::PersistLogEntry { .. } => Ok(()),
            Effect::PublishToBus { project_id, channel } => {
                let channel_key = match &channel {
                    BusChannel::Execution(id) => format!("execution:{id}"),
                    BusChannel::Workflow(id) => format!("workflow:{id}"),
                };
                self.events
                    .publish(&project_id, &channel_key, serde_json::json!({ "channel": channel_key }));
                let _ = project;
                Ok(())
            }
            Effect::ScheduleTimer { .. } | Effect::ClearTimer { .. } => {
                // Owned by the Wakeup Service (C8); the Workflow Engine
                // calls it directly rather than through this
                // interpreter, since it needs the scheduled event's id
                // back.
                Ok(())
            }
            Effect::BindStepExecution {
                workflow_id,
                step_id,
                execution_id,
            } => {
                let mut state = self.state.lock();
                let workflow = state.get_workflow_mut(&workflow_id)?;
                let step = workflow
                    .steps
                    .iter_mut()
                    .find(|s| s.id == step_id)
                    .ok_or_else(|| EngineError::StepNotFound(step_id.to_string()))?;
                step.execution_id = Some(execution_id);
                step.status = StepStatus::Running;
                Ok(())
            }
            Effect::SkipDependents { workflow_id, step_id } => {
                let mut state = self.state.lock();
                let workflow = state.get_workflow_mut(&workflow_id)?;
                skip_dependents_recursive(workflow, &step_id);
                Ok(())
            }
        }
    }

    pub async fn execute_all(&self, project: &ProjectId, effects: Vec<Effect>) -> Result<(), EngineError> {
        for effect in effects {
            self.execute(project, effect).await?;
        }
        Ok(())
    }
}

fn skip_dependents_recursive(workflow: &mut loom_core::workflow::Workflow, step_id: &loom_core::workflow::StepId) {
    let dependent_ids: Vec<_> = workflow.dependents_of(step_id).into_iter().map(|s| s.id.clone()).collect();
    for dep_id in dependent_ids {
        if let Some(step) = workflow.steps.iter_mut().find(|s| s.id == dep_id) {
            if step.status.is_terminal() {
                continue;
            }
            step.status = StepStatus::Skipped;
        }
        skip_dependents_recursive(workflow, &dep_id);
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
