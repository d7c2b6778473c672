// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workflow Engine (C7): the sequential engine (§4.7.1) and the
//! orchestrator's tool-call surface (§4.7.2) share one state machine,
//! both driven on top of the Execution Engine (C6). Grounded on the
//! teacher's `Runtime` job-queue loop — a shared ready-set, worker
//! slots bounded by a parallelism policy, and a single mutation path
//! per workflow — narrowed here to steps bound 1:1 to executions
//! instead of shelled-out jobs.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use loom_core::clock::Clock;
use loom_core::execution::{AgentType, ExecutionId, ExecutionMode, ExecutionStatus};
use loom_core::execution_log::{ExecutionLogEntry, PermissionOption};
use loom_core::id::IdGen;
use loom_core::interfaces::EventEmitter;
use loom_core::issue::IssueId;
use loom_core::owner::OwnerId;
use loom_core::permission::{Decision, DecisionId, DecisionSource};
use loom_core::project::ProjectId;
use loom_core::workflow::{
    OnFailure, StepId, StepStatus, Workflow, WorkflowConfig, WorkflowId, WorkflowSource, WorkflowStatus, WorkflowStep,
};
use loom_core::workflow_event::{StepFailureReason, WorkflowEventType};
use loom_storage::LogStore;
use parking_lot::Mutex as SyncMutex;

use crate::error::EngineError;
use crate::execution_engine::{CreateExecutionParams, ExecutionEngine, WorkflowContext};
use crate::executor::Executor;
use crate::state::EngineState;
use crate::wakeup::WakeupService;

/// Input shape for one step of a workflow under construction; `depends_on`
/// must name sibling ids within the same `create()` call (invariant 7).
#[derive(Debug, Clone)]
pub struct NewStep {
    pub id: StepId,
    pub issue_id: IssueId,
    pub depends_on: Vec<StepId>,
}

pub struct WorkflowEngine<G: IdGen, C: Clock> {
    project: ProjectId,
    state: Arc<SyncMutex<EngineState>>,
    execution_engine: Arc<ExecutionEngine<G, C>>,
    executor: Arc<Executor>,
    wakeup: Arc<WakeupService<C>>,
    events: Arc<dyn EventEmitter>,
    logs: Arc<SyncMutex<LogStore>>,
    id_gen: G,
    clock: C,
}

impl<G: IdGen + 'static, C: Clock + Clone + 'static> WorkflowEngine<G, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project: ProjectId,
        state: Arc<SyncMutex<EngineState>>,
        execution_engine: Arc<ExecutionEngine<G, C>>,
        executor: Arc<Executor>,
        wakeup: Arc<WakeupService<C>>,
        events: Arc<dyn EventEmitter>,
        logs: Arc<SyncMutex<LogStore>>,
        id_gen: G,
        clock: C,
    ) -> Self {
        Self { project, state, execution_engine, executor, wakeup, events, logs, id_gen, clock }
    }

    /// Validates the step DAG and persists a new `pending` workflow.
    /// Does not start it — call [`Self::start`] once subscribers are
    /// wired up.
    pub fn create(&self, title: impl Into<String>, source: WorkflowSource, steps: Vec<NewStep>, config: WorkflowConfig) -> Result<Workflow, EngineError> {
        validate_dag(&steps)?;

        let id = WorkflowId::new(self.id_gen.next());
        let now = self.clock.now_millis();
        let steps = steps
            .into_iter()
            .enumerate()
            .map(|(index, s)| WorkflowStep::new(s.id, s.issue_id, index as u32, s.depends_on))
            .collect();

        let workflow = Workflow {
            id: id.clone(),
            title: title.into(),
            status: WorkflowStatus::Pending,
            source,
            steps,
            worktree_path: None,
            branch_name: None,
            base_branch: None,
            current_step_index: 0,
            orchestrator_execution_id: None,
            config,
            created_at: now,
            updated_at: now,
        };
        self.state.lock().insert_workflow(workflow.clone());
        Ok(workflow)
    }

    /// Transitions a `pending` workflow to `running`, subscribes to its
    /// own bus channel for step-terminal notifications (published by
    /// [`ExecutionEngine::create`]'s streaming task), and kicks off the
    /// first wave of ready steps.
    pub async fn start(self: &Arc<Self>, workflow_id: &WorkflowId) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock();
            let workflow = state.get_workflow_mut(workflow_id)?;
            workflow.status = WorkflowStatus::Running;
            workflow.updated_at = self.clock.now_millis();
        }
        self.spawn_subscriber(workflow_id.clone());
        self.advance(workflow_id).await
    }

    fn spawn_subscriber(self: &Arc<Self>, workflow_id: WorkflowId) {
        let engine = self.clone();
        let events = self.events.clone();
        let project = self.project.clone();
        tokio::spawn(async move {
            let mut receiver = events.subscribe(&project, &format!("workflow:{workflow_id}")).await;
            while let Ok(message) = receiver.recv().await {
                if message.get("kind").and_then(|v| v.as_str()) != Some("step_terminal") {
                    continue;
                }
                let Some(step_id) = message.get("step_id").and_then(|v| v.as_str()) else { continue };
                let Some(status) = message.get("status").and_then(|v| v.as_str()) else { continue };
                if let Err(err) = engine.handle_step_terminal(&workflow_id, &StepId::new(step_id), status).await {
                    tracing::warn!(%workflow_id, error = %err, "failed to process step terminal event");
                }
            }
        });
    }

    /// Fills every open worker slot with a ready step. A no-op unless
    /// the workflow is `running`. Loops rather than taking one pass:
    /// a step that fails before any execution is ever spawned (a
    /// prompt-render or agent-spawn failure) frees its slot within the
    /// same tick, with no terminal bus event to trigger a second call —
    /// so this keeps filling slots until a pass starts nothing new.
    pub async fn advance(&self, workflow_id: &WorkflowId) -> Result<(), EngineError> {
        loop {
            let to_start = {
                let mut state = self.state.lock();
                let workflow = state.get_workflow_mut(workflow_id)?;
                if workflow.status != WorkflowStatus::Running {
                    return Ok(());
                }

                let ready_ids: Vec<StepId> = workflow.ready_steps().into_iter().map(|s| s.id.clone()).collect();
                for step in workflow.steps.iter_mut() {
                    if ready_ids.contains(&step.id) {
                        step.status = StepStatus::Ready;
                    }
                }

                let running = workflow.steps.iter().filter(|s| s.status == StepStatus::Running).count() as u32;
                let slots = workflow.config.parallelism.slot_count();
                let available = slots.saturating_sub(running) as usize;

                let mut ready: Vec<&WorkflowStep> = workflow.steps.iter().filter(|s| s.status == StepStatus::Ready).collect();
                ready.sort_by_key(|s| s.index);
                ready.into_iter().take(available).map(|s| (s.id.clone(), s.issue_id.clone())).collect::<Vec<_>>()
            };

            if to_start.is_empty() {
                break;
            }
            for (step_id, issue_id) in to_start {
                self.start_step(workflow_id, &step_id, &issue_id).await;
            }
        }
        self.maybe_finish(workflow_id);
        Ok(())
    }

    async fn start_step(&self, workflow_id: &WorkflowId, step_id: &StepId, issue_id: &IssueId) {
        let agent_type = self.state.lock().get_workflow(workflow_id).map(|w| w.config.default_agent_type).unwrap_or(AgentType::Claude);
        let base_branch = self.state.lock().get_workflow(workflow_id).ok().and_then(|w| w.base_branch.clone());

        let prompt = match self.execution_engine.prepare(issue_id).await {
            Ok(prompt) => prompt,
            Err(err) => {
                self.fail_step(workflow_id, step_id, StepFailureReason::AgentFailure).await;
                tracing::warn!(%workflow_id, %step_id, error = %err, "failed to prepare step prompt");
                return;
            }
        };

        let params = CreateExecutionParams {
            issue_id: Some(issue_id.clone()),
            agent_type,
            mode: ExecutionMode::Worktree,
            prompt,
            target_branch: base_branch,
            workflow_context: Some(WorkflowContext { workflow_id: workflow_id.clone(), step_id: step_id.clone() }),
        };

        match self.execution_engine.create(params).await {
            Ok(execution) => {
                let _ = self
                    .executor
                    .execute(
                        &self.project,
                        loom_core::effect::Effect::BindStepExecution {
                            workflow_id: workflow_id.clone(),
                            step_id: step_id.clone(),
                            execution_id: execution.id,
                        },
                    )
                    .await;
            }
            Err(err) => {
                tracing::warn!(%workflow_id, %step_id, error = %err, "failed to spawn step execution");
                self.fail_step(workflow_id, step_id, StepFailureReason::AgentFailure).await;
            }
        }
    }

    async fn fail_step(&self, workflow_id: &WorkflowId, step_id: &StepId, reason: StepFailureReason) {
        let now = self.clock.now_millis();
        {
            let mut state = self.state.lock();
            if let Ok(workflow) = state.get_workflow_mut(workflow_id) {
                if let Some(step) = workflow.steps.iter_mut().find(|s| &s.id == step_id) {
                    step.status = StepStatus::Failed;
                }
                workflow.updated_at = now;
                let event = loom_core::workflow_event::WorkflowEvent::new(
                    loom_core::workflow_event::WorkflowEventId::new(self.id_gen.next()),
                    workflow_id.clone(),
                    WorkflowEventType::StepFailed { reason },
                    now,
                );
                state.insert_workflow_event(event);
            }
        }
        self.apply_on_failure(workflow_id, step_id).await;
    }

    async fn handle_step_terminal(&self, workflow_id: &WorkflowId, step_id: &StepId, status: &str) -> Result<(), EngineError> {
        let now = self.clock.now_millis();
        let completed = status == "Completed";
        {
            let mut state = self.state.lock();
            let workflow = state.get_workflow_mut(workflow_id)?;
            let step = workflow.steps.iter_mut().find(|s| &s.id == step_id).ok_or_else(|| EngineError::StepNotFound(step_id.to_string()))?;
            step.status = if completed { StepStatus::Completed } else { StepStatus::Failed };
            workflow.updated_at = now;
        }

        if !completed {
            self.apply_on_failure(workflow_id, step_id).await;
        }
        self.advance(workflow_id).await
    }

    async fn apply_on_failure(&self, workflow_id: &WorkflowId, step_id: &StepId) {
        let policy = self.state.lock().get_workflow(workflow_id).map(|w| w.config.on_failure).unwrap_or(OnFailure::Pause);
        match policy {
            OnFailure::Pause => {
                let mut state = self.state.lock();
                if let Ok(workflow) = state.get_workflow_mut(workflow_id) {
                    workflow.status = WorkflowStatus::Paused;
                }
            }
            OnFailure::Continue => {
                let _ = self
                    .executor
                    .execute(&self.project, loom_core::effect::Effect::SkipDependents { workflow_id: workflow_id.clone(), step_id: step_id.clone() })
                    .await;
            }
            OnFailure::Abort => {
                let running_executions: Vec<ExecutionId> = {
                    let mut state = self.state.lock();
                    let ids = state
                        .get_workflow(workflow_id)
                        .map(|w| w.steps.iter().filter(|s| s.status == StepStatus::Running).filter_map(|s| s.execution_id.clone()).collect())
                        .unwrap_or_default();
                    if let Ok(workflow) = state.get_workflow_mut(workflow_id) {
                        workflow.status = WorkflowStatus::Failed;
                    }
                    ids
                };
                for execution_id in running_executions {
                    let _ = self.execution_engine.cancel(&execution_id).await;
                }
            }
        }
    }

    fn maybe_finish(&self, workflow_id: &WorkflowId) {
        let mut state = self.state.lock();
        let Ok(workflow) = state.get_workflow_mut(workflow_id) else { return };
        if workflow.status != WorkflowStatus::Running {
            return;
        }
        if workflow.all_steps_terminal() {
            workflow.status = if workflow.any_step_failed() { WorkflowStatus::Failed } else { WorkflowStatus::Completed };
            workflow.updated_at = self.clock.now_millis();
        }
    }

    /// `pause` refuses to start new steps but lets in-flight steps finish.
    pub fn pause(&self, workflow_id: &WorkflowId) -> Result<(), EngineError> {
        let mut state = self.state.lock();
        let workflow = state.get_workflow_mut(workflow_id)?;
        if workflow.status == WorkflowStatus::Running {
            workflow.status = WorkflowStatus::Paused;
        }
        Ok(())
    }

    pub async fn resume(self: &Arc<Self>, workflow_id: &WorkflowId) -> Result<(), EngineError> {
        {
            let mut state = self.state.lock();
            let workflow = state.get_workflow_mut(workflow_id)?;
            if workflow.status != WorkflowStatus::Paused {
                return Ok(());
            }
            workflow.status = WorkflowStatus::Running;
        }
        self.advance(workflow_id).await
    }

    /// Cancels in-flight steps and marks the workflow `cancelled`.
    pub async fn cancel(&self, workflow_id: &WorkflowId) -> Result<(), EngineError> {
        let running_executions: Vec<ExecutionId> = {
            let mut state = self.state.lock();
            let workflow = state.get_workflow_mut(workflow_id)?;
            let ids = workflow.steps.iter().filter(|s| s.status == StepStatus::Running).filter_map(|s| s.execution_id.clone()).collect();
            workflow.status = WorkflowStatus::Cancelled;
            ids
        };
        for execution_id in running_executions {
            let _ = self.execution_engine.cancel(&execution_id).await;
        }
        Ok(())
    }

    /// §4.7.3 recovery: on process start, every `running`/`paused` step
    /// whose bound execution is non-terminal could not have survived a
    /// host crash, so it is marked `failed(reason=crashed)` and the
    /// workflow's `onFailure` policy is applied. `paused` workflows are
    /// left paused; `completed`/`cancelled`/`failed` rows are untouched.
    pub async fn recover(&self) {
        let crashed: Vec<(WorkflowId, StepId)> = {
            let state = self.state.lock();
            state
                .workflows
                .values()
                .filter(|w| !w.status.is_terminal())
                .flat_map(|w| {
                    w.steps
                        .iter()
                        .filter(|s| s.status == StepStatus::Running)
                        .filter_map(|s| {
                            let execution_id = s.execution_id.as_ref()?;
                            let non_terminal = state.executions.get(execution_id).map(|e| !e.status.is_terminal()).unwrap_or(true);
                            non_terminal.then(|| (w.id.clone(), s.id.clone()))
                        })
                        .collect::<Vec<_>>()
                })
                .collect()
        };

        let mut touched: HashSet<WorkflowId> = HashSet::new();
        for (workflow_id, step_id) in &crashed {
            touched.insert(workflow_id.clone());
            self.fail_step(workflow_id, step_id, StepFailureReason::Crashed).await;
        }

        // A crashed step's failure only marks its own row (and, under
        // `Continue`, its dependents) terminal — nothing else pumps the
        // ready-set afterward. Without this, a workflow recovered with
        // `onFailure=continue` would never start the sibling steps that
        // were always independent of the crash.
        for workflow_id in touched {
            if let Err(err) = self.advance(&workflow_id).await {
                tracing::warn!(%workflow_id, error = %err, "failed to advance workflow after recovery");
            }
        }
    }

    // ---- Orchestrator engine tool-call surface (§4.7.2) ----

    pub fn workflow_status(&self, workflow_id: &WorkflowId) -> Result<WorkflowStatusView, EngineError> {
        let state = self.state.lock();
        let workflow = state.get_workflow(workflow_id)?;
        Ok(WorkflowStatusView {
            status: workflow.status,
            steps: workflow.steps.clone(),
            ready_step_ids: workflow.ready_steps().into_iter().map(|s| s.id.clone()).collect(),
        })
    }

    /// `execute_issue(issueId, config?)`: launches a child execution not
    /// bound to a pre-declared step, appending a fresh step to the
    /// orchestrator's workflow so its terminal status still flows
    /// through the same `BindStepExecution`/bus machinery.
    pub async fn execute_issue(&self, workflow_id: &WorkflowId, issue_id: IssueId, agent_type: Option<AgentType>) -> Result<ExecutionId, EngineError> {
        let step_id = StepId::new(self.id_gen.next());
        {
            let mut state = self.state.lock();
            let workflow = state.get_workflow_mut(workflow_id)?;
            let index = workflow.steps.len() as u32;
            workflow.steps.push(WorkflowStep::new(step_id.clone(), issue_id.clone(), index, vec![]));
        }

        let agent_type = agent_type.unwrap_or_else(|| self.state.lock().get_workflow(workflow_id).map(|w| w.config.default_agent_type).unwrap_or(AgentType::Claude));
        let prompt = self.execution_engine.prepare(&issue_id).await?;
        let execution = self
            .execution_engine
            .create(CreateExecutionParams {
                issue_id: Some(issue_id),
                agent_type,
                mode: ExecutionMode::Worktree,
                prompt,
                target_branch: None,
                workflow_context: Some(WorkflowContext { workflow_id: workflow_id.clone(), step_id: step_id.clone() }),
            })
            .await?;

        self.executor
            .execute(&self.project, loom_core::effect::Effect::BindStepExecution { workflow_id: workflow_id.clone(), step_id, execution_id: execution.id.clone() })
            .await?;
        Ok(execution.id)
    }

    pub fn execution_status(&self, execution_id: &ExecutionId) -> Result<ExecutionStatus, EngineError> {
        self.execution_engine.get(execution_id).map(|e| e.status)
    }

    pub fn execution_trajectory(&self, execution_id: &ExecutionId, from_index: u64, limit: usize) -> Result<Vec<ExecutionLogEntry>, EngineError> {
        self.logs.lock().read(execution_id, from_index, limit).map_err(EngineError::from)
    }

    pub fn execution_changes(&self, execution_id: &ExecutionId) -> Result<Vec<String>, EngineError> {
        self.execution_engine.get(execution_id).map(|e| e.files_changed)
    }

    pub async fn execution_cancel(&self, execution_id: &ExecutionId) -> Result<(), EngineError> {
        self.execution_engine.cancel(execution_id).await
    }

    /// `workflow_complete({status, summary})`: the orchestrator's own
    /// terminal transition, distinct from the sequential engine's
    /// automatic one.
    pub fn workflow_complete(&self, workflow_id: &WorkflowId, status: WorkflowStatus, summary: impl Into<String>) -> Result<(), EngineError> {
        let summary = summary.into();
        let mut state = self.state.lock();
        let workflow = state.get_workflow_mut(workflow_id)?;
        workflow.status = status;
        workflow.updated_at = self.clock.now_millis();
        tracing::info!(%workflow_id, %summary, "workflow completed by orchestrator");
        Ok(())
    }

    /// `escalate_to_user({message, options})`: enqueues a human decision
    /// and parks the caller on C8 until it resolves or times out.
    pub fn escalate_to_user(&self, workflow_id: &WorkflowId, message: impl Into<String>, options: Vec<PermissionOption>) -> DecisionId {
        let id = DecisionId::new(self.id_gen.next());
        let now = self.clock.now_millis();
        let decision = Decision::new(id.clone(), DecisionSource::OrchestratorEscalation { workflow_id: workflow_id.clone() }, message, options, now);
        self.state.lock().insert_decision(decision);
        id
    }

    pub fn resolve_escalation(&self, decision_id: &DecisionId, option_id: &str) -> Result<bool, EngineError> {
        let mut state = self.state.lock();
        let decision = state.get_decision_mut(decision_id)?;
        Ok(decision.resolve(option_id))
    }

    pub fn notify_user(&self, workflow_id: &WorkflowId, level: &str, message: &str) {
        self.events.publish(&self.project, &format!("workflow:{workflow_id}"), serde_json::json!({ "kind": "notify_user", "level": level, "message": message }));
    }

    /// `await_event({eventTypes, timeoutSeconds})`: registers a durable
    /// timer with C8; the caller polls [`WakeupService::due_events`] (or
    /// is woken by a future host-side park mechanism) to learn whether
    /// it matched or timed out.
    pub fn await_event(&self, workflow_id: &WorkflowId, timeout_seconds: i64) -> loom_core::workflow_event::WorkflowEventId {
        let event_id = format!("await-{}", self.id_gen.next());
        let timeout_at = self.clock.now_millis() + timeout_seconds * 1_000;
        self.wakeup.schedule(event_id.clone(), OwnerId::workflow(workflow_id.clone()), timeout_at);
        loom_core::workflow_event::WorkflowEventId::new(event_id)
    }
}

#[derive(Debug, Clone)]
pub struct WorkflowStatusView {
    pub status: WorkflowStatus,
    pub steps: Vec<WorkflowStep>,
    pub ready_step_ids: Vec<StepId>,
}

fn validate_dag(steps: &[NewStep]) -> Result<(), EngineError> {
    let ids: std::collections::HashSet<&StepId> = steps.iter().map(|s| &s.id).collect();
    for step in steps {
        for dep in &step.depends_on {
            if !ids.contains(dep) {
                return Err(EngineError::CyclicOrForeignDependency);
            }
        }
    }

    let mut visiting: HashMap<&StepId, bool> = HashMap::new();
    let by_id: HashMap<&StepId, &NewStep> = steps.iter().map(|s| (&s.id, s)).collect();

    fn visit<'a>(id: &'a StepId, by_id: &HashMap<&'a StepId, &'a NewStep>, visiting: &mut HashMap<&'a StepId, bool>) -> Result<(), EngineError> {
        match visiting.get(id) {
            Some(true) => return Err(EngineError::CyclicOrForeignDependency),
            Some(false) => return Ok(()),
            None => {}
        }
        visiting.insert(id, true);
        if let Some(step) = by_id.get(id) {
            for dep in &step.depends_on {
                visit(dep, by_id, visiting)?;
            }
        }
        visiting.insert(id, false);
        Ok(())
    }

    for step in steps {
        visit(&step.id, &by_id, &mut visiting)?;
    }
    Ok(())
}

#[cfg(test)]
#[path = "workflow_engine_tests.rs"]
mod tests;
