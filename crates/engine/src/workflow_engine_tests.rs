// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loom_core::clock::FakeClock;
use loom_core::config::EngineConfig;
use loom_core::error::ClassifiedError;
use loom_core::execution::{AgentType, ExecutionStatus};
use loom_core::id::SequentialIdGen;
use loom_core::interfaces::GitBackend;
use loom_core::issue::{Issue, IssueId, IssueStatus, Priority};
use loom_core::project::ProjectId;
use loom_core::test_support::{FakeEntityStore, FakeEventEmitter};
use loom_core::workflow::{OnFailure, Parallelism, StepId, StepStatus, WorkflowConfig, WorkflowSource, WorkflowStatus};
use loom_adapters::{AgentAdapter, AgentError, FakeAgentAdapter, RunConfig, TrajectoryStream};
use parking_lot::Mutex as SyncMutex;

use super::*;
use crate::adapter_factory::AgentAdapterFactory;
use crate::execution_engine::ExecutionEngine;
use crate::wakeup::WakeupService;

#[derive(Default)]
struct FakeGitBackend;

#[async_trait]
impl GitBackend for FakeGitBackend {
    async fn create_worktree(&self, _: &str, _: &str, _: &str, _: &str, _: bool, _: &[String]) -> Result<(), ClassifiedError> {
        Ok(())
    }
    async fn remove_worktree(&self, _: &str, _: &str, _: bool) -> Result<(), ClassifiedError> {
        Ok(())
    }
    async fn list_worktrees(&self, _: &str) -> Result<Vec<String>, ClassifiedError> {
        Ok(vec![])
    }
    async fn rev_parse_head(&self, _: &str) -> Result<String, ClassifiedError> {
        Ok("deadbeef".into())
    }
    async fn diff_names(&self, _: &str, _: &str, _: &str) -> Result<Vec<String>, ClassifiedError> {
        Ok(vec![])
    }
    async fn branch_exists(&self, _: &str, _: &str) -> Result<bool, ClassifiedError> {
        Ok(true)
    }
    async fn create_branch(&self, _: &str, _: &str, _: &str) -> Result<(), ClassifiedError> {
        Ok(())
    }
    async fn delete_branch(&self, _: &str, _: &str) -> Result<(), ClassifiedError> {
        Ok(())
    }
    async fn list_branches(&self, _: &str) -> Result<Vec<String>, ClassifiedError> {
        Ok(vec![])
    }
}

struct SharedFakeAdapter(Arc<FakeAgentAdapter>);

#[async_trait]
impl AgentAdapter for SharedFakeAdapter {
    async fn run(&self, config: RunConfig) -> Result<TrajectoryStream, AgentError> {
        self.0.run(config).await
    }
    async fn resume(&self, session_id: &str, config: RunConfig) -> Result<TrajectoryStream, AgentError> {
        self.0.resume(session_id, config).await
    }
    async fn fork(&self, session_id: &str) -> Result<String, AgentError> {
        self.0.fork(session_id).await
    }
    async fn cancel(&self) -> Result<(), AgentError> {
        self.0.cancel().await
    }
    async fn interrupt_with(&self, prompt: &str) -> Result<TrajectoryStream, AgentError> {
        self.0.interrupt_with(prompt).await
    }
    async fn set_mode(&self, mode: loom_adapters::AgentMode) -> Result<(), AgentError> {
        self.0.set_mode(mode).await
    }
    async fn respond_to_permission(&self, request_id: &str, option_id: &str) -> Result<(), AgentError> {
        self.0.respond_to_permission(request_id, option_id).await
    }
}

/// Hands out a fresh [`FakeAgentAdapter`] per execution, each scripted
/// to complete immediately with no trajectory entries — enough for the
/// workflow engine's scheduling logic, which only cares about terminal
/// status.
struct AutoCompleteAgentAdapterFactory;

impl AgentAdapterFactory for AutoCompleteAgentAdapterFactory {
    fn create(&self, _agent_type: AgentType) -> Result<Box<dyn AgentAdapter>, EngineError> {
        let fake = Arc::new(FakeAgentAdapter::new());
        fake.set_script(vec![]);
        Ok(Box::new(SharedFakeAdapter(fake)))
    }
}

/// Scripted to fail: every `run`/`resume` call errors immediately, so
/// the spawned execution never starts.
struct AlwaysFailAgentAdapterFactory;

impl AgentAdapterFactory for AlwaysFailAgentAdapterFactory {
    fn create(&self, _agent_type: AgentType) -> Result<Box<dyn AgentAdapter>, EngineError> {
        let fake = Arc::new(FakeAgentAdapter::new());
        fake.set_run_error("boom");
        Ok(Box::new(SharedFakeAdapter(fake)))
    }
}

fn issue(id: &str) -> Issue {
    Issue { id: IssueId::new(id), title: format!("issue {id}"), content: "details".into(), status: IssueStatus::Open, priority: Priority::Medium, relationships: vec![], created_at: 0, updated_at: 0 }
}

fn harness(agents: Arc<dyn AgentAdapterFactory>) -> Arc<WorkflowEngine<SequentialIdGen, FakeClock>> {
    let state = Arc::new(SyncMutex::new(EngineState::new()));
    let entities = Arc::new(FakeEntityStore::new());
    for id in ["i-1", "i-2", "i-3"] {
        entities.insert_issue(issue(id));
    }

    let log_dir = tempfile::tempdir().expect("tempdir");
    let logs = Arc::new(SyncMutex::new(loom_storage::LogStore::new(log_dir.into_path())));
    let git: Arc<dyn GitBackend> = Arc::new(FakeGitBackend);
    let events: Arc<dyn loom_core::interfaces::EventEmitter> = Arc::new(FakeEventEmitter::new());
    let executor = Arc::new(crate::executor::Executor::new(state.clone(), git.clone(), events.clone(), "/repo"));
    let clock = FakeClock::new(0);
    let wakeup = Arc::new(WakeupService::new(state.clone(), clock.clone()));

    let execution_engine = Arc::new(ExecutionEngine::new(
        ProjectId::new("p-1"),
        "/repo",
        EngineConfig::default(),
        state.clone(),
        entities,
        git,
        events.clone(),
        agents,
        logs.clone(),
        executor.clone(),
        SequentialIdGen::new("e"),
        clock.clone(),
    ));

    Arc::new(WorkflowEngine::new(ProjectId::new("p-1"), state, execution_engine, executor, wakeup, events, logs, SequentialIdGen::new("w"), clock))
}

fn steps_chain() -> Vec<NewStep> {
    vec![
        NewStep { id: StepId::new("s-1"), issue_id: IssueId::new("i-1"), depends_on: vec![] },
        NewStep { id: StepId::new("s-2"), issue_id: IssueId::new("i-2"), depends_on: vec![StepId::new("s-1")] },
        NewStep { id: StepId::new("s-3"), issue_id: IssueId::new("i-3"), depends_on: vec![StepId::new("s-2")] },
    ]
}

async fn wait_until<F: Fn() -> bool>(predicate: F) {
    for _ in 0..200 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true");
}

#[test]
fn create_rejects_a_foreign_dependency() {
    let engine = harness(Arc::new(AutoCompleteAgentAdapterFactory));
    let steps = vec![NewStep { id: StepId::new("s-1"), issue_id: IssueId::new("i-1"), depends_on: vec![StepId::new("ghost")] }];
    let err = engine.create("wf", WorkflowSource::Issues { issue_ids: vec![] }, steps, WorkflowConfig::default()).expect_err("rejected");
    assert!(matches!(err, EngineError::CyclicOrForeignDependency));
}

#[test]
fn create_rejects_a_cycle() {
    let engine = harness(Arc::new(AutoCompleteAgentAdapterFactory));
    let steps = vec![
        NewStep { id: StepId::new("s-1"), issue_id: IssueId::new("i-1"), depends_on: vec![StepId::new("s-2")] },
        NewStep { id: StepId::new("s-2"), issue_id: IssueId::new("i-2"), depends_on: vec![StepId::new("s-1")] },
    ];
    let err = engine.create("wf", WorkflowSource::Issues { issue_ids: vec![] }, steps, WorkflowConfig::default()).expect_err("rejected");
    assert!(matches!(err, EngineError::CyclicOrForeignDependency));
}

#[tokio::test]
async fn a_sequential_workflow_runs_its_steps_in_order_to_completion() {
    let engine = harness(Arc::new(AutoCompleteAgentAdapterFactory));
    let config = WorkflowConfig { parallelism: Parallelism::Sequential, on_failure: OnFailure::Pause, default_agent_type: AgentType::Fake, autonomy_level: loom_core::workflow::AutonomyLevel::Autonomous };
    let workflow = engine.create("wf", WorkflowSource::Issues { issue_ids: vec![] }, steps_chain(), config).expect("create succeeds");

    engine.start(&workflow.id).await.expect("start succeeds");

    wait_until(|| {
        let status = engine.workflow_status(&workflow.id).expect("status").status;
        matches!(status, WorkflowStatus::Completed | WorkflowStatus::Failed)
    })
    .await;

    let status = engine.workflow_status(&workflow.id).expect("status");
    assert_eq!(status.status, WorkflowStatus::Completed);
    assert!(status.steps.iter().all(|s| s.status == StepStatus::Completed));
}

#[tokio::test]
async fn on_failure_continue_skips_only_the_failed_steps_dependents() {
    let engine = harness(Arc::new(AlwaysFailAgentAdapterFactory));
    let config = WorkflowConfig { parallelism: Parallelism::Sequential, on_failure: OnFailure::Continue, default_agent_type: AgentType::Fake, autonomy_level: loom_core::workflow::AutonomyLevel::Autonomous };
    let independent = NewStep { id: StepId::new("s-indep"), issue_id: IssueId::new("i-3"), depends_on: vec![] };
    let mut steps = steps_chain();
    steps.push(independent);
    let workflow = engine.create("wf", WorkflowSource::Issues { issue_ids: vec![] }, steps, config).expect("create succeeds");

    engine.start(&workflow.id).await.expect("start succeeds");

    wait_until(|| {
        let status = engine.workflow_status(&workflow.id).expect("status");
        status.steps.iter().all(|s| s.status.is_terminal())
    })
    .await;

    let status = engine.workflow_status(&workflow.id).expect("status");
    let step = |id: &str| status.steps.iter().find(|s| s.id == StepId::new(id)).unwrap();
    assert_eq!(step("s-1").status, StepStatus::Failed);
    assert_eq!(step("s-2").status, StepStatus::Skipped);
    assert_eq!(step("s-3").status, StepStatus::Skipped);
}

#[tokio::test]
async fn on_failure_pause_stops_the_workflow() {
    let engine = harness(Arc::new(AlwaysFailAgentAdapterFactory));
    let config = WorkflowConfig { parallelism: Parallelism::Sequential, on_failure: OnFailure::Pause, default_agent_type: AgentType::Fake, autonomy_level: loom_core::workflow::AutonomyLevel::Autonomous };
    let workflow = engine.create("wf", WorkflowSource::Issues { issue_ids: vec![] }, steps_chain(), config).expect("create succeeds");

    engine.start(&workflow.id).await.expect("start succeeds");

    wait_until(|| engine.workflow_status(&workflow.id).expect("status").status == WorkflowStatus::Paused).await;

    let status = engine.workflow_status(&workflow.id).expect("status");
    assert_eq!(status.steps.iter().find(|s| s.id == StepId::new("s-2")).unwrap().status, StepStatus::Pending, "dependents never started while paused");
}

#[tokio::test]
async fn a_paused_workflow_does_not_advance_until_resumed() {
    let engine = harness(Arc::new(AutoCompleteAgentAdapterFactory));
    let config = WorkflowConfig::default();
    let workflow = engine.create("wf", WorkflowSource::Issues { issue_ids: vec![] }, vec![NewStep { id: StepId::new("s-1"), issue_id: IssueId::new("i-1"), depends_on: vec![] }], config).expect("create succeeds");

    // Force the workflow into `paused` before it ever starts, so `resume`
    // is exercised deterministically rather than racing a fast-completing
    // step against an in-flight `pause()` call.
    {
        let mut state = engine.state.lock();
        state.get_workflow_mut(&workflow.id).expect("workflow exists").status = WorkflowStatus::Paused;
    }

    // advance() on a non-running workflow is a no-op.
    engine.advance(&workflow.id).await.expect("advance succeeds");
    assert_eq!(engine.workflow_status(&workflow.id).expect("status").steps[0].status, StepStatus::Pending);

    engine.resume(&workflow.id).await.expect("resume succeeds");
    wait_until(|| engine.workflow_status(&workflow.id).expect("status").status == WorkflowStatus::Completed).await;
}

#[tokio::test]
async fn cancel_marks_the_workflow_cancelled() {
    let engine = harness(Arc::new(AutoCompleteAgentAdapterFactory));
    let workflow = engine
        .create("wf", WorkflowSource::Issues { issue_ids: vec![] }, vec![NewStep { id: StepId::new("s-1"), issue_id: IssueId::new("i-1"), depends_on: vec![] }], WorkflowConfig::default())
        .expect("create succeeds");

    engine.cancel(&workflow.id).await.expect("cancel succeeds");
    assert_eq!(engine.workflow_status(&workflow.id).expect("status").status, WorkflowStatus::Cancelled);
}

#[tokio::test]
async fn recover_marks_running_steps_with_non_terminal_executions_as_crashed() {
    let engine = harness(Arc::new(AutoCompleteAgentAdapterFactory));
    let workflow = engine
        .create("wf", WorkflowSource::Issues { issue_ids: vec![] }, vec![NewStep { id: StepId::new("s-1"), issue_id: IssueId::new("i-1"), depends_on: vec![] }], WorkflowConfig::default())
        .expect("create succeeds");

    {
        let mut state = engine.state.lock();
        let wf = state.get_workflow_mut(&workflow.id).expect("workflow exists");
        wf.status = WorkflowStatus::Running;
        wf.steps[0].status = StepStatus::Running;
        wf.steps[0].execution_id = Some(loom_core::execution::ExecutionId::new("ghost-execution"));
    }

    engine.recover().await;

    let status = engine.workflow_status(&workflow.id).expect("status");
    assert_eq!(status.steps[0].status, StepStatus::Failed);
}

#[tokio::test]
async fn execute_issue_appends_an_ad_hoc_step_and_runs_it() {
    let engine = harness(Arc::new(AutoCompleteAgentAdapterFactory));
    let workflow = engine.create("wf", WorkflowSource::Issues { issue_ids: vec![] }, vec![], WorkflowConfig::default()).expect("create succeeds");
    {
        let mut state = engine.state.lock();
        state.get_workflow_mut(&workflow.id).expect("workflow exists").status = WorkflowStatus::Running;
    }

    let execution_id = engine.execute_issue(&workflow.id, IssueId::new("i-1"), Some(AgentType::Fake)).await.expect("execute_issue succeeds");

    wait_until(|| engine.execution_status(&execution_id).map(|s| s.is_terminal()).unwrap_or(false)).await;
    assert_eq!(engine.execution_status(&execution_id).expect("status"), ExecutionStatus::Completed);
}

#[test]
fn escalate_to_user_creates_a_pending_decision_resolvable_once() {
    let engine = harness(Arc::new(AutoCompleteAgentAdapterFactory));
    let workflow = engine.create("wf", WorkflowSource::Issues { issue_ids: vec![] }, vec![], WorkflowConfig::default()).expect("create succeeds");

    let decision_id = engine.escalate_to_user(&workflow.id, "proceed?", vec![loom_core::execution_log::PermissionOption { id: "yes".into(), label: "Yes".into() }]);
    assert!(engine.resolve_escalation(&decision_id, "yes").expect("resolve succeeds"));
    assert!(!engine.resolve_escalation(&decision_id, "yes").expect("second resolve is a no-op"));
}
