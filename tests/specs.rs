// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Workspace-level end-to-end scenarios, mirroring the teacher's
//! `oj-specs` suite: each test drives the Execution Engine (C6) and
//! Workflow Engine (C7) the way a real caller would, through their
//! public APIs only, rather than reaching into engine-private state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loom_core::clock::FakeClock;
use loom_core::config::EngineConfig;
use loom_core::error::ClassifiedError;
use loom_core::execution::{AgentType, ExecutionMode, ExecutionStatus};
use loom_core::execution_log::LogPayload;
use loom_core::id::SequentialIdGen;
use loom_core::interfaces::GitBackend;
use loom_core::issue::{Issue, IssueId, IssueStatus, Priority};
use loom_core::owner::OwnerId;
use loom_core::project::ProjectId;
use loom_core::test_support::{FakeEntityStore, FakeEventEmitter};
use loom_core::workflow::{OnFailure, Parallelism, StepId, StepStatus, WorkflowConfig, WorkflowSource, WorkflowStatus};
use loom_adapters::{AgentAdapter, AgentError, FakeAgentAdapter, RunConfig, TrajectoryStream};
use loom_engine::adapter_factory::AgentAdapterFactory;
use loom_engine::execution_engine::{CreateExecutionParams, ExecutionEngine};
use loom_engine::executor::Executor;
use loom_engine::journal::Journal;
use loom_engine::state::EngineState;
use loom_engine::wakeup::WakeupService;
use loom_engine::workflow_engine::{NewStep, WorkflowEngine};
use loom_engine::EngineError;
use loom_storage::LogStore;
use parking_lot::Mutex as SyncMutex;

/// No-op git backend with zero diff and a constant commit, so the
/// happy-path scenario's `after_commit == base_commit` and
/// `files_changed == []` expectations hold without a real repository.
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

/// Delegates every call to a shared fake, so the scripted instance can
/// be inspected after `create()` hands ownership of a `Box<dyn
/// AgentAdapter>` to the engine.
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

/// Hands out a fresh [`FakeAgentAdapter`] scripted with `script` every
/// call, regardless of how many executions are created.
struct ScriptedAgentAdapterFactory {
    build: Box<dyn Fn() -> FakeAgentAdapter + Send + Sync>,
}

impl ScriptedAgentAdapterFactory {
    fn constant(script: Vec<LogPayload>) -> Self {
        Self {
            build: Box::new(move || {
                let fake = FakeAgentAdapter::new();
                fake.set_script(script.clone());
                fake
            }),
        }
    }
}

impl AgentAdapterFactory for ScriptedAgentAdapterFactory {
    fn create(&self, _agent_type: AgentType) -> Result<Box<dyn AgentAdapter>, EngineError> {
        Ok(Box::new(SharedFakeAdapter(Arc::new((self.build)()))))
    }
}

/// Fails on the Nth call (1-indexed) and completes immediately with no
/// trajectory on every other call. Calls land in scheduling order, so
/// under `Parallelism::Sequential` the Nth call corresponds to the Nth
/// step started.
struct CountingAgentAdapterFactory {
    calls: AtomicUsize,
    fail_on_call: usize,
}

impl CountingAgentAdapterFactory {
    fn fail_on(call: usize) -> Self {
        Self { calls: AtomicUsize::new(0), fail_on_call: call }
    }
}

impl AgentAdapterFactory for CountingAgentAdapterFactory {
    fn create(&self, _agent_type: AgentType) -> Result<Box<dyn AgentAdapter>, EngineError> {
        let n = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let fake = Arc::new(FakeAgentAdapter::new());
        if n == self.fail_on_call {
            fake.set_run_error("boom");
        } else {
            fake.set_script(vec![]);
        }
        Ok(Box::new(SharedFakeAdapter(fake)))
    }
}

fn issue(id: &str) -> Issue {
    Issue {
        id: IssueId::new(id),
        title: format!("issue {id}"),
        content: "details".into(),
        status: IssueStatus::Open,
        priority: Priority::Medium,
        relationships: vec![],
        created_at: 0,
        updated_at: 0,
    }
}

struct Harness {
    execution_engine: Arc<ExecutionEngine<SequentialIdGen, FakeClock>>,
    workflow_engine: Arc<WorkflowEngine<SequentialIdGen, FakeClock>>,
    logs: Arc<SyncMutex<LogStore>>,
    state: Arc<SyncMutex<EngineState>>,
    clock: FakeClock,
}

fn harness(agents: Arc<dyn AgentAdapterFactory>, issue_ids: &[&str]) -> Harness {
    let state = Arc::new(SyncMutex::new(EngineState::new()));
    let entities = Arc::new(FakeEntityStore::new());
    for id in issue_ids {
        entities.insert_issue(issue(id));
    }

    let log_dir = tempfile::tempdir().expect("tempdir");
    let logs = Arc::new(SyncMutex::new(LogStore::new(log_dir.into_path())));
    let git: Arc<dyn GitBackend> = Arc::new(FakeGitBackend);
    let events = Arc::new(FakeEventEmitter::new());
    let clock = FakeClock::new(0);
    let executor = Arc::new(Executor::new(state.clone(), git.clone(), events.clone(), "/repo"));
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

    let workflow_engine = Arc::new(WorkflowEngine::new(
        ProjectId::new("p-1"),
        state.clone(),
        execution_engine.clone(),
        executor,
        wakeup,
        events,
        logs.clone(),
        SequentialIdGen::new("w"),
        clock.clone(),
    ));

    Harness { execution_engine, workflow_engine, logs, state, clock }
}

async fn wait_until<F: Fn() -> bool>(predicate: F) {
    for _ in 0..400 {
        if predicate() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition never became true within the deadline");
}

/// Scenario 1: happy path. A worktree-mode execution whose agent emits
/// one assistant message and exits cleanly completes with no changed
/// files and an unmoved commit.
#[tokio::test]
async fn happy_path_completes_with_one_assistant_message_and_no_changes() {
    let harness = harness(
        Arc::new(ScriptedAgentAdapterFactory::constant(vec![
            LogPayload::SystemMessage { text: "starting".into(), session_id: Some("sess-1".into()) },
            LogPayload::AssistantMessage { text: "done".into() },
        ])),
        &["i-1"],
    );

    let execution = harness
        .execution_engine
        .create(CreateExecutionParams {
            issue_id: Some(IssueId::new("i-1")),
            agent_type: AgentType::Fake,
            mode: ExecutionMode::Worktree,
            prompt: "noop".into(),
            target_branch: None,
            workflow_context: None,
        })
        .await
        .expect("create succeeds");

    wait_until(|| {
        harness.execution_engine.get(&execution.id).map(|e| e.status.is_terminal()).unwrap_or(false)
    })
    .await;

    let terminal = harness.execution_engine.get(&execution.id).expect("execution exists");
    assert_eq!(terminal.status, ExecutionStatus::Completed);
    assert_eq!(terminal.files_changed, Vec::<String>::new());
    assert_eq!(terminal.after_commit, terminal.base_commit);
    assert!(terminal.worktree_path.is_some(), "worktree exists until cleanup is invoked");
    assert!(harness.state.lock().worktrees.contains_key(&execution.id), "worktree record not removed without explicit cleanup");

    let entries = harness.logs.lock().read(&execution.id, 0, 100).expect("log readable");
    let assistant_messages: Vec<_> = entries
        .iter()
        .filter_map(|e| match &e.payload {
            LogPayload::AssistantMessage { text } => Some(text.as_str()),
            _ => None,
        })
        .collect();
    assert_eq!(assistant_messages, vec!["done"]);
}

/// Scenario 2: cancel mid-stream. An agent that keeps streaming until
/// explicitly told to stop transitions to `stopped` once `cancel` is
/// invoked, and the adapter records the cancellation.
#[tokio::test]
async fn cancel_mid_stream_stops_the_execution() {
    let fake = Arc::new(FakeAgentAdapter::new());
    fake.set_repeating_script(LogPayload::AssistantMessage { text: "…".into() }, Duration::from_millis(20));
    let harness = harness(
        Arc::new(ScriptedAgentAdapterFactory { build: Box::new(move || (*fake).clone()) }),
        &[],
    );

    let execution = harness
        .execution_engine
        .create(CreateExecutionParams {
            issue_id: None,
            agent_type: AgentType::Fake,
            mode: ExecutionMode::Local,
            prompt: "go".into(),
            target_branch: None,
            workflow_context: None,
        })
        .await
        .expect("create succeeds");

    tokio::time::sleep(Duration::from_millis(50)).await;
    harness.execution_engine.cancel(&execution.id).await.expect("cancel succeeds");

    wait_until(|| harness.execution_engine.get(&execution.id).map(|e| e.status.is_terminal()).unwrap_or(false)).await;
    let terminal = harness.execution_engine.get(&execution.id).expect("execution exists");
    assert_eq!(terminal.status, ExecutionStatus::Stopped);

    let count_before = harness.logs.lock().len(&execution.id).expect("len readable");
    tokio::time::sleep(Duration::from_millis(100)).await;
    let count_after = harness.logs.lock().len(&execution.id).expect("len readable");
    assert_eq!(count_before, count_after, "no further log entries after cancel returns");
}

/// Scenario 3: worktree collision. Two executions requested for the
/// same issue concurrently — the second is rejected outright rather
/// than provisioning a partial worktree.
#[tokio::test]
async fn concurrent_executions_for_the_same_issue_collide() {
    let harness = harness(Arc::new(ScriptedAgentAdapterFactory::constant(vec![])), &["i-1"]);

    let first = harness
        .execution_engine
        .create(CreateExecutionParams {
            issue_id: Some(IssueId::new("i-1")),
            agent_type: AgentType::Fake,
            mode: ExecutionMode::Worktree,
            prompt: "go".into(),
            target_branch: None,
            workflow_context: None,
        })
        .await
        .expect("first create succeeds");
    assert_eq!(harness.execution_engine.get(&first.id).expect("exists").status, ExecutionStatus::Running);

    let err = harness
        .execution_engine
        .create(CreateExecutionParams {
            issue_id: Some(IssueId::new("i-1")),
            agent_type: AgentType::Fake,
            mode: ExecutionMode::Worktree,
            prompt: "go again".into(),
            target_branch: None,
            workflow_context: None,
        })
        .await
        .expect_err("second create conflicts");
    assert!(matches!(err, EngineError::ActiveExecutionExists(_)));
}

fn diamond_steps() -> Vec<NewStep> {
    vec![
        NewStep { id: StepId::new("a"), issue_id: IssueId::new("i-1"), depends_on: vec![] },
        NewStep { id: StepId::new("b"), issue_id: IssueId::new("i-2"), depends_on: vec![StepId::new("a")] },
        NewStep { id: StepId::new("c"), issue_id: IssueId::new("i-3"), depends_on: vec![StepId::new("a")] },
        NewStep { id: StepId::new("d"), issue_id: IssueId::new("i-4"), depends_on: vec![StepId::new("b")] },
    ]
}

/// Scenario 4: sequential workflow, fail-continue. `A -> B`, `A -> C`,
/// `B -> D`; A completes, B fails, `onFailure=continue` lets C run
/// while D is skipped, and the workflow never regresses its step index.
#[tokio::test]
async fn fail_continue_skips_only_the_failed_steps_dependents() {
    // Under `Parallelism::Sequential` with one slot, steps start in
    // index order: A (call 1), then B (call 2, scripted to fail), then
    // C (call 3) once B's slot frees up.
    let agents = Arc::new(CountingAgentAdapterFactory::fail_on(2));
    let harness = harness(agents, &["i-1", "i-2", "i-3", "i-4"]);

    let config = WorkflowConfig { parallelism: Parallelism::Sequential, on_failure: OnFailure::Continue, default_agent_type: AgentType::Fake, autonomy_level: loom_core::workflow::AutonomyLevel::Autonomous };
    let workflow = harness.workflow_engine.create("diamond", WorkflowSource::Issues { issue_ids: vec![] }, diamond_steps(), config).expect("create succeeds");

    harness.workflow_engine.start(&workflow.id).await.expect("start succeeds");

    wait_until(|| harness.workflow_engine.workflow_status(&workflow.id).expect("status").steps.iter().all(|s| s.status.is_terminal())).await;

    let status = harness.workflow_engine.workflow_status(&workflow.id).expect("status");
    let step = |id: &str| status.steps.iter().find(|s| s.id == StepId::new(id)).unwrap();
    assert_eq!(step("a").status, StepStatus::Completed);
    assert_eq!(step("b").status, StepStatus::Failed);
    assert_eq!(step("c").status, StepStatus::Completed);
    assert_eq!(step("d").status, StepStatus::Skipped);
    assert_eq!(status.status, WorkflowStatus::Failed);
}

/// Scenario 5: recovery. A workflow whose step B was `running` when the
/// host died is reloaded from its journal snapshot with no graceful
/// shutdown; recovery marks B `failed(crashed)` and applies the
/// `onFailure` policy — `pause` parks the workflow, `continue` lets the
/// next step run.
#[tokio::test]
async fn recovery_marks_the_interrupted_step_crashed_and_applies_on_failure() {
    async fn seed_and_recover(on_failure: OnFailure) -> (WorkflowStatus, StepStatus, Vec<StepStatus>) {
        let dir = tempfile::tempdir().expect("tempdir");
        let journal = Journal::new(dir.path().join("state.json"));

        let mut seed = EngineState::new();
        let config = WorkflowConfig { parallelism: Parallelism::Sequential, on_failure, default_agent_type: AgentType::Fake, autonomy_level: loom_core::workflow::AutonomyLevel::Autonomous };
        // Independent steps, ordered only by `Sequential`'s single
        // concurrency slot — not a dependency chain. Under `continue`,
        // C is never "B's dependent", so it is free to run once B's
        // slot is vacated by recovery, matching §8's boundary-behavior
        // rule that `continue` skips a failed step's *dependents*.
        let steps = vec![
            NewStep { id: StepId::new("a"), issue_id: IssueId::new("i-1"), depends_on: vec![] },
            NewStep { id: StepId::new("b"), issue_id: IssueId::new("i-2"), depends_on: vec![] },
            NewStep { id: StepId::new("c"), issue_id: IssueId::new("i-3"), depends_on: vec![] },
        ];
        let mut workflow_steps: Vec<loom_core::workflow::WorkflowStep> =
            steps.into_iter().enumerate().map(|(i, s)| loom_core::workflow::WorkflowStep::new(s.id, s.issue_id, i as u32, s.depends_on)).collect();
        workflow_steps[0].status = StepStatus::Completed;
        workflow_steps[1].status = StepStatus::Running;
        workflow_steps[1].execution_id = Some(loom_core::execution::ExecutionId::new("ghost"));

        let workflow_id = loom_core::workflow::WorkflowId::new("wf-1");
        let workflow = loom_core::workflow::Workflow {
            id: workflow_id.clone(),
            title: "seq".into(),
            status: WorkflowStatus::Running,
            source: WorkflowSource::Issues { issue_ids: vec![] },
            steps: workflow_steps,
            worktree_path: None,
            branch_name: None,
            base_branch: None,
            current_step_index: 1,
            orchestrator_execution_id: None,
            config,
            created_at: 0,
            updated_at: 0,
        };
        seed.insert_workflow(workflow);
        journal.save(&seed).expect("save succeeds");

        // Fresh process: reload strictly from the journal, no in-memory
        // carryover from whatever produced the snapshot.
        let recovered = journal.load().expect("load succeeds");
        let harness = harness(Arc::new(ScriptedAgentAdapterFactory::constant(vec![])), &["i-1", "i-2", "i-3"]);
        *harness.state.lock() = recovered;

        harness.workflow_engine.recover().await;
        wait_until(|| {
            let status = harness.workflow_engine.workflow_status(&workflow_id).expect("status");
            status.steps[1].status.is_terminal()
        })
        .await;

        // `continue` kicks off step C asynchronously; give it a beat.
        tokio::time::sleep(Duration::from_millis(30)).await;

        let status = harness.workflow_engine.workflow_status(&workflow_id).expect("status");
        (status.status, status.steps[1].status, status.steps.iter().map(|s| s.status).collect())
    }

    let (status, b_status, _) = seed_and_recover(OnFailure::Pause).await;
    assert_eq!(b_status, StepStatus::Failed);
    assert_eq!(status, WorkflowStatus::Paused);

    let (_, b_status, all) = seed_and_recover(OnFailure::Continue).await;
    assert_eq!(b_status, StepStatus::Failed);
    let c_status = all[2];
    assert!(matches!(c_status, StepStatus::Running | StepStatus::Completed), "C runs once continue applies");
}

/// Scenario 6: await + timeout. Registering an await with no matching
/// event fires exactly one wakeup once its deadline passes, and
/// reloading the host mid-wait from a durable snapshot still yields
/// exactly one wakeup — never zero, never two.
#[tokio::test]
async fn await_event_fires_exactly_one_wakeup_on_timeout_and_after_restart() {
    let harness = harness(Arc::new(ScriptedAgentAdapterFactory::constant(vec![])), &[]);
    let config = WorkflowConfig::default();
    let workflow = harness.workflow_engine.create("orchestrated", WorkflowSource::SpecDerived { spec_id: "spec-1".into() }, vec![], config).expect("create succeeds");

    let event_id = harness.workflow_engine.await_event(&workflow.id, 1);

    // Not yet due.
    {
        let state = harness.state.lock();
        let event = state.workflow_events.get(&event_id).expect("event exists");
        assert!(!event.is_processed());
    }

    harness.clock.advance(1_000);

    let dir = tempfile::tempdir().expect("tempdir");
    let journal = Journal::new(dir.path().join("state.json"));
    journal.save(&harness.state.lock().clone()).expect("save succeeds");

    // Simulate a restart: a brand new wakeup service over state reloaded
    // strictly from the journal, never touching the live one above.
    let reloaded = Arc::new(SyncMutex::new(journal.load().expect("load succeeds")));
    let wakeup_after_restart = WakeupService::new(reloaded, harness.clock.clone());

    let fired = wakeup_after_restart.recover();
    assert_eq!(fired.len(), 1, "exactly one wakeup fires on restart");
    match &fired[0].event.event_type {
        loom_core::workflow_event::WorkflowEventType::OrchestratorWakeup { matched, .. } => assert!(!matched, "unmatched wakeup is a timeout"),
        other => panic!("expected an orchestrator wakeup, got {other:?}"),
    }
    assert_eq!(fired[0].owner, OwnerId::workflow(workflow.id.clone()));

    // Recovering a second time over the same (now-processed) state never
    // redelivers the same wakeup.
    assert!(wakeup_after_restart.recover().is_empty());
}
