// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Execution Engine (C6): owns the lifecycle of one execution end to
//! end. Grounded on the teacher's `Runtime`/`Executor` split — a
//! synchronous "accept the command, mutate the row, kick off the work"
//! half and a per-session background task that owns the live
//! trajectory stream — narrowed to one producer task per execution
//! rather than one shared runtime loop, since here each execution's
//! adapter session is already its own `tokio::sync::mpsc` stream.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use loom_core::clock::Clock;
use loom_core::config::EngineConfig;
use loom_core::error::{ClassifiedError, ErrorKind, TimeoutKind};
use loom_core::execution::{AgentType, Execution, ExecutionId, ExecutionMode, ExecutionStatus};
use loom_core::execution_log::LogPayload;
use loom_core::id::IdGen;
use loom_core::interfaces::{EntityStore, EventEmitter, GitBackend};
use loom_core::issue::IssueId;
use loom_core::project::ProjectId;
use loom_core::workflow::{StepId, WorkflowId};
use loom_core::worktree::WorktreeRecord;
use loom_adapters::{AgentAdapter, RunConfig};
use loom_storage::{Coalescer, LogStore};
use parking_lot::Mutex as SyncMutex;
use tokio::sync::Mutex as AsyncMutex;

use crate::adapter_factory::AgentAdapterFactory;
use crate::error::EngineError;
use crate::executor::Executor;
use crate::state::EngineState;

/// Binds a newly created execution to a workflow step so the streaming
/// task's terminal publish lands on the step's workflow channel too;
/// the Workflow Engine is the only subscriber that interprets it.
#[derive(Debug, Clone)]
pub struct WorkflowContext {
    pub workflow_id: WorkflowId,
    pub step_id: StepId,
}

/// Inputs to [`ExecutionEngine::create`].
pub struct CreateExecutionParams {
    pub issue_id: Option<IssueId>,
    pub agent_type: AgentType,
    pub mode: ExecutionMode,
    pub prompt: String,
    pub target_branch: Option<String>,
    pub workflow_context: Option<WorkflowContext>,
}

struct Session {
    adapter: Arc<dyn AgentAdapter>,
    cancelled: Arc<AtomicBool>,
}

pub struct ExecutionEngine<G: IdGen, C: Clock> {
    project: ProjectId,
    repo_path: PathBuf,
    config: EngineConfig,
    state: Arc<SyncMutex<EngineState>>,
    entities: Arc<dyn EntityStore>,
    git: Arc<dyn GitBackend>,
    events: Arc<dyn EventEmitter>,
    agents: Arc<dyn AgentAdapterFactory>,
    logs: Arc<SyncMutex<LogStore>>,
    executor: Arc<Executor>,
    id_gen: G,
    clock: C,
    sessions: Arc<AsyncMutex<HashMap<ExecutionId, Session>>>,
}

impl<G: IdGen + 'static, C: Clock + Clone + 'static> ExecutionEngine<G, C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        project: ProjectId,
        repo_path: impl Into<PathBuf>,
        config: EngineConfig,
        state: Arc<SyncMutex<EngineState>>,
        entities: Arc<dyn EntityStore>,
        git: Arc<dyn GitBackend>,
        events: Arc<dyn EventEmitter>,
        agents: Arc<dyn AgentAdapterFactory>,
        logs: Arc<SyncMutex<LogStore>>,
        executor: Arc<Executor>,
        id_gen: G,
        clock: C,
    ) -> Self {
        Self {
            project,
            repo_path: repo_path.into(),
            config,
            state,
            entities,
            git,
            events,
            agents,
            logs,
            executor,
            id_gen,
            clock,
            sessions: Arc::new(AsyncMutex::new(HashMap::new())),
        }
    }

    /// Renders a prompt and validates invariant 1, without touching the
    /// filesystem.
    pub async fn prepare(&self, issue_id: &IssueId) -> Result<String, EngineError> {
        if self.state.lock().active_execution_for_issue(issue_id).is_some() {
            return Err(EngineError::ActiveExecutionExists(issue_id.to_string()));
        }
        let issue = self
            .entities
            .get_issue(&self.project, issue_id)
            .await
            .map_err(EngineError::EntityStore)?;
        Ok(format!("{}\n\n{}", issue.title, issue.content))
    }

    pub async fn create(&self, params: CreateExecutionParams) -> Result<Execution, EngineError> {
        if let Some(issue_id) = &params.issue_id {
            if self.state.lock().active_execution_for_issue(issue_id).is_some() {
                return Err(EngineError::ActiveExecutionExists(issue_id.to_string()));
            }
        }

        let id = ExecutionId::new(self.id_gen.next());
        let now = self.clock.now_millis();
        let mut execution = Execution::new(id.clone(), params.issue_id.clone(), params.agent_type, params.mode, params.prompt.clone(), now);
        self.state.lock().insert_execution(execution.clone());

        let worktree = if params.mode == ExecutionMode::Worktree {
            match self.provision_worktree(&id, params.target_branch.as_deref()).await {
                Ok(w) => Some(w),
                Err(err) => {
                    let classified = ClassifiedError::new(err.classify(), err.to_string());
                    self.fail_without_worktree(&mut execution, classified);
                    return Err(err);
                }
            }
        } else {
            None
        };

        if let Some((worktree_path, branch_name, base_branch, base_commit)) = &worktree {
            execution.worktree_path = Some(worktree_path.clone());
            execution.branch_name = Some(branch_name.clone());
            execution.target_branch = Some(base_branch.clone());
            execution.base_commit = Some(base_commit.clone());
        }

        let cwd = worktree
            .as_ref()
            .map(|(p, ..)| PathBuf::from(p))
            .unwrap_or_else(|| self.repo_path.clone());

        let adapter: Arc<dyn AgentAdapter> = match self.agents.create(params.agent_type) {
            Ok(adapter) => Arc::from(adapter),
            Err(err) => {
                if worktree.is_some() {
                    self.remove_worktree_best_effort(&id).await;
                }
                let classified = ClassifiedError::new(err.classify(), err.to_string());
                self.fail_without_worktree(&mut execution, classified);
                return Err(err);
            }
        };

        let run_config = RunConfig {
            cmd: agent_command(params.agent_type),
            args: agent_args(params.agent_type),
            env: Vec::new(),
            cwd,
            prompt: params.prompt,
            transcript_path: self.transcript_path(&id),
        };

        let stream = match adapter.run(run_config).await {
            Ok(stream) => stream,
            Err(err) => {
                if worktree.is_some() {
                    self.remove_worktree_best_effort(&id).await;
                }
                let engine_err = EngineError::AgentSpawnFailure(err.to_string());
                let classified = ClassifiedError::new(engine_err.classify(), engine_err.to_string());
                self.fail_without_worktree(&mut execution, classified);
                return Err(engine_err);
            }
        };

        let now = self.clock.now_millis();
        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(now);
        execution.updated_at = now;
        {
            let mut state = self.state.lock();
            state.insert_execution(execution.clone());
            if let Some((path, branch_name, base_branch, _)) = &worktree {
                state.insert_worktree(WorktreeRecord::new(id.clone(), path.clone(), branch_name.clone(), base_branch.clone(), now));
            }
        }
        self.publish_status_change(&id, "pending", "running");

        let cancelled = Arc::new(AtomicBool::new(false));
        self.sessions.lock().await.insert(id.clone(), Session { adapter, cancelled: cancelled.clone() });

        self.spawn_stream_task(id.clone(), stream, cancelled, params.workflow_context);

        Ok(execution)
    }

    pub async fn follow_up(&self, parent_execution_id: &ExecutionId, prompt: String, agent_type: Option<AgentType>) -> Result<Execution, EngineError> {
        let parent = self.state.lock().get_execution(parent_execution_id)?.clone();
        if !parent.status.is_terminal() {
            return Err(EngineError::ParentNotTerminal(parent_execution_id.to_string()));
        }

        let id = ExecutionId::new(self.id_gen.next());
        let now = self.clock.now_millis();
        let agent_type = agent_type.unwrap_or(parent.agent_type);
        let mut execution = Execution::new(id.clone(), parent.issue_id.clone(), agent_type, parent.mode, prompt.clone(), now);
        execution.parent_execution_id = Some(parent.id.clone());
        execution.worktree_path = parent.worktree_path.clone();
        execution.branch_name = parent.branch_name.clone();
        execution.target_branch = parent.target_branch.clone();
        execution.base_commit = parent.after_commit.clone().or_else(|| parent.base_commit.clone());
        self.state.lock().insert_execution(execution.clone());

        let cwd = execution
            .worktree_path
            .as_ref()
            .map(PathBuf::from)
            .unwrap_or_else(|| self.repo_path.clone());

        let adapter: Arc<dyn AgentAdapter> = match self.agents.create(agent_type) {
            Ok(adapter) => Arc::from(adapter),
            Err(err) => {
                let classified = ClassifiedError::new(err.classify(), err.to_string());
                self.fail_without_worktree(&mut execution, classified);
                return Err(err);
            }
        };

        let run_config = RunConfig {
            cmd: agent_command(agent_type),
            args: agent_args(agent_type),
            env: Vec::new(),
            cwd,
            prompt,
            transcript_path: self.transcript_path(&id),
        };

        let stream = if let Some(session_id) = &parent.session_id {
            adapter.resume(session_id, run_config).await
        } else {
            adapter.run(run_config).await
        };
        let stream = match stream {
            Ok(stream) => stream,
            Err(err) => {
                let engine_err = EngineError::AgentSpawnFailure(err.to_string());
                let classified = ClassifiedError::new(engine_err.classify(), engine_err.to_string());
                self.fail_without_worktree(&mut execution, classified);
                return Err(engine_err);
            }
        };

        let now = self.clock.now_millis();
        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(now);
        execution.updated_at = now;
        self.state.lock().insert_execution(execution.clone());
        self.publish_status_change(&id, "pending", "running");

        let cancelled = Arc::new(AtomicBool::new(false));
        self.sessions.lock().await.insert(id.clone(), Session { adapter, cancelled: cancelled.clone() });
        self.spawn_stream_task(id.clone(), stream, cancelled, None);

        Ok(execution)
    }

    pub async fn cancel(&self, execution_id: &ExecutionId) -> Result<(), EngineError> {
        let session = {
            let sessions = self.sessions.lock().await;
            sessions.get(execution_id).map(|s| (s.adapter.clone(), s.cancelled.clone()))
        };
        let Some((adapter, cancelled)) = session else {
            return Err(EngineError::ExecutionNotFound(execution_id.to_string()));
        };
        cancelled.store(true, Ordering::SeqCst);
        adapter
            .cancel()
            .await
            .map_err(|e| EngineError::AgentProtocolFailure(e.to_string()))
    }

    pub async fn respond_to_permission(&self, execution_id: &ExecutionId, request_id: &str, option_id: &str) -> Result<(), EngineError> {
        let adapter = {
            let sessions = self.sessions.lock().await;
            sessions.get(execution_id).map(|s| s.adapter.clone())
        };
        let Some(adapter) = adapter else {
            return Err(EngineError::ExecutionNotFound(execution_id.to_string()));
        };
        adapter.respond_to_permission(request_id, option_id).await.map_err(|e| match e {
            loom_adapters::AgentError::NoPendingPermission(id) => EngineError::DecisionNotFound(id),
            other => EngineError::AgentProtocolFailure(other.to_string()),
        })
    }

    pub fn get(&self, execution_id: &ExecutionId) -> Result<Execution, EngineError> {
        self.state.lock().get_execution(execution_id).map(Clone::clone)
    }

    pub fn list(&self, issue_id: Option<&IssueId>, status: Option<ExecutionStatus>) -> Vec<Execution> {
        self.state.lock().list_executions(issue_id, status)
    }

    /// Cancels every in-flight execution and waits for each session
    /// table entry to be registered cancelled; the streaming tasks
    /// themselves finish asynchronously as their adapters' streams
    /// close.
    pub async fn shutdown(&self) {
        let active_ids: Vec<_> = self
            .state
            .lock()
            .list_executions(None, None)
            .into_iter()
            .filter(|e| e.status.is_active())
            .map(|e| e.id)
            .collect();
        for id in active_ids {
            let _ = self.cancel(&id).await;
        }
    }

    async fn provision_worktree(&self, id: &ExecutionId, target_branch: Option<&str>) -> Result<(String, String, String, String), EngineError> {
        let worktree_path = format!("{}/{}", self.config.worktree_storage_path, id.as_str());
        let branch_name = format!("{}/{}", self.config.branch_prefix, id.as_str());
        let base_branch = target_branch.unwrap_or("main").to_string();
        let repo_path = self.repo_path.to_string_lossy().to_string();

        let sparse_patterns: &[String] = if self.config.enable_sparse_checkout {
            &self.config.sparse_checkout_patterns
        } else {
            &[]
        };
        self.git
            .create_worktree(&repo_path, &worktree_path, &branch_name, &base_branch, self.config.auto_create_branches, sparse_patterns)
            .await
            .map_err(EngineError::from)?;

        let base_commit = self.git.rev_parse_head(&worktree_path).await.map_err(EngineError::from)?;
        Ok((worktree_path, branch_name, base_branch, base_commit))
    }

    async fn remove_worktree_best_effort(&self, id: &ExecutionId) {
        let record = self.state.lock().remove_worktree(id);
        if let Some(record) = record {
            let repo_path = self.repo_path.to_string_lossy().to_string();
            let _ = self.git.remove_worktree(&repo_path, &record.path, self.config.auto_delete_branches).await;
        }
    }

    fn fail_without_worktree(&self, execution: &mut Execution, classified: ClassifiedError) {
        let now = self.clock.now_millis();
        execution.finish(ExecutionStatus::Failed, None, Some(classified), now);
        self.state.lock().insert_execution(execution.clone());
        self.publish_status_change(&execution.id, "preparing", "failed");
    }

    fn transcript_path(&self, id: &ExecutionId) -> PathBuf {
        PathBuf::from(&self.config.worktree_storage_path).join(format!("{}.transcript.jsonl", id.as_str()))
    }

    fn publish_status_change(&self, execution_id: &ExecutionId, from: &str, to: &str) {
        self.events.publish(
            &self.project,
            &format!("execution:{execution_id}"),
            serde_json::json!({ "kind": "status_change", "from": from, "to": to }),
        );
    }

    fn spawn_stream_task(
        &self,
        id: ExecutionId,
        mut stream: loom_adapters::TrajectoryStream,
        cancelled: Arc<AtomicBool>,
        workflow_context: Option<WorkflowContext>,
    ) {
        let state = self.state.clone();
        let logs = self.logs.clone();
        let events = self.events.clone();
        let git = self.git.clone();
        let clock = self.clock.clone();
        let project = self.project.clone();
        let sessions = self.sessions.clone();

        tokio::spawn(async move {
            let mut coalescer = Coalescer::new();
            let mut saw_error = false;
            let mut timeout_kind: Option<TimeoutKind> = None;

            while let Some(payload) = stream.recv().await {
                if let LogPayload::SystemMessage { session_id: Some(sid), .. } = &payload {
                    let mut state = state.lock();
                    if let Ok(execution) = state.get_execution_mut(&id) {
                        execution.try_set_session_id(sid.clone());
                    }
                }
                if matches!(payload, LogPayload::Error(_)) {
                    saw_error = true;
                }
                if let LogPayload::StatusChange(change) = &payload {
                    timeout_kind = match change.to.as_str() {
                        "timeout_idle" => Some(TimeoutKind::Idle),
                        "timeout_hard" => Some(TimeoutKind::Hard),
                        "timeout_shutdown" => Some(TimeoutKind::Shutdown),
                        _ => timeout_kind,
                    };
                }
                if let Some(ready) = coalescer.push(payload) {
                    persist_and_publish(&logs, &events, &project, &clock, &id, ready);
                }
            }
            if let Some(ready) = coalescer.flush() {
                persist_and_publish(&logs, &events, &project, &clock, &id, ready);
            }

            let (after_commit, files_changed) = {
                let worktree_path = state.lock().get_worktree(&id).map(|w| w.path.clone());
                match worktree_path {
                    Some(path) => {
                        let after_commit = git.rev_parse_head(&path).await.ok();
                        let base_commit = state.lock().get_execution(&id).ok().and_then(|e| e.base_commit.clone());
                        let files_changed = match (&base_commit, &after_commit) {
                            (Some(base), Some(after)) => git.diff_names(&path, base, after).await.unwrap_or_default(),
                            _ => Vec::new(),
                        };
                        (after_commit, files_changed)
                    }
                    None => (None, Vec::new()),
                }
            };

            let was_cancelled = cancelled.load(Ordering::SeqCst);
            let now = clock.now_millis();
            let final_status = if was_cancelled || timeout_kind.is_some() {
                ExecutionStatus::Stopped
            } else if saw_error {
                ExecutionStatus::Failed
            } else {
                ExecutionStatus::Completed
            };
            let error = if let Some(kind) = timeout_kind {
                Some(ClassifiedError::new(ErrorKind::Timeout(kind), "execution timed out"))
            } else if was_cancelled {
                Some(ClassifiedError::new(ErrorKind::Cancelled, "cancelled by caller"))
            } else if saw_error {
                Some(ClassifiedError::new(ErrorKind::AgentProtocolFailure, "agent reported an error entry"))
            } else {
                None
            };

            {
                let mut state = state.lock();
                if let Ok(execution) = state.get_execution_mut(&id) {
                    execution.after_commit = after_commit;
                    execution.files_changed = files_changed;
                    execution.finish(final_status, None, error, now);
                }
            }
            events.publish(
                &project,
                &format!("execution:{id}"),
                serde_json::json!({ "kind": "status_change", "to": format!("{final_status:?}") }),
            );
            if let Some(ctx) = &workflow_context {
                events.publish(
                    &project,
                    &format!("workflow:{}", ctx.workflow_id),
                    serde_json::json!({
                        "kind": "step_terminal",
                        "step_id": ctx.step_id.to_string(),
                        "execution_id": id.to_string(),
                        "status": format!("{final_status:?}"),
                    }),
                );
            }
            sessions.lock().await.remove(&id);
        });
    }
}

fn persist_and_publish(
    logs: &Arc<SyncMutex<LogStore>>,
    events: &Arc<dyn EventEmitter>,
    project: &ProjectId,
    clock: &impl Clock,
    execution_id: &ExecutionId,
    payload: LogPayload,
) {
    let now = clock.now_millis();
    let entry = match logs.lock().append(execution_id, payload, now) {
        Ok(entry) => entry,
        Err(err) => {
            tracing::warn!(%execution_id, error = %err, "failed to persist log entry; continuing");
            return;
        }
    };
    events.publish(
        project,
        &format!("execution:{execution_id}"),
        serde_json::to_value(&entry).unwrap_or(serde_json::Value::Null),
    );
}

fn agent_command(agent_type: AgentType) -> String {
    match agent_type {
        AgentType::Claude => "claude".to_string(),
        AgentType::Fake => String::new(),
    }
}

fn agent_args(agent_type: AgentType) -> Vec<String> {
    match agent_type {
        AgentType::Claude => vec!["-p".to_string(), "--output-format".to_string(), "stream-json".to_string()],
        AgentType::Fake => Vec::new(),
    }
}

#[cfg(test)]
#[path = "execution_engine_tests.rs"]
mod tests;
