// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project Registry & Lifecycle (C9).
//!
//! Grounded on the teacher's `lifecycle::{startup, shutdown}` pair,
//! generalized from one implicit project per daemon process to a
//! registry keyed by [`ProjectId`]: `open` inserts a [`ProjectHandle`]
//! (its own [`EngineState`], [`Bus`], execution/workflow engines) into
//! a map; `shutdown` cancels whatever is still running in that
//! project's executions before dropping its handle. Per invariant 9,
//! nothing here ever reaches across a [`ProjectHandle`] boundary.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use loom_adapters::{Git2Backend, ProcessManager};
use loom_core::clock::SystemClock;
use loom_core::config::EngineConfig;
use loom_core::id::UuidIdGen;
use loom_core::interfaces::{EntityStore, EventEmitter, GitBackend};
use loom_core::project::ProjectId;
use loom_engine::{
    AgentAdapterFactory, DefaultAgentAdapterFactory, EngineState, Executor, ExecutionEngine, Journal, WakeupService,
    WorkflowEngine,
};
use loom_storage::LogStore;
use parking_lot::Mutex as SyncMutex;
use tracing::info;

use crate::error::DaemonError;

/// Everything one open project needs, owned exclusively by it. C9's
/// "each project has its own instance" guarantee is just this: no
/// field here is ever shared with another project's handle.
pub struct ProjectHandle {
    pub project: ProjectId,
    pub repo_path: PathBuf,
    pub state: Arc<SyncMutex<EngineState>>,
    pub bus: Arc<dyn EventEmitter>,
    pub git: Arc<dyn GitBackend>,
    pub logs: Arc<SyncMutex<LogStore>>,
    pub execution_engine: Arc<ExecutionEngine<UuidIdGen, SystemClock>>,
    pub workflow_engine: Arc<WorkflowEngine<UuidIdGen, SystemClock>>,
    pub wakeup: Arc<WakeupService<SystemClock>>,
    pub journal: Journal,
}

impl std::fmt::Debug for ProjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProjectHandle")
            .field("project", &self.project)
            .field("repo_path", &self.repo_path)
            .finish_non_exhaustive()
    }
}

impl ProjectHandle {
    /// §4.7.3 recovery, run once right after a project is opened: marks
    /// any workflow step left `running` with no live execution as
    /// crashed, and re-delivers any timer that matured while this
    /// project was closed.
    pub async fn recover(&self) {
        self.workflow_engine.recover().await;
        let fired = self.wakeup.recover();
        if !fired.is_empty() {
            info!(project = %self.project, count = fired.len(), "redelivered matured timers on recovery");
        }
    }

    /// Snapshots the current in-memory state to the project's journal.
    /// Best-effort: a failed snapshot is logged, not fatal — the
    /// project keeps running against whatever was last durably saved.
    pub fn checkpoint(&self) {
        let snapshot = self.state.lock().clone();
        if let Err(e) = self.journal.save(&snapshot) {
            tracing::warn!(project = %self.project, error = %e, "failed to checkpoint project state");
        }
    }
}

/// Owns every project this process currently has open. Cheap to clone
/// (an `Arc` around a lockable map) so both the supervisor binary and
/// any embedding caller can hold a handle to it.
#[derive(Clone)]
pub struct ProjectRegistry {
    state_dir: PathBuf,
    bus: Arc<dyn EventEmitter>,
    projects: Arc<SyncMutex<HashMap<ProjectId, Arc<ProjectHandle>>>>,
}

impl ProjectRegistry {
    /// `state_dir` roots every project's on-disk log store under
    /// `state_dir/projects/<project-id>/logs`; one bus instance is
    /// shared process-wide, scoped per project by channel key (C5).
    pub fn new(state_dir: impl Into<PathBuf>, bus: Arc<dyn EventEmitter>) -> Self {
        Self { state_dir: state_dir.into(), bus, projects: Arc::new(SyncMutex::new(HashMap::new())) }
    }

    pub fn get(&self, project: &ProjectId) -> Option<Arc<ProjectHandle>> {
        self.projects.lock().get(project).cloned()
    }

    /// Opens `repo_path` as a project, deriving its [`ProjectId`] from
    /// the repository root's basename (or the config's own override).
    /// `entities` is handed in by the caller rather than constructed
    /// here — the entity CRUD layer is out of scope for this crate
    /// (§6), so whatever owns that store is responsible for it.
    pub async fn open(
        &self, repo_path: impl Into<PathBuf>, project: ProjectId, entities: Arc<dyn EntityStore>, config: EngineConfig,
    ) -> Result<Arc<ProjectHandle>, DaemonError> {
        if self.projects.lock().contains_key(&project) {
            return Err(DaemonError::AlreadyOpen(project.to_string()));
        }

        let repo_path = repo_path.into();
        let project_dir = self.state_dir.join("projects").join(project.as_str());
        let logs_dir = project_dir.join("logs");
        std::fs::create_dir_all(&logs_dir).map_err(|e| DaemonError::StateDirCreate(logs_dir.clone(), e))?;

        let journal = Journal::new(project_dir.join("state.json"));
        let recovered = journal.load()?;
        let state = Arc::new(SyncMutex::new(recovered));
        let logs = Arc::new(SyncMutex::new(LogStore::new(logs_dir)));
        let git: Arc<dyn GitBackend> = Arc::new(Git2Backend::new());
        let process_manager = Arc::new(ProcessManager::default());
        let idle_timeout = Some(Duration::from_millis(config.idle_timeout_ms));
        let hard_timeout = Some(Duration::from_millis(config.hard_timeout_ms));
        let agents: Arc<dyn AgentAdapterFactory> = Arc::new(DefaultAgentAdapterFactory::new(process_manager, idle_timeout, hard_timeout));

        let executor = Arc::new(Executor::new(state.clone(), git.clone(), self.bus.clone(), repo_path.display().to_string()));

        let execution_engine = Arc::new(ExecutionEngine::new(
            project.clone(),
            repo_path.clone(),
            config,
            state.clone(),
            entities,
            git.clone(),
            self.bus.clone(),
            agents,
            logs.clone(),
            executor.clone(),
            UuidIdGen,
            SystemClock,
        ));

        let wakeup = Arc::new(WakeupService::new(state.clone(), SystemClock));

        let workflow_engine = Arc::new(WorkflowEngine::new(
            project.clone(),
            state.clone(),
            execution_engine.clone(),
            executor,
            wakeup.clone(),
            self.bus.clone(),
            logs.clone(),
            UuidIdGen,
            SystemClock,
        ));

        let handle = Arc::new(ProjectHandle {
            project: project.clone(),
            repo_path,
            state,
            bus: self.bus.clone(),
            git,
            logs,
            execution_engine,
            workflow_engine,
            wakeup,
            journal,
        });

        handle.recover().await;
        self.projects.lock().insert(project.clone(), handle.clone());
        info!(project = %project, "project opened");
        Ok(handle)
    }

    /// Cancels every in-flight execution the project's workflows own,
    /// then drops its handle. Worktrees are left on disk — they outlive
    /// their execution until an explicit cleanup, per §4.6 step 9.
    pub async fn shutdown(&self, project: &ProjectId) -> Result<(), DaemonError> {
        let handle = self.projects.lock().remove(project).ok_or_else(|| DaemonError::NotOpen(project.to_string()))?;
        let workflow_ids: Vec<_> = handle.state.lock().workflows.keys().cloned().collect();
        for workflow_id in workflow_ids {
            let _ = handle.workflow_engine.cancel(&workflow_id).await;
        }
        handle.checkpoint();
        info!(project = %project, "project shut down");
        Ok(())
    }

    /// Graceful-then-forced shutdown of every open project, mirroring
    /// the teacher's daemon-wide shutdown deadline.
    pub async fn shutdown_all(&self, deadline: Duration) {
        let projects: Vec<_> = self.projects.lock().keys().cloned().collect();
        let all = async {
            for project in &projects {
                let _ = self.shutdown(project).await;
            }
        };
        if tokio::time::timeout(deadline, all).await.is_err() {
            tracing::warn!("project shutdown deadline exceeded; remaining projects dropped without cancellation");
            self.projects.lock().clear();
        }
    }
}

/// Convenience for the common case: derive the project id from the
/// repo path's basename before calling [`ProjectRegistry::open`].
pub fn project_id_for(repo_path: &Path) -> ProjectId {
    ProjectId::from_repo_path(repo_path)
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
