// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory state shared by the Execution Engine (C6), Workflow Engine
//! (C7), and Wakeup Service (C8). Grounded on the teacher's
//! `MaterializedState` (one shared, lockable map-of-maps that every
//! runtime component reads and mutates through), narrowed from a
//! WAL-replayed snapshot of every domain entity to exactly the rows
//! this workspace's engines own: executions, workflows, workflow
//! events, decisions, and worktree records. Durable recovery
//! (`journal.rs`) snapshots this same struct to disk.

use std::collections::HashMap;

use loom_core::execution::{Execution, ExecutionId, ExecutionStatus};
use loom_core::issue::IssueId;
use loom_core::permission::{Decision, DecisionId};
use loom_core::workflow::{Workflow, WorkflowId};
use loom_core::workflow_event::{WorkflowEvent, WorkflowEventId};
use loom_core::worktree::WorktreeRecord;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// All durable-ish state the engines hold in memory. A project runs one
/// instance of this struct (C9 owns one per open project).
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct EngineState {
    pub executions: HashMap<ExecutionId, Execution>,
    pub workflows: HashMap<WorkflowId, Workflow>,
    pub workflow_events: HashMap<WorkflowEventId, WorkflowEvent>,
    pub decisions: HashMap<DecisionId, Decision>,
    pub worktrees: HashMap<ExecutionId, WorktreeRecord>,
}

impl EngineState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Invariant 1: at most one execution with a non-terminal status per
    /// issue id.
    pub fn active_execution_for_issue(&self, issue_id: &IssueId) -> Option<&Execution> {
        self.executions
            .values()
            .find(|e| e.issue_id.as_ref() == Some(issue_id) && e.status.is_active())
    }

    pub fn insert_execution(&mut self, execution: Execution) {
        self.executions.insert(execution.id.clone(), execution);
    }

    pub fn get_execution(&self, id: &ExecutionId) -> Result<&Execution, EngineError> {
        self.executions
            .get(id)
            .ok_or_else(|| EngineError::ExecutionNotFound(id.to_string()))
    }

    pub fn get_execution_mut(&mut self, id: &ExecutionId) -> Result<&mut Execution, EngineError> {
        self.executions
            .get_mut(id)
            .ok_or_else(|| EngineError::ExecutionNotFound(id.to_string()))
    }

    pub fn list_executions(&self, issue_id: Option<&IssueId>, status: Option<ExecutionStatus>) -> Vec<Execution> {
        self.executions
            .values()
            .filter(|e| issue_id.map(|id| e.issue_id.as_ref() == Some(id)).unwrap_or(true))
            .filter(|e| status.map(|s| e.status == s).unwrap_or(true))
            .cloned()
            .collect()
    }

    pub fn insert_workflow(&mut self, workflow: Workflow) {
        self.workflows.insert(workflow.id.clone(), workflow);
    }

    pub fn get_workflow(&self, id: &WorkflowId) -> Result<&Workflow, EngineError> {
        self.workflows
            .get(id)
            .ok_or_else(|| EngineError::WorkflowNotFound(id.to_string()))
    }

    pub fn get_workflow_mut(&mut self, id: &WorkflowId) -> Result<&mut Workflow, EngineError> {
        self.workflows
            .get_mut(id)
            .ok_or_else(|| EngineError::WorkflowNotFound(id.to_string()))
    }

    pub fn list_workflows(&self) -> Vec<Workflow> {
        self.workflows.values().cloned().collect()
    }

    pub fn insert_workflow_event(&mut self, event: WorkflowEvent) {
        self.workflow_events.insert(event.id.clone(), event);
    }

    pub fn get_workflow_event_mut(&mut self, id: &WorkflowEventId) -> Option<&mut WorkflowEvent> {
        self.workflow_events.get_mut(id)
    }

    /// Unprocessed events for a workflow, oldest first by `created_at`
    /// then id, per the "deliver to the oldest pending await" rule.
    pub fn unprocessed_events_for(&self, workflow_id: &WorkflowId) -> Vec<WorkflowEvent> {
        let mut events: Vec<_> = self
            .workflow_events
            .values()
            .filter(|e| &e.workflow_id == workflow_id && !e.is_processed())
            .cloned()
            .collect();
        events.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.as_str().cmp(b.id.as_str())));
        events
    }

    pub fn insert_decision(&mut self, decision: Decision) {
        self.decisions.insert(decision.id.clone(), decision);
    }

    pub fn get_decision_mut(&mut self, id: &DecisionId) -> Result<&mut Decision, EngineError> {
        self.decisions
            .get_mut(id)
            .ok_or_else(|| EngineError::DecisionNotFound(id.to_string()))
    }

    pub fn insert_worktree(&mut self, record: WorktreeRecord) {
        self.worktrees.insert(record.execution_id.clone(), record);
    }

    pub fn remove_worktree(&mut self, execution_id: &ExecutionId) -> Option<WorktreeRecord> {
        self.worktrees.remove(execution_id)
    }

    pub fn get_worktree(&self, execution_id: &ExecutionId) -> Option<&WorktreeRecord> {
        self.worktrees.get(execution_id)
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
