// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable `WorkflowEvent` rows. These back both ordinary step
//! transitions and, doubling as C8's timer table, persisted await and
//! timeout wakeups (a timer is an unprocessed event with `timeout_at`
//! set in its payload — see §4.8).

use serde::{Deserialize, Serialize};

use crate::define_id;
use crate::execution::ExecutionId;
use crate::workflow::{StepId, WorkflowId};

define_id! {
    /// Stable identifier for a [`WorkflowEvent`].
    pub struct WorkflowEventId;
}

/// Discriminates the kind of workflow event, per §3.1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEventType {
    StepStarted,
    StepCompleted,
    StepFailed { reason: StepFailureReason },
    OrchestratorWakeup { timeout_at: i64, matched: bool },
    ExecutionTimeout { timeout_at: i64 },
    UserMessage { text: String },
}

/// Why a step transitioned to `failed`, used to disambiguate ordinary
/// adapter failures from a crash-recovered or timed-out step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepFailureReason {
    AgentFailure,
    Timeout,
    /// The step's bound execution row was non-terminal when the host
    /// crashed; §4.7.3 recovery step 2.
    Crashed,
}

/// A durable workflow event. Invariant 6: `processed_at` transitions at
/// most once from `None` to `Some`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowEvent {
    pub id: WorkflowEventId,
    pub workflow_id: WorkflowId,
    pub event_type: WorkflowEventType,
    pub execution_id: Option<ExecutionId>,
    pub step_id: Option<StepId>,
    pub created_at: i64,
    pub processed_at: Option<i64>,
}

impl WorkflowEvent {
    pub fn new(
        id: WorkflowEventId,
        workflow_id: WorkflowId,
        event_type: WorkflowEventType,
        now: i64,
    ) -> Self {
        Self {
            id,
            workflow_id,
            event_type,
            execution_id: None,
            step_id: None,
            created_at: now,
            processed_at: None,
        }
    }

    pub fn is_processed(&self) -> bool {
        self.processed_at.is_some()
    }

    /// Marks the event processed. Returns `false` if it was already
    /// processed (the processed_at guard — invariant 6).
    pub fn mark_processed(&mut self, now: i64) -> bool {
        if self.is_processed() {
            return false;
        }
        self.processed_at = Some(now);
        true
    }

    /// For an `OrchestratorWakeup`/`ExecutionTimeout` event, the
    /// deadline at which C8 should fire if no matching event arrives
    /// first.
    pub fn timeout_at(&self) -> Option<i64> {
        match &self.event_type {
            WorkflowEventType::OrchestratorWakeup { timeout_at, .. } => Some(*timeout_at),
            WorkflowEventType::ExecutionTimeout { timeout_at } => Some(*timeout_at),
            _ => None,
        }
    }
}

#[cfg(test)]
#[path = "workflow_event_tests.rs"]
mod tests;
