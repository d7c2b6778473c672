// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Human-in-the-loop decisions: an agent's `permission_request` (C3) and
//! an orchestrator's `escalate_to_user` (C7) are both, structurally, a
//! pending decision with a set of labeled options awaiting exactly one
//! resolution. This module gives both call sites one shared shape.

use serde::{Deserialize, Serialize};

use crate::define_id;
use crate::execution::ExecutionId;
use crate::execution_log::PermissionOption;
use crate::workflow::WorkflowId;

define_id! {
    /// Stable identifier for a [`Decision`].
    pub struct DecisionId;
}

/// What produced this decision request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DecisionSource {
    /// An agent's `permission_request` trajectory entry, routed through
    /// C3's `respondToPermission`.
    AgentPermission { execution_id: ExecutionId },
    /// An orchestrator's `escalate_to_user` tool call, routed through
    /// C7/C8's await path.
    OrchestratorEscalation { workflow_id: WorkflowId },
}

/// Current resolution state of a decision. A decision resolves at most
/// once; `respondToPermission` delivered twice resolves at most one
/// pending request (the round-trip law in §8).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum DecisionState {
    Pending,
    Resolved { option_id: String },
}

/// A pending human-in-the-loop decision with labeled options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Decision {
    pub id: DecisionId,
    pub source: DecisionSource,
    pub message: String,
    pub options: Vec<PermissionOption>,
    pub state: DecisionState,
    pub created_at: i64,
}

impl Decision {
    pub fn new(
        id: DecisionId,
        source: DecisionSource,
        message: impl Into<String>,
        options: Vec<PermissionOption>,
        now: i64,
    ) -> Self {
        Self {
            id,
            source,
            message: message.into(),
            options,
            state: DecisionState::Pending,
            created_at: now,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self.state, DecisionState::Pending)
    }

    /// Resolves the decision with the given option id. Returns `false`
    /// (a no-op) if the decision was already resolved, so callers can
    /// implement the "second response is NotFound" contract at the
    /// engine boundary.
    pub fn resolve(&mut self, option_id: impl Into<String>) -> bool {
        if !self.is_pending() {
            return false;
        }
        self.state = DecisionState::Resolved {
            option_id: option_id.into(),
        };
        true
    }
}

#[cfg(test)]
#[path = "permission_tests.rs"]
mod tests;
