// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable timer identifiers for the Wakeup / Await Service (C8).
//!
//! A [`TimerId`] encodes the owning entity and the timer's family into a
//! single string so the persisted [`crate::workflow_event::WorkflowEvent`]
//! row that backs a timer can be recognized and re-scheduled on recovery
//! without a separate timer table.

use serde::{Deserialize, Serialize};

use crate::owner::OwnerId;

/// The two timer families C8 schedules.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimerKind {
    /// Waits for any of a set of event types on a workflow, bounded by a
    /// deadline.
    AwaitCondition,
    /// Bounds an execution's wall-clock runtime.
    ExecutionTimeout,
}

impl TimerKind {
    fn tag(&self) -> &'static str {
        match self {
            TimerKind::AwaitCondition => "await",
            TimerKind::ExecutionTimeout => "exectimeout",
        }
    }
}

/// Identifies one durable timer: `<owner-prefix>-<owner-id>-<kind-tag>-<seq>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimerId(pub String);

impl TimerId {
    pub fn await_condition(owner: &OwnerId, seq: u64) -> Self {
        Self::build(owner, TimerKind::AwaitCondition, seq)
    }

    pub fn execution_timeout(owner: &OwnerId, seq: u64) -> Self {
        Self::build(owner, TimerKind::ExecutionTimeout, seq)
    }

    fn build(owner: &OwnerId, kind: TimerKind, seq: u64) -> Self {
        let owner_id = match owner {
            OwnerId::Workflow { id } => id.as_str().to_string(),
            OwnerId::Execution { id } => id.as_str().to_string(),
        };
        Self(format!(
            "{}-{}-{}-{}",
            owner.prefix(),
            owner_id,
            kind.tag(),
            seq
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns true if this timer id was built for an await-condition
    /// timer, by inspecting its encoded kind tag.
    pub fn is_await_condition(&self) -> bool {
        self.0.contains(&format!("-{}-", TimerKind::AwaitCondition.tag()))
    }

    /// Returns true if this timer id was built for an execution timeout.
    pub fn is_execution_timeout(&self) -> bool {
        self.0.contains(&format!("-{}-", TimerKind::ExecutionTimeout.tag()))
    }
}

impl std::fmt::Display for TimerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
#[path = "timer_tests.rs"]
mod tests;
