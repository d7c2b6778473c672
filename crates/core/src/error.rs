// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared error taxonomy. Each crate boundary defines its own
//! `#[derive(thiserror::Error)]` enum and implements `classify()` to map
//! into this shared [`ErrorKind`], so every terminal execution or
//! workflow step exposes a uniform classification tag regardless of
//! which component produced the failure.

use serde::{Deserialize, Serialize};

/// Semantic error classification, shared across crate boundaries.
/// Variant names are taxonomy kinds, not Rust type names — several
/// distinct `thiserror` variants in `loom-adapters`, `loom-storage`, or
/// `loom-engine` may classify to the same kind here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Entity, execution, or workflow does not exist.
    NotFound,
    /// Invariant violation, e.g. an active execution already exists for
    /// an issue.
    Conflict,
    /// Worktree creation requested an existing branch that is absent.
    BranchNotFound,
    /// Worktree creation's base branch is absent.
    TargetBranchMissing,
    /// The process manager could not produce a child process.
    AgentSpawnFailure,
    /// The agent protocol stream ended abnormally or was unparseable.
    AgentProtocolFailure,
    /// The adapter cannot resume the requested session.
    ResumeUnsupported,
    /// A configured timeout fired. See [`TimeoutKind`] for the subkind.
    Timeout(TimeoutKind),
    /// Explicit user cancellation.
    Cancelled,
    /// The user rejected a permission prompt.
    PermissionDenied,
    /// On restart, a referenced execution row was missing or
    /// inconsistent.
    RecoveryMismatch,
    /// An underlying store write failed; the producer continues
    /// best-effort.
    StorageFailure,
    /// Unrecoverable host error.
    Fatal,
}

/// Subkind of a [`ErrorKind::Timeout`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeoutKind {
    Idle,
    Hard,
    Shutdown,
}

impl std::fmt::Display for TimeoutKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TimeoutKind::Idle => write!(f, "idle"),
            TimeoutKind::Hard => write!(f, "hard"),
            TimeoutKind::Shutdown => write!(f, "shutdown"),
        }
    }
}

impl ErrorKind {
    /// Short machine-readable tag, stable across releases, suitable for
    /// persistence and structured log fields.
    pub fn tag(&self) -> &'static str {
        match self {
            ErrorKind::NotFound => "not_found",
            ErrorKind::Conflict => "conflict",
            ErrorKind::BranchNotFound => "branch_not_found",
            ErrorKind::TargetBranchMissing => "target_branch_missing",
            ErrorKind::AgentSpawnFailure => "agent_spawn_failure",
            ErrorKind::AgentProtocolFailure => "agent_protocol_failure",
            ErrorKind::ResumeUnsupported => "resume_unsupported",
            ErrorKind::Timeout(TimeoutKind::Idle) => "timeout_idle",
            ErrorKind::Timeout(TimeoutKind::Hard) => "timeout_hard",
            ErrorKind::Timeout(TimeoutKind::Shutdown) => "timeout_shutdown",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::PermissionDenied => "permission_denied",
            ErrorKind::RecoveryMismatch => "recovery_mismatch",
            ErrorKind::StorageFailure => "storage_failure",
            ErrorKind::Fatal => "fatal",
        }
    }
}

/// A terminal entity's classified failure: the taxonomy kind plus a
/// human-readable message. Invariant 10: every `ClassifiedError` names
/// exactly one taxonomy kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifiedError {
    pub kind: ErrorKind,
    pub message: String,
}

impl ClassifiedError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ClassifiedError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}] {}", self.kind.tag(), self.message)
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
