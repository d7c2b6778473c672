// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error taxonomy for the Execution/Workflow/Wakeup engines (C6-C8).
//! Mirrors the teacher's `RuntimeError` (one flat enum covering every
//! failure the runtime surfaces), but each variant carries the §7
//! classification tag so callers can build the user-visible
//! `ClassifiedError` without re-deriving it.

use loom_core::error::{ClassifiedError, ErrorKind, TimeoutKind};
use loom_storage::LogStoreError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("execution not found: {0}")]
    ExecutionNotFound(String),
    #[error("workflow not found: {0}")]
    WorkflowNotFound(String),
    #[error("step not found: {0}")]
    StepNotFound(String),
    #[error("decision not found: {0}")]
    DecisionNotFound(String),
    #[error("an active execution already exists for issue {0}")]
    ActiveExecutionExists(String),
    #[error("branch not found: {0}")]
    BranchNotFound(String),
    #[error("target branch missing: {0}")]
    TargetBranchMissing(String),
    #[error("agent spawn failed: {0}")]
    AgentSpawnFailure(String),
    #[error("agent protocol failure: {0}")]
    AgentProtocolFailure(String),
    #[error("resume unsupported by this agent")]
    ResumeUnsupported,
    #[error("{0} timeout")]
    Timeout(TimeoutKind),
    #[error("cancelled")]
    Cancelled,
    #[error("permission denied")]
    PermissionDenied,
    #[error("follow-up requires a terminal parent execution, but {0} is not terminal")]
    ParentNotTerminal(String),
    #[error("workflow step graph contains a cycle or refers to an out-of-graph step")]
    CyclicOrForeignDependency,
    #[error("recovery mismatch: {0}")]
    RecoveryMismatch(String),
    #[error("storage failure: {0}")]
    Storage(#[from] LogStoreError),
    #[error("entity store failure: {0}")]
    EntityStore(ClassifiedError),
    #[error("git backend failure: {0}")]
    Git(ClassifiedError),
    #[error("fatal: {0}")]
    Fatal(String),
}

impl EngineError {
    /// Classifies this error per the §7 taxonomy, for the user-visible
    /// failure surface every terminal execution exposes.
    pub fn classify(&self) -> ErrorKind {
        match self {
            EngineError::ExecutionNotFound(_)
            | EngineError::WorkflowNotFound(_)
            | EngineError::StepNotFound(_)
            | EngineError::DecisionNotFound(_) => ErrorKind::NotFound,
            EngineError::ActiveExecutionExists(_) | EngineError::CyclicOrForeignDependency => {
                ErrorKind::Conflict
            }
            EngineError::BranchNotFound(_) => ErrorKind::BranchNotFound,
            EngineError::TargetBranchMissing(_) => ErrorKind::TargetBranchMissing,
            EngineError::AgentSpawnFailure(_) | EngineError::ParentNotTerminal(_) => {
                ErrorKind::AgentSpawnFailure
            }
            EngineError::AgentProtocolFailure(_) => ErrorKind::AgentProtocolFailure,
            EngineError::ResumeUnsupported => ErrorKind::ResumeUnsupported,
            EngineError::Timeout(kind) => ErrorKind::Timeout(*kind),
            EngineError::Cancelled => ErrorKind::Cancelled,
            EngineError::PermissionDenied => ErrorKind::PermissionDenied,
            EngineError::RecoveryMismatch(_) => ErrorKind::RecoveryMismatch,
            EngineError::Storage(_) => ErrorKind::StorageFailure,
            EngineError::EntityStore(e) => e.kind,
            EngineError::Git(e) => e.kind,
            EngineError::Fatal(_) => ErrorKind::Fatal,
        }
    }

    pub fn into_classified(self) -> ClassifiedError {
        let kind = self.classify();
        ClassifiedError::new(kind, self.to_string())
    }
}

impl From<ClassifiedError> for EngineError {
    fn from(e: ClassifiedError) -> Self {
        match e.kind {
            ErrorKind::BranchNotFound => EngineError::BranchNotFound(e.message),
            ErrorKind::TargetBranchMissing => EngineError::TargetBranchMissing(e.message),
            _ => EngineError::Git(e),
        }
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
