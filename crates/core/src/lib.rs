// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Data model, identifiers, and narrow external-interface traits shared
//! by every other crate in this workspace. `loom-core` has no knowledge
//! of subprocesses, git, or storage formats — those live in
//! `loom-adapters`, `loom-storage`, and `loom-engine`, which depend on
//! this crate rather than the other way around.

pub mod clock;
pub mod config;
pub mod effect;
pub mod error;
pub mod execution;
pub mod execution_log;
pub mod id;
pub mod interfaces;
pub mod issue;
pub mod owner;
pub mod permission;
pub mod project;
pub mod spec_entity;
pub mod test_support;
pub mod timer;
pub mod workflow;
pub mod workflow_event;
pub mod worktree;

pub use clock::{Clock, FakeClock, Millis, SystemClock};
pub use config::{EngineConfig, ExecutionModeConfig, PermissionMode, TerminalConfig, WorkflowSectionConfig};
pub use effect::{BusChannel, Effect};
pub use error::{ClassifiedError, ErrorKind, TimeoutKind};
pub use execution::{AgentType, Execution, ExecutionId, ExecutionMode, ExecutionStatus};
pub use execution_log::{ExecutionLogEntry, LogPayload};
pub use id::{IdGen, SequentialIdGen, ShortId, UuidIdGen};
pub use interfaces::{
    EntityStore, EventEmitter, EventReceiver, GitBackend, ProcessHandle, ProcessSpawner,
};
pub use issue::{Issue, IssueId, IssueStatus, Priority};
pub use owner::OwnerId;
pub use permission::{Decision, DecisionId, DecisionSource, DecisionState};
pub use project::ProjectId;
pub use spec_entity::{Spec, SpecId};
pub use timer::{TimerId, TimerKind};
pub use workflow::{
    AutonomyLevel, OnFailure, Parallelism, Workflow, WorkflowConfig, WorkflowId, WorkflowSource,
    WorkflowStatus, WorkflowStep, StepId, StepStatus,
};
pub use workflow_event::{StepFailureReason, WorkflowEvent, WorkflowEventId, WorkflowEventType};
pub use worktree::WorktreeRecord;
