// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Execution and workflow orchestration engine: owns the lifecycle of
//! individual agent executions (C6), drives multi-step workflows over
//! them (C7), interprets the generic [`loom_core::effect::Effect`]
//! vocabulary against live adapters, and durably tracks timers (C8).

pub mod adapter_factory;
pub mod error;
pub mod executor;
pub mod execution_engine;
pub mod journal;
pub mod state;
pub mod wakeup;
pub mod workflow_engine;

pub use adapter_factory::{AgentAdapterFactory, DefaultAgentAdapterFactory};
pub use error::EngineError;
pub use executor::Executor;
pub use execution_engine::{CreateExecutionParams, ExecutionEngine, WorkflowContext};
pub use journal::{Journal, JournalError};
pub use state::EngineState;
pub use wakeup::{FiredTimer, WakeupService};
pub use workflow_engine::WorkflowEngine;
