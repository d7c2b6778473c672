// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Tagged-variant Agent Protocol Adapter dispatch, per Design Note 1:
//! the source's interface-inheritance agent hierarchy is re-architected
//! as one adapter trait keyed by [`AgentType`], with per-variant
//! construction bundled behind a factory rather than scattered through
//! the Execution Engine.

use std::sync::Arc;
use std::time::Duration;

use loom_adapters::{AgentAdapter, ClaudeAgentAdapter, ProcessManager};
use loom_core::execution::AgentType;

use crate::error::EngineError;

/// Builds a fresh, session-scoped [`AgentAdapter`] for an execution
/// about to spawn. One instance is created per execution; adapters are
/// never shared across executions.
pub trait AgentAdapterFactory: Send + Sync {
    fn create(&self, agent_type: AgentType) -> Result<Box<dyn AgentAdapter>, EngineError>;
}

/// Production factory: `Claude` spawns via the shared [`ProcessManager`]
/// (C1); `Fake` is only available when this crate's `test-support`
/// feature is enabled (AgentType::Fake is never selected in
/// production, per its doc comment in `loom-core`).
pub struct DefaultAgentAdapterFactory {
    process_manager: Arc<ProcessManager>,
    idle_timeout: Option<Duration>,
    hard_timeout: Option<Duration>,
}

impl DefaultAgentAdapterFactory {
    pub fn new(process_manager: Arc<ProcessManager>, idle_timeout: Option<Duration>, hard_timeout: Option<Duration>) -> Self {
        Self { process_manager, idle_timeout, hard_timeout }
    }
}

impl AgentAdapterFactory for DefaultAgentAdapterFactory {
    fn create(&self, agent_type: AgentType) -> Result<Box<dyn AgentAdapter>, EngineError> {
        match agent_type {
            AgentType::Claude => Ok(Box::new(ClaudeAgentAdapter::new(
                self.process_manager.clone(),
                self.idle_timeout,
                self.hard_timeout,
            ))),
            #[cfg(any(test, feature = "test-support"))]
            AgentType::Fake => Ok(Box::new(loom_adapters::FakeAgentAdapter::new())),
            #[cfg(not(any(test, feature = "test-support")))]
            AgentType::Fake => Err(EngineError::AgentSpawnFailure(
                "AgentType::Fake is unavailable outside test-support builds".to_string(),
            )),
        }
    }
}

#[cfg(test)]
#[path = "adapter_factory_tests.rs"]
mod tests;
