// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake agent adapter for deterministic testing. Grounded on the
//! teacher's `FakeAgentAdapter` (records calls, lets the caller script
//! the next response), narrowed to the trajectory-stream contract of
//! this workspace's [`super::AgentAdapter`].

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loom_core::execution_log::LogPayload;
use parking_lot::Mutex;
use tokio::sync::mpsc;

use crate::agent::{AgentAdapter, AgentError, AgentMode, RunConfig, TrajectoryStream};

/// A call recorded by [`FakeAgentAdapter`], inspectable from tests.
#[derive(Debug, Clone, PartialEq)]
pub enum AgentCall {
    Run { prompt: String },
    Resume { session_id: String, prompt: String },
    Fork { session_id: String },
    Cancel,
    InterruptWith { prompt: String },
    SetMode(AgentMode),
    RespondToPermission { request_id: String, option_id: String },
}

struct FakeState {
    calls: Vec<AgentCall>,
    script: Vec<LogPayload>,
    repeating: Option<(LogPayload, Duration)>,
    run_error: Option<String>,
    pending_permissions: HashSet<String>,
    cancelled: bool,
}

/// Deterministic, in-process [`AgentAdapter`] used by engine tests and
/// the scenario suite. `run`/`resume` replay a pre-configured script of
/// trajectory payloads rather than spawning a real process.
#[derive(Clone)]
pub struct FakeAgentAdapter {
    inner: Arc<Mutex<FakeState>>,
}

impl Default for FakeAgentAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeAgentAdapter {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeState {
                calls: Vec::new(),
                script: Vec::new(),
                repeating: None,
                run_error: None,
                pending_permissions: HashSet::new(),
                cancelled: false,
            })),
        }
    }

    /// Sets the trajectory payloads the next `run`/`resume` call will
    /// replay, in order.
    pub fn set_script(&self, script: Vec<LogPayload>) {
        self.inner.lock().script = script;
    }

    pub fn set_run_error(&self, message: impl Into<String>) {
        self.inner.lock().run_error = Some(message.into());
    }

    /// Emits `payload` on `interval` forever, stopping only once
    /// `cancel()` has been called. Used to simulate an agent that keeps
    /// streaming until explicitly cancelled (cancel-mid-stream tests).
    pub fn set_repeating_script(&self, payload: LogPayload, interval: Duration) {
        self.inner.lock().repeating = Some((payload, interval));
    }

    pub fn calls(&self) -> Vec<AgentCall> {
        self.inner.lock().calls.clone()
    }

    pub fn was_cancelled(&self) -> bool {
        self.inner.lock().cancelled
    }

    async fn replay(&self, call: AgentCall) -> Result<TrajectoryStream, AgentError> {
        let (script, repeating, error) = {
            let mut state = self.inner.lock();
            state.calls.push(call);
            (state.script.clone(), state.repeating.clone(), state.run_error.take())
        };
        if let Some(message) = error {
            return Err(AgentError::SpawnFailed(message));
        }

        let (tx, rx) = mpsc::channel(script.len().max(1));
        let inner = self.inner.clone();
        tokio::spawn(async move {
            for payload in script {
                if let LogPayload::PermissionRequest(req) = &payload {
                    inner.lock().pending_permissions.insert(req.request_id.clone());
                }
                if tx.send(payload).await.is_err() {
                    return;
                }
            }
            if let Some((payload, interval)) = repeating {
                loop {
                    if inner.lock().cancelled {
                        return;
                    }
                    tokio::time::sleep(interval).await;
                    if inner.lock().cancelled {
                        return;
                    }
                    if tx.send(payload.clone()).await.is_err() {
                        return;
                    }
                }
            }
        });
        Ok(rx)
    }
}

#[async_trait]
impl AgentAdapter for FakeAgentAdapter {
    async fn run(&self, config: RunConfig) -> Result<TrajectoryStream, AgentError> {
        self.replay(AgentCall::Run { prompt: config.prompt }).await
    }

    async fn resume(&self, session_id: &str, config: RunConfig) -> Result<TrajectoryStream, AgentError> {
        self.replay(AgentCall::Resume {
            session_id: session_id.to_string(),
            prompt: config.prompt,
        })
        .await
    }

    async fn fork(&self, session_id: &str) -> Result<String, AgentError> {
        self.inner.lock().calls.push(AgentCall::Fork {
            session_id: session_id.to_string(),
        });
        Ok(format!("{session_id}-fork"))
    }

    async fn cancel(&self) -> Result<(), AgentError> {
        let mut state = self.inner.lock();
        state.calls.push(AgentCall::Cancel);
        state.cancelled = true;
        Ok(())
    }

    async fn interrupt_with(&self, prompt: &str) -> Result<TrajectoryStream, AgentError> {
        self.inner.lock().calls.push(AgentCall::InterruptWith {
            prompt: prompt.to_string(),
        });
        let (_, rx) = mpsc::channel(1);
        Ok(rx)
    }

    async fn set_mode(&self, mode: AgentMode) -> Result<(), AgentError> {
        self.inner.lock().calls.push(AgentCall::SetMode(mode));
        Ok(())
    }

    async fn respond_to_permission(&self, request_id: &str, option_id: &str) -> Result<(), AgentError> {
        let mut state = self.inner.lock();
        if !state.pending_permissions.remove(request_id) {
            return Err(AgentError::NoPendingPermission(request_id.to_string()));
        }
        state.calls.push(AgentCall::RespondToPermission {
            request_id: request_id.to_string(),
            option_id: option_id.to_string(),
        });
        Ok(())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
