// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Agent Protocol Adapter (C3)
//!
//! Translates an agent's native stdio/transcript framing into the
//! normalized trajectory table of §4.3 and exposes the control surface
//! C6 drives an execution through. Grounded on the teacher's
//! `AgentAdapter` trait (`agent::mod`), narrowed from the teacher's
//! tmux-session-oriented contract (`spawn`/`send`/`kill`/`reconnect`/
//! `get_state`) to the distilled spec's trajectory-stream contract
//! (`run`/`resume`/`fork`/`cancel`/`interruptWith`/`setMode`/
//! `respondToPermission`).

pub mod claude;
#[cfg(any(test, feature = "test-support"))]
pub mod fake;
pub mod transcript;

use std::path::PathBuf;

use async_trait::async_trait;
use loom_core::execution_log::LogPayload;
use thiserror::Error;
use tokio::sync::mpsc;

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeAgentAdapter;

/// Errors surfaced by an [`AgentAdapter`]. `ResumeUnsupported` is the
/// distinguished variant callers must check to decide whether to fall
/// back to a fresh `run()`, per §4.3's failure clause.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("session not found: {0}")]
    NotFound(String),
    #[error("spawn failed: {0}")]
    SpawnFailed(String),
    #[error("send failed: {0}")]
    SendFailed(String),
    #[error("resume is unsupported by this agent")]
    ResumeUnsupported,
    #[error("no permission request is pending for {0}")]
    NoPendingPermission(String),
    #[error("session error: {0}")]
    SessionError(String),
}

/// Inputs to [`AgentAdapter::run`]/[`AgentAdapter::resume`].
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub cmd: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: PathBuf,
    pub prompt: String,
    /// Path of the transcript file this adapter should tail. Resolving
    /// this path from an agent-specific state directory is a caller
    /// concern (out of scope here, narrowed from the teacher's
    /// `find_session_log`/`~/.claude` lookup to an explicit input so
    /// the adapter stays agent-agnostic).
    pub transcript_path: PathBuf,
}

/// `code` vs `plan`, per §4.3's `setMode` operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentMode {
    Code,
    Plan,
}

/// A finite stream of normalized trajectory payloads. The stream ends
/// (the channel closes) when the agent signals end-of-run or the
/// underlying process exits.
pub type TrajectoryStream = mpsc::Receiver<LogPayload>;

/// Control surface for one agent session, per §4.3. An adapter instance
/// is scoped to a single session: tool-call callbacks and permission
/// state live on the instance, not passed per-call.
#[async_trait]
pub trait AgentAdapter: Send + Sync {
    async fn run(&self, config: RunConfig) -> Result<TrajectoryStream, AgentError>;

    async fn resume(&self, session_id: &str, config: RunConfig) -> Result<TrajectoryStream, AgentError>;

    /// Flushes pending output and returns a session id whose history
    /// inherits from the parent session.
    async fn fork(&self, session_id: &str) -> Result<String, AgentError>;

    /// Cancels the in-flight prompt without tearing down the session if
    /// the underlying agent supports it; otherwise escalates to process
    /// termination.
    async fn cancel(&self) -> Result<(), AgentError>;

    async fn interrupt_with(&self, prompt: &str) -> Result<TrajectoryStream, AgentError>;

    async fn set_mode(&self, mode: AgentMode) -> Result<(), AgentError>;

    /// Unblocks the adapter's awaiting permission prompt identified by
    /// `request_id`. Returns `NoPendingPermission` if that request is
    /// not currently awaited (already resolved, or never issued).
    async fn respond_to_permission(&self, request_id: &str, option_id: &str) -> Result<(), AgentError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
