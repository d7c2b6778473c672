// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process spawning, worktree management, and agent protocol adapters
//! (C1, C2, C3). Implements the narrow trait boundaries declared in
//! `loom_core::interfaces` against real subprocesses, `git2`, and the
//! Claude CLI.

pub mod agent;
pub mod process;
pub mod worktree;

pub use agent::{AgentAdapter, AgentError, AgentMode, RunConfig, TrajectoryStream};
pub use agent::claude::ClaudeAgentAdapter;
#[cfg(any(test, feature = "test-support"))]
pub use agent::fake::{AgentCall, FakeAgentAdapter};
pub use process::{AcquireConfig, AcquiredProcess, ActivityTracker, ProcessManager};
pub use worktree::{CreateWorktreeRequest, CreatedWorktree, Git2Backend, WorktreeManager};
