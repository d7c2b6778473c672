// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process Manager (C1): spawn/supervise child processes and PTYs.
//!
//! Exposes two variants behind one [`loom_core::ProcessHandle`]
//! abstraction: [`simple::SimpleProcess`] (stdio pipes, grounded on the
//! teacher's `subprocess::run_with_timeout` helper) and
//! [`pty::PtyProcess`] (grounded on the teacher's `TmuxAdapter`,
//! generalized from shelling out to `tmux send-keys` to a genuine
//! `portable-pty`-backed handle so `resize` and raw byte I/O are
//! first-class).

pub mod pty;
pub mod simple;

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loom_core::error::{ClassifiedError, ErrorKind, TimeoutKind};
use loom_core::interfaces::{ProcessHandle, ProcessSpawner};
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Default grace period between a graceful terminate request and a
/// forceful kill, per §4.1's "fallback SIGKILL after a small timeout".
pub const GRACEFUL_SHUTDOWN_GRACE: Duration = Duration::from_secs(2);

/// Window within which a spawned child must report a PID, per §4.1's
/// "validates a PID is assigned within a bounded window".
pub const SPAWN_PID_WINDOW: Duration = Duration::from_secs(5);

/// Bookkeeping shared by both process variants: spawn time, last
/// activity, and configured timeouts, used by the idle/hard timeout
/// supervisor loop.
#[derive(Debug)]
pub struct ActivityTracker {
    spawned_at: Instant,
    last_activity: Mutex<Instant>,
    idle_timeout: Option<Duration>,
    hard_timeout: Option<Duration>,
}

impl ActivityTracker {
    pub fn new(idle_timeout: Option<Duration>, hard_timeout: Option<Duration>) -> Self {
        let now = Instant::now();
        Self {
            spawned_at: now,
            last_activity: Mutex::new(now),
            idle_timeout,
            hard_timeout,
        }
    }

    pub async fn touch(&self) {
        *self.last_activity.lock().await = Instant::now();
    }

    /// Returns the timeout kind that has elapsed, if any.
    pub async fn check_timeout(&self) -> Option<TimeoutKind> {
        if let Some(hard) = self.hard_timeout {
            if self.spawned_at.elapsed() >= hard {
                return Some(TimeoutKind::Hard);
            }
        }
        if let Some(idle) = self.idle_timeout {
            if self.last_activity.lock().await.elapsed() >= idle {
                return Some(TimeoutKind::Idle);
            }
        }
        None
    }
}

/// Configuration for [`ProcessManager::acquire`].
#[derive(Debug, Clone)]
pub struct AcquireConfig {
    pub cmd: String,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub cwd: String,
    pub interactive: bool,
    pub idle_timeout: Option<Duration>,
    pub hard_timeout: Option<Duration>,
    pub terminal_cols: u16,
    pub terminal_rows: u16,
}

/// One acquired process handle plus its activity tracker, returned by
/// [`ProcessManager::acquire`].
#[derive(Clone)]
pub struct AcquiredProcess {
    pub handle: Arc<dyn ProcessHandle>,
    pub activity: Arc<ActivityTracker>,
}

/// Chooses between [`simple::SimpleProcess`] and [`pty::PtyProcess`]
/// based on `config.interactive`, and hands back the [`ActivityTracker`]
/// each `AcquiredProcess` needs to enforce its own idle/hard timeouts.
/// The caller (e.g. [`crate::agent::claude::ClaudeAgentAdapter`]) owns
/// the actual polling loop, since it's the one already awake on a tail
/// interval and able to thread `touch()` through its forwarded output.
#[derive(Clone, Default)]
pub struct ProcessManager;

impl ProcessManager {
    pub fn new() -> Self {
        Self
    }

    /// Spawns a child; validates a PID is assigned within
    /// [`SPAWN_PID_WINDOW`].
    pub async fn acquire(&self, config: AcquireConfig) -> Result<AcquiredProcess, ClassifiedError> {
        let activity = Arc::new(ActivityTracker::new(config.idle_timeout, config.hard_timeout));
        let handle: Arc<dyn ProcessHandle> = if config.interactive {
            Arc::new(
                pty::PtyProcess::spawn(
                    &config.cmd,
                    &config.args,
                    &config.env,
                    &config.cwd,
                    config.terminal_cols,
                    config.terminal_rows,
                )
                .await?,
            )
        } else {
            Arc::new(simple::SimpleProcess::spawn(&config.cmd, &config.args, &config.env, &config.cwd).await?)
        };

        tokio::time::timeout(SPAWN_PID_WINDOW, async { handle.pid() })
            .await
            .map_err(|_| {
                ClassifiedError::new(
                    ErrorKind::AgentSpawnFailure,
                    "child did not report a pid within the spawn window",
                )
            })?;

        Ok(AcquiredProcess { handle, activity })
    }

    /// Best-effort graceful terminate, falling back to a forced kill
    /// after [`GRACEFUL_SHUTDOWN_GRACE`].
    pub async fn terminate(&self, handle: &Arc<dyn ProcessHandle>) -> Result<(), ClassifiedError> {
        handle.terminate().await?;
        match tokio::time::timeout(GRACEFUL_SHUTDOWN_GRACE, handle.wait()).await {
            Ok(result) => result.map(|_| ()),
            Err(_elapsed) => {
                tracing::warn!("graceful terminate did not exit in time, forcing kill");
                handle.terminate().await
            }
        }
    }
}

#[async_trait]
impl ProcessSpawner for ProcessManager {
    async fn spawn(
        &self,
        cmd: &str,
        args: &[String],
        env: &[(String, String)],
        cwd: &str,
        interactive: bool,
    ) -> Result<Box<dyn ProcessHandle>, ClassifiedError> {
        if interactive {
            Ok(Box::new(pty::PtyProcess::spawn(cmd, args, env, cwd, 120, 40).await?))
        } else {
            Ok(Box::new(simple::SimpleProcess::spawn(cmd, args, env, cwd).await?))
        }
    }
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
