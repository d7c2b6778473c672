// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Claude agent adapter. Grounded on the teacher's `ClaudeAgentAdapter`
//! (spawn-then-watch structure) and `watcher::watch_agent` (a
//! background task that tails a growing transcript file and forwards
//! state changes), narrowed here to forward normalized trajectory
//! payloads instead of `AgentState` transitions. The teacher watches
//! via `notify::RecommendedWatcher` with a polling fallback; this
//! adapter keeps only the polling half — a fixed-interval tail loop —
//! since `notify` carries no other use in this workspace (see
//! DESIGN.md).

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use loom_core::error::ErrorKind;
use loom_core::execution_log::{LogPayload, StatusChange};
use loom_core::id::{IdGen, UuidIdGen};
use tokio::sync::{mpsc, Mutex};

use crate::agent::transcript::TranscriptTailer;
use crate::agent::{AgentAdapter, AgentError, AgentMode, RunConfig, TrajectoryStream};
use crate::process::{AcquireConfig, ActivityTracker, AcquiredProcess, ProcessManager};

const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(250);

struct SessionState {
    process: Option<AcquiredProcess>,
    session_id: Option<String>,
    pending_permissions: HashSet<String>,
}

impl SessionState {
    fn new() -> Self {
        Self {
            process: None,
            session_id: None,
            pending_permissions: HashSet::new(),
        }
    }
}

/// Drives one Claude CLI session: spawns it via the Process Manager
/// (C1) and tails its JSONL transcript, translating each line into a
/// normalized trajectory entry.
pub struct ClaudeAgentAdapter {
    process_manager: Arc<ProcessManager>,
    poll_interval: Duration,
    idle_timeout: Option<Duration>,
    hard_timeout: Option<Duration>,
    id_gen: UuidIdGen,
    state: Arc<Mutex<SessionState>>,
}

impl ClaudeAgentAdapter {
    pub fn new(process_manager: Arc<ProcessManager>, idle_timeout: Option<Duration>, hard_timeout: Option<Duration>) -> Self {
        Self {
            process_manager,
            poll_interval: DEFAULT_POLL_INTERVAL,
            idle_timeout,
            hard_timeout,
            id_gen: UuidIdGen,
            state: Arc::new(Mutex::new(SessionState::new())),
        }
    }

    #[cfg(test)]
    fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn spawn_and_tail(&self, config: RunConfig, resume_session: Option<&str>) -> Result<TrajectoryStream, AgentError> {
        let mut args = config.args.clone();
        if let Some(session_id) = resume_session {
            args.push("--resume".to_string());
            args.push(session_id.to_string());
        }

        let acquired = self
            .process_manager
            .acquire(AcquireConfig {
                cmd: config.cmd.clone(),
                args,
                env: config.env.clone(),
                cwd: config.cwd.to_string_lossy().to_string(),
                interactive: false,
                idle_timeout: self.idle_timeout,
                hard_timeout: self.hard_timeout,
                terminal_cols: 80,
                terminal_rows: 24,
            })
            .await
            .map_err(|e| AgentError::SpawnFailed(e.to_string()))?;

        acquired
            .handle
            .write(config.prompt.as_bytes())
            .await
            .map_err(|e| AgentError::SendFailed(e.to_string()))?;

        let handle = acquired.handle.clone();
        let activity = acquired.activity.clone();
        {
            let mut state = self.state.lock().await;
            state.process = Some(acquired);
        }

        let (tx, rx) = mpsc::channel(256);
        let transcript_path = config.transcript_path;
        let poll_interval = self.poll_interval;
        let state = self.state.clone();
        let process_manager = self.process_manager.clone();

        tokio::spawn(async move {
            let mut tailer = TranscriptTailer::new();
            loop {
                tokio::select! {
                    _ = tokio::time::sleep(poll_interval) => {
                        if !forward_batch(&mut tailer, &transcript_path, &tx, &state, &activity).await {
                            return;
                        }
                        if let Some(kind) = activity.check_timeout().await {
                            let _ = process_manager.terminate(&handle).await;
                            let _ = tx
                                .send(LogPayload::StatusChange(StatusChange {
                                    from: "running".to_string(),
                                    to: ErrorKind::Timeout(kind).tag().to_string(),
                                }))
                                .await;
                            return;
                        }
                    }
                    _ = handle.wait() => {
                        forward_batch(&mut tailer, &transcript_path, &tx, &state, &activity).await;
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// Polls the transcript once, updates session bookkeeping, touches the
/// idle-timeout clock for every forwarded payload, and forwards each
/// payload downstream. Returns `false` if the receiver has hung up.
async fn forward_batch(
    tailer: &mut TranscriptTailer,
    transcript_path: &std::path::Path,
    tx: &mpsc::Sender<LogPayload>,
    state: &Arc<Mutex<SessionState>>,
    activity: &Arc<ActivityTracker>,
) -> bool {
    let payloads = tailer.poll(transcript_path);
    for payload in payloads {
        activity.touch().await;
        match &payload {
            LogPayload::SystemMessage { session_id: Some(sid), .. } => {
                let mut st = state.lock().await;
                if st.session_id.is_none() {
                    st.session_id = Some(sid.clone());
                }
            }
            LogPayload::PermissionRequest(req) => {
                let mut st = state.lock().await;
                st.pending_permissions.insert(req.request_id.clone());
            }
            _ => {}
        }
        if tx.send(payload).await.is_err() {
            return false;
        }
    }
    true
}

#[async_trait]
impl AgentAdapter for ClaudeAgentAdapter {
    async fn run(&self, config: RunConfig) -> Result<TrajectoryStream, AgentError> {
        self.spawn_and_tail(config, None).await
    }

    async fn resume(&self, session_id: &str, config: RunConfig) -> Result<TrajectoryStream, AgentError> {
        self.spawn_and_tail(config, Some(session_id)).await
    }

    async fn fork(&self, session_id: &str) -> Result<String, AgentError> {
        // A fork inherits the parent's transcript history under a new
        // session id; the underlying agent establishes that history the
        // next time `resume` is called with the returned id.
        Ok(format!("{session_id}-fork-{}", self.id_gen.next()))
    }

    async fn cancel(&self) -> Result<(), AgentError> {
        let process = {
            let state = self.state.lock().await;
            state.process.clone()
        };
        let Some(acquired) = process else {
            return Err(AgentError::SessionError("no active session to cancel".to_string()));
        };
        self.process_manager
            .terminate(&acquired.handle)
            .await
            .map_err(|e| AgentError::SessionError(e.to_string()))
    }

    async fn interrupt_with(&self, prompt: &str) -> Result<TrajectoryStream, AgentError> {
        let session_id = {
            let state = self.state.lock().await;
            state.session_id.clone()
        };
        self.cancel().await?;
        let Some(session_id) = session_id else {
            return Err(AgentError::SessionError("cannot interrupt a session with no established session id".to_string()));
        };
        let config = RunConfig {
            cmd: String::new(),
            args: Vec::new(),
            env: Vec::new(),
            cwd: std::path::PathBuf::new(),
            prompt: prompt.to_string(),
            transcript_path: std::path::PathBuf::new(),
        };
        self.resume(&session_id, config).await
    }

    async fn set_mode(&self, mode: AgentMode) -> Result<(), AgentError> {
        let process = {
            let state = self.state.lock().await;
            state.process.clone()
        };
        let Some(acquired) = process else {
            return Err(AgentError::SessionError("no active session".to_string()));
        };
        let command = match mode {
            AgentMode::Code => "/mode code\n",
            AgentMode::Plan => "/mode plan\n",
        };
        acquired
            .handle
            .write(command.as_bytes())
            .await
            .map_err(|e| AgentError::SendFailed(e.to_string()))
    }

    async fn respond_to_permission(&self, request_id: &str, option_id: &str) -> Result<(), AgentError> {
        let process = {
            let mut state = self.state.lock().await;
            if !state.pending_permissions.remove(request_id) {
                return Err(AgentError::NoPendingPermission(request_id.to_string()));
            }
            state.process.clone()
        };
        let Some(acquired) = process else {
            return Err(AgentError::SessionError("no active session".to_string()));
        };
        let line = format!("{option_id}\n");
        acquired
            .handle
            .write(line.as_bytes())
            .await
            .map_err(|e| AgentError::SendFailed(e.to_string()))
    }
}

#[cfg(test)]
#[path = "claude_tests.rs"]
mod tests;
