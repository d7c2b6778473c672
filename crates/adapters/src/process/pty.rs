// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PTY-backed process handle. Grounded on the teacher's `TmuxAdapter`
//! (`session::tmux`), generalized from shelling out to a named tmux
//! session to a real `portable-pty` master/slave pair so `resize` and
//! raw byte I/O are first-class instead of `tmux send-keys`/
//! `capture-pane` round trips.

use std::sync::Arc;

use async_trait::async_trait;
use loom_core::error::{ClassifiedError, ErrorKind};
use loom_core::interfaces::ProcessHandle;
use parking_lot::Mutex as SyncMutex;
use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};
use tokio::sync::Mutex;

/// A child process attached to a pseudo-terminal.
pub struct PtyProcess {
    pid: u32,
    master: Arc<SyncMutex<Box<dyn MasterPty + Send>>>,
    writer: Arc<Mutex<Box<dyn std::io::Write + Send>>>,
    child: Arc<Mutex<Box<dyn Child + Send + Sync>>>,
}

impl PtyProcess {
    pub async fn spawn(
        cmd: &str,
        args: &[String],
        env: &[(String, String)],
        cwd: &str,
        cols: u16,
        rows: u16,
    ) -> Result<Self, ClassifiedError> {
        let pty_system = native_pty_system();
        let pair = pty_system
            .openpty(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
            .map_err(|e| ClassifiedError::new(ErrorKind::AgentSpawnFailure, e.to_string()))?;

        let mut builder = CommandBuilder::new(cmd);
        builder.args(args);
        builder.cwd(cwd);
        for (key, value) in env {
            builder.env(key, value);
        }

        let child = pair
            .slave
            .spawn_command(builder)
            .map_err(|e| ClassifiedError::new(ErrorKind::AgentSpawnFailure, e.to_string()))?;
        let pid = child
            .process_id()
            .ok_or_else(|| ClassifiedError::new(ErrorKind::AgentSpawnFailure, "pty child exited immediately"))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| ClassifiedError::new(ErrorKind::AgentSpawnFailure, e.to_string()))?;

        Ok(Self {
            pid,
            master: Arc::new(SyncMutex::new(pair.master)),
            writer: Arc::new(Mutex::new(writer)),
            child: Arc::new(Mutex::new(child)),
        })
    }

    /// Clones a reader over the PTY's merged stdout/stderr stream, for
    /// the Agent Protocol Adapter (C3) to tail. A fresh clone can be
    /// taken any number of times; all clones observe the same bytes
    /// from their creation point onward.
    pub fn try_clone_reader(&self) -> Result<Box<dyn std::io::Read + Send>, ClassifiedError> {
        self.master
            .lock()
            .try_clone_reader()
            .map_err(|e| ClassifiedError::new(ErrorKind::AgentProtocolFailure, e.to_string()))
    }
}

#[async_trait]
impl ProcessHandle for PtyProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), ClassifiedError> {
        let bytes = bytes.to_vec();
        let writer = self.writer.clone();
        tokio::task::spawn_blocking(move || {
            let mut writer = writer.blocking_lock();
            std::io::Write::write_all(&mut *writer, &bytes)
        })
        .await
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?
        .map_err(|e| ClassifiedError::new(ErrorKind::AgentProtocolFailure, e.to_string()))
    }

    async fn resize(&self, cols: u16, rows: u16) -> Result<(), ClassifiedError> {
        let master = self.master.clone();
        tokio::task::spawn_blocking(move || {
            master.lock().resize(PtySize {
                rows,
                cols,
                pixel_width: 0,
                pixel_height: 0,
            })
        })
        .await
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))
    }

    async fn terminate(&self) -> Result<(), ClassifiedError> {
        let mut child = self.child.lock().await;
        child
            .kill()
            .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))
    }

    async fn wait(&self) -> Result<Option<i32>, ClassifiedError> {
        let child = self.child.clone();
        let status = tokio::task::spawn_blocking(move || child.blocking_lock().wait())
            .await
            .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?
            .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
        Ok(status.exit_code().try_into().ok())
    }
}

#[cfg(test)]
#[path = "pty_tests.rs"]
mod tests;
