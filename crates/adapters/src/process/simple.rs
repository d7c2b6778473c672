// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Stdio-piped child process handle. Grounded on the teacher's
//! `subprocess::run_with_timeout` helper, generalized from "run to
//! completion" to a long-lived handle with ongoing stdin writes and a
//! buffered, lockable stdout/stderr tail.

use std::process::Stdio;
use std::sync::Arc;

use async_trait::async_trait;
use loom_core::error::{ClassifiedError, ErrorKind};
use loom_core::interfaces::ProcessHandle;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};
use tokio::sync::Mutex;

/// A child process communicating over stdio pipes.
pub struct SimpleProcess {
    pid: u32,
    child: Arc<Mutex<Child>>,
}

impl SimpleProcess {
    pub async fn spawn(
        cmd: &str,
        args: &[String],
        env: &[(String, String)],
        cwd: &str,
    ) -> Result<Self, ClassifiedError> {
        let mut command = Command::new(cmd);
        command
            .args(args)
            .current_dir(cwd)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        for (key, value) in env {
            command.env(key, value);
        }

        let child = command
            .spawn()
            .map_err(|e| ClassifiedError::new(ErrorKind::AgentSpawnFailure, e.to_string()))?;
        let pid = child
            .id()
            .ok_or_else(|| ClassifiedError::new(ErrorKind::AgentSpawnFailure, "child exited immediately"))?;

        Ok(Self {
            pid,
            child: Arc::new(Mutex::new(child)),
        })
    }

    /// Reads up to `max_bytes` currently buffered on stdout, used by the
    /// Agent Protocol Adapter (C3) when an agent speaks structured
    /// stdio instead of writing a transcript file.
    pub async fn read_stdout_chunk(&self, max_bytes: usize) -> Result<Vec<u8>, ClassifiedError> {
        let mut child = self.child.lock().await;
        let stdout = child
            .stdout
            .as_mut()
            .ok_or_else(|| ClassifiedError::new(ErrorKind::AgentProtocolFailure, "stdout not piped"))?;
        let mut buf = vec![0u8; max_bytes];
        let n = stdout
            .read(&mut buf)
            .await
            .map_err(|e| ClassifiedError::new(ErrorKind::AgentProtocolFailure, e.to_string()))?;
        buf.truncate(n);
        Ok(buf)
    }
}

#[async_trait]
impl ProcessHandle for SimpleProcess {
    fn pid(&self) -> u32 {
        self.pid
    }

    async fn write(&self, bytes: &[u8]) -> Result<(), ClassifiedError> {
        let mut child = self.child.lock().await;
        let stdin = child
            .stdin
            .as_mut()
            .ok_or_else(|| ClassifiedError::new(ErrorKind::AgentProtocolFailure, "stdin not piped"))?;
        stdin
            .write_all(bytes)
            .await
            .map_err(|e| ClassifiedError::new(ErrorKind::AgentProtocolFailure, e.to_string()))
    }

    async fn resize(&self, _cols: u16, _rows: u16) -> Result<(), ClassifiedError> {
        // Resize is a PTY-only operation; stdio pipes have no geometry.
        Ok(())
    }

    async fn terminate(&self) -> Result<(), ClassifiedError> {
        let mut child = self.child.lock().await;
        child
            .start_kill()
            .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))
    }

    async fn wait(&self) -> Result<Option<i32>, ClassifiedError> {
        let mut child = self.child.lock().await;
        let status = child
            .wait()
            .await
            .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
        Ok(status.code())
    }
}

#[cfg(test)]
#[path = "simple_tests.rs"]
mod tests;
