// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Narrow trait boundaries to the core's external collaborators (§6):
//! an entity store, a git interface, a subprocess spawner, and an event
//! emitter. `loom-adapters` and `loom-storage` provide production
//! implementations; fakes live behind `test-support` for the engine's
//! own unit tests, mirroring the teacher's adapter-trait-plus-fake
//! pattern.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ClassifiedError;
use crate::issue::{Issue, IssueId};
use crate::project::ProjectId;
use crate::spec_entity::{Spec, SpecId};

/// Read/write access to issues, specs, and their relationships. The
/// entity CRUD layer itself is out of scope; this trait is the narrow
/// seam the engine calls through.
#[async_trait]
pub trait EntityStore: Send + Sync {
    async fn get_issue(&self, project: &ProjectId, id: &IssueId) -> Result<Issue, ClassifiedError>;
    async fn get_spec(&self, project: &ProjectId, id: &SpecId) -> Result<Spec, ClassifiedError>;
    async fn relationships_of(
        &self,
        project: &ProjectId,
        id: &IssueId,
    ) -> Result<Vec<IssueId>, ClassifiedError>;
}

/// A handle yielded by [`ProcessSpawner::spawn`], narrow enough to cover
/// both a stdio-piped child and a PTY session.
#[async_trait]
pub trait ProcessHandle: Send + Sync {
    fn pid(&self) -> u32;
    async fn write(&self, bytes: &[u8]) -> Result<(), ClassifiedError>;
    /// PTY-only; no-op (returns `Ok`) for a stdio-piped process.
    async fn resize(&self, cols: u16, rows: u16) -> Result<(), ClassifiedError>;
    async fn terminate(&self) -> Result<(), ClassifiedError>;
    async fn wait(&self) -> Result<Option<i32>, ClassifiedError>;
}

/// Spawns a child process or PTY session on behalf of C1.
#[async_trait]
pub trait ProcessSpawner: Send + Sync {
    async fn spawn(
        &self,
        cmd: &str,
        args: &[String],
        env: &[(String, String)],
        cwd: &str,
        interactive: bool,
    ) -> Result<Box<dyn ProcessHandle>, ClassifiedError>;
}

/// Git plumbing consumed by the Worktree Manager (C2).
#[async_trait]
pub trait GitBackend: Send + Sync {
    async fn create_worktree(
        &self,
        repo_path: &str,
        worktree_path: &str,
        branch_name: &str,
        base_branch: &str,
        create_branch: bool,
        sparse_checkout_patterns: &[String],
    ) -> Result<(), ClassifiedError>;
    async fn remove_worktree(
        &self,
        repo_path: &str,
        worktree_path: &str,
        delete_branch: bool,
    ) -> Result<(), ClassifiedError>;
    async fn list_worktrees(&self, repo_path: &str) -> Result<Vec<String>, ClassifiedError>;
    async fn rev_parse_head(&self, dir: &str) -> Result<String, ClassifiedError>;
    async fn diff_names(
        &self,
        dir: &str,
        base_ref: &str,
        head_ref: &str,
    ) -> Result<Vec<String>, ClassifiedError>;
    async fn branch_exists(&self, repo_path: &str, branch: &str) -> Result<bool, ClassifiedError>;
    async fn create_branch(
        &self,
        repo_path: &str,
        branch: &str,
        base: &str,
    ) -> Result<(), ClassifiedError>;
    async fn delete_branch(&self, repo_path: &str, branch: &str) -> Result<(), ClassifiedError>;
    async fn list_branches(&self, repo_path: &str) -> Result<Vec<String>, ClassifiedError>;
}

/// A subscription handle for published messages, backed by a broadcast
/// channel per C5's "many subscribers, one producer" discipline. A slow
/// subscriber is dropped (its next `recv()` returns `Lagged`) rather
/// than backpressuring the producer.
pub type EventReceiver = tokio::sync::broadcast::Receiver<Value>;

/// Publishes/subscribes to the fan-out bus (C5), keyed by
/// `(projectId, channel)`.
#[async_trait]
pub trait EventEmitter: Send + Sync {
    async fn subscribe(&self, project: &ProjectId, channel: &str) -> EventReceiver;
    fn publish(&self, project: &ProjectId, channel: &str, message: Value);
}
