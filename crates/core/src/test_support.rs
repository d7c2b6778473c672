// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory fakes for the trait boundaries in [`crate::interfaces`],
//! shared across `loom-adapters`, `loom-storage`, and `loom-engine`
//! tests behind the `test-support` feature, mirroring the teacher's own
//! `FakeAgentAdapter`/`FakeSessionAdapter` pair.

#![cfg(any(test, feature = "test-support"))]

use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::{ClassifiedError, ErrorKind};
use crate::interfaces::{EntityStore, EventEmitter, EventReceiver};
use crate::issue::{Issue, IssueId};
use crate::project::ProjectId;
use crate::spec_entity::{Spec, SpecId};

/// An [`EntityStore`] backed by in-memory maps, seeded by the test.
#[derive(Default)]
pub struct FakeEntityStore {
    issues: Mutex<HashMap<String, Issue>>,
    specs: Mutex<HashMap<String, Spec>>,
}

impl FakeEntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_issue(&self, issue: Issue) {
        self.issues.lock().insert(issue.id.as_str().to_string(), issue);
    }

    pub fn insert_spec(&self, spec: Spec) {
        self.specs.lock().insert(spec.id.as_str().to_string(), spec);
    }
}

#[async_trait]
impl EntityStore for FakeEntityStore {
    async fn get_issue(&self, _project: &ProjectId, id: &IssueId) -> Result<Issue, ClassifiedError> {
        self.issues
            .lock()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| ClassifiedError::new(ErrorKind::NotFound, format!("issue {id} not found")))
    }

    async fn get_spec(&self, _project: &ProjectId, id: &SpecId) -> Result<Spec, ClassifiedError> {
        self.specs
            .lock()
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| ClassifiedError::new(ErrorKind::NotFound, format!("spec {id} not found")))
    }

    async fn relationships_of(
        &self,
        project: &ProjectId,
        id: &IssueId,
    ) -> Result<Vec<IssueId>, ClassifiedError> {
        let issue = self.get_issue(project, id).await?;
        Ok(issue.dependency_ids().cloned().collect())
    }
}

/// An [`EventEmitter`] backed by one broadcast channel per scoped
/// channel key, matching production fan-out semantics closely enough
/// for engine tests.
pub struct FakeEventEmitter {
    channels: Mutex<HashMap<String, broadcast::Sender<Value>>>,
    capacity: usize,
}

impl FakeEventEmitter {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
            capacity: 256,
        }
    }

    fn sender_for(&self, key: &str) -> broadcast::Sender<Value> {
        let mut channels = self.channels.lock();
        channels
            .entry(key.to_string())
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .clone()
    }
}

impl Default for FakeEventEmitter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EventEmitter for FakeEventEmitter {
    async fn subscribe(&self, project: &ProjectId, channel: &str) -> EventReceiver {
        let key = crate::project::scoped_name(project, channel);
        self.sender_for(&key).subscribe()
    }

    fn publish(&self, project: &ProjectId, channel: &str, message: Value) {
        let key = crate::project::scoped_name(project, channel);
        // No subscribers is not an error: the bus is fire-and-forget.
        let _ = self.sender_for(&key).send(message);
    }
}

#[cfg(test)]
#[path = "test_support_tests.rs"]
mod tests;
