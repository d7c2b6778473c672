// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Transport / Fan-out Bus (C5).
//!
//! Grounded on the teacher's `event_bus::EventBus` — here narrowed from
//! a single process-wide durable channel to one `tokio::sync::broadcast`
//! channel per `(project_id, channel)` key, since this workspace's
//! engine already persists the entries that matter (`LogStore`,
//! `EngineState`) and the bus exists purely to fan a live entry out to
//! whoever is subscribed at the moment it is published (§4.5). A slow
//! subscriber is dropped rather than backpressuring the publisher —
//! `broadcast::Receiver::recv` surfaces this as `Lagged` on its own.

use std::collections::HashMap;

use async_trait::async_trait;
use loom_core::interfaces::{EventEmitter, EventReceiver};
use loom_core::project::{scoped_name, ProjectId};
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast;

/// Per-channel buffer depth. A subscriber that falls this far behind the
/// publisher loses the oldest unread messages rather than stalling it.
const CHANNEL_CAPACITY: usize = 256;

/// Fan-out bus shared by every project opened in this process. Cheap to
/// clone (an `Arc` around a lockable channel map).
#[derive(Default)]
pub struct Bus {
    channels: Mutex<HashMap<String, broadcast::Sender<Value>>>,
}

impl Bus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, key: &str) -> broadcast::Sender<Value> {
        let mut channels = self.channels.lock();
        channels.entry(key.to_string()).or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0).clone()
    }

    /// Drops channels with no subscribers and nothing buffered, so a
    /// long-lived daemon does not accumulate one entry per execution or
    /// workflow that has long since gone terminal.
    pub fn prune_idle(&self) {
        self.channels.lock().retain(|_, sender| sender.receiver_count() > 0);
    }
}

#[async_trait]
impl EventEmitter for Bus {
    async fn subscribe(&self, project: &ProjectId, channel: &str) -> EventReceiver {
        let key = scoped_name(project, channel);
        self.sender_for(&key).subscribe()
    }

    fn publish(&self, project: &ProjectId, channel: &str, message: Value) {
        let key = scoped_name(project, channel);
        // No subscribers is not an error: the bus is fire-and-forget.
        let _ = self.sender_for(&key).send(message);
    }
}

#[cfg(test)]
#[path = "event_bus_tests.rs"]
mod tests;
