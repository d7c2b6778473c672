// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use loom_core::project::ProjectId;
use serde_json::json;

use super::*;

#[tokio::test]
async fn a_published_message_reaches_a_subscriber_on_the_same_channel() {
    let bus = Bus::new();
    let project = ProjectId::new("p-1");
    let mut receiver = bus.subscribe(&project, "workflow:w-1").await;

    bus.publish(&project, "workflow:w-1", json!({"kind": "step_terminal"}));

    let message = receiver.recv().await.expect("message delivered");
    assert_eq!(message["kind"], "step_terminal");
}

#[tokio::test]
async fn channels_are_isolated_by_project_and_by_name() {
    let bus = Bus::new();
    let project_a = ProjectId::new("p-a");
    let project_b = ProjectId::new("p-b");

    let mut a = bus.subscribe(&project_a, "workflow:w-1").await;
    let mut other_channel = bus.subscribe(&project_a, "workflow:w-2").await;
    let mut b = bus.subscribe(&project_b, "workflow:w-1").await;

    bus.publish(&project_a, "workflow:w-1", json!({"n": 1}));

    assert_eq!(a.recv().await.expect("delivered")["n"], 1);
    assert!(other_channel.try_recv().is_err());
    assert!(b.try_recv().is_err());
}

#[tokio::test]
async fn publishing_with_no_subscribers_is_not_an_error() {
    let bus = Bus::new();
    let project = ProjectId::new("p-1");
    bus.publish(&project, "workflow:w-1", json!({"n": 1}));
}

#[tokio::test]
async fn prune_idle_drops_channels_with_no_subscribers() {
    let bus = Bus::new();
    let project = ProjectId::new("p-1");
    {
        let _receiver = bus.subscribe(&project, "workflow:w-1").await;
        assert_eq!(bus.channels.lock().len(), 1);
    }
    bus.prune_idle();
    assert_eq!(bus.channels.lock().len(), 0);
}
