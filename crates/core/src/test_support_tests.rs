// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::issue::{IssueStatus, Priority};

fn sample_issue(id: &str) -> Issue {
    Issue {
        id: IssueId::new(id),
        title: "t".into(),
        content: "c".into(),
        status: IssueStatus::Open,
        priority: Priority::Medium,
        relationships: vec![],
        created_at: 0,
        updated_at: 0,
    }
}

#[tokio::test]
async fn fake_entity_store_round_trips_issue() {
    let store = FakeEntityStore::new();
    store.insert_issue(sample_issue("i-1"));
    let project = ProjectId::new("acme");
    let issue = store.get_issue(&project, &IssueId::new("i-1")).await.expect("found");
    assert_eq!(issue.id, IssueId::new("i-1"));
}

#[tokio::test]
async fn fake_entity_store_returns_not_found() {
    let store = FakeEntityStore::new();
    let project = ProjectId::new("acme");
    let err = store
        .get_issue(&project, &IssueId::new("missing"))
        .await
        .expect_err("should fail");
    assert_eq!(err.kind, ErrorKind::NotFound);
}

#[tokio::test]
async fn fake_event_emitter_delivers_to_subscriber() {
    let emitter = FakeEventEmitter::new();
    let project = ProjectId::new("acme");
    let mut rx = emitter.subscribe(&project, "execution:ex-1").await;
    emitter.publish(&project, "execution:ex-1", serde_json::json!({"hello": "world"}));
    let received = rx.recv().await.expect("message");
    assert_eq!(received, serde_json::json!({"hello": "world"}));
}

#[tokio::test]
async fn fake_event_emitter_scopes_channels_per_project() {
    let emitter = FakeEventEmitter::new();
    let acme = ProjectId::new("acme");
    let other = ProjectId::new("other");
    let mut acme_rx = emitter.subscribe(&acme, "execution:ex-1").await;
    let _other_rx = emitter.subscribe(&other, "execution:ex-1").await;
    emitter.publish(&other, "execution:ex-1", serde_json::json!("for-other"));
    // acme's subscriber must not see other's messages.
    let result = tokio::time::timeout(std::time::Duration::from_millis(50), acme_rx.recv()).await;
    assert!(result.is_err(), "acme subscriber should not receive other project's message");
}
