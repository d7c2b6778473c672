// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::sync::Arc;

use loom_core::config::EngineConfig;
use loom_core::interfaces::EntityStore;
use loom_core::test_support::FakeEntityStore;

use super::*;
use crate::event_bus::Bus;

fn entities() -> Arc<dyn EntityStore> {
    Arc::new(FakeEntityStore::new())
}

#[tokio::test]
async fn open_registers_a_project_handle() {
    let state_dir = tempfile::tempdir().expect("tempdir");
    let repo = tempfile::tempdir().expect("tempdir");
    let registry = ProjectRegistry::new(state_dir.path(), Arc::new(Bus::new()));
    let project = project_id_for(repo.path());

    let handle = registry.open(repo.path(), project.clone(), entities(), EngineConfig::default()).await.expect("open succeeds");
    assert_eq!(handle.project, project);
    assert!(registry.get(&project).is_some());
}

#[tokio::test]
async fn opening_the_same_project_twice_is_rejected() {
    let state_dir = tempfile::tempdir().expect("tempdir");
    let repo = tempfile::tempdir().expect("tempdir");
    let registry = ProjectRegistry::new(state_dir.path(), Arc::new(Bus::new()));
    let project = project_id_for(repo.path());

    registry.open(repo.path(), project.clone(), entities(), EngineConfig::default()).await.expect("first open succeeds");
    let err = registry.open(repo.path(), project.clone(), entities(), EngineConfig::default()).await.expect_err("second open is rejected");
    assert!(matches!(err, DaemonError::AlreadyOpen(_)));
}

#[tokio::test]
async fn shutdown_removes_the_project_from_the_registry() {
    let state_dir = tempfile::tempdir().expect("tempdir");
    let repo = tempfile::tempdir().expect("tempdir");
    let registry = ProjectRegistry::new(state_dir.path(), Arc::new(Bus::new()));
    let project = project_id_for(repo.path());

    registry.open(repo.path(), project.clone(), entities(), EngineConfig::default()).await.expect("open succeeds");
    registry.shutdown(&project).await.expect("shutdown succeeds");
    assert!(registry.get(&project).is_none());
}

#[tokio::test]
async fn shutting_down_an_unknown_project_is_an_error() {
    let state_dir = tempfile::tempdir().expect("tempdir");
    let registry = ProjectRegistry::new(state_dir.path(), Arc::new(Bus::new()));
    let err = registry.shutdown(&loom_core::project::ProjectId::new("nope")).await.expect_err("not open");
    assert!(matches!(err, DaemonError::NotOpen(_)));
}
