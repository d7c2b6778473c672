// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

fn simple_config(cmd: &str, args: &[&str]) -> AcquireConfig {
    AcquireConfig {
        cmd: cmd.into(),
        args: args.iter().map(|s| s.to_string()).collect(),
        env: vec![],
        cwd: "/tmp".into(),
        interactive: false,
        idle_timeout: None,
        hard_timeout: None,
        terminal_cols: 80,
        terminal_rows: 24,
    }
}

#[tokio::test]
async fn acquire_spawns_simple_process() {
    let manager = ProcessManager::new();
    let acquired = manager
        .acquire(simple_config("sh", &["-c", "sleep 1"]))
        .await
        .expect("acquire");
    assert!(acquired.handle.pid() > 0);
    manager.terminate(&acquired.handle).await.expect("terminate");
}

#[tokio::test]
async fn acquire_spawns_pty_process_when_interactive() {
    let manager = ProcessManager::new();
    let mut config = simple_config("sh", &["-c", "sleep 1"]);
    config.interactive = true;
    let acquired = manager.acquire(config).await.expect("acquire");
    assert!(acquired.handle.pid() > 0);
    manager.terminate(&acquired.handle).await.expect("terminate");
}

#[tokio::test]
async fn activity_tracker_detects_hard_timeout() {
    let tracker = ActivityTracker::new(None, Some(Duration::from_millis(1)));
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(tracker.check_timeout().await, Some(TimeoutKind::Hard));
}

#[tokio::test]
async fn activity_tracker_detects_idle_timeout_after_touch_gap() {
    let tracker = ActivityTracker::new(Some(Duration::from_millis(1)), None);
    tokio::time::sleep(Duration::from_millis(20)).await;
    assert_eq!(tracker.check_timeout().await, Some(TimeoutKind::Idle));
}

#[tokio::test]
async fn activity_tracker_touch_resets_idle_window() {
    let tracker = ActivityTracker::new(Some(Duration::from_millis(50)), None);
    tokio::time::sleep(Duration::from_millis(20)).await;
    tracker.touch().await;
    assert_eq!(tracker.check_timeout().await, None);
}
