// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! `loomd` — a thin supervisor process.
//!
//! Owns the process-wide fan-out bus (C5) and the project registry
//! (C9) for as long as it runs. Opening and closing individual
//! projects, and everything an embedding frontend would drive that
//! through (a command protocol, an entity store), is out of scope here
//! — those are the caller's concern per §6; this binary only keeps the
//! shared machinery alive and shuts it down cleanly on signal.

use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fs2::FileExt;
use loom_daemon::{Bus, ProjectRegistry};
use tokio::signal::unix::{signal, SignalKind};
use tracing::info;

const SHUTDOWN_DEADLINE: Duration = Duration::from_secs(10);

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    if let Some(arg) = std::env::args().nth(1) {
        match arg.as_str() {
            "--version" | "-V" | "-v" => {
                println!("loomd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" | "help" => {
                println!("loomd {}", env!("CARGO_PKG_VERSION"));
                println!("Supervises the fan-out bus and project registry for the agent");
                println!("execution and workflow orchestration engine.");
                println!();
                println!("USAGE:\n    loomd");
                return Ok(());
            }
            _ => {
                eprintln!("error: unexpected argument '{arg}'");
                eprintln!("Usage: loomd [--help | --version]");
                std::process::exit(1);
            }
        }
    }

    let state_dir = loom_daemon::env::state_dir().ok_or("could not determine a state directory")?;
    std::fs::create_dir_all(&state_dir)?;

    let lock_path = state_dir.join("loomd.pid");
    let lock_file = acquire_lock(&lock_path)?;

    let _log_guard = setup_logging(&state_dir)?;
    info!(state_dir = %state_dir.display(), "loomd starting");

    let bus = Arc::new(Bus::new());
    let registry = ProjectRegistry::new(state_dir.clone(), bus.clone());

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    println!("READY");
    info!("loomd ready");

    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM, shutting down"),
        _ = sigint.recv() => info!("received SIGINT, shutting down"),
    }

    registry.shutdown_all(SHUTDOWN_DEADLINE).await;
    drop(lock_file);
    let _ = std::fs::remove_file(&lock_path);
    info!("loomd stopped");
    Ok(())
}

/// Exclusive lock preventing a second supervisor from starting against
/// the same state directory. Released automatically when `lock_file`
/// drops at the end of `main`.
fn acquire_lock(lock_path: &PathBuf) -> Result<File, Box<dyn std::error::Error>> {
    let mut file = std::fs::OpenOptions::new().write(true).create(true).truncate(false).open(lock_path)?;
    file.try_lock_exclusive().map_err(|e| format!("loomd is already running (failed to lock {}: {e})", lock_path.display()))?;
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(file)
}

fn setup_logging(state_dir: &std::path::Path) -> Result<tracing_appender::non_blocking::WorkerGuard, Box<dyn std::error::Error>> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let file_appender = tracing_appender::rolling::never(state_dir, "loomd.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry().with(filter).with(fmt::layer().with_writer(non_blocking)).init();

    Ok(guard)
}
