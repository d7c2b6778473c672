// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("could not determine a state directory (set LOOM_STATE_DIR)")]
    NoStateDir,

    #[error("failed to create state directory {0}: {1}")]
    StateDirCreate(PathBuf, #[source] std::io::Error),

    #[error("project {0} is already open")]
    AlreadyOpen(String),

    #[error("project {0} is not open")]
    NotOpen(String),

    #[error("engine error: {0}")]
    Engine(#[from] loom_engine::EngineError),

    #[error("journal error: {0}")]
    Journal(#[from] loom_engine::JournalError),
}
