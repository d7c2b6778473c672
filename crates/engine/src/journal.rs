// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable persistence of [`EngineState`] across process restarts.
//!
//! Grounded on the teacher's `storage::Checkpointer` (write to a temp
//! file, fsync, atomically rename over the target, fsync the
//! directory) narrowed from a WAL-replay checkpoint to a single
//! snapshot: this workspace's `EngineState` is small enough, and
//! mutated rarely enough relative to per-entry log traffic (which
//! already goes through [`loom_storage::LogStore`] instead), that a
//! whole-state JSON snapshot on every structural change is simpler than
//! append-only WAL replay and still meets §4.7.3's "recovery is a
//! single scan" requirement.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::state::EngineState;

#[derive(Debug, Error)]
pub enum JournalError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Snapshots one project's [`EngineState`] to a single file, replacing
/// it atomically so a crash mid-write never leaves a torn snapshot
/// behind for the next startup to load.
pub struct Journal {
    path: PathBuf,
}

impl Journal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Loads the last snapshot, or an empty state if none was ever
    /// written (first run for this project).
    pub fn load(&self) -> Result<EngineState, JournalError> {
        match std::fs::read(&self.path) {
            Ok(bytes) => Ok(serde_json::from_slice(&bytes)?),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(EngineState::new()),
            Err(e) => Err(e.into()),
        }
    }

    /// Writes `state` to a temp file in the same directory, fsyncs it,
    /// then renames it over the snapshot path. The rename is atomic on
    /// the same filesystem, so a reader never observes a half-written
    /// file.
    pub fn save(&self, state: &EngineState) -> Result<(), JournalError> {
        let parent = self.path.parent().unwrap_or_else(|| Path::new("."));
        std::fs::create_dir_all(parent)?;
        let tmp_path = parent.join(format!(".{}.tmp", file_name(&self.path)));

        let bytes = serde_json::to_vec(state)?;
        {
            let mut file = File::create(&tmp_path)?;
            use std::io::Write;
            file.write_all(&bytes)?;
            file.sync_all()?;
        }
        std::fs::rename(&tmp_path, &self.path)?;
        if let Ok(dir) = File::open(parent) {
            let _ = dir.sync_all();
        }
        Ok(())
    }
}

fn file_name(path: &Path) -> String {
    path.file_name().and_then(|n| n.to_str()).unwrap_or("journal").to_string()
}

#[cfg(test)]
#[path = "journal_tests.rs"]
mod tests;
