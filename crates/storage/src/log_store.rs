// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Append-only per-execution log persistence.
//!
//! Each execution owns two JSONL files under `<root>/<execution_id>/`:
//! `raw.jsonl` holds the verbatim coalesced payload as it was emitted
//! (for byte-for-byte replay) and `entries.jsonl` holds the same
//! payload wrapped in an indexed, timestamped [`ExecutionLogEntry`] (for
//! paginated UI reads). Writes are single-producer per execution;
//! appends are fsync'd before `append()` returns so a crash never loses
//! an acknowledged entry, and a partially written tail line is detected
//! and skipped on reopen rather than corrupting the whole log.
//!
//! Grounded on the teacher's `wal.rs` incremental-scan/corruption
//! handling, narrowed from one process-wide write-ahead log to many
//! small per-execution logs with no snapshot/replay-to-materialize step
//! (there is no whole-state snapshot here — each execution's log is the
//! state).

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use loom_core::execution::ExecutionId;
use loom_core::execution_log::{ExecutionLogEntry, LogPayload};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum LogStoreError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One execution's open log files plus the next index to assign.
struct ExecutionLog {
    raw: File,
    entries: File,
    next_index: u64,
}

/// Crash-safe, append-only storage for normalized execution trajectories.
pub struct LogStore {
    root: PathBuf,
    open: HashMap<ExecutionId, ExecutionLog>,
}

impl LogStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into(), open: HashMap::new() }
    }

    fn dir_for(&self, execution_id: &ExecutionId) -> PathBuf {
        self.root.join(execution_id.as_str())
    }

    /// Open (or create) the log for `execution_id`, recovering the next
    /// index by scanning for a complete tail.
    fn ensure_open(&mut self, execution_id: &ExecutionId) -> Result<&mut ExecutionLog, LogStoreError> {
        match self.open.entry(execution_id.clone()) {
            std::collections::hash_map::Entry::Occupied(entry) => Ok(entry.into_mut()),
            std::collections::hash_map::Entry::Vacant(entry) => {
                let dir = self.root.join(execution_id.as_str());
                fs::create_dir_all(&dir)?;
                let raw_path = dir.join("raw.jsonl");
                let entries_path = dir.join("entries.jsonl");

                let next_index = recover_entries_tail(&entries_path)?;
                recover_raw_tail(&raw_path)?;

                let raw = OpenOptions::new().create(true).append(true).open(&raw_path)?;
                let entries = OpenOptions::new().create(true).append(true).open(&entries_path)?;
                Ok(entry.insert(ExecutionLog { raw, entries, next_index }))
            }
        }
    }

    /// Append a coalesced payload, assigning the next index for this
    /// execution. Returns the [`ExecutionLogEntry`] that was persisted.
    pub fn append(
        &mut self,
        execution_id: &ExecutionId,
        payload: LogPayload,
        timestamp: i64,
    ) -> Result<ExecutionLogEntry, LogStoreError> {
        let log = self.ensure_open(execution_id)?;
        let index = log.next_index;

        let mut raw_line = serde_json::to_vec(&payload)?;
        raw_line.push(b'\n');
        log.raw.write_all(&raw_line)?;
        log.raw.sync_all()?;

        let entry = ExecutionLogEntry::new(execution_id.clone(), index, timestamp, payload);
        let mut entry_line = serde_json::to_vec(&entry)?;
        entry_line.push(b'\n');
        log.entries.write_all(&entry_line)?;
        log.entries.sync_all()?;

        log.next_index += 1;
        Ok(entry)
    }

    /// Read up to `limit` entries for `execution_id` starting at
    /// `from_index`, in index order.
    pub fn read(
        &self,
        execution_id: &ExecutionId,
        from_index: u64,
        limit: usize,
    ) -> Result<Vec<ExecutionLogEntry>, LogStoreError> {
        let path = self.dir_for(execution_id).join("entries.jsonl");
        if !path.exists() {
            return Ok(Vec::new());
        }

        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut out = Vec::new();

        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let entry: ExecutionLogEntry = match serde_json::from_str(trimmed) {
                Ok(e) => e,
                Err(_) => break,
            };
            if entry.index < from_index {
                continue;
            }
            out.push(entry);
            if out.len() >= limit {
                break;
            }
        }

        Ok(out)
    }

    /// Total number of entries persisted for `execution_id`.
    pub fn len(&mut self, execution_id: &ExecutionId) -> Result<u64, LogStoreError> {
        Ok(self.ensure_open(execution_id)?.next_index)
    }

    /// Remove whole execution logs whose most recent entry is older
    /// than `cutoff_ms` (epoch milliseconds). Returns the removed ids.
    pub fn purge_executions_older_than(&mut self, cutoff_ms: i64) -> Result<Vec<ExecutionId>, LogStoreError> {
        let mut removed = Vec::new();
        if !self.root.exists() {
            return Ok(removed);
        }

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let execution_id = ExecutionId::from(entry.file_name().to_string_lossy().into_owned());
            let last = self.last_timestamp(&execution_id)?;
            if last.is_some_and(|ts| ts < cutoff_ms) {
                self.open.remove(&execution_id);
                fs::remove_dir_all(entry.path())?;
                removed.push(execution_id);
            }
        }

        Ok(removed)
    }

    fn last_timestamp(&self, execution_id: &ExecutionId) -> Result<Option<i64>, LogStoreError> {
        let path = self.dir_for(execution_id).join("entries.jsonl");
        if !path.exists() {
            return Ok(None);
        }
        let file = File::open(&path)?;
        let reader = BufReader::new(file);
        let mut last = None;
        for line in reader.lines() {
            let line = line?;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            if let Ok(entry) = serde_json::from_str::<ExecutionLogEntry>(trimmed) {
                last = Some(entry.timestamp);
            }
        }
        Ok(last)
    }
}

/// Scan `entries.jsonl`, truncating a trailing partially-written or
/// corrupt line so the file always ends on a complete record. Returns
/// the index to assign to the next entry (one past the highest
/// complete `ExecutionLogEntry.index` found, or 0 for a fresh/empty
/// file).
fn recover_entries_tail(path: &Path) -> Result<u64, LogStoreError> {
    let mut next_index = 0u64;
    truncate_to_valid_tail(path, |trimmed| {
        serde_json::from_str::<ExecutionLogEntry>(trimmed)
            .map(|entry| next_index = entry.index + 1)
            .is_ok()
    })?;
    Ok(next_index)
}

/// Scan `raw.jsonl`, truncating a trailing partially-written or corrupt
/// line. Raw lines carry no index, so recovery only needs to restore a
/// clean byte boundary.
fn recover_raw_tail(path: &Path) -> Result<(), LogStoreError> {
    truncate_to_valid_tail(path, |trimmed| serde_json::from_str::<LogPayload>(trimmed).is_ok())
}

/// Walks `path` line by line while `is_valid` accepts each non-blank
/// line, then truncates the file to drop anything after the first
/// rejected (or incomplete) line.
fn truncate_to_valid_tail(path: &Path, mut is_valid: impl FnMut(&str) -> bool) -> Result<(), LogStoreError> {
    if !path.exists() {
        return Ok(());
    }

    let file = File::open(path)?;
    let reader = BufReader::new(&file);

    let mut valid_len: u64 = 0;

    for line in reader.lines() {
        let line = match line {
            Ok(l) => l,
            Err(_) => break,
        };
        let trimmed = line.trim();
        if trimmed.is_empty() {
            valid_len += line.len() as u64 + 1;
            continue;
        }
        if is_valid(trimmed) {
            valid_len += line.len() as u64 + 1;
        } else {
            break;
        }
    }

    let actual_len = fs::metadata(path)?.len();
    if valid_len < actual_len {
        warn!(
            path = %path.display(),
            valid_bytes = valid_len,
            actual_bytes = actual_len,
            "truncating partially written log tail",
        );
        let file = OpenOptions::new().write(true).open(path)?;
        file.set_len(valid_len)?;
        file.sync_all()?;
    }

    Ok(())
}

#[cfg(test)]
#[path = "log_store_tests.rs"]
mod tests;
