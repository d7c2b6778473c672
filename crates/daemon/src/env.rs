// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Centralized environment variable access for the daemon crate.

use std::path::PathBuf;

/// Resolve state directory: `LOOM_STATE_DIR` > `XDG_STATE_HOME/loom` > `~/.local/state/loom`.
pub fn state_dir() -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("LOOM_STATE_DIR") {
        return Some(PathBuf::from(dir));
    }
    if let Ok(xdg) = std::env::var("XDG_STATE_HOME") {
        return Some(PathBuf::from(xdg).join("loom"));
    }
    let home = std::env::var("HOME").ok()?;
    Some(PathBuf::from(home).join(".local/state/loom"))
}
