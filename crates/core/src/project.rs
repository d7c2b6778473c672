// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Project identity and scoped-name helpers.
//!
//! A [`ProjectId`] scopes every entity, worktree, and bus channel to one
//! open project so C9 can host several repositories in a single process
//! without cross-contamination (invariant 9).

use crate::define_id;

define_id! {
    /// Identifies one open project (normally derived from the repository
    /// root's basename, optionally overridden by project configuration).
    pub struct ProjectId;
}

impl ProjectId {
    /// Derives a default project id from a repository root path, taking
    /// the final path component. Falls back to `"default"` for a root
    /// path with no nameable component (e.g. `/`).
    pub fn from_repo_path(repo_path: &std::path::Path) -> Self {
        let name = repo_path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or("default");
        Self::new(name)
    }
}

/// Joins a project id and a local name into one scoped string, used for
/// bus channel keys and on-disk directory names.
pub fn scoped_name(project: &ProjectId, local: &str) -> String {
    format!("{}/{}", project.as_str(), local)
}

/// Splits a scoped name produced by [`scoped_name`] back into its parts.
/// Returns `None` if the string does not contain a `/` separator.
pub fn split_scoped_name(scoped: &str) -> Option<(ProjectId, &str)> {
    let (project, local) = scoped.split_once('/')?;
    Some((ProjectId::new(project), local))
}

#[cfg(test)]
#[path = "project_tests.rs"]
mod tests;
