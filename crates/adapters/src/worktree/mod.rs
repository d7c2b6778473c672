// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Worktree Manager (C2): create/destroy git worktrees and branches,
//! sparse checkout, validity checks. Grounded on the teacher's
//! workspace-preparation helpers, generalized from "create a plain
//! directory" to real `git worktree add`/`git worktree remove` via the
//! `git2` crate — pulled into this workspace from the `iepathos-prodigy`
//! example, which leans on `git2` for the same kind of repository
//! plumbing.

pub mod git_backend;

use std::path::{Path, PathBuf};

use loom_core::error::{ClassifiedError, ErrorKind};

pub use git_backend::Git2Backend;

/// Inputs to [`WorktreeManager::create`], per §4.2.
pub struct CreateWorktreeRequest<'a> {
    pub repo_path: &'a Path,
    pub branch_name: &'a str,
    pub worktree_path: &'a Path,
    pub base_branch: &'a str,
    pub create_branch: bool,
    pub sparse_patterns: Option<&'a [String]>,
}

/// Result of a successful [`WorktreeManager::create`] call.
#[derive(Debug)]
pub struct CreatedWorktree {
    pub worktree_path: PathBuf,
    pub branch_name: String,
}

/// Git worktree and branch lifecycle, backed by `git2`.
#[derive(Clone, Default)]
pub struct WorktreeManager;

impl WorktreeManager {
    pub fn new() -> Self {
        Self
    }

    /// Creates the worktree atomically with respect to the repository:
    /// on any failure after partial state has been created (branch
    /// registered, worktree directory present), that partial state is
    /// rolled back before returning the error.
    pub fn create(&self, req: CreateWorktreeRequest<'_>) -> Result<CreatedWorktree, ClassifiedError> {
        let repo = open_repo(req.repo_path)?;

        if !req.create_branch && !branch_exists(&repo, req.branch_name)? {
            return Err(ClassifiedError::new(
                ErrorKind::BranchNotFound,
                format!("branch '{}' does not exist and createBranch is false", req.branch_name),
            ));
        }
        if !branch_exists(&repo, req.base_branch)? {
            return Err(ClassifiedError::new(
                ErrorKind::TargetBranchMissing,
                format!("base branch '{}' does not exist", req.base_branch),
            ));
        }

        let branch_name = self.resolve_branch_collision(&repo, req.branch_name)?;

        let mut branch_created = false;
        if req.create_branch && !branch_exists(&repo, &branch_name)? {
            create_branch_from(&repo, &branch_name, req.base_branch)?;
            branch_created = true;
        }

        let worktree_result = add_worktree(&repo, &branch_name, req.worktree_path);
        if let Err(err) = worktree_result {
            if branch_created {
                let _ = delete_branch(&repo, &branch_name);
            }
            return Err(err);
        }

        if let Some(patterns) = req.sparse_patterns {
            if let Err(err) = apply_sparse_checkout(req.worktree_path, patterns) {
                let _ = remove_worktree_dir(&repo, req.worktree_path);
                if branch_created {
                    let _ = delete_branch(&repo, &branch_name);
                }
                return Err(err);
            }
        }

        Ok(CreatedWorktree {
            worktree_path: req.worktree_path.to_path_buf(),
            branch_name,
        })
    }

    /// On a branch-name collision, appends a numeric suffix rather than
    /// clobbering, per §4.2.
    fn resolve_branch_collision(&self, repo: &git2::Repository, desired: &str) -> Result<String, ClassifiedError> {
        if !branch_exists(repo, desired)? {
            return Ok(desired.to_string());
        }
        for suffix in 2..1000 {
            let candidate = format!("{desired}-{suffix}");
            if !branch_exists(repo, &candidate)? {
                return Ok(candidate);
            }
        }
        Err(ClassifiedError::new(
            ErrorKind::Conflict,
            format!("could not find a free branch name for '{desired}'"),
        ))
    }

    /// Removes worktree registration and its directory; optionally
    /// deletes the branch. Idempotent on a missing directory.
    pub fn remove(
        &self,
        repo_path: &Path,
        worktree_path: &Path,
        branch_name: Option<&str>,
        should_delete_branch: bool,
    ) -> Result<(), ClassifiedError> {
        let repo = open_repo(repo_path)?;
        if worktree_path.exists() {
            remove_worktree_dir(&repo, worktree_path)?;
        }
        if should_delete_branch {
            if let Some(branch) = branch_name {
                let _ = delete_branch(&repo, branch);
            }
        }
        Ok(())
    }

    /// Returns true iff git still recognizes the worktree as registered
    /// and the directory exists.
    pub fn is_valid(&self, repo_path: &Path, worktree_path: &Path) -> Result<bool, ClassifiedError> {
        if !worktree_path.exists() {
            return Ok(false);
        }
        let names = self.list(repo_path)?;
        Ok(names.iter().any(|p| Path::new(p) == worktree_path))
    }

    /// Enumerates registered worktrees' absolute paths.
    pub fn list(&self, repo_path: &Path) -> Result<Vec<String>, ClassifiedError> {
        let repo = open_repo(repo_path)?;
        let names = repo
            .worktrees()
            .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
        let mut paths = Vec::new();
        for name in names.iter().flatten() {
            if let Ok(wt) = repo.find_worktree(name) {
                paths.push(wt.path().to_string_lossy().to_string());
            }
        }
        Ok(paths)
    }

    /// Removes any registered worktree whose path is not in
    /// `live_worktree_paths` and whose directory exists (or whose
    /// registration is stale).
    pub fn cleanup_orphans(
        &self,
        repo_path: &Path,
        live_worktree_paths: &[PathBuf],
    ) -> Result<Vec<String>, ClassifiedError> {
        let repo = open_repo(repo_path)?;
        let names = repo
            .worktrees()
            .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
        let mut removed = Vec::new();
        for name in names.iter().flatten() {
            let Ok(wt) = repo.find_worktree(name) else {
                continue;
            };
            let path = wt.path().to_path_buf();
            let is_live = live_worktree_paths.iter().any(|p| p == &path);
            let is_stale = wt.validate().is_err();
            if !is_live || is_stale {
                if path.exists() {
                    let _ = std::fs::remove_dir_all(&path);
                }
                wt.prune(Some(
                    git2::WorktreePruneOptions::new().valid(true).locked(true),
                ))
                .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
                removed.push(path.to_string_lossy().to_string());
            }
        }
        Ok(removed)
    }
}

fn open_repo(repo_path: &Path) -> Result<git2::Repository, ClassifiedError> {
    git2::Repository::open(repo_path)
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, format!("open repo: {e}")))
}

fn branch_exists(repo: &git2::Repository, name: &str) -> Result<bool, ClassifiedError> {
    match repo.find_branch(name, git2::BranchType::Local) {
        Ok(_) => Ok(true),
        Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
        Err(e) => Err(ClassifiedError::new(ErrorKind::Fatal, e.to_string())),
    }
}

fn create_branch_from(repo: &git2::Repository, name: &str, base: &str) -> Result<(), ClassifiedError> {
    let base_branch = repo
        .find_branch(base, git2::BranchType::Local)
        .map_err(|e| ClassifiedError::new(ErrorKind::TargetBranchMissing, e.to_string()))?;
    let commit = base_branch
        .get()
        .peel_to_commit()
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
    repo.branch(name, &commit, false)
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
    Ok(())
}

fn delete_branch(repo: &git2::Repository, name: &str) -> Result<(), ClassifiedError> {
    let mut branch = repo
        .find_branch(name, git2::BranchType::Local)
        .map_err(|e| ClassifiedError::new(ErrorKind::NotFound, e.to_string()))?;
    branch
        .delete()
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))
}

fn add_worktree(repo: &git2::Repository, branch_name: &str, worktree_path: &Path) -> Result<(), ClassifiedError> {
    let branch = repo
        .find_branch(branch_name, git2::BranchType::Local)
        .map_err(|e| ClassifiedError::new(ErrorKind::BranchNotFound, e.to_string()))?;
    let reference = branch.into_reference();
    let name = worktree_path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(branch_name);
    let mut opts = git2::WorktreeAddOptions::new();
    opts.reference(Some(&reference));
    repo.worktree(name, worktree_path, Some(&opts))
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
    Ok(())
}

fn remove_worktree_dir(repo: &git2::Repository, worktree_path: &Path) -> Result<(), ClassifiedError> {
    let names = repo
        .worktrees()
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
    for name in names.iter().flatten() {
        if let Ok(wt) = repo.find_worktree(name) {
            if wt.path() == worktree_path {
                if worktree_path.exists() {
                    std::fs::remove_dir_all(worktree_path)
                        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
                }
                wt.prune(Some(git2::WorktreePruneOptions::new().valid(true).locked(true)))
                    .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
                return Ok(());
            }
        }
    }
    // Idempotent: no registration found, nothing to do.
    Ok(())
}

/// Applies sparse-checkout patterns in cone mode (directories only),
/// per the Open Question decision recorded in DESIGN.md. Shells out to
/// `git sparse-checkout set --cone` rather than hand-writing the
/// pattern file: in a linked worktree `<worktree>/.git` is a gitlink
/// file, not a directory, so the per-worktree sparse config actually
/// lives under `$GIT_COMMON_DIR/worktrees/<name>/info/` — a location
/// only `git` itself resolves reliably. Running the real command also
/// updates the working tree to match, which a bare file write never
/// would.
fn apply_sparse_checkout(worktree_path: &Path, patterns: &[String]) -> Result<(), ClassifiedError> {
    let patterns: Vec<String> = patterns
        .iter()
        .map(|p| if p.ends_with('/') { p.clone() } else { format!("{p}/") })
        .collect();
    let output = std::process::Command::new("git")
        .arg("-C")
        .arg(worktree_path)
        .args(["sparse-checkout", "set", "--cone"])
        .args(&patterns)
        .output()
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, format!("spawn git sparse-checkout: {e}")))?;
    if !output.status.success() {
        return Err(ClassifiedError::new(
            ErrorKind::Fatal,
            format!("git sparse-checkout set failed: {}", String::from_utf8_lossy(&output.stderr)),
        ));
    }
    Ok(())
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
