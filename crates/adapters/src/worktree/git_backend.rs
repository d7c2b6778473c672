// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! [`loom_core::interfaces::GitBackend`] implementation, wrapping
//! [`WorktreeManager`] plus the extra read-side git2 plumbing (`rev_parse_head`,
//! `diff_names`, branch listing) that the Execution Engine needs for
//! `after_commit`/`files_changed` bookkeeping. `git2` is synchronous, so
//! every call is dispatched through `spawn_blocking`.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use loom_core::error::{ClassifiedError, ErrorKind};
use loom_core::interfaces::GitBackend;

use super::{CreateWorktreeRequest, WorktreeManager};

/// Production [`GitBackend`], backed by `git2` and [`WorktreeManager`].
#[derive(Clone, Default)]
pub struct Git2Backend {
    manager: WorktreeManager,
}

impl Git2Backend {
    pub fn new() -> Self {
        Self { manager: WorktreeManager::new() }
    }
}

fn join_err(e: tokio::task::JoinError) -> ClassifiedError {
    ClassifiedError::new(ErrorKind::Fatal, format!("blocking git task panicked: {e}"))
}

#[async_trait]
impl GitBackend for Git2Backend {
    async fn create_worktree(
        &self,
        repo_path: &str,
        worktree_path: &str,
        branch_name: &str,
        base_branch: &str,
        create_branch: bool,
        sparse_checkout_patterns: &[String],
    ) -> Result<(), ClassifiedError> {
        let manager = self.manager.clone();
        let repo_path = PathBuf::from(repo_path);
        let worktree_path = PathBuf::from(worktree_path);
        let branch_name = branch_name.to_string();
        let base_branch = base_branch.to_string();
        let sparse_patterns = sparse_checkout_patterns.to_vec();
        tokio::task::spawn_blocking(move || {
            manager.create(CreateWorktreeRequest {
                repo_path: &repo_path,
                branch_name: &branch_name,
                worktree_path: &worktree_path,
                base_branch: &base_branch,
                create_branch,
                sparse_patterns: if sparse_patterns.is_empty() { None } else { Some(&sparse_patterns) },
            })
        })
        .await
        .map_err(join_err)??;
        Ok(())
    }

    async fn remove_worktree(
        &self,
        repo_path: &str,
        worktree_path: &str,
        delete_branch: bool,
    ) -> Result<(), ClassifiedError> {
        let manager = self.manager.clone();
        let repo_path = PathBuf::from(repo_path);
        let worktree_path = PathBuf::from(worktree_path);
        tokio::task::spawn_blocking(move || manager.remove(&repo_path, &worktree_path, None, delete_branch))
            .await
            .map_err(join_err)?
    }

    async fn list_worktrees(&self, repo_path: &str) -> Result<Vec<String>, ClassifiedError> {
        let manager = self.manager.clone();
        let repo_path = PathBuf::from(repo_path);
        tokio::task::spawn_blocking(move || manager.list(&repo_path))
            .await
            .map_err(join_err)?
    }

    async fn rev_parse_head(&self, dir: &str) -> Result<String, ClassifiedError> {
        let dir = PathBuf::from(dir);
        tokio::task::spawn_blocking(move || rev_parse_head_blocking(&dir))
            .await
            .map_err(join_err)?
    }

    async fn diff_names(
        &self,
        dir: &str,
        base_ref: &str,
        head_ref: &str,
    ) -> Result<Vec<String>, ClassifiedError> {
        let dir = PathBuf::from(dir);
        let base_ref = base_ref.to_string();
        let head_ref = head_ref.to_string();
        tokio::task::spawn_blocking(move || diff_names_blocking(&dir, &base_ref, &head_ref))
            .await
            .map_err(join_err)?
    }

    async fn branch_exists(&self, repo_path: &str, branch: &str) -> Result<bool, ClassifiedError> {
        let repo_path = PathBuf::from(repo_path);
        let branch = branch.to_string();
        tokio::task::spawn_blocking(move || {
            let repo = open_repo(&repo_path)?;
            let result = match repo.find_branch(&branch, git2::BranchType::Local) {
                Ok(_) => Ok(true),
                Err(e) if e.code() == git2::ErrorCode::NotFound => Ok(false),
                Err(e) => Err(ClassifiedError::new(ErrorKind::Fatal, e.to_string())),
            };
            result
        })
        .await
        .map_err(join_err)?
    }

    async fn create_branch(
        &self,
        repo_path: &str,
        branch: &str,
        base: &str,
    ) -> Result<(), ClassifiedError> {
        let repo_path = PathBuf::from(repo_path);
        let branch = branch.to_string();
        let base = base.to_string();
        tokio::task::spawn_blocking(move || {
            let repo = open_repo(&repo_path)?;
            let base_branch = repo
                .find_branch(&base, git2::BranchType::Local)
                .map_err(|e| ClassifiedError::new(ErrorKind::TargetBranchMissing, e.to_string()))?;
            let commit = base_branch
                .get()
                .peel_to_commit()
                .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
            repo.branch(&branch, &commit, false)
                .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
            Ok(())
        })
        .await
        .map_err(join_err)?
    }

    async fn delete_branch(&self, repo_path: &str, branch: &str) -> Result<(), ClassifiedError> {
        let repo_path = PathBuf::from(repo_path);
        let branch = branch.to_string();
        tokio::task::spawn_blocking(move || {
            let repo = open_repo(&repo_path)?;
            let mut b = repo
                .find_branch(&branch, git2::BranchType::Local)
                .map_err(|e| ClassifiedError::new(ErrorKind::NotFound, e.to_string()))?;
            b.delete().map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))
        })
        .await
        .map_err(join_err)?
    }

    async fn list_branches(&self, repo_path: &str) -> Result<Vec<String>, ClassifiedError> {
        let repo_path = PathBuf::from(repo_path);
        tokio::task::spawn_blocking(move || {
            let repo = open_repo(&repo_path)?;
            let branches = repo
                .branches(Some(git2::BranchType::Local))
                .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
            let mut names = Vec::new();
            for branch in branches {
                let (branch, _) = branch.map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
                if let Some(name) = branch.name().map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))? {
                    names.push(name.to_string());
                }
            }
            Ok(names)
        })
        .await
        .map_err(join_err)?
    }
}

fn open_repo(path: &Path) -> Result<git2::Repository, ClassifiedError> {
    git2::Repository::open(path).map_err(|e| ClassifiedError::new(ErrorKind::Fatal, format!("open repo: {e}")))
}

fn rev_parse_head_blocking(dir: &Path) -> Result<String, ClassifiedError> {
    let repo = open_repo(dir)?;
    let head = repo.head().map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
    let commit = head.peel_to_commit().map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
    Ok(commit.id().to_string())
}

fn diff_names_blocking(dir: &Path, base_ref: &str, head_ref: &str) -> Result<Vec<String>, ClassifiedError> {
    let repo = open_repo(dir)?;
    let base_tree = resolve_tree(&repo, base_ref)?;
    let head_tree = resolve_tree(&repo, head_ref)?;
    let diff = repo
        .diff_tree_to_tree(Some(&base_tree), Some(&head_tree), None)
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
    let mut names = Vec::new();
    diff.foreach(
        &mut |delta, _| {
            if let Some(path) = delta.new_file().path().or_else(|| delta.old_file().path()) {
                names.push(path.to_string_lossy().to_string());
            }
            true
        },
        None,
        None,
        None,
    )
    .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))?;
    Ok(names)
}

fn resolve_tree<'r>(repo: &'r git2::Repository, rev: &str) -> Result<git2::Tree<'r>, ClassifiedError> {
    let object = repo
        .revparse_single(rev)
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, format!("revparse '{rev}': {e}")))?;
    object
        .peel_to_tree()
        .map_err(|e| ClassifiedError::new(ErrorKind::Fatal, e.to_string()))
}

#[cfg(test)]
#[path = "git_backend_tests.rs"]
mod tests;
