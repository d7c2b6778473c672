// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Narrow project configuration recognized by the core (§6). Full
//! configuration *layout* — multi-file merge, schema migration — is out
//! of scope; this struct is handed a single resolved `toml` document by
//! whatever caller owns that layout, matching how the teacher's
//! `namespace::resolve_namespace` hands `core` an already-resolved
//! value.

use serde::{Deserialize, Serialize};

use crate::execution::AgentType;
use crate::workflow::{AutonomyLevel, OnFailure, Parallelism};

fn default_worktree_storage_path() -> String {
    ".loom/worktrees".to_string()
}

fn default_branch_prefix() -> String {
    "loom".to_string()
}

fn default_idle_timeout_ms() -> u64 {
    5 * 60 * 1000
}

fn default_hard_timeout_ms() -> u64 {
    60 * 60 * 1000
}

/// `executionMode` — stdio pipes vs a pseudo-terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionModeConfig {
    Structured,
    Interactive,
}

impl Default for ExecutionModeConfig {
    fn default() -> Self {
        ExecutionModeConfig::Structured
    }
}

/// `permissionMode` — whether permission prompts block on a human.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionMode {
    Interactive,
    AutoApprove,
}

impl Default for PermissionMode {
    fn default() -> Self {
        PermissionMode::Interactive
    }
}

/// PTY geometry, used when `executionMode = interactive`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TerminalConfig {
    #[serde(default = "default_cols")]
    pub cols: u16,
    #[serde(default = "default_rows")]
    pub rows: u16,
    #[serde(default)]
    pub name: Option<String>,
}

fn default_cols() -> u16 {
    120
}

fn default_rows() -> u16 {
    40
}

impl Default for TerminalConfig {
    fn default() -> Self {
        Self {
            cols: default_cols(),
            rows: default_rows(),
            name: None,
        }
    }
}

/// Workflow-scoped knobs under the `[workflow]` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSectionConfig {
    #[serde(default = "default_parallelism")]
    pub parallelism: Parallelism,
    #[serde(default = "default_on_failure")]
    pub on_failure: OnFailure,
    #[serde(default = "default_agent_type")]
    pub default_agent_type: AgentType,
    #[serde(default = "default_autonomy_level")]
    pub autonomy_level: AutonomyLevel,
}

fn default_parallelism() -> Parallelism {
    Parallelism::Sequential
}

fn default_on_failure() -> OnFailure {
    OnFailure::Pause
}

fn default_agent_type() -> AgentType {
    AgentType::Claude
}

fn default_autonomy_level() -> AutonomyLevel {
    AutonomyLevel::HumanInTheLoop
}

impl Default for WorkflowSectionConfig {
    fn default() -> Self {
        Self {
            parallelism: default_parallelism(),
            on_failure: default_on_failure(),
            default_agent_type: default_agent_type(),
            autonomy_level: default_autonomy_level(),
        }
    }
}

/// The engine-recognized subset of a project's resolved configuration,
/// per the §6 table. Everything else belongs to surrounding
/// collaborators and is not represented here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineConfig {
    #[serde(default = "default_worktree_storage_path")]
    pub worktree_storage_path: String,
    #[serde(default = "default_true")]
    pub auto_create_branches: bool,
    #[serde(default)]
    pub auto_delete_branches: bool,
    #[serde(default)]
    pub enable_sparse_checkout: bool,
    #[serde(default)]
    pub sparse_checkout_patterns: Vec<String>,
    #[serde(default = "default_branch_prefix")]
    pub branch_prefix: String,
    #[serde(default)]
    pub cleanup_orphaned_worktrees_on_startup: bool,
    #[serde(default)]
    pub execution_mode: ExecutionModeConfig,
    #[serde(default)]
    pub terminal: TerminalConfig,
    #[serde(default = "default_idle_timeout_ms")]
    pub idle_timeout_ms: u64,
    #[serde(default = "default_hard_timeout_ms")]
    pub hard_timeout_ms: u64,
    #[serde(default)]
    pub permission_mode: PermissionMode,
    #[serde(default)]
    pub workflow: WorkflowSectionConfig,
}

fn default_true() -> bool {
    true
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            worktree_storage_path: default_worktree_storage_path(),
            auto_create_branches: true,
            auto_delete_branches: false,
            enable_sparse_checkout: false,
            sparse_checkout_patterns: Vec::new(),
            branch_prefix: default_branch_prefix(),
            cleanup_orphaned_worktrees_on_startup: false,
            execution_mode: ExecutionModeConfig::default(),
            terminal: TerminalConfig::default(),
            idle_timeout_ms: default_idle_timeout_ms(),
            hard_timeout_ms: default_hard_timeout_ms(),
            permission_mode: PermissionMode::default(),
            workflow: WorkflowSectionConfig::default(),
        }
    }
}

impl EngineConfig {
    /// Parses a resolved `toml` document. Unknown tables are ignored —
    /// layout/merge of the surrounding config file is out of scope.
    pub fn from_toml_str(input: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(input)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
