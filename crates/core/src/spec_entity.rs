// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `Spec` entity: a design document linked to one or more issues,
//! consulted when rendering a prompt for an execution.

use serde::{Deserialize, Serialize};

use crate::define_id;
use crate::issue::IssueId;

define_id! {
    /// Stable identifier for a [`Spec`].
    pub struct SpecId;
}

/// A design document linked to one or more issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    pub id: SpecId,
    pub title: String,
    pub content: String,
    #[serde(default)]
    pub issue_ids: Vec<IssueId>,
}

#[cfg(test)]
#[path = "spec_entity_tests.rs"]
mod tests;
