// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Normalized trajectory entries persisted to the Logs Store (C4) and
//! fanned out on the bus (C5). The Agent Protocol Adapter (C3) is
//! responsible for translating each agent's native framing into this
//! shape before it ever reaches the engine.

use serde::{Deserialize, Serialize};

use crate::execution::ExecutionId;

/// Status of a tool invocation in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    Pending,
    Running,
    Success,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolUse {
    pub tool_call_id: String,
    pub tool_name: String,
    pub action: String,
    pub status: ToolStatus,
    pub input: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub tool_call_id: String,
    pub success: bool,
    pub data: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntryError {
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusChange {
    pub from: String,
    pub to: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionOption {
    pub id: String,
    pub label: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRequest {
    pub request_id: String,
    pub tool_call: String,
    pub options: Vec<PermissionOption>,
}

/// The kind-dependent payload of a normalized trajectory entry, per the
/// §4.3 table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "payload", rename_all = "snake_case")]
pub enum LogPayload {
    AssistantMessage { text: String },
    UserMessage { text: String },
    SystemMessage {
        text: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        session_id: Option<String>,
    },
    Thinking { text: String },
    ToolUse(ToolUse),
    ToolResult(ToolResult),
    Error(EntryError),
    StatusChange(StatusChange),
    PermissionRequest(PermissionRequest),
}

impl LogPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            LogPayload::AssistantMessage { .. } => "assistant_message",
            LogPayload::UserMessage { .. } => "user_message",
            LogPayload::SystemMessage { .. } => "system_message",
            LogPayload::Thinking { .. } => "thinking",
            LogPayload::ToolUse(_) => "tool_use",
            LogPayload::ToolResult(_) => "tool_result",
            LogPayload::Error(_) => "error",
            LogPayload::StatusChange(_) => "status_change",
            LogPayload::PermissionRequest(_) => "permission_request",
        }
    }

    /// The tool_call_id two trajectory entries must share to be
    /// coalescing candidates, per C4's tool_use collapse rule.
    pub fn tool_call_id(&self) -> Option<&str> {
        match self {
            LogPayload::ToolUse(t) => Some(&t.tool_call_id),
            LogPayload::ToolResult(t) => Some(&t.tool_call_id),
            _ => None,
        }
    }
}

/// One normalized, persisted trajectory entry. Invariant 2: indices for
/// a given execution form an unbroken `0..N-1` sequence assigned by the
/// execution's single producer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionLogEntry {
    pub execution_id: ExecutionId,
    pub index: u64,
    pub timestamp: i64,
    pub payload: LogPayload,
}

impl ExecutionLogEntry {
    pub fn new(execution_id: ExecutionId, index: u64, timestamp: i64, payload: LogPayload) -> Self {
        Self {
            execution_id,
            index,
            timestamp,
            payload,
        }
    }
}

#[cfg(test)]
#[path = "execution_log_tests.rs"]
mod tests;
