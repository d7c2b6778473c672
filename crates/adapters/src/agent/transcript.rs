// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Incremental JSONL transcript tailing, generalized from the teacher's
//! `watcher::SessionLogParser`/`log_entry::parse_entries_from` pair: the
//! teacher reads newly appended lines by byte offset to derive an
//! activity summary and an `AgentState`; this module performs the same
//! incremental read but maps each line into the normalized `kind`/
//! `payload` table of §4.3 instead.

use std::fs::File;
use std::io::{BufRead, BufReader, Seek, SeekFrom};
use std::path::Path;

use loom_core::execution_log::{EntryError, LogPayload, PermissionOption, PermissionRequest, ToolResult, ToolStatus, ToolUse};
use serde_json::Value;

/// Tracks a byte offset into a growing JSONL transcript file and yields
/// normalized payloads for every complete line appended since the last
/// call to [`TranscriptTailer::poll`].
pub struct TranscriptTailer {
    offset: u64,
}

impl TranscriptTailer {
    pub fn new() -> Self {
        Self { offset: 0 }
    }

    /// Reads any newly appended complete lines, returning their mapped
    /// payloads in file order. An incomplete trailing line is left
    /// un-consumed so it is re-read whole on the next poll.
    pub fn poll(&mut self, path: &Path) -> Vec<LogPayload> {
        let Ok(file) = File::open(path) else {
            return Vec::new();
        };
        let file_len = file.metadata().map(|m| m.len()).unwrap_or(0);
        if file_len < self.offset {
            // Log was truncated or replaced (e.g. a fresh session); restart.
            self.offset = 0;
        }
        let mut reader = BufReader::new(file);
        if reader.seek(SeekFrom::Start(self.offset)).is_err() {
            return Vec::new();
        }

        let mut payloads = Vec::new();
        let mut current_offset = self.offset;
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(n) => {
                    if !line.ends_with('\n') {
                        break;
                    }
                    current_offset += n as u64;
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }
                    if let Ok(json) = serde_json::from_str::<Value>(trimmed) {
                        payloads.extend(map_line(&json));
                    }
                }
            }
        }
        self.offset = current_offset;
        payloads
    }
}

impl Default for TranscriptTailer {
    fn default() -> Self {
        Self::new()
    }
}

fn get_str<'a>(obj: &'a Value, key: &str) -> Option<&'a str> {
    obj.get(key).and_then(|v| v.as_str())
}

/// Maps one JSONL record from the agent's native transcript into zero or
/// more normalized entries.
fn map_line(json: &Value) -> Vec<LogPayload> {
    if let Some(error) = detect_error(json) {
        return vec![LogPayload::Error(EntryError {
            message: error,
            stack: None,
        })];
    }

    match get_str(json, "type") {
        Some("system") => vec![LogPayload::SystemMessage {
            text: get_str(json, "subtype").unwrap_or("init").to_string(),
            session_id: get_str(json, "session_id").map(String::from),
        }],
        Some("assistant") => map_content_blocks(json.get("message"), true),
        Some("user") => map_content_blocks(json.get("message"), false),
        Some("control_request") => map_permission_request(json),
        _ => Vec::new(),
    }
}

fn map_content_blocks(message: Option<&Value>, is_assistant: bool) -> Vec<LogPayload> {
    let Some(content) = message.and_then(|m| m.get("content")).and_then(|c| c.as_array()) else {
        return Vec::new();
    };

    let mut out = Vec::new();
    for block in content {
        match get_str(block, "type") {
            Some("text") => {
                let text = get_str(block, "text").unwrap_or_default().to_string();
                if text.is_empty() {
                    continue;
                }
                out.push(if is_assistant {
                    LogPayload::AssistantMessage { text }
                } else {
                    LogPayload::UserMessage { text }
                });
            }
            Some("thinking") => {
                let text = get_str(block, "thinking").unwrap_or_default().to_string();
                if !text.is_empty() {
                    out.push(LogPayload::Thinking { text });
                }
            }
            Some("tool_use") => {
                let tool_call_id = get_str(block, "id").unwrap_or_default().to_string();
                let tool_name = get_str(block, "name").unwrap_or_default().to_string();
                let input = block.get("input").cloned().unwrap_or(Value::Null);
                out.push(LogPayload::ToolUse(ToolUse {
                    tool_call_id,
                    action: tool_name.clone(),
                    tool_name,
                    status: ToolStatus::Running,
                    input,
                    result: None,
                }));
            }
            Some("tool_result") => {
                let tool_call_id = get_str(block, "tool_use_id").unwrap_or_default().to_string();
                let is_error = block.get("is_error").and_then(|v| v.as_bool()).unwrap_or(false);
                let data = block.get("content").cloned().unwrap_or(Value::Null);
                out.push(LogPayload::ToolResult(ToolResult {
                    tool_call_id,
                    success: !is_error,
                    data,
                }));
            }
            _ => {}
        }
    }
    out
}

fn map_permission_request(json: &Value) -> Vec<LogPayload> {
    let Some(request) = json.get("request") else {
        return Vec::new();
    };
    let request_id = get_str(json, "request_id").unwrap_or_default().to_string();
    let tool_call = get_str(request, "tool_name").unwrap_or_default().to_string();
    let options = vec![
        PermissionOption {
            id: "allow".to_string(),
            label: "Allow".to_string(),
        },
        PermissionOption {
            id: "deny".to_string(),
            label: "Deny".to_string(),
        },
    ];
    vec![LogPayload::PermissionRequest(PermissionRequest {
        request_id,
        tool_call,
        options,
    })]
}

/// Detects an error surfaced in-band (not a process exit), generalized
/// from the teacher's `watcher::detect_error` pattern-matching on common
/// provider failure phrases.
fn detect_error(json: &Value) -> Option<String> {
    let err = get_str(json, "error").or_else(|| json.get("message").and_then(|m| get_str(m, "error")))?;
    Some(err.to_string())
}

#[cfg(test)]
#[path = "transcript_tests.rs"]
mod tests;
