// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Coalesces consecutive small-granularity trajectory updates targeting
//! the same logical object before they reach the Logs Store or the
//! fan-out bus (C5), reducing storage pressure and downstream work
//! while preserving semantics.
//!
//! Rules, in priority order:
//! - Adjacent `assistant_message` entries coalesce by string append (the
//!   normalized schema carries no per-delta message id, so adjacency —
//!   no other kind interleaved — stands in for "same message id").
//! - Adjacent `tool_use` entries with identical `tool_call_id` collapse
//!   into one entry: `status` takes the latest value, `input`/`result`
//!   take the latest non-null value.
//! - Every other kind passes through unchanged and flushes whatever was
//!   pending first.
//!
//! One [`Coalescer`] instance is scoped to a single execution's
//! producer; coalescing across executions never happens.

use loom_core::execution_log::LogPayload;

/// Buffers at most one in-flight entry awaiting a coalescing decision.
#[derive(Debug, Default)]
pub struct Coalescer {
    pending: Option<LogPayload>,
}

impl Coalescer {
    pub fn new() -> Self {
        Self { pending: None }
    }

    /// Feed one raw trajectory entry. Returns an entry ready to persist
    /// if the new entry could not be merged into the pending one.
    pub fn push(&mut self, entry: LogPayload) -> Option<LogPayload> {
        match self.pending.take() {
            Some(pending) => match merge(pending, entry) {
                Ok(merged) => {
                    self.pending = Some(merged);
                    None
                }
                Err((pending, entry)) => {
                    self.pending = Some(entry);
                    Some(pending)
                }
            },
            None => {
                self.pending = Some(entry);
                None
            }
        }
    }

    /// Emit the buffered entry, if any. Called on stream end.
    pub fn flush(&mut self) -> Option<LogPayload> {
        self.pending.take()
    }
}

/// Attempts to merge `next` into `pending`. On success returns the
/// merged entry; on failure returns both entries unchanged so the
/// caller can flush `pending` and start buffering `next`.
fn merge(pending: LogPayload, next: LogPayload) -> Result<LogPayload, (LogPayload, LogPayload)> {
    match (pending, next) {
        (LogPayload::AssistantMessage { text: mut acc }, LogPayload::AssistantMessage { text }) => {
            acc.push_str(&text);
            Ok(LogPayload::AssistantMessage { text: acc })
        }
        (LogPayload::ToolUse(mut acc), LogPayload::ToolUse(next))
            if acc.tool_call_id == next.tool_call_id =>
        {
            acc.status = next.status;
            if !next.input.is_null() {
                acc.input = next.input;
            }
            if next.result.is_some() {
                acc.result = next.result;
            }
            Ok(LogPayload::ToolUse(acc))
        }
        (pending, next) => Err((pending, next)),
    }
}

#[cfg(test)]
#[path = "coalescer_tests.rs"]
mod tests;
