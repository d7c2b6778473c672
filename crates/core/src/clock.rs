// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Time abstraction so the engine and workflow drivers can be tested
//! deterministically.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

/// Milliseconds since the Unix epoch.
pub type Millis = i64;

/// Abstracts wall-clock time so timeouts and timers can be driven
/// deterministically in tests.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Current time in milliseconds since the Unix epoch.
    fn now_millis(&self) -> Millis;
}

/// Real wall-clock time.
#[derive(Debug, Clone, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_millis(&self) -> Millis {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as Millis)
            .unwrap_or(0)
    }
}

/// Manually-advanced clock for tests. Cloning shares the same underlying
/// counter, so a `FakeClock` handed to a driver and one kept by the test
/// observe the same advances.
#[derive(Debug, Clone)]
pub struct FakeClock {
    millis: Arc<AtomicI64>,
}

impl FakeClock {
    pub fn new(start_millis: Millis) -> Self {
        Self {
            millis: Arc::new(AtomicI64::new(start_millis)),
        }
    }

    /// Advances the clock and returns the new time.
    pub fn advance(&self, delta_millis: Millis) -> Millis {
        self.millis.fetch_add(delta_millis, Ordering::SeqCst) + delta_millis
    }

    pub fn set(&self, millis: Millis) {
        self.millis.store(millis, Ordering::SeqCst);
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new(0)
    }
}

impl Clock for FakeClock {
    fn now_millis(&self) -> Millis {
        self.millis.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
