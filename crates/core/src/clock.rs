// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Clock abstraction for testable time handling

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// A clock that provides the current wall-clock time.
///
/// Trigger matching is calendar-based (HH:MM candidates, day-of-year dates),
/// so the clock hands out `DateTime<Utc>` rather than a monotonic instant.
pub trait Clock: Clone + Send + Sync + 'static {
    fn now_utc(&self) -> DateTime<Utc>;
}

/// Real system clock
#[derive(Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Fake clock for testing with controllable time
#[derive(Clone)]
pub struct FakeClock {
    current: Arc<Mutex<DateTime<Utc>>>,
}

impl FakeClock {
    pub fn new() -> Self {
        Self { current: Arc::new(Mutex::new(Utc::now())) }
    }

    /// Create a fake clock pinned to the given time.
    pub fn at(time: DateTime<Utc>) -> Self {
        Self { current: Arc::new(Mutex::new(time)) }
    }

    /// Advance the clock by the given duration
    pub fn advance(&self, duration: Duration) {
        *self.current.lock() += duration;
    }

    /// Set the clock to a specific time
    pub fn set(&self, time: DateTime<Utc>) {
        *self.current.lock() = time;
    }
}

impl Default for FakeClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for FakeClock {
    fn now_utc(&self) -> DateTime<Utc> {
        *self.current.lock()
    }
}

#[cfg(test)]
#[path = "clock_tests.rs"]
mod tests;
