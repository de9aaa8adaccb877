// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-destination bounded log ring.
//!
//! Handler side-effect descriptions land here (and at debug level via
//! `tracing`). Callers surfacing status read a snapshot; the ring is capped
//! so an idle process never grows.

use chrono::{DateTime, Utc};
use marquee_core::DestinationId;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};

/// Lines retained per destination.
pub const LOG_RING_CAP: usize = 200;

#[derive(Debug, Clone, PartialEq)]
pub struct LogLine {
    pub at: DateTime<Utc>,
    pub line: String,
}

#[derive(Default)]
pub struct LogRing {
    inner: Mutex<HashMap<DestinationId, VecDeque<LogLine>>>,
}

impl LogRing {
    pub fn push(&self, dest: &DestinationId, at: DateTime<Utc>, line: impl Into<String>) {
        let line = line.into();
        tracing::debug!(%dest, %line, "scheduler log");
        let mut inner = self.inner.lock();
        let ring = inner.entry(dest.clone()).or_default();
        ring.push_back(LogLine { at, line });
        while ring.len() > LOG_RING_CAP {
            ring.pop_front();
        }
    }

    pub fn extend(
        &self,
        dest: &DestinationId,
        at: DateTime<Utc>,
        lines: impl IntoIterator<Item = String>,
    ) {
        for line in lines {
            self.push(dest, at, line);
        }
    }

    /// Snapshot of the destination's lines, oldest first.
    pub fn snapshot(&self, dest: &DestinationId) -> Vec<LogLine> {
        self.inner
            .lock()
            .get(dest.as_str())
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default()
    }

    pub fn clear(&self, dest: &DestinationId) {
        self.inner.lock().remove(dest.as_str());
    }
}

#[cfg(test)]
#[path = "logring_tests.rs"]
mod tests;
