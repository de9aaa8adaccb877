// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-destination instruction queue with urgent/important preemption.
//!
//! Admission rules:
//! - urgent push: remove every non-important entry, then prepend the new
//!   entries preserving their internal order;
//! - important push: append to the tail regardless of queue contents;
//! - normal push: append only if the queue is empty, otherwise drop.
//!
//! The normal-drop policy is deliberate: triggers re-evaluate every tick, so
//! a missed normal block is re-offered on the next tick if still valid,
//! whereas accepting it now would interleave stale and fresh work.

use chrono::{DateTime, Utc};
use marquee_schedule::Instruction;
use std::collections::VecDeque;

/// Seconds between urgent-peek debug logs during a wait.
const URGENT_LOG_INTERVAL_SECS: i64 = 30;

/// One queued instruction with its block's flags.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub instruction: Instruction,
    /// Survives urgent preemption.
    pub important: bool,
    /// Preempts non-important work and active waits.
    pub urgent: bool,
    /// Set for entries that came from an event trigger's block; used to
    /// scope the `_event` context variable to the block's lifetime.
    pub from_event_block: bool,
}

/// FIFO of instruction entries for one destination.
#[derive(Debug, Default)]
pub struct InstructionQueue {
    queue: VecDeque<Entry>,
    last_urgent_log: Option<DateTime<Utc>>,
}

impl InstructionQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Push a block of instructions with the given flags.
    pub fn push_block(
        &mut self,
        instructions: impl IntoIterator<Item = Instruction>,
        important: bool,
        urgent: bool,
    ) {
        self.push_block_tagged(instructions, important, urgent, false);
    }

    /// Like [`push_block`], additionally tagging entries as belonging to an
    /// event trigger's block.
    pub fn push_block_tagged(
        &mut self,
        instructions: impl IntoIterator<Item = Instruction>,
        important: bool,
        urgent: bool,
        from_event_block: bool,
    ) {
        let entries: Vec<Entry> = instructions
            .into_iter()
            .map(|instruction| Entry { instruction, important, urgent, from_event_block })
            .collect();
        if entries.is_empty() {
            return;
        }

        if urgent {
            self.remove_non_important();
            for entry in entries.into_iter().rev() {
                self.queue.push_front(entry);
            }
            tracing::debug!(size = self.queue.len(), "urgent instructions prepended");
        } else if important {
            let count = entries.len();
            self.queue.extend(entries);
            tracing::debug!(count, size = self.queue.len(), "important instructions appended");
        } else if self.queue.is_empty() {
            self.queue.extend(entries);
            tracing::debug!(size = self.queue.len(), "normal instructions queued");
        } else {
            tracing::debug!(
                skipped = entries.len(),
                "normal instructions dropped (queue not empty)"
            );
        }
    }

    /// Pop the next entry. With `urgent_only`, pop the first urgent entry
    /// wherever it sits in the queue, or `None` if there is none.
    pub fn pop_next(&mut self, urgent_only: bool) -> Option<Entry> {
        if !urgent_only {
            return self.queue.pop_front();
        }
        let index = self.queue.iter().position(|entry| entry.urgent)?;
        if index > 0 {
            tracing::debug!(index, "urgent instruction extracted from mid-queue");
        }
        self.queue.remove(index)
    }

    /// Look at the first urgent entry without removing it. Debug logging is
    /// rate limited because this runs every pass during a wait.
    pub fn peek_next_urgent(&mut self, now: DateTime<Utc>) -> Option<&Entry> {
        let should_log = self
            .last_urgent_log
            .is_none_or(|at| (now - at).num_seconds() > URGENT_LOG_INTERVAL_SECS);
        if should_log {
            self.last_urgent_log = Some(now);
            tracing::debug!(size = self.queue.len(), "scanning queue for urgent entries");
        }
        self.queue.iter().find(|entry| entry.urgent)
    }

    /// Remove all non-important entries (urgent preemption, exit-block).
    pub fn remove_non_important(&mut self) {
        let before = self.queue.len();
        self.queue.retain(|entry| entry.important);
        let removed = before - self.queue.len();
        if removed > 0 {
            tracing::debug!(removed, "non-important instructions removed");
        }
    }

    /// Put an entry back at the head (an instruction that has not finished,
    /// e.g. an in-progress wait).
    pub fn push_front(&mut self, entry: Entry) {
        self.queue.push_front(entry);
    }

    /// Head of the queue without removing it.
    pub fn front(&self) -> Option<&Entry> {
        self.queue.front()
    }

    pub fn clear(&mut self) {
        self.queue.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Entry> {
        self.queue.iter()
    }
}

#[cfg(test)]
#[path = "queue_tests.rs"]
mod tests;
