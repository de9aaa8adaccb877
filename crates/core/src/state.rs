// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Durable per-destination scheduler state.
//!
//! One snapshot per destination, serialized to a single JSON document.
//! Schedules and contexts round-trip verbatim; template strings are stored
//! as-is and only rendered at execution time.

use crate::context::Context;
use crate::event::EventEntry;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Scheduler lifecycle state. Exactly one holds at any instant.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunState {
    #[default]
    Stopped,
    Running,
    Paused,
}

impl std::fmt::Display for RunState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            RunState::Stopped => "stopped",
            RunState::Running => "running",
            RunState::Paused => "paused",
        })
    }
}

/// An important trigger hit recorded for later execution (e.g. it fired
/// during a wait). Re-offered by the resolver ahead of fresh evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TriggerHitRecord {
    pub instructions: Vec<serde_json::Value>,
    #[serde(default)]
    pub urgent: bool,
    #[serde(default)]
    pub important: bool,
    pub source: String,
    pub recorded_at: DateTime<Utc>,
}

/// Full durable snapshot for one destination.
///
/// Invariant: `schedule_stack` and `context_stack` always have equal depth.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SchedulerState {
    /// Stack of schedule documents, stored verbatim; only the top is active.
    #[serde(default)]
    pub schedule_stack: Vec<serde_json::Value>,
    #[serde(default)]
    pub context_stack: Vec<Context>,
    #[serde(default)]
    pub state: RunState,
    /// Stable-hash → candidate timestamp; dedupes interval firings across
    /// restarts.
    #[serde(default)]
    pub last_trigger_executions: HashMap<String, DateTime<Utc>>,
    /// key → FIFO of queued entries.
    #[serde(default)]
    pub events_active: HashMap<String, Vec<EventEntry>>,
    /// Bounded ring of consumed/expired entries, newest last.
    #[serde(default)]
    pub events_history: Vec<EventEntry>,
    /// Important trigger hits awaiting execution.
    #[serde(default)]
    pub important_triggers: Vec<TriggerHitRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_updated: Option<DateTime<Utc>>,
}

impl SchedulerState {
    /// Top-of-stack context, if any schedule is loaded.
    pub fn top_context(&self) -> Option<&Context> {
        self.context_stack.last()
    }

    pub fn top_context_mut(&mut self) -> Option<&mut Context> {
        self.context_stack.last_mut()
    }

    /// Top-of-stack schedule document, if any.
    pub fn top_schedule(&self) -> Option<&serde_json::Value> {
        self.schedule_stack.last()
    }

    /// Push a schedule with its fresh context.
    pub fn push(&mut self, schedule: serde_json::Value, context: Context) {
        self.schedule_stack.push(schedule);
        self.context_stack.push(context);
    }

    /// Pop the top schedule and its context together.
    pub fn pop(&mut self) -> Option<(serde_json::Value, Context)> {
        match (self.schedule_stack.pop(), self.context_stack.pop()) {
            (Some(s), Some(c)) => Some((s, c)),
            // Stacks must stay in lockstep; a one-sided pop is a bug.
            (Some(s), None) => {
                self.schedule_stack.push(s);
                None
            }
            (None, Some(c)) => {
                self.context_stack.push(c);
                None
            }
            (None, None) => None,
        }
    }

    pub fn stack_depth(&self) -> usize {
        self.schedule_stack.len()
    }
}

#[cfg(test)]
#[path = "state_tests.rs"]
mod tests;
