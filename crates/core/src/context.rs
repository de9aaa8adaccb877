// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-destination execution context.
//!
//! Contexts form a stack parallel to the schedule stack; only the top context
//! is live. Variable values are JSON-representable scalars, arrays, or maps.

use crate::destination::DestinationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Context variable key holding the payload of the event that produced the
/// currently executing block.
pub const EVENT_VAR: &str = "_event";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Context {
    #[serde(default)]
    pub vars: Map<String, Value>,
    /// Set while a non-blocking `wait` is in progress.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_until: Option<DateTime<Utc>>,
    /// Last time the runtime logged wait progress (rate limiting).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_wait_log: Option<DateTime<Utc>>,
    pub publish_destination: DestinationId,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub stopping: bool,
}

impl Context {
    pub fn new(dest: DestinationId) -> Self {
        Self {
            vars: Map::new(),
            wait_until: None,
            last_wait_log: None,
            publish_destination: dest,
            stopping: false,
        }
    }

    pub fn var(&self, name: &str) -> Option<&Value> {
        self.vars.get(name)
    }

    pub fn set_var(&mut self, name: impl Into<String>, value: Value) {
        self.vars.insert(name.into(), value);
    }

    /// Remove a single variable, returning its previous value.
    pub fn remove_var(&mut self, name: &str) -> Option<Value> {
        self.vars.remove(name)
    }

    /// Drop every variable (`set_var` with `var = null`).
    pub fn clear_vars(&mut self) {
        self.vars.clear();
    }

    /// Whether the context is inside an unfinished wait at `now`.
    pub fn is_waiting(&self, now: DateTime<Utc>) -> bool {
        self.wait_until.is_some_and(|until| now < until)
    }
}

#[cfg(test)]
#[path = "context_tests.rs"]
mod tests;
