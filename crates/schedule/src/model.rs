// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Typed schedule document model

use crate::instruction::Instruction;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A block of instructions with its urgency flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TriggerActions {
    #[serde(default)]
    pub instructions_block: Vec<Instruction>,
    /// Preempt current non-important work and any active wait.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub urgent: Option<bool>,
    /// Survive urgent preemption.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub important: Option<bool>,
}

/// `initial_actions` / `final_actions` accept either a bare instruction list
/// or a full `{ instructions_block, urgent, important }` object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ActionBlock {
    List(Vec<Instruction>),
    Block(TriggerActions),
}

impl ActionBlock {
    pub fn instructions(&self) -> &[Instruction] {
        match self {
            ActionBlock::List(list) => list,
            ActionBlock::Block(actions) => &actions.instructions_block,
        }
    }

    pub fn urgent(&self) -> bool {
        match self {
            ActionBlock::List(_) => false,
            ActionBlock::Block(actions) => actions.urgent.unwrap_or(false),
        }
    }

    pub fn important(&self) -> bool {
        match self {
            ActionBlock::List(_) => false,
            ActionBlock::Block(actions) => actions.important.unwrap_or(false),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.instructions().is_empty()
    }
}

/// Repeat interval for a scheduled sub-action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepeatSchedule {
    /// Interval in minutes; string or number, fractional allowed
    /// (`"0.5"` repeats every 30 seconds).
    pub every: Value,
    /// HH:MM bound; end-of-day when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub until: Option<String>,
}

/// A time-anchored action under a `date` or `day_of_week` trigger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledAction {
    /// Base time, HH:MM.
    pub time: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_schedule: Option<RepeatSchedule>,
    #[serde(default)]
    pub trigger_actions: TriggerActions,
}

/// One trigger rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Trigger {
    /// Fires on a literal day-of-year (e.g. `25-Dec`).
    Date {
        date: String,
        #[serde(default)]
        scheduled_actions: Vec<ScheduledAction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        urgent: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        important: Option<bool>,
    },
    /// Fires on any of the named weekdays.
    DayOfWeek {
        days: Vec<String>,
        #[serde(default)]
        scheduled_actions: Vec<ScheduledAction>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        urgent: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        important: Option<bool>,
    },
    /// Fires when an event with the given key is consumable.
    Event {
        /// Event key.
        value: String,
        #[serde(default)]
        trigger_actions: TriggerActions,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        urgent: Option<bool>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        important: Option<bool>,
    },
}

/// A full schedule document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Schedule {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initial_actions: Option<ActionBlock>,
    #[serde(default)]
    pub triggers: Vec<Trigger>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_actions: Option<ActionBlock>,
    /// Veto `unload` instructions while this schedule is on top.
    #[serde(default)]
    pub prevent_unload: bool,
}

#[cfg(test)]
#[path = "model_tests.rs"]
mod tests;
