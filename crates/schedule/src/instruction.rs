// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The instruction sum type.
//!
//! Instructions are tagged records (`action` field). Template-bearing string
//! fields are rendered at execution time, never at parse time, so they are
//! stored verbatim here.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Input source for `set_var`: a literal value or a reference to another var.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SetVarInput {
    /// An explicit `"value": null` is `Some(Null)` — it means "remove the
    /// variable", which is different from the key being absent.
    #[serde(
        default,
        deserialize_with = "present_value",
        skip_serializing_if = "Option::is_none"
    )]
    pub value: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub var_ref: Option<String>,
}

/// Deserialize a field whose presence matters: JSON `null` becomes
/// `Some(Value::Null)` instead of `None`.
fn present_value<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

/// Prompt inputs for `generate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GenerateInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub images: Vec<String>,
}

/// Prompt inputs for `animate`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnimateInput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_path: Option<String>,
}

/// How `terminate` unwinds the schedule.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TerminateMode {
    /// Run `final_actions` before unloading.
    #[default]
    Normal,
    /// Unload without running `final_actions`.
    Immediate,
    /// Drop the rest of the current block only.
    Block,
}

impl std::fmt::Display for TerminateMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            TerminateMode::Normal => "normal",
            TerminateMode::Immediate => "immediate",
            TerminateMode::Block => "block",
        })
    }
}

/// One executable instruction.
///
/// The device instructions accept the hyphenated wire form (`device-wake`)
/// older schedules used, alongside the canonical snake_case tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Instruction {
    SetVar {
        /// `None` clears every variable in the context.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        var: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<SetVarInput>,
        /// Fallback when `input` is absent or its `var_ref` misses.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        default: Option<Value>,
    },
    RandomChoice {
        var: String,
        #[serde(default)]
        choices: Vec<Value>,
    },
    Wait {
        /// Duration string or bare number (minutes).
        duration: Value,
    },
    Unload,
    Terminate {
        #[serde(default)]
        mode: TerminateMode,
        /// Templated condition; renders falsy ⇒ the instruction is a no-op.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        test: Option<Value>,
        #[serde(default)]
        prevent_unload: bool,
        /// Set on the follow-up synthesized from an internal terminate event
        /// so it does not re-emit the event.
        #[serde(default)]
        from_event: bool,
    },
    Log {
        message: String,
    },
    ThrowEvent {
        /// Destination id, group name, or "global"; defaults to the
        /// executing destination.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
        key: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        ttl: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        delay: Option<Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        future_time: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        display_name: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        payload: Option<Value>,
        #[serde(default)]
        single_consumer: bool,
    },
    ImportVar {
        var_name: String,
        #[serde(rename = "as", default, skip_serializing_if = "Option::is_none")]
        import_as: Option<String>,
        /// Destination id, group name, or "global" (default).
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
    },
    ExportVar {
        var_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        friendly_name: Option<String>,
        /// "global" (default) or a group name.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        scope: Option<String>,
    },
    Generate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<GenerateInput>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        refiner: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        workflow: Option<String>,
        /// `None` ⇒ publish to the executing destination; empty list ⇒
        /// generate without publishing.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        targets: Option<Vec<String>>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        history_var: Option<String>,
    },
    Animate {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<AnimateInput>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        history_var: Option<String>,
    },
    Display {
        show: String,
        #[serde(default)]
        silent: bool,
    },
    Publish {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        targets: Option<Vec<String>>,
        #[serde(default)]
        silent: bool,
    },
    Purge {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        days: Option<f64>,
    },
    Reason {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        reasoner: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        text_input: Option<String>,
        #[serde(default, skip_serializing_if = "Vec::is_empty")]
        image_inputs: Vec<String>,
        #[serde(default)]
        output_vars: Vec<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        history_var: Option<String>,
    },
    #[serde(alias = "device-wake")]
    DeviceWake,
    /// `sleep` is the historical alias for `device_sleep`.
    #[serde(alias = "device-sleep", alias = "sleep")]
    DeviceSleep,
    #[serde(alias = "device-standby")]
    DeviceStandby,
    #[serde(alias = "device-media-sync")]
    DeviceMediaSync,
}

impl Instruction {
    /// The wire tag, for logging.
    pub fn kind(&self) -> &'static str {
        match self {
            Instruction::SetVar { .. } => "set_var",
            Instruction::RandomChoice { .. } => "random_choice",
            Instruction::Wait { .. } => "wait",
            Instruction::Unload => "unload",
            Instruction::Terminate { .. } => "terminate",
            Instruction::Log { .. } => "log",
            Instruction::ThrowEvent { .. } => "throw_event",
            Instruction::ImportVar { .. } => "import_var",
            Instruction::ExportVar { .. } => "export_var",
            Instruction::Generate { .. } => "generate",
            Instruction::Animate { .. } => "animate",
            Instruction::Display { .. } => "display",
            Instruction::Publish { .. } => "publish",
            Instruction::Purge { .. } => "purge",
            Instruction::Reason { .. } => "reason",
            Instruction::DeviceWake => "device_wake",
            Instruction::DeviceSleep => "device_sleep",
            Instruction::DeviceStandby => "device_standby",
            Instruction::DeviceMediaSync => "device_media_sync",
        }
    }
}

#[cfg(test)]
#[path = "instruction_tests.rs"]
mod tests;
