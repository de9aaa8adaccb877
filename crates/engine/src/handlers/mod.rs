// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Instruction handler dispatch.
//!
//! Handlers are a closed match over the instruction sum type. Every
//! template-bearing string field is rendered here, at execution time, with
//! the current context — earlier instructions in a block legitimately change
//! what later instructions see. Collaborator failures are logged into the
//! destination's output and the loop moves on; they never propagate.

mod flow;
mod media;
mod reason;
mod vars;

use crate::error::HandlerError;
use crate::events::EventStore;
use crate::queue::InstructionQueue;
use crate::registry::VariableRegistry;
use chrono::{DateTime, Utc};
use marquee_adapters::Collaborators;
use marquee_core::{Context, DestinationId, ImportSourceType};
use marquee_schedule::{template, Instruction, Schedule};
use serde_json::Value;

/// Most entries a `history_var` FIFO retains.
pub const HISTORY_VAR_MAX: usize = 20;

/// What the executed instruction asks of the runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    /// Stay in the schedule; run the next instruction.
    Continue,
    /// The instruction has not finished (an in-progress wait); requeue it at
    /// the head.
    Pending,
    /// Drop the remaining non-important entries of the current block.
    ExitBlock,
    /// Pop the top schedule.
    Unload,
    /// Stop the runtime but keep the stack (immediate terminate vetoed by
    /// `prevent_unload`).
    StopRuntime,
}

/// An import requested by `import_var`, applied by the runtime after the
/// instruction completes (it needs cross-destination context access).
#[derive(Debug, Clone)]
pub struct ImportRequest {
    pub var_name: String,
    pub alias: String,
    pub source_type: ImportSourceType,
    pub source: String,
}

/// Side effects the runtime applies after the handler returns.
#[derive(Debug, Default)]
pub struct SideEffects {
    /// Variable assignments that may need export propagation.
    pub var_writes: Vec<(String, Value)>,
    pub imports_requested: Vec<ImportRequest>,
}

/// Everything a handler may touch.
pub struct HandlerCtx<'a> {
    pub dest: &'a DestinationId,
    pub now: DateTime<Utc>,
    pub context: &'a mut Context,
    pub schedule: &'a Schedule,
    pub queue: &'a mut InstructionQueue,
    pub events: &'a EventStore,
    pub registry: &'a VariableRegistry,
    pub collab: &'a Collaborators,
    /// Human-readable side-effect lines, flushed to the log ring.
    pub output: &'a mut Vec<String>,
    pub effects: &'a mut SideEffects,
}

/// Render templates and execute one instruction.
pub async fn execute(
    instruction: &Instruction,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    // Render every string field against the current vars. If rendering
    // produced something that no longer parses as the instruction (e.g. a
    // templated enum tag), that is a handler failure.
    let doc = serde_json::to_value(instruction)?;
    let rendered = template::render_value(&doc, &ctx.context.vars);
    let instruction: Instruction = serde_json::from_value(rendered)?;

    match &instruction {
        Instruction::SetVar { var, input, default } => {
            vars::set_var(var.as_deref(), input.as_ref(), default.as_ref(), ctx)
        }
        Instruction::RandomChoice { var, choices } => vars::random_choice(var, choices, ctx),
        Instruction::ImportVar { var_name, import_as, scope } => {
            vars::import_var(var_name, import_as.as_deref(), scope.as_deref(), ctx)
        }
        Instruction::ExportVar { var_name, friendly_name, scope } => {
            vars::export_var(var_name, friendly_name.clone(), scope.as_deref(), ctx)
        }
        Instruction::Wait { duration } => flow::wait(duration, ctx),
        Instruction::Unload => flow::unload(ctx),
        Instruction::Terminate { mode, test, prevent_unload, from_event } => {
            flow::terminate(*mode, test.as_ref(), *prevent_unload, *from_event, ctx)
        }
        Instruction::Log { message } => {
            ctx.output.push(message.clone());
            Ok(Outcome::Continue)
        }
        Instruction::ThrowEvent {
            scope,
            key,
            ttl,
            delay,
            future_time,
            display_name,
            payload,
            single_consumer,
        } => flow::throw_event(
            scope.as_deref(),
            key,
            ttl.clone(),
            delay.clone(),
            future_time.as_deref(),
            display_name.clone(),
            payload.clone(),
            *single_consumer,
            ctx,
        ),
        Instruction::Generate { input, refiner, workflow, targets, history_var } => {
            media::generate(
                input.as_ref(),
                refiner.clone(),
                workflow.clone(),
                targets.as_deref(),
                history_var.as_deref(),
                ctx,
            )
            .await
        }
        Instruction::Animate { input, history_var } => {
            media::animate(input.as_ref(), history_var.as_deref(), ctx).await
        }
        Instruction::Display { show, silent } => media::display(show, *silent, ctx).await,
        Instruction::Publish { source, targets, silent } => {
            media::publish(source.as_deref(), targets.as_deref(), *silent, ctx).await
        }
        Instruction::Purge { days } => media::purge(*days, ctx).await,
        Instruction::Reason { reasoner, text_input, image_inputs, output_vars, history_var } => {
            reason::reason(
                reasoner.as_deref(),
                text_input.as_deref(),
                image_inputs,
                output_vars,
                history_var.as_deref(),
                ctx,
            )
            .await
        }
        Instruction::DeviceWake => media::device(ctx, "wake").await,
        Instruction::DeviceSleep => media::device(ctx, "sleep").await,
        Instruction::DeviceStandby => media::device(ctx, "standby").await,
        Instruction::DeviceMediaSync => media::device(ctx, "sync_media").await,
    }
}

/// Append an entry to a bounded history FIFO stored in a context variable.
pub(crate) fn push_history(context: &mut Context, history_var: &str, entry: Value) {
    let history = context
        .vars
        .entry(history_var.to_string())
        .or_insert_with(|| Value::Array(Vec::new()));
    if !history.is_array() {
        // A non-list value under the history name is replaced
        *history = Value::Array(Vec::new());
    }
    if let Value::Array(items) = history {
        items.push(entry);
        while items.len() > HISTORY_VAR_MAX {
            items.remove(0);
        }
    }
}

#[cfg(test)]
#[path = "handler_tests.rs"]
mod tests;
