// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Control-flow instructions: `wait`, `unload`, `terminate`, `throw_event`.

use super::{HandlerCtx, Outcome};
use crate::error::HandlerError;
use crate::events::{
    ThrowSpec, INTERNAL_EXIT_BLOCK, INTERNAL_TERMINATE, INTERNAL_TERMINATE_IMMEDIATE,
};
use chrono::{DateTime, Utc};
use marquee_core::duration::{parse_duration_value, BareUnit};
use marquee_schedule::{Instruction, TerminateMode};
use serde_json::{json, Value};

/// Seconds between "still waiting" log lines.
const WAIT_LOG_INTERVAL_SECS: i64 = 30;

/// Non-blocking wait. First invocation arms `wait_until`; later invocations
/// report progress and complete once the deadline passes. The runtime keeps
/// the entry at the queue head while this returns [`Outcome::Pending`].
pub(super) fn wait(duration: &Value, ctx: &mut HandlerCtx<'_>) -> Result<Outcome, HandlerError> {
    match ctx.context.wait_until {
        None => {
            let duration = parse_duration_value(duration, BareUnit::Minutes)
                .map_err(|e| HandlerError::BadArgument(e.to_string()))?;
            let until = ctx.now + duration;
            ctx.context.wait_until = Some(until);
            ctx.context.last_wait_log = Some(ctx.now);
            ctx.output.push(format!("Started waiting until {}", until.to_rfc3339()));
            Ok(Outcome::Pending)
        }
        Some(until) if ctx.now >= until => {
            ctx.context.wait_until = None;
            ctx.context.last_wait_log = None;
            ctx.output.push("Wait complete".to_string());
            Ok(Outcome::Continue)
        }
        Some(until) => {
            let should_log = ctx
                .context
                .last_wait_log
                .is_none_or(|at| (ctx.now - at).num_seconds() >= WAIT_LOG_INTERVAL_SECS);
            if should_log {
                ctx.context.last_wait_log = Some(ctx.now);
                let left = (until - ctx.now).num_seconds();
                ctx.output.push(format!("Still waiting ({}s left)", left));
            }
            Ok(Outcome::Pending)
        }
    }
}

pub(super) fn unload(ctx: &mut HandlerCtx<'_>) -> Result<Outcome, HandlerError> {
    if ctx.schedule.prevent_unload {
        ctx.output.push("Unload prevented by schedule".to_string());
        return Ok(Outcome::Continue);
    }
    ctx.output.push("Unloading schedule".to_string());
    Ok(Outcome::Unload)
}

/// `terminate` runs in two phases. The instruction itself emits an internal
/// urgent event so that preemption goes through the normal urgent-event
/// path; the runtime then synthesizes a follow-up with `from_event = true`
/// which performs the actual unwind.
pub(super) fn terminate(
    mode: TerminateMode,
    test: Option<&Value>,
    prevent_unload: bool,
    from_event: bool,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    if let Some(test) = test {
        if !truthy(test) {
            ctx.output.push("Terminate test evaluated false; skipping".to_string());
            return Ok(Outcome::Continue);
        }
    }
    let prevented = prevent_unload || ctx.schedule.prevent_unload;

    if !from_event {
        let key = match mode {
            TerminateMode::Normal => INTERNAL_TERMINATE,
            TerminateMode::Immediate => INTERNAL_TERMINATE_IMMEDIATE,
            TerminateMode::Block => INTERNAL_EXIT_BLOCK,
        };
        let spec = ThrowSpec {
            key: key.to_string(),
            ttl: Some(json!("60s")),
            payload: Some(json!({ "prevent_unload": prevented })),
            ..ThrowSpec::default()
        };
        match ctx.events.throw(ctx.dest.as_str(), spec, ctx.now, ctx.collab.groups.as_ref()) {
            Ok(_) => ctx.output.push(format!("Terminate ({}) requested", mode)),
            Err(e) => ctx.output.push(format!("Error in terminate: {}", e)),
        }
        return Ok(Outcome::Continue);
    }

    // Follow-up synthesized from the internal event
    match mode {
        TerminateMode::Block => {
            ctx.output.push("Exiting current block".to_string());
            Ok(Outcome::ExitBlock)
        }
        TerminateMode::Immediate => {
            if prevented {
                ctx.output.push("Terminate blocked by prevent_unload; stopping".to_string());
                Ok(Outcome::StopRuntime)
            } else {
                ctx.output.push("Terminating immediately".to_string());
                Ok(Outcome::Unload)
            }
        }
        TerminateMode::Normal => {
            // Final actions run under a stopping context, then an immediate
            // follow-up unloads. Urgent+important so the block survives its
            // own preemption.
            ctx.context.stopping = true;
            let mut block: Vec<Instruction> = ctx
                .schedule
                .final_actions
                .as_ref()
                .map(|actions| actions.instructions().to_vec())
                .unwrap_or_default();
            block.push(Instruction::Terminate {
                mode: TerminateMode::Immediate,
                test: None,
                prevent_unload: prevented,
                from_event: true,
            });
            ctx.queue.push_block(block, true, true);
            ctx.output.push("Terminating after final actions".to_string());
            Ok(Outcome::Continue)
        }
    }
}

#[allow(clippy::too_many_arguments)]
pub(super) fn throw_event(
    scope: Option<&str>,
    key: &str,
    ttl: Option<Value>,
    delay: Option<Value>,
    future_time: Option<&str>,
    display_name: Option<String>,
    payload: Option<Value>,
    single_consumer: bool,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    let future_time = match future_time {
        Some(text) => Some(parse_future_time(text).ok_or_else(|| {
            HandlerError::BadArgument(format!("invalid future_time: {text:?}"))
        })?),
        None => None,
    };
    let spec = ThrowSpec {
        key: key.to_string(),
        ttl,
        delay,
        future_time,
        display_name,
        payload,
        single_consumer,
    };
    let scope = scope.unwrap_or(ctx.dest.as_str());
    match ctx.events.throw(scope, spec, ctx.now, ctx.collab.groups.as_ref()) {
        Ok(receipt) => {
            ctx.output.push(format!(
                "Threw event {} to {} destination(s)",
                key,
                receipt.destinations.len()
            ));
        }
        Err(e) => ctx.output.push(format!("Error in throw_event: {}", e)),
    }
    Ok(Outcome::Continue)
}

fn parse_future_time(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(at) = DateTime::parse_from_rfc3339(text) {
        return Some(at.with_timezone(&Utc));
    }
    chrono::NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Falsy: false, null, 0, "", "false", "0", "no".
fn truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let lower = s.trim().to_lowercase();
            !(lower.is_empty() || lower == "false" || lower == "0" || lower == "no")
        }
        Value::Array(items) => !items.is_empty(),
        Value::Object(map) => !map.is_empty(),
    }
}
