// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Variable instructions: `set_var`, `random_choice`, `import_var`,
//! `export_var`.

use super::{HandlerCtx, ImportRequest, Outcome};
use crate::error::HandlerError;
use crate::registry::ExportScope;
use marquee_core::ImportSourceType;
use marquee_schedule::instruction::SetVarInput;
use rand::seq::SliceRandom;
use serde_json::Value;

/// Strings that parse cleanly as integer / float / boolean are coerced.
fn coerce(value: Value) -> Value {
    let Value::String(s) = &value else { return value };
    let trimmed = s.trim();
    if let Ok(n) = trimmed.parse::<i64>() {
        return Value::Number(n.into());
    }
    if let Ok(f) = trimmed.parse::<f64>() {
        if let Some(n) = serde_json::Number::from_f64(f) {
            return Value::Number(n);
        }
    }
    match trimmed {
        "true" | "True" => Value::Bool(true),
        "false" | "False" => Value::Bool(false),
        _ => value,
    }
}

pub(super) fn set_var(
    var: Option<&str>,
    input: Option<&SetVarInput>,
    default: Option<&Value>,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    let Some(var) = var else {
        // set_var with var = null resets the whole context
        ctx.context.clear_vars();
        ctx.output.push("Cleared all context variables".to_string());
        return Ok(Outcome::Continue);
    };

    let value = match input {
        Some(SetVarInput { value: Some(value), .. }) => Some(value.clone()),
        Some(SetVarInput { var_ref: Some(var_ref), .. }) => {
            ctx.context.var(var_ref).cloned().or_else(|| default.cloned())
        }
        _ => default.cloned(),
    };
    let Some(value) = value else {
        ctx.output.push("Error in set_var: could not determine value".to_string());
        return Ok(Outcome::Continue);
    };

    if value.is_null() {
        ctx.context.remove_var(var);
        let groups = ctx.collab.groups.groups_of(ctx.dest);
        let detached = ctx.registry.remove_export(var, ctx.dest, &groups);
        if detached.is_empty() {
            ctx.output.push(format!("Removed {}", var));
        } else {
            ctx.output.push(format!(
                "Removed {} and its export ({} importers detached)",
                var,
                detached.len()
            ));
        }
        return Ok(Outcome::Continue);
    }

    let value = coerce(value);
    ctx.output.push(format!("Set {} to {}", var, display_value(&value)));
    ctx.context.set_var(var, value.clone());
    ctx.effects.var_writes.push((var.to_string(), value));
    Ok(Outcome::Continue)
}

pub(super) fn random_choice(
    var: &str,
    choices: &[Value],
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    let Some(choice) = choices.choose(&mut rand::thread_rng()).cloned() else {
        ctx.output.push("Error in random_choice: empty choices".to_string());
        return Ok(Outcome::Continue);
    };
    ctx.output.push(format!("Randomly chose {} = {}", var, display_value(&choice)));
    ctx.context.set_var(var, choice.clone());
    ctx.effects.var_writes.push((var.to_string(), choice));
    Ok(Outcome::Continue)
}

pub(super) fn import_var(
    var_name: &str,
    import_as: Option<&str>,
    scope: Option<&str>,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    let alias = import_as.unwrap_or(var_name).to_string();
    let (source_type, source) = classify_scope(scope, ctx);

    ctx.registry.register_import(
        var_name,
        ctx.dest,
        &alias,
        source_type,
        &source,
        ctx.now,
    );
    ctx.effects.imports_requested.push(ImportRequest {
        var_name: var_name.to_string(),
        alias: alias.clone(),
        source_type,
        source: source.clone(),
    });
    ctx.output.push(format!("Imported {} from {} as {}", var_name, source, alias));
    Ok(Outcome::Continue)
}

pub(super) fn export_var(
    var_name: &str,
    friendly_name: Option<String>,
    scope: Option<&str>,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    let scope = match scope {
        None | Some("global") => ExportScope::Global,
        Some(group) => ExportScope::Group(group.to_string()),
    };
    ctx.registry.register_export(var_name, ctx.dest, friendly_name, scope.clone(), ctx.now);

    // Existing importers see the current value right away
    if let Some(current) = ctx.context.var(var_name).cloned() {
        ctx.effects.var_writes.push((var_name.to_string(), current));
    }
    let scope_name = match &scope {
        ExportScope::Global => "global".to_string(),
        ExportScope::Group(group) => group.clone(),
    };
    ctx.output.push(format!("Exported {} to {}", var_name, scope_name));
    Ok(Outcome::Continue)
}

/// Resolve a scope string into an import source.
fn classify_scope(scope: Option<&str>, ctx: &HandlerCtx<'_>) -> (ImportSourceType, String) {
    match scope {
        None | Some("global") => (ImportSourceType::Scope, "global".to_string()),
        Some(name) if ctx.collab.groups.is_group(name) => {
            (ImportSourceType::Group, name.to_string())
        }
        Some(dest) => (ImportSourceType::Destination, dest.to_string()),
    }
}

fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
