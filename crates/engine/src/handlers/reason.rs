// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The `reason` instruction: delegate to the LLM collaborator and bind its
//! outputs to context variables positionally.

use super::{push_history, HandlerCtx, Outcome};
use crate::error::HandlerError;
use marquee_adapters::{ReasonRequest, ReasonResponse};
use serde_json::{json, Value};

pub(super) async fn reason(
    reasoner: Option<&str>,
    text_input: Option<&str>,
    image_inputs: &[String],
    output_vars: &[String],
    history_var: Option<&str>,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    let reasoner = reasoner.unwrap_or("default");
    let text_input = text_input.unwrap_or_default().to_string();
    ctx.output.push(format!("Reasoning with '{}'", reasoner));

    let request = ReasonRequest {
        system_prompt: reasoner.to_string(),
        user_prompt: text_input.clone(),
        schema: output_schema(output_vars),
        images: (!image_inputs.is_empty()).then(|| image_inputs.to_vec()),
    };

    // Collaborator failure never propagates: the scheduler survives on a
    // synthesized fallback result.
    let response = match ctx.collab.reasoner.reason(&request).await {
        Ok(response) => response,
        Err(e) => {
            ctx.output.push(format!("Reasoner failed ({}); using fallback", e));
            ReasonResponse {
                outputs: Vec::new(),
                explanation: Some(format!("reasoner unavailable: {}", e)),
            }
        }
    };

    let mut bound = serde_json::Map::new();
    for (var, value) in output_vars.iter().zip(response.outputs.iter()) {
        ctx.context.set_var(var.clone(), Value::String(value.clone()));
        ctx.effects.var_writes.push((var.clone(), Value::String(value.clone())));
        bound.insert(var.clone(), Value::String(value.clone()));
        ctx.output.push(format!("Set {} to result", var));
    }

    if let Some(history_var) = history_var {
        push_history(
            ctx.context,
            history_var,
            json!({
                "timestamp": ctx.now.to_rfc3339(),
                "type": "reason",
                "reasoner": reasoner,
                "text_input": text_input,
                "outputs": Value::Object(bound),
                "explanation": response.explanation,
            }),
        );
    }

    ctx.output.push("Completed reasoning".to_string());
    Ok(Outcome::Continue)
}

fn output_schema(output_vars: &[String]) -> Value {
    json!({
        "type": "object",
        "properties": {
            "outputs": {
                "type": "array",
                "items": {"type": "string"},
                "minItems": output_vars.len(),
            },
            "explanation": {"type": "string"},
        },
        "required": ["outputs"],
    })
}
