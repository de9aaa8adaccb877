// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Media and device instructions: `generate`, `animate`, `display`,
//! `publish`, `purge`, `device_*`.
//!
//! All of these delegate to external collaborators. None suspend the
//! scheduler: a failure is logged into the destination's output and the
//! loop runs the next instruction.

use super::{push_history, HandlerCtx, Outcome};
use crate::error::HandlerError;
use marquee_adapters::{AnimateRequest, GenerateRequest, PublishOptions};
use marquee_core::DestinationId;
use marquee_schedule::instruction::{AnimateInput, GenerateInput};
use serde_json::json;

pub(super) async fn generate(
    input: Option<&GenerateInput>,
    refiner: Option<String>,
    workflow: Option<String>,
    targets: Option<&[String]>,
    history_var: Option<&str>,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    let prompt = input.and_then(|i| i.prompt.clone()).unwrap_or_default();
    if prompt.is_empty() {
        ctx.output.push("Error in generate: no prompt".to_string());
        return Ok(Outcome::Continue);
    }
    // None means "publish here"; an explicit empty list means generate only
    let targets: Vec<DestinationId> = match targets {
        None => vec![ctx.dest.clone()],
        Some(list) => list.iter().map(DestinationId::from).collect(),
    };

    let request = GenerateRequest {
        prompt: prompt.clone(),
        images: input.map(|i| i.images.clone()).unwrap_or_default(),
        refiner,
        workflow,
        targets,
        extra: None,
    };
    match ctx.collab.generator.generate(&request).await {
        Ok(results) => {
            let first = results.first();
            let image_url = first
                .and_then(|r| r.published_path.clone())
                .or_else(|| first.map(|r| r.message.clone()));
            if let Some(history_var) = history_var {
                push_history(
                    ctx.context,
                    history_var,
                    json!({
                        "timestamp": ctx.now.to_rfc3339(),
                        "type": "generation",
                        "prompt": prompt,
                        "image_url": image_url,
                    }),
                );
            }
            ctx.output.push(format!("Generated from prompt ({} result(s))", results.len()));
        }
        Err(e) => ctx.output.push(format!("Error in generate: {}", e)),
    }
    Ok(Outcome::Continue)
}

pub(super) async fn animate(
    input: Option<&AnimateInput>,
    history_var: Option<&str>,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    let request = AnimateRequest {
        prompt: input.and_then(|i| i.prompt.clone()),
        image_path: input.and_then(|i| i.image_path.clone()),
        target: Some(ctx.dest.clone()),
    };
    match ctx.collab.animator.animate(&request).await {
        Ok(result) => {
            if let Some(history_var) = history_var {
                push_history(
                    ctx.context,
                    history_var,
                    json!({
                        "timestamp": ctx.now.to_rfc3339(),
                        "type": "animation",
                        "prompt": request.prompt,
                        "image_path": request.image_path,
                        "animation_id": result.animation_id,
                    }),
                );
            }
            ctx.output.push("Animation started".to_string());
        }
        Err(e) => ctx.output.push(format!("Error in animate: {}", e)),
    }
    Ok(Outcome::Continue)
}

pub(super) async fn display(
    show: &str,
    silent: bool,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    match ctx.collab.display.show(ctx.dest, show, silent).await {
        Ok(()) => ctx.output.push(format!("Display set to {}", show)),
        Err(e) => ctx.output.push(format!("Error in display: {}", e)),
    }
    Ok(Outcome::Continue)
}

pub(super) async fn publish(
    source: Option<&str>,
    targets: Option<&[String]>,
    silent: bool,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    let Some(source) = source else {
        ctx.output.push("Error in publish: no source".to_string());
        return Ok(Outcome::Continue);
    };
    let targets: Vec<DestinationId> = match targets {
        None => vec![ctx.dest.clone()],
        Some(list) => list.iter().map(DestinationId::from).collect(),
    };
    let options = PublishOptions { silent, ..PublishOptions::default() };
    for target in &targets {
        match ctx.collab.publisher.publish(source, target, &options).await {
            Ok(result) if result.success => {
                ctx.output.push(format!("Published {} to {}", source, target));
            }
            Ok(_) => ctx.output.push(format!("Publish of {} to {} refused", source, target)),
            Err(e) => ctx.output.push(format!("Error in publish to {}: {}", target, e)),
        }
    }
    Ok(Outcome::Continue)
}

pub(super) async fn purge(
    days: Option<f64>,
    ctx: &mut HandlerCtx<'_>,
) -> Result<Outcome, HandlerError> {
    let Some(days) = days else {
        ctx.output.push("Error in purge: no days given".to_string());
        return Ok(Outcome::Continue);
    };
    match ctx.collab.publisher.purge(ctx.dest, days).await {
        Ok(()) => ctx.output.push(format!("Purged entries older than {} day(s)", days)),
        Err(e) => ctx.output.push(format!("Error in purge: {}", e)),
    }
    Ok(Outcome::Continue)
}

pub(super) async fn device(
    ctx: &mut HandlerCtx<'_>,
    command: &str,
) -> Result<Outcome, HandlerError> {
    let result = match command {
        "wake" => ctx.collab.device.wake(ctx.dest).await,
        "sleep" => ctx.collab.device.sleep(ctx.dest).await,
        "standby" => ctx.collab.device.standby(ctx.dest).await,
        _ => ctx.collab.device.sync_media(ctx.dest).await,
    };
    match result {
        Ok(()) => {
            let line = match command {
                "wake" => "Waking device".to_string(),
                "sleep" => "Putting device to sleep".to_string(),
                "standby" => "Putting device into standby".to_string(),
                _ => "Syncing device media".to_string(),
            };
            ctx.output.push(line);
        }
        Err(e) => ctx.output.push(format!("Error in device {}: {}", command, e)),
    }
    Ok(Outcome::Continue)
}
