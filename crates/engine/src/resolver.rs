// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Trigger resolution.
//!
//! Maps (schedule, now, context, event store) to an ordered list of
//! instruction blocks with urgency flags. Time-schedule matching enumerates
//! candidate times (`T, T+every, …` up to `until` or end-of-day) and fires a
//! candidate at most once, deduplicated through the per-destination
//! execution log keyed by a stable hash of the scheduled action plus the
//! candidate time. The hash key makes the dedup restart-safe.

use crate::events::EventStore;
use chrono::{DateTime, Duration, NaiveTime, Utc};
use marquee_core::{DestinationId, TriggerHitRecord};
use marquee_schedule::{
    time as caltime, validate, Instruction, Schedule, ScheduledAction, Trigger, TriggerActions,
};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

/// Catch-up window applied on the first evaluation after scheduler start.
pub const GRACE_WINDOW_MINUTES: i64 = 5;

/// Window for ordinary ticks; wide enough that a candidate falling between
/// ticks still fires, narrow enough that stale candidates do not.
pub const MATCH_WINDOW_SECONDS: i64 = 60;

/// Execution-log entries older than this are pruned.
pub const EXEC_LOG_RETENTION_HOURS: i64 = 48;

/// Where a hit came from.
#[derive(Debug, Clone, PartialEq)]
pub enum HitSource {
    ImportantPending,
    Initial,
    Date,
    DayOfWeek,
    Event(String),
    Final,
}

/// One resolved instruction block.
#[derive(Debug, Clone)]
pub struct TriggerHit {
    pub instructions: Vec<Instruction>,
    pub urgent: bool,
    pub important: bool,
    pub source: HitSource,
    /// Payload of the consumed event for [`HitSource::Event`] hits.
    pub event_payload: Option<Value>,
}

/// Inputs to one resolution pass.
pub struct ResolveInputs<'a> {
    pub schedule: &'a Schedule,
    pub now: DateTime<Utc>,
    pub dest: &'a DestinationId,
    pub include_initial: bool,
    pub apply_grace_period: bool,
    pub exec_log: &'a mut HashMap<String, DateTime<Utc>>,
    pub pending_important: &'a mut Vec<TriggerHitRecord>,
    pub events: &'a EventStore,
}

/// Resolve the schedule against the current instant.
pub fn resolve_schedule(inputs: ResolveInputs<'_>) -> Vec<TriggerHit> {
    let ResolveInputs {
        schedule,
        now,
        dest,
        include_initial,
        apply_grace_period,
        exec_log,
        pending_important,
        events,
    } = inputs;

    let mut hits = Vec::new();

    // 1. Important triggers recorded in a past cycle run first.
    for record in pending_important.drain(..) {
        let instructions: Vec<Instruction> = record
            .instructions
            .iter()
            .filter_map(|doc| match serde_json::from_value(doc.clone()) {
                Ok(instruction) => Some(instruction),
                Err(e) => {
                    tracing::warn!(%dest, error = %e, "dropping unreadable pending instruction");
                    None
                }
            })
            .collect();
        if instructions.is_empty() {
            continue;
        }
        hits.push(TriggerHit {
            instructions,
            urgent: record.urgent,
            important: true,
            source: HitSource::ImportantPending,
            event_payload: None,
        });
    }

    // 2. Initial actions, once, at start.
    if include_initial {
        if let Some(initial) = &schedule.initial_actions {
            if !initial.is_empty() {
                hits.push(TriggerHit {
                    instructions: initial.instructions().to_vec(),
                    urgent: initial.urgent(),
                    important: initial.important(),
                    source: HitSource::Initial,
                    event_payload: None,
                });
            }
        }
    }

    let mut fired_trigger = false;

    // 3. Date triggers on today's literal day-of-year.
    for trigger in &schedule.triggers {
        if let Trigger::Date { date, scheduled_actions, urgent, important } = trigger {
            let Ok(day) = caltime::parse_day_of_year(date) else { continue };
            if !day.matches(now.date_naive()) {
                continue;
            }
            let matched = process_time_schedules(
                scheduled_actions,
                now,
                apply_grace_period,
                exec_log,
                (*urgent, *important),
                HitSource::Date,
            );
            fired_trigger |= !matched.is_empty();
            hits.extend(matched);
        }
    }

    // 4. Day-of-week triggers, independently of date matches.
    for trigger in &schedule.triggers {
        if let Trigger::DayOfWeek { days, scheduled_actions, urgent, important } = trigger {
            use chrono::Datelike;
            let today = now.weekday();
            let matches_today = days
                .iter()
                .any(|name| caltime::parse_weekday(name).is_ok_and(|day| day == today));
            if !matches_today {
                continue;
            }
            let matched = process_time_schedules(
                scheduled_actions,
                now,
                apply_grace_period,
                exec_log,
                (*urgent, *important),
                HitSource::DayOfWeek,
            );
            fired_trigger |= !matched.is_empty();
            hits.extend(matched);
        }
    }

    // 5. Event triggers consume at most one matching event each.
    for trigger in &schedule.triggers {
        if let Trigger::Event { value, trigger_actions, urgent, important } = trigger {
            let Some(entry) = events.pop_next(dest, value, now) else { continue };
            let (urgent, important) = inherit_flags(trigger_actions, *urgent, *important);
            fired_trigger = true;
            hits.push(TriggerHit {
                instructions: trigger_actions.instructions_block.clone(),
                urgent,
                important,
                source: HitSource::Event(value.clone()),
                event_payload: entry.payload,
            });
        }
    }

    // 6. Nothing fired: fall through to final actions.
    if !fired_trigger {
        if let Some(final_actions) = &schedule.final_actions {
            if !final_actions.is_empty() {
                hits.push(TriggerHit {
                    instructions: final_actions.instructions().to_vec(),
                    urgent: false,
                    important: false,
                    source: HitSource::Final,
                    event_payload: None,
                });
            }
        }
    }

    hits
}

/// Evaluate time-anchored actions. A candidate fires when `now` falls inside
/// its window and the `(action, candidate)` pair has not been recorded in
/// the execution log.
pub fn process_time_schedules(
    actions: &[ScheduledAction],
    now: DateTime<Utc>,
    apply_grace_period: bool,
    exec_log: &mut HashMap<String, DateTime<Utc>>,
    trigger_flags: (Option<bool>, Option<bool>),
    source: HitSource,
) -> Vec<TriggerHit> {
    let window = if apply_grace_period {
        Duration::minutes(GRACE_WINDOW_MINUTES)
    } else {
        Duration::seconds(MATCH_WINDOW_SECONDS)
    };

    let mut hits = Vec::new();
    for action in actions {
        let Ok(base) = caltime::parse_hhmm(&action.time) else { continue };
        let Some(candidate) = latest_candidate(action, base, now, window) else { continue };

        let key = execution_key(action, candidate);
        if exec_log.contains_key(&key) {
            continue;
        }
        exec_log.insert(key, candidate);

        let (urgent, important) =
            inherit_flags(&action.trigger_actions, trigger_flags.0, trigger_flags.1);
        tracing::debug!(time = %action.time, %candidate, "scheduled action fired");
        hits.push(TriggerHit {
            instructions: action.trigger_actions.instructions_block.clone(),
            urgent,
            important,
            source: source.clone(),
            event_payload: None,
        });
    }
    hits
}

/// The latest candidate `≤ now` within `window`, respecting the repeat
/// interval and its `until` bound. Catch-up replays at most one candidate.
fn latest_candidate(
    action: &ScheduledAction,
    base: NaiveTime,
    now: DateTime<Utc>,
    window: Duration,
) -> Option<DateTime<Utc>> {
    let base_dt = now.date_naive().and_time(base).and_utc();
    if now < base_dt {
        return None;
    }

    let candidate = match &action.repeat_schedule {
        None => base_dt,
        Some(repeat) => {
            let every = validate::every_minutes(repeat).ok()?;
            let step_ms = (every * 60_000.0).round() as i64;
            if step_ms <= 0 {
                return None;
            }
            let elapsed_ms = (now - base_dt).num_milliseconds();
            let k = elapsed_ms / step_ms;
            let mut candidate = base_dt + Duration::milliseconds(k * step_ms);

            // Clamp to the `until` bound (inclusive)
            if let Some(until) = &repeat.until {
                let until_dt = now.date_naive().and_time(caltime::parse_hhmm(until).ok()?).and_utc();
                if candidate > until_dt {
                    let span_ms = (until_dt - base_dt).num_milliseconds();
                    let last_k = span_ms / step_ms;
                    candidate = base_dt + Duration::milliseconds(last_k * step_ms);
                }
            }
            candidate
        }
    };

    (now - candidate <= window).then_some(candidate)
}

/// Stable hash of the scheduled action's content plus the candidate time.
fn execution_key(action: &ScheduledAction, candidate: DateTime<Utc>) -> String {
    let mut hasher = Sha256::new();
    // Serialization of a ScheduledAction is deterministic (struct field order)
    if let Ok(doc) = serde_json::to_string(action) {
        hasher.update(doc.as_bytes());
    }
    hasher.update(candidate.to_rfc3339().as_bytes());
    let digest = hasher.finalize();
    digest.iter().map(|byte| format!("{:02x}", byte)).collect()
}

/// A sub-action inherits `urgent`/`important` from its own `trigger_actions`,
/// falling back to the enclosing trigger's flags.
fn inherit_flags(
    actions: &TriggerActions,
    trigger_urgent: Option<bool>,
    trigger_important: Option<bool>,
) -> (bool, bool) {
    (
        actions.urgent.or(trigger_urgent).unwrap_or(false),
        actions.important.or(trigger_important).unwrap_or(false),
    )
}

/// Drop execution-log entries old enough that their candidates can never
/// fire again.
pub fn prune_exec_log(exec_log: &mut HashMap<String, DateTime<Utc>>, now: DateTime<Utc>) {
    let cutoff = now - Duration::hours(EXEC_LOG_RETENTION_HOURS);
    exec_log.retain(|_, fired_at| *fired_at > cutoff);
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
