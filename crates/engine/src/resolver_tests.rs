// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use crate::events::ThrowSpec;
use chrono::TimeZone;
use marquee_adapters::StaticGroups;
use marquee_core::DestinationsConfig;
use serde_json::json;

fn dest() -> DestinationId {
    DestinationId::new("test-dest")
}

fn groups() -> StaticGroups {
    StaticGroups::new(
        DestinationsConfig::from_toml_str("[[destination]]\nid = \"test-dest\"\n").unwrap(),
    )
}

/// 2025-01-01 is a Wednesday.
fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 1, h, m, s).unwrap()
}

fn schedule(doc: serde_json::Value) -> Schedule {
    marquee_schedule::parse_schedule(&doc).unwrap()
}

struct Fixture {
    schedule: Schedule,
    exec_log: HashMap<String, DateTime<Utc>>,
    pending: Vec<TriggerHitRecord>,
    events: EventStore,
}

impl Fixture {
    fn new(doc: serde_json::Value) -> Self {
        Self {
            schedule: schedule(doc),
            exec_log: HashMap::new(),
            pending: Vec::new(),
            events: EventStore::new(),
        }
    }

    fn resolve(&mut self, now: DateTime<Utc>, include_initial: bool, grace: bool) -> Vec<TriggerHit> {
        resolve_schedule(ResolveInputs {
            schedule: &self.schedule,
            now,
            dest: &dest(),
            include_initial,
            apply_grace_period: grace,
            exec_log: &mut self.exec_log,
            pending_important: &mut self.pending,
            events: &self.events,
        })
    }
}

fn repeating_doc(every: &str) -> serde_json::Value {
    json!({
        "triggers": [{
            "type": "day_of_week",
            "days": ["Wednesday"],
            "scheduled_actions": [{
                "time": "08:00",
                "repeat_schedule": {"every": every, "until": "23:00"},
                "trigger_actions": {
                    "instructions_block": [{"action": "set_var", "var": "c", "input": {"value": 1}}]
                }
            }]
        }]
    })
}

// =============================================================================
// initial / final
// =============================================================================

#[test]
fn initial_actions_emitted_once_when_requested() {
    let mut fx = Fixture::new(json!({
        "initial_actions": [{"action": "set_var", "var": "a", "input": {"value": 1}}],
        "triggers": []
    }));
    let hits = fx.resolve(at(8, 0, 0), true, true);
    assert!(hits.iter().any(|h| h.source == HitSource::Initial));

    let hits = fx.resolve(at(8, 0, 2), false, false);
    assert!(hits.iter().all(|h| h.source != HitSource::Initial));
}

#[test]
fn final_actions_emitted_when_no_trigger_fires() {
    let mut fx = Fixture::new(json!({
        "triggers": [],
        "final_actions": [{"action": "set_var", "var": "b", "input": {"value": 2}}]
    }));
    let hits = fx.resolve(at(9, 0, 0), false, false);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source, HitSource::Final);
    assert!(!hits[0].urgent);
    assert!(!hits[0].important);
}

#[test]
fn final_actions_suppressed_when_a_trigger_fires() {
    let mut doc = repeating_doc("1");
    doc["final_actions"] = json!([{"action": "unload"}]);
    let mut fx = Fixture::new(doc);
    let hits = fx.resolve(at(8, 0, 1), false, true);
    assert!(hits.iter().any(|h| h.source == HitSource::DayOfWeek));
    assert!(hits.iter().all(|h| h.source != HitSource::Final));
}

#[test]
fn no_final_actions_means_quiet_tick() {
    let mut fx = Fixture::new(repeating_doc("1"));
    // Sunday — day does not match; no final actions defined
    let sunday = Utc.with_ymd_and_hms(2025, 1, 5, 8, 0, 0).unwrap();
    assert!(fx.resolve(sunday, false, false).is_empty());
}

// =============================================================================
// time-schedule matching
// =============================================================================

#[test]
fn fires_once_per_interval() {
    let mut fx = Fixture::new(repeating_doc("1"));
    // First tick, shortly after 08:00
    assert_eq!(fx.resolve(at(8, 0, 5), false, true).len(), 1);
    // Same minute again: candidate already recorded
    assert!(fx.resolve(at(8, 0, 55), false, false).is_empty());
    // Next interval
    assert_eq!(fx.resolve(at(8, 1, 5), false, false).len(), 1);
}

#[test]
fn fractional_interval_repeats_every_thirty_seconds() {
    let mut fx = Fixture::new(repeating_doc("0.5"));
    assert_eq!(fx.resolve(at(8, 0, 0), false, true).len(), 1);
    assert!(fx.resolve(at(8, 0, 10), false, false).is_empty());
    assert!(fx.resolve(at(8, 0, 20), false, false).is_empty());
    assert_eq!(fx.resolve(at(8, 0, 30), false, false).len(), 1);
    assert!(fx.resolve(at(8, 0, 40), false, false).is_empty());
    assert!(fx.resolve(at(8, 0, 50), false, false).is_empty());
    assert_eq!(fx.resolve(at(8, 1, 0), false, false).len(), 1);
    assert_eq!(fx.resolve(at(8, 1, 30), false, false).len(), 1);
}

#[test]
fn grace_window_catches_missed_candidate_once() {
    let mut fx = Fixture::new(json!({
        "triggers": [{
            "type": "day_of_week",
            "days": ["Wednesday"],
            "scheduled_actions": [{
                "time": "08:00",
                "trigger_actions": {"instructions_block": [{"action": "device_wake"}]}
            }]
        }]
    }));
    // Candidate was 3 minutes ago; first tick with grace fires it
    assert_eq!(fx.resolve(at(8, 3, 0), false, true).len(), 1);

    // A reload without grace does not re-fire (fresh log, but window too small)
    let mut fx2 = Fixture::new(repeating_doc("1"));
    fx2.schedule = fx.schedule.clone();
    assert!(fx2.resolve(at(8, 3, 0), false, false).is_empty());
}

#[test]
fn before_base_time_nothing_fires() {
    let mut fx = Fixture::new(repeating_doc("1"));
    assert!(fx.resolve(at(7, 59, 0), false, true).is_empty());
}

#[test]
fn until_bound_caps_candidates() {
    let mut fx = Fixture::new(json!({
        "triggers": [{
            "type": "day_of_week",
            "days": ["Wednesday"],
            "scheduled_actions": [{
                "time": "08:00",
                "repeat_schedule": {"every": "1", "until": "09:00"},
                "trigger_actions": {"instructions_block": [{"action": "device_wake"}]}
            }]
        }]
    }));
    // Past the bound: latest candidate clamps to 09:00, outside the match
    // window by 10:00
    assert!(fx.resolve(at(10, 0, 0), false, false).is_empty());
    // Clamped candidate fires within the grace window shortly after the bound
    assert_eq!(fx.resolve(at(9, 0, 30), false, true).len(), 1);
}

#[test]
fn date_trigger_fires_on_matching_day() {
    let doc = json!({
        "triggers": [{
            "type": "date",
            "date": "1-Jan",
            "scheduled_actions": [{
                "time": "08:00",
                "trigger_actions": {"instructions_block": [{"action": "device_wake"}]}
            }]
        }]
    });
    let mut fx = Fixture::new(doc);
    assert_eq!(fx.resolve(at(8, 0, 1), false, true).len(), 1);

    let mut fx = Fixture::new(json!({
        "triggers": [{
            "type": "date",
            "date": "25-Dec",
            "scheduled_actions": [{
                "time": "08:00",
                "trigger_actions": {"instructions_block": [{"action": "device_wake"}]}
            }]
        }]
    }));
    assert!(fx.resolve(at(8, 0, 1), false, true).is_empty());
}

#[test]
fn date_and_day_of_week_evaluate_independently() {
    let mut fx = Fixture::new(json!({
        "triggers": [
            {
                "type": "date",
                "date": "1-Jan",
                "scheduled_actions": [{
                    "time": "08:00",
                    "trigger_actions": {"instructions_block": [{"action": "device_wake"}]}
                }]
            },
            {
                "type": "day_of_week",
                "days": ["Wednesday"],
                "scheduled_actions": [{
                    "time": "08:00",
                    "trigger_actions": {"instructions_block": [{"action": "device_standby"}]}
                }]
            }
        ]
    }));
    let hits = fx.resolve(at(8, 0, 1), false, true);
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().any(|h| h.source == HitSource::Date));
    assert!(hits.iter().any(|h| h.source == HitSource::DayOfWeek));
}

#[test]
fn restart_safe_dedup_via_exec_log() {
    let mut fx = Fixture::new(repeating_doc("1"));
    assert_eq!(fx.resolve(at(8, 0, 5), false, true).len(), 1);

    // Simulate restart: same log survives, grace applies again
    let log = fx.exec_log.clone();
    let mut fx2 = Fixture::new(repeating_doc("1"));
    fx2.exec_log = log;
    assert!(fx2.resolve(at(8, 0, 30), false, true).is_empty());
}

#[test]
fn exec_log_pruning() {
    let mut log = HashMap::new();
    log.insert("old".to_string(), at(8, 0, 0) - Duration::hours(72));
    log.insert("fresh".to_string(), at(8, 0, 0));
    prune_exec_log(&mut log, at(8, 0, 0));
    assert!(log.contains_key("fresh"));
    assert!(!log.contains_key("old"));
}

// =============================================================================
// event triggers
// =============================================================================

fn event_doc() -> serde_json::Value {
    json!({
        "triggers": [{
            "type": "event",
            "value": "poke",
            "urgent": true,
            "trigger_actions": {
                "instructions_block": [{"action": "set_var", "var": "hit", "input": {"value": 1}}]
            }
        }]
    })
}

#[test]
fn event_trigger_consumes_and_binds_payload() {
    let mut fx = Fixture::new(event_doc());
    fx.events
        .throw(
            "test-dest",
            ThrowSpec {
                key: "poke".to_string(),
                payload: Some(json!({"who": "ada"})),
                ..ThrowSpec::default()
            },
            at(8, 0, 0),
            &groups(),
        )
        .unwrap();

    let hits = fx.resolve(at(8, 0, 1), false, false);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].source, HitSource::Event("poke".to_string()));
    assert!(hits[0].urgent);
    assert_eq!(hits[0].event_payload.as_ref().unwrap()["who"], "ada");

    // Consumed: a second resolve finds nothing (and falls through to final,
    // of which there is none)
    assert!(fx.resolve(at(8, 0, 3), false, false).is_empty());
}

#[test]
fn event_trigger_inherits_flags_from_trigger_actions_first() {
    let mut fx = Fixture::new(json!({
        "triggers": [{
            "type": "event",
            "value": "poke",
            "urgent": true,
            "trigger_actions": {
                "instructions_block": [{"action": "device_wake"}],
                "urgent": false,
                "important": true
            }
        }]
    }));
    fx.events
        .throw("test-dest", ThrowSpec { key: "poke".into(), ..ThrowSpec::default() }, at(8, 0, 0), &groups())
        .unwrap();
    let hits = fx.resolve(at(8, 0, 1), false, false);
    // trigger_actions.urgent=false overrides the trigger's urgent=true
    assert!(!hits[0].urgent);
    assert!(hits[0].important);
}

// =============================================================================
// pending important triggers
// =============================================================================

#[test]
fn pending_important_returned_first() {
    let mut fx = Fixture::new(repeating_doc("1"));
    fx.pending.push(TriggerHitRecord {
        instructions: vec![json!({"action": "set_var", "var": "p", "input": {"value": 1}})],
        urgent: false,
        important: true,
        source: "day_of_week".to_string(),
        recorded_at: at(7, 59, 0),
    });

    let hits = fx.resolve(at(8, 0, 1), false, true);
    assert_eq!(hits[0].source, HitSource::ImportantPending);
    assert!(hits[0].important);
    // Drained
    assert!(fx.pending.is_empty());
}

#[test]
fn unreadable_pending_instructions_are_dropped() {
    let mut fx = Fixture::new(json!({"triggers": []}));
    fx.pending.push(TriggerHitRecord {
        instructions: vec![json!({"action": "frobnicate"})],
        urgent: false,
        important: true,
        source: "event".to_string(),
        recorded_at: at(7, 59, 0),
    });
    let hits = fx.resolve(at(8, 0, 0), false, false);
    assert!(hits.iter().all(|h| h.source != HitSource::ImportantPending));
}
