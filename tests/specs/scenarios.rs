// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end scheduler scenarios.

use super::prelude::*;

/// Initial-only schedule: initial actions run, then the schedule falls
/// through to its final actions and stops, leaving the context readable.
#[tokio::test]
async fn initial_only_schedule_runs_both_blocks_and_stops() {
    let h = Harness::new();
    let d = h.dest("d1");
    h.scheduler
        .load_schedule(
            &d,
            &json!({
                "initial_actions": [{"action": "set_var", "var": "a", "input": {"value": 1}}],
                "triggers": [],
                "final_actions": [{"action": "set_var", "var": "b", "input": {"value": 2}}]
            }),
        )
        .await
        .unwrap();
    h.scheduler.start(&d).await.unwrap();

    h.run_until_stopped(&d, 10).await;
    let vars = h.vars(&d).await;
    assert_eq!(vars.get("a"), Some(&json!(1)));
    assert_eq!(vars.get("b"), Some(&json!(2)));
    assert_eq!(h.scheduler.run_state(&d).await, RunState::Stopped);
}

/// Repeating trigger with a templated counter: fires at 08:00 and 08:01 but
/// not in between.
#[tokio::test]
async fn repeating_trigger_counts_once_per_interval() {
    // Start at 08:00:05, five seconds past the first candidate
    let h = Harness::at(Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 5).unwrap());
    let d = h.dest("d1");
    h.scheduler
        .load_schedule(
            &d,
            &json!({
                "triggers": [{
                    "type": "day_of_week",
                    "days": ["Wednesday"],
                    "scheduled_actions": [{
                        "time": "08:00",
                        "repeat_schedule": {"every": "1"},
                        "trigger_actions": {
                            "instructions_block": [{
                                "action": "set_var",
                                "var": "c",
                                "input": {"value": "{{ c|default(0) + 1 }}"}
                            }]
                        }
                    }]
                }]
            }),
        )
        .await
        .unwrap();
    h.scheduler.start(&d).await.unwrap();

    // 08:00:05 — first candidate fires under the start grace window
    h.scheduler.tick(&d).await;
    assert_eq!(h.vars(&d).await.get("c"), Some(&json!(1)));

    // 08:00:55 — same interval, deduplicated
    h.clock.set(Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 55).unwrap());
    h.scheduler.tick(&d).await;
    assert_eq!(h.vars(&d).await.get("c"), Some(&json!(1)));

    // 08:01:05 — next interval
    h.clock.set(Utc.with_ymd_and_hms(2025, 1, 1, 8, 1, 5).unwrap());
    h.scheduler.tick(&d).await;
    assert_eq!(h.vars(&d).await.get("c"), Some(&json!(2)));
}

/// An urgent event interrupts an active wait in the same tick.
#[tokio::test]
async fn urgent_event_interrupts_wait() {
    let h = Harness::new();
    let d = h.dest("d1");
    h.scheduler
        .load_schedule(
            &d,
            &json!({
                "initial_actions": [{"action": "wait", "duration": "5m"}],
                "triggers": [{
                    "type": "event",
                    "value": "poke",
                    "urgent": true,
                    "trigger_actions": {
                        "instructions_block": [{"action": "set_var", "var": "hit", "input": {"value": 1}}]
                    }
                }]
            }),
        )
        .await
        .unwrap();
    h.scheduler.start(&d).await.unwrap();

    // First pass arms the wait
    assert_eq!(h.scheduler.tick(&d).await, TickOutcome::Waiting);

    // One second later the poke arrives
    h.clock.advance(Duration::seconds(1));
    h.scheduler
        .throw_event("d1", ThrowSpec { key: "poke".into(), ttl: Some(json!("60s")), ..ThrowSpec::default() })
        .await
        .unwrap();

    // Within the next tick the urgent block runs and the wait is gone
    h.step(&d).await;
    let vars = h.vars(&d).await;
    assert_eq!(vars.get("hit"), Some(&json!(1)));
    let snapshot = h.scheduler.state_snapshot(&d).await;
    assert!(snapshot.top_context().unwrap().wait_until.is_none());
}

/// Single-consumer fan-out: exactly one of the three group members ever
/// observes the event.
#[tokio::test]
async fn single_consumer_fanout_hits_exactly_once() {
    let h = Harness::new();
    let schedule = json!({
        "triggers": [{
            "type": "event",
            "value": "k",
            "trigger_actions": {
                "instructions_block": [{"action": "set_var", "var": "hit", "input": {"value": 1}}]
            }
        }]
    });
    for id in ["d1", "d2", "d3"] {
        let d = h.dest(id);
        h.scheduler.load_schedule(&d, &schedule).await.unwrap();
        h.scheduler.start(&d).await.unwrap();
    }

    h.scheduler
        .throw_event(
            "G",
            ThrowSpec {
                key: "k".into(),
                ttl: Some(json!("300s")),
                single_consumer: true,
                ..ThrowSpec::default()
            },
        )
        .await
        .unwrap();

    // Run several passes on every destination, interleaved
    for _ in 0..4 {
        for id in ["d1", "d2", "d3"] {
            h.step(&h.dest(id)).await;
        }
    }

    let mut hits = 0;
    for id in ["d1", "d2", "d3"] {
        if h.vars(&h.dest(id)).await.get("hit") == Some(&json!(1)) {
            hits += 1;
        }
    }
    assert_eq!(hits, 1, "exactly one destination may consume a single-consumer event");
}

/// Exported variable propagation: the importer sees the owner's later
/// assignments.
#[tokio::test]
async fn exported_variable_propagates_to_importer() {
    let h = Harness::new();
    let d1 = h.dest("d1");
    let d2 = h.dest("d2");

    h.scheduler
        .load_schedule(
            &d1,
            &json!({
                "initial_actions": [
                    {"action": "set_var", "var": "x", "input": {"value": 7}},
                    {"action": "export_var", "var_name": "x"}
                ],
                "triggers": [{
                    "type": "event",
                    "value": "bump",
                    "trigger_actions": {
                        "instructions_block": [{"action": "set_var", "var": "x", "input": {"value": 9}}]
                    }
                }]
            }),
        )
        .await
        .unwrap();
    h.scheduler
        .load_schedule(
            &d2,
            &json!({
                "initial_actions": [{"action": "import_var", "var_name": "x"}],
                "triggers": [{
                    "type": "event",
                    "value": "nothing",
                    "trigger_actions": {"instructions_block": []}
                }]
            }),
        )
        .await
        .unwrap();
    h.scheduler.start(&d1).await.unwrap();
    h.scheduler.start(&d2).await.unwrap();

    // d1 sets and exports; d2 imports and reads the current value
    h.scheduler.tick(&d1).await;
    h.step(&d1).await;
    h.scheduler.tick(&d2).await;
    assert_eq!(h.vars(&d2).await.get("x"), Some(&json!(7)));

    // d1 reassigns; the registry pushes the new value into d2's context
    h.scheduler
        .throw_event("d1", ThrowSpec { key: "bump".into(), ttl: Some(json!("300s")), ..ThrowSpec::default() })
        .await
        .unwrap();
    h.step(&d1).await;
    assert_eq!(h.vars(&d1).await.get("x"), Some(&json!(9)));
    assert_eq!(h.vars(&d2).await.get("x"), Some(&json!(9)));
}

/// Restart preserves a paused destination: stacks intact, still paused, and
/// no initial actions replayed.
#[tokio::test]
async fn restart_preserves_paused_destination() {
    let h = Harness::new();
    let d = h.dest("d1");
    h.scheduler
        .load_schedule(
            &d,
            &json!({
                "initial_actions": [{"action": "set_var", "var": "runs", "input": {"value": "{{ runs|default(0) + 1 }}"}}],
                "triggers": []
            }),
        )
        .await
        .unwrap();
    h.scheduler.start(&d).await.unwrap();
    h.scheduler.tick(&d).await;
    assert_eq!(h.vars(&d).await.get("runs"), Some(&json!(1)));
    h.scheduler.pause(&d).await.unwrap();

    // Kill the process; recover from disk
    let h = h.reopen();
    let recovered = h.scheduler.recover_all().await;
    assert_eq!(recovered, vec![h.dest("d1")]);

    let d = h.dest("d1");
    assert_eq!(h.scheduler.run_state(&d).await, RunState::Paused);
    let snapshot = h.scheduler.state_snapshot(&d).await;
    assert_eq!(snapshot.stack_depth(), 1);
    assert_eq!(snapshot.top_context().unwrap().var("runs"), Some(&json!(1)));

    // Paused means no work happens
    assert_eq!(h.step(&d).await, TickOutcome::Paused);

    // Unpausing continues without replaying initial actions
    h.scheduler.unpause(&d).await.unwrap();
    for _ in 0..3 {
        h.step(&d).await;
    }
    assert_eq!(h.vars(&d).await.get("runs"), Some(&json!(1)));
}

/// A delayed event is invisible until its activation time crosses now.
#[tokio::test]
async fn delayed_event_becomes_consumable_later() {
    let h = Harness::new();
    let d = h.dest("d1");
    h.scheduler
        .load_schedule(
            &d,
            &json!({
                "triggers": [{
                    "type": "event",
                    "value": "later",
                    "trigger_actions": {
                        "instructions_block": [{"action": "set_var", "var": "seen", "input": {"value": 1}}]
                    }
                }]
            }),
        )
        .await
        .unwrap();
    h.scheduler.start(&d).await.unwrap();
    h.scheduler
        .throw_event(
            "d1",
            ThrowSpec {
                key: "later".into(),
                delay: Some(json!("5s")),
                ttl: Some(json!("300s")),
                ..ThrowSpec::default()
            },
        )
        .await
        .unwrap();

    // Not yet active
    h.scheduler.tick(&d).await;
    assert!(h.vars(&d).await.get("seen").is_none());

    // After the delay it is consumed
    h.clock.advance(Duration::seconds(6));
    h.scheduler.tick(&d).await;
    h.step(&d).await;
    assert_eq!(h.vars(&d).await.get("seen"), Some(&json!(1)));
}
