// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cross-component invariant checks.

use super::prelude::*;
use marquee_storage::StateStore;

/// Schedule and context stacks stay at equal depth through load, override,
/// unload, and stop.
#[tokio::test]
async fn stacks_stay_in_lockstep() {
    let h = Harness::new();
    let d = h.dest("d1");

    let base = json!({"triggers": []});
    let overlay = json!({
        "initial_actions": [{"action": "unload"}],
        "triggers": []
    });

    h.scheduler.load_schedule(&d, &base).await.unwrap();
    h.scheduler.load_schedule(&d, &overlay).await.unwrap();
    h.scheduler.start(&d).await.unwrap();

    let snapshot = h.scheduler.state_snapshot(&d).await;
    assert_eq!(snapshot.schedule_stack.len(), 2);
    assert_eq!(snapshot.schedule_stack.len(), snapshot.context_stack.len());

    // Unload pops both together
    h.scheduler.tick(&d).await;
    let snapshot = h.scheduler.state_snapshot(&d).await;
    assert_eq!(snapshot.schedule_stack.len(), 1);
    assert_eq!(snapshot.schedule_stack.len(), snapshot.context_stack.len());

    h.scheduler.stop(&d).await;
    let snapshot = h.scheduler.state_snapshot(&d).await;
    assert_eq!(snapshot.schedule_stack.len(), snapshot.context_stack.len());
}

/// The persisted snapshot matches the in-memory state after every
/// state-changing operation.
#[tokio::test]
async fn disk_and_memory_stay_in_sync() {
    let h = Harness::new();
    let d = h.dest("d1");
    h.scheduler
        .load_schedule(
            &d,
            &json!({
                "initial_actions": [{"action": "set_var", "var": "a", "input": {"value": 1}}],
                "triggers": [{
                    "type": "event",
                    "value": "k",
                    "trigger_actions": {"instructions_block": []}
                }]
            }),
        )
        .await
        .unwrap();
    h.scheduler.start(&d).await.unwrap();
    h.scheduler.tick(&d).await;

    let store = StateStore::open(h.dir.path()).unwrap();
    let on_disk = store.load(&d).unwrap();
    let in_memory = h.scheduler.state_snapshot(&d).await;
    assert_eq!(on_disk, in_memory);

    // Pause persists immediately too
    h.scheduler.pause(&d).await.unwrap();
    let on_disk = store.load(&d).unwrap();
    assert_eq!(on_disk.state, RunState::Paused);
}

/// Every active event satisfies `active_from ≤ expires`, and history stays
/// within its bound while the runtime churns.
#[tokio::test]
async fn event_invariants_under_load() {
    let h = Harness::new();
    let d = h.dest("d1");
    h.scheduler
        .load_schedule(
            &d,
            &json!({
                "triggers": [{
                    "type": "event",
                    "value": "churn",
                    "trigger_actions": {
                        "instructions_block": [{
                            "action": "set_var",
                            "var": "n",
                            "input": {"value": "{{ n|default(0) + 1 }}"}
                        }]
                    }
                }]
            }),
        )
        .await
        .unwrap();
    h.scheduler.start(&d).await.unwrap();

    for _ in 0..120 {
        h.scheduler
            .throw_event("d1", ThrowSpec { key: "churn".into(), ttl: Some(json!("30s")), ..ThrowSpec::default() })
            .await
            .unwrap();
        h.step(&d).await;

        let snapshot = h.scheduler.state_snapshot(&d).await;
        for entries in snapshot.events_active.values() {
            for entry in entries {
                assert!(entry.active_from <= entry.expires);
                assert_eq!(entry.status, marquee_core::EventStatus::Active);
            }
        }
        assert!(snapshot.events_history.len() <= marquee_core::MAX_EVENT_HISTORY);
    }
}

/// An interval candidate never executes twice, even across a restart.
#[tokio::test]
async fn trigger_execution_log_survives_restart() {
    let h = Harness::at(Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 5).unwrap());
    let d = h.dest("d1");
    let schedule = json!({
        "triggers": [{
            "type": "day_of_week",
            "days": ["Wednesday"],
            "scheduled_actions": [{
                "time": "08:00",
                "repeat_schedule": {"every": "5"},
                "trigger_actions": {
                    "instructions_block": [{
                        "action": "set_var",
                        "var": "n",
                        "input": {"value": "{{ n|default(0) + 1 }}"}
                    }]
                }
            }]
        }]
    });
    h.scheduler.load_schedule(&d, &schedule).await.unwrap();
    h.scheduler.start(&d).await.unwrap();
    h.scheduler.tick(&d).await;
    assert_eq!(h.vars(&d).await.get("n"), Some(&json!(1)));

    // Restart one minute later: the 08:00 candidate is in the grace window
    // but the execution log remembers it fired
    h.clock.advance(Duration::minutes(1));
    let h = h.reopen();
    h.scheduler.recover_all().await;
    let d = h.dest("d1");
    h.scheduler.tick(&d).await;
    h.step(&d).await;
    assert_eq!(h.vars(&d).await.get("n"), Some(&json!(1)));
}
