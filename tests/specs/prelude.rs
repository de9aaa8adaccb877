// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness for scheduler specs.

pub use chrono::{DateTime, Duration, TimeZone, Utc};
pub use marquee_core::{DestinationId, FakeClock, RunState};
pub use marquee_engine::{Scheduler, ThrowSpec, TickOutcome, TICK_INTERVAL_SECS};
pub use serde_json::json;

use marquee_adapters::Collaborators;
use marquee_core::DestinationsConfig;
use marquee_storage::StateStore;
use std::sync::Arc;
use tempfile::TempDir;

/// Three destinations in group `G`, plus a loner.
pub const CONFIG: &str = r#"
[[destination]]
id = "d1"
groups = ["G"]

[[destination]]
id = "d2"
groups = ["G"]

[[destination]]
id = "d3"
groups = ["G"]

[[destination]]
id = "solo"
"#;

pub struct Harness {
    pub scheduler: Arc<Scheduler<FakeClock>>,
    pub clock: FakeClock,
    pub dir: TempDir,
}

impl Harness {
    /// Fresh harness pinned to 2025-01-01 (a Wednesday) 08:00:00 UTC.
    pub fn new() -> Self {
        Self::at(Utc.with_ymd_and_hms(2025, 1, 1, 8, 0, 0).unwrap())
    }

    pub fn at(start: DateTime<Utc>) -> Self {
        let dir = TempDir::new().unwrap();
        let clock = FakeClock::at(start);
        let scheduler = Arc::new(Scheduler::new(
            StateStore::open(dir.path()).unwrap(),
            Collaborators::fake(DestinationsConfig::from_toml_str(CONFIG).unwrap()),
            clock.clone(),
        ));
        Self { scheduler, clock, dir }
    }

    /// Reopen over the same state dir, simulating a process restart.
    pub fn reopen(self) -> Self {
        let Harness { clock, dir, scheduler } = self;
        drop(scheduler);
        let scheduler = Arc::new(Scheduler::new(
            StateStore::open(dir.path()).unwrap(),
            Collaborators::fake(DestinationsConfig::from_toml_str(CONFIG).unwrap()),
            clock.clone(),
        ));
        Self { scheduler, clock, dir }
    }

    pub fn dest(&self, id: &str) -> DestinationId {
        DestinationId::new(id)
    }

    /// Advance past the trigger cadence and run one pass.
    pub async fn step(&self, dest: &DestinationId) -> TickOutcome {
        self.clock.advance(Duration::seconds(TICK_INTERVAL_SECS));
        self.scheduler.tick(dest).await
    }

    /// Tick (with cadence) until the destination stops.
    pub async fn run_until_stopped(&self, dest: &DestinationId, max_passes: usize) {
        for _ in 0..max_passes {
            if self.scheduler.run_state(dest).await == RunState::Stopped {
                return;
            }
            self.step(dest).await;
        }
        panic!("{dest} did not stop within {max_passes} passes");
    }

    pub async fn vars(&self, dest: &DestinationId) -> serde_json::Map<String, serde_json::Value> {
        self.scheduler.context_vars(dest).await
    }
}
