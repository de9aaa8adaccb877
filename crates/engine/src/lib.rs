// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! marquee-engine: the scheduler core.
//!
//! Drives a population of output destinations, each with an independent
//! cooperative loop executing a declarative schedule of triggers and
//! instructions. The engine guarantees *when*, *in what order*, and *with
//! what context* instructions run; what they ultimately do is delegated to
//! the collaborators in `marquee-adapters`.

pub mod error;
pub mod events;
pub mod handlers;
pub mod logring;
pub mod queue;
pub mod registry;
pub mod resolver;
pub mod runtime;

pub use error::{EngineError, HandlerError};
pub use events::{EventStore, ThrowReceipt, ThrowSpec};
pub use handlers::Outcome;
pub use logring::{LogLine, LogRing, LOG_RING_CAP};
pub use queue::{Entry, InstructionQueue};
pub use registry::{ExportScope, VariableRegistry};
pub use resolver::{resolve_schedule, HitSource, ResolveInputs, TriggerHit};
pub use runtime::{Scheduler, TickOutcome, EVENT_SWEEP_INTERVAL_SECS, TICK_INTERVAL_SECS};
