// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Engine error kinds.
//!
//! No error within a single destination may crash or halt any other
//! destination's loop, the event store, or the variable registry; handler
//! and collaborator failures are logged and the loop continues.

use marquee_core::{DestinationId, RunState};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed schedule or instruction; surfaced to the caller of
    /// load-schedule, never to a running loop.
    #[error(transparent)]
    Validation(#[from] marquee_schedule::ScheduleError),

    /// Operation conflicts with the destination's current lifecycle state.
    #[error("destination {dest} is {state}: {operation} refused")]
    StateConflict {
        dest: DestinationId,
        state: RunState,
        operation: &'static str,
    },

    /// No schedule loaded for the destination.
    #[error("destination {0} has no schedule loaded")]
    NoSchedule(DestinationId),

    /// The active schedule vetoes unloading.
    #[error("destination {0}: active schedule sets prevent_unload")]
    UnloadPrevented(DestinationId),

    /// Unknown throw scope (not a destination, group, or "global").
    #[error("unknown event scope: {0:?}")]
    UnknownScope(String),

    /// Unparsable duration field (TTL, delay).
    #[error("invalid duration: {0:?}")]
    BadDuration(String),

    /// Disk write failed; in-memory state remains authoritative.
    #[error(transparent)]
    Persistence(#[from] marquee_storage::StorageError),
}

/// Failure inside one instruction handler. The failing instruction is
/// skipped; the loop continues.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid instruction argument: {0}")]
    BadArgument(String),
    #[error("instruction no longer valid after template rendering: {0}")]
    Rendering(#[from] serde_json::Error),
}
