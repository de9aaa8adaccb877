// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Per-destination cooperative scheduler runtime.
//!
//! One loop per destination, each owning its lifecycle (running, paused,
//! stopped), tick cadence, wait-state, interruption, and cleanup. Loops do
//! not share mutable state; coordination goes through the event store, the
//! variable registry, and the persistence layer.
//!
//! A tick performs one pass: periodic event expiry, trigger evaluation at
//! the tick cadence, urgent internal-event polling, then popping and
//! executing at most one instruction.

use crate::events::{
    EventStore, ThrowSpec, ThrowReceipt, INTERNAL_EXIT_BLOCK, INTERNAL_TERMINATE,
    INTERNAL_TERMINATE_IMMEDIATE, URGENT_EVENT_KEYS,
};
use crate::handlers::{self, HandlerCtx, ImportRequest, Outcome, SideEffects};
use crate::logring::{LogLine, LogRing};
use crate::queue::InstructionQueue;
use crate::registry::{ExportScope, VariableRegistry};
use crate::resolver::{self, HitSource, ResolveInputs};
use crate::EngineError;
use chrono::{DateTime, Utc};
use marquee_adapters::Collaborators;
use marquee_core::context::EVENT_VAR;
use marquee_core::{
    Clock, Context, DestinationId, RunState, SchedulerState, SystemClock, TriggerHitRecord,
};
use marquee_schedule::{parse_schedule, Instruction, Schedule, TerminateMode};
use marquee_storage::StateStore;
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Seconds between trigger evaluations.
pub const TICK_INTERVAL_SECS: i64 = 2;

/// Seconds between event-expiry sweeps.
pub const EVENT_SWEEP_INTERVAL_SECS: i64 = 30;

/// End-of-pass yield while in wait-state / otherwise.
const WAIT_YIELD_MS: u64 = 50;
const IDLE_YIELD_MS: u64 = 100;
const PAUSED_YIELD_MS: u64 = 200;

/// What one pass did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// No schedule loaded / nothing to do.
    Idle,
    /// Destination is paused; the worker idles.
    Paused,
    /// Destination reached stopped; the worker exits.
    Stopped,
    /// One instruction executed.
    Executed,
    /// In wait-state; nothing but the wait progressed.
    Waiting,
}

struct DestRuntime {
    state: SchedulerState,
    /// Parsed top of the schedule stack.
    active: Option<Schedule>,
    queue: InstructionQueue,
    /// Important trigger hits recovered from a previous process, re-offered
    /// by the resolver exactly once. Distinct from the persisted
    /// `state.important_triggers`, which mirrors the queue's un-executed
    /// important entries at save time.
    pending_important: Vec<TriggerHitRecord>,
    include_initial: bool,
    apply_grace: bool,
    last_trigger_check: Option<DateTime<Utc>>,
    last_sweep: Option<DateTime<Utc>>,
}

impl DestRuntime {
    fn new() -> Self {
        Self {
            state: SchedulerState::default(),
            active: None,
            queue: InstructionQueue::new(),
            pending_important: Vec::new(),
            include_initial: false,
            apply_grace: false,
            last_trigger_check: None,
            last_sweep: None,
        }
    }
}

struct DestCell {
    runtime: tokio::sync::Mutex<DestRuntime>,
    cancel: Mutex<Option<CancellationToken>>,
}

/// A value change to push into an importer's context.
struct Propagation {
    importer: DestinationId,
    alias: String,
    value: Value,
}

/// The multi-destination scheduler.
pub struct Scheduler<C: Clock = SystemClock> {
    clock: C,
    store: StateStore,
    collab: Collaborators,
    events: Arc<EventStore>,
    registry: Arc<VariableRegistry>,
    logs: Arc<LogRing>,
    cells: Mutex<HashMap<DestinationId, Arc<DestCell>>>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(store: StateStore, collab: Collaborators, clock: C) -> Self {
        let registry = Arc::new(VariableRegistry::new(store.load_registry()));
        Self {
            clock,
            store,
            collab,
            events: Arc::new(EventStore::new()),
            registry,
            logs: Arc::new(LogRing::default()),
            cells: Mutex::new(HashMap::new()),
        }
    }

    pub fn events(&self) -> &EventStore {
        &self.events
    }

    pub fn registry(&self) -> &VariableRegistry {
        &self.registry
    }

    /// Log-ring snapshot for a destination, oldest first.
    pub fn logs(&self, dest: &DestinationId) -> Vec<LogLine> {
        self.logs.snapshot(dest)
    }

    /// Install (or fetch) the cell for a destination. Installing a
    /// placeholder before any slow work serializes concurrent start calls.
    /// Only paths that legitimately introduce a destination (loading a
    /// schedule, recovery) call this; everything else goes through
    /// [`Scheduler::existing_cell`] so a stray id never manufactures state
    /// that could later overwrite a real on-disk snapshot.
    fn cell(&self, dest: &DestinationId) -> Arc<DestCell> {
        self.cells
            .lock()
            .entry(dest.clone())
            .or_insert_with(|| {
                Arc::new(DestCell {
                    runtime: tokio::sync::Mutex::new(DestRuntime::new()),
                    cancel: Mutex::new(None),
                })
            })
            .clone()
    }

    fn existing_cell(&self, dest: &DestinationId) -> Option<Arc<DestCell>> {
        self.cells.lock().get(dest.as_str()).cloned()
    }

    // --- schedule lifecycle ---

    /// Validate and push a schedule onto the destination's stack.
    ///
    /// Validation failure leaves any existing schedule untouched. Pushing on
    /// top of a running schedule is a temporary override: the queue is
    /// cleared and the new schedule's `initial_actions` run.
    pub async fn load_schedule(
        &self,
        dest: &DestinationId,
        doc: &Value,
    ) -> Result<(), EngineError> {
        let schedule = parse_schedule(doc)?;
        let cell = self.cell(dest);
        let mut rt = cell.runtime.lock().await;
        rt.state.push(doc.clone(), Context::new(dest.clone()));
        rt.active = Some(schedule);
        if rt.state.state == RunState::Running {
            rt.queue.clear();
            rt.include_initial = true;
            rt.apply_grace = true;
            rt.last_trigger_check = None;
        }
        self.persist(dest, &mut rt);
        tracing::info!(%dest, depth = rt.state.stack_depth(), "schedule loaded");
        Ok(())
    }

    /// Start a stopped destination; runs `initial_actions` on the first tick.
    pub async fn start(&self, dest: &DestinationId) -> Result<(), EngineError> {
        let cell = self.existing_cell(dest).ok_or_else(|| EngineError::NoSchedule(dest.clone()))?;
        let mut rt = cell.runtime.lock().await;
        if rt.state.state != RunState::Stopped {
            return Err(EngineError::StateConflict {
                dest: dest.clone(),
                state: rt.state.state,
                operation: "start",
            });
        }
        if rt.active.is_none() {
            return Err(EngineError::NoSchedule(dest.clone()));
        }
        rt.state.state = RunState::Running;
        rt.include_initial = true;
        rt.apply_grace = true;
        rt.last_trigger_check = None;
        self.persist(dest, &mut rt);
        tracing::info!(%dest, "scheduler started");
        Ok(())
    }

    /// Transition to running without replaying `initial_actions` (process
    /// restart recovery).
    pub async fn resume(&self, dest: &DestinationId) -> Result<(), EngineError> {
        let cell = self.existing_cell(dest).ok_or_else(|| EngineError::NoSchedule(dest.clone()))?;
        let mut rt = cell.runtime.lock().await;
        if rt.active.is_none() {
            return Err(EngineError::NoSchedule(dest.clone()));
        }
        rt.state.state = RunState::Running;
        rt.include_initial = false;
        rt.apply_grace = true;
        rt.last_trigger_check = None;
        self.persist(dest, &mut rt);
        tracing::info!(%dest, "scheduler resumed");
        Ok(())
    }

    pub async fn pause(&self, dest: &DestinationId) -> Result<(), EngineError> {
        let cell = self.existing_cell(dest).ok_or_else(|| EngineError::StateConflict {
            dest: dest.clone(),
            state: RunState::Stopped,
            operation: "pause",
        })?;
        let mut rt = cell.runtime.lock().await;
        if rt.state.state != RunState::Running {
            return Err(EngineError::StateConflict {
                dest: dest.clone(),
                state: rt.state.state,
                operation: "pause",
            });
        }
        rt.state.state = RunState::Paused;
        // force_save: persist even though only the state flag changed
        self.persist(dest, &mut rt);
        tracing::info!(%dest, "scheduler paused");
        Ok(())
    }

    pub async fn unpause(&self, dest: &DestinationId) -> Result<(), EngineError> {
        let cell = self.existing_cell(dest).ok_or_else(|| EngineError::StateConflict {
            dest: dest.clone(),
            state: RunState::Stopped,
            operation: "unpause",
        })?;
        let mut rt = cell.runtime.lock().await;
        if rt.state.state != RunState::Paused {
            return Err(EngineError::StateConflict {
                dest: dest.clone(),
                state: rt.state.state,
                operation: "unpause",
            });
        }
        rt.state.state = RunState::Running;
        self.persist(dest, &mut rt);
        tracing::info!(%dest, "scheduler unpaused");
        Ok(())
    }

    /// Stop the destination, preserving its stacks on disk so a later start
    /// can resume.
    pub async fn stop(&self, dest: &DestinationId) {
        let Some(cell) = self.existing_cell(dest) else { return };
        if let Some(token) = cell.cancel.lock().take() {
            token.cancel();
        }
        let mut rt = cell.runtime.lock().await;
        rt.state.state = RunState::Stopped;
        if let Some(ctx) = rt.state.top_context_mut() {
            ctx.stopping = false;
        }
        self.persist(dest, &mut rt);
        tracing::info!(%dest, "scheduler stopped");
    }

    /// Restore every destination with a saved snapshot.
    ///
    /// Running destinations resume without replaying `initial_actions`;
    /// paused destinations stay paused with their stacks intact; stopped or
    /// unreadable snapshots are left alone.
    pub async fn recover_all(&self) -> Vec<DestinationId> {
        let mut recovered = Vec::new();
        for dest in self.store.known_destinations() {
            let Some(state) = self.store.load(&dest) else { continue };
            if state.state == RunState::Stopped {
                continue;
            }
            let active = state.top_schedule().and_then(|doc| parse_schedule(doc).ok());
            self.events.seed(
                &dest,
                state.events_active.clone(),
                state.events_history.clone(),
            );
            let cell = self.cell(&dest);
            let mut rt = cell.runtime.lock().await;
            rt.state = state;
            rt.pending_important = std::mem::take(&mut rt.state.important_triggers);
            rt.active = active;
            rt.include_initial = false;
            rt.apply_grace = true;
            rt.last_trigger_check = None;
            tracing::info!(%dest, state = %rt.state.state, "destination recovered");
            drop(rt);
            recovered.push(dest);
        }
        recovered
    }

    /// Pop the top schedule from outside the instruction stream (an
    /// operator action). Vetoed by `prevent_unload` on the active schedule.
    pub async fn unload_schedule(&self, dest: &DestinationId) -> Result<(), EngineError> {
        let cell = self.existing_cell(dest).ok_or_else(|| EngineError::NoSchedule(dest.clone()))?;
        let mut rt = cell.runtime.lock().await;
        if rt.state.stack_depth() == 0 {
            return Err(EngineError::NoSchedule(dest.clone()));
        }
        if rt.active.as_ref().is_some_and(|schedule| schedule.prevent_unload) {
            return Err(EngineError::UnloadPrevented(dest.clone()));
        }
        self.perform_unload(dest, &mut rt);
        self.persist(dest, &mut rt);
        Ok(())
    }

    /// Drop a destination's active events, one key or all. Returns the
    /// number removed.
    pub async fn clear_events(&self, dest: &DestinationId, key: Option<&str>) -> usize {
        let removed = self.events.clear(dest, key);
        if let Some(cell) = self.existing_cell(dest) {
            let mut rt = cell.runtime.lock().await;
            self.persist(dest, &mut rt);
        }
        removed
    }

    /// Clear the trigger execution log so a reloaded schedule can fire again.
    pub async fn reset_trigger_executions(&self, dest: &DestinationId) {
        let Some(cell) = self.existing_cell(dest) else { return };
        let mut rt = cell.runtime.lock().await;
        rt.state.last_trigger_executions.clear();
        self.persist(dest, &mut rt);
    }

    // --- introspection ---

    pub async fn run_state(&self, dest: &DestinationId) -> RunState {
        match self.existing_cell(dest) {
            Some(cell) => cell.runtime.lock().await.state.state,
            None => RunState::Stopped,
        }
    }

    /// Clone of the top context's variables.
    pub async fn context_vars(&self, dest: &DestinationId) -> serde_json::Map<String, Value> {
        let Some(cell) = self.existing_cell(dest) else { return serde_json::Map::new() };
        let rt = cell.runtime.lock().await;
        rt.state.top_context().map(|ctx| ctx.vars.clone()).unwrap_or_default()
    }

    /// In-memory state snapshot (tests, status surfaces).
    pub async fn state_snapshot(&self, dest: &DestinationId) -> SchedulerState {
        let Some(cell) = self.existing_cell(dest) else { return SchedulerState::default() };
        let mut rt = cell.runtime.lock().await;
        self.mirror_shared(dest, &mut rt);
        rt.state.clone()
    }

    /// Throw an event from outside any scheduler loop.
    pub async fn throw_event(
        &self,
        scope: &str,
        spec: ThrowSpec,
    ) -> Result<ThrowReceipt, EngineError> {
        let now = self.clock.now_utc();
        let receipt = self.events.throw(scope, spec, now, self.collab.groups.as_ref())?;
        for dest in &receipt.destinations {
            // Only destinations this process is tracking get their snapshot
            // refreshed; the event itself lives in the shared store either way
            if let Some(cell) = self.existing_cell(dest) {
                let mut rt = cell.runtime.lock().await;
                self.persist(dest, &mut rt);
            }
        }
        Ok(receipt)
    }

    // --- the loop ---

    /// Spawn the worker loop for a destination.
    pub fn spawn(self: Arc<Self>, dest: &DestinationId) -> CancellationToken {
        let token = CancellationToken::new();
        let cell = self.cell(dest);
        *cell.cancel.lock() = Some(token.clone());

        let this = self;
        let dest = dest.clone();
        let cancel = token.clone();
        tokio::spawn(async move {
            loop {
                if cancel.is_cancelled() {
                    break;
                }
                let yield_ms = match this.tick(&dest).await {
                    TickOutcome::Stopped => break,
                    TickOutcome::Waiting => WAIT_YIELD_MS,
                    TickOutcome::Paused => PAUSED_YIELD_MS,
                    _ => IDLE_YIELD_MS,
                };
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(std::time::Duration::from_millis(yield_ms)) => {}
                }
            }
            tracing::debug!(%dest, "worker exited");
        });
        token
    }

    /// One cooperative pass. Public so tests (and embedders without a tokio
    /// worker per destination) can drive the loop deterministically.
    pub async fn tick(&self, dest: &DestinationId) -> TickOutcome {
        let Some(cell) = self.existing_cell(dest) else { return TickOutcome::Stopped };
        let mut rt = cell.runtime.lock().await;

        match rt.state.state {
            RunState::Paused => return TickOutcome::Paused,
            RunState::Stopped => return TickOutcome::Stopped,
            RunState::Running => {}
        }
        let now = self.clock.now_utc();

        // Periodic event expiry and execution-log pruning
        if rt
            .last_sweep
            .is_none_or(|at| (now - at).num_seconds() >= EVENT_SWEEP_INTERVAL_SECS)
        {
            rt.last_sweep = Some(now);
            self.events.expire_all(now);
            resolver::prune_exec_log(&mut rt.state.last_trigger_executions, now);
        }

        // Trigger evaluation at the tick cadence
        let mut dirty = false;
        if rt
            .last_trigger_check
            .is_none_or(|at| (now - at).num_seconds() >= TICK_INTERVAL_SECS)
        {
            rt.last_trigger_check = Some(now);
            dirty |= self.evaluate_triggers(dest, &mut rt, now);
        }

        // Urgent internal events re-enter through the queue
        dirty |= self.poll_urgent_events(dest, &mut rt, now);

        // A wait whose deadline has passed normally completes through its
        // queue entry; if that entry is gone (queue rebuilt after restart),
        // clear the stale wait here.
        let head_is_wait = rt
            .queue
            .front()
            .is_some_and(|entry| matches!(entry.instruction, Instruction::Wait { .. }));
        if !head_is_wait {
            if let Some(ctx) = rt.state.top_context_mut() {
                if ctx.wait_until.is_some_and(|until| now >= until) {
                    ctx.wait_until = None;
                    ctx.last_wait_log = None;
                    dirty = true;
                }
            }
        }

        // Pop and execute at most one instruction
        let waiting = rt.state.top_context().is_some_and(|ctx| ctx.is_waiting(now));
        let entry = if waiting {
            if rt.queue.peek_next_urgent(now).is_some() {
                // Wait interruption: clear the wait before popping the
                // urgent entry so the urgent work runs immediately.
                if let Some(ctx) = rt.state.top_context_mut() {
                    ctx.wait_until = None;
                    ctx.last_wait_log = None;
                }
                dirty = true;
                rt.queue.pop_next(true)
            } else if head_is_wait {
                // The in-progress wait entry sits at the head; popping it
                // re-invokes the wait handler, which reports progress.
                rt.queue.pop_next(false)
            } else {
                // Anything else holds until the wait ends
                None
            }
        } else {
            rt.queue.pop_next(false)
        };

        let outcome = match entry {
            None => {
                if dirty {
                    self.persist(dest, &mut rt);
                }
                if waiting {
                    TickOutcome::Waiting
                } else if rt.state.state == RunState::Stopped {
                    TickOutcome::Stopped
                } else {
                    TickOutcome::Idle
                }
            }
            Some(entry) => {
                let (propagations, imports) =
                    self.execute_entry(dest, &mut rt, entry, now).await;
                self.persist(dest, &mut rt);
                let state = rt.state.state;
                let still_waiting =
                    rt.state.top_context().is_some_and(|ctx| ctx.is_waiting(now));
                drop(rt);

                // Cross-destination work happens with this destination's
                // lock released (lock order is always "self, then peer").
                self.apply_imports(dest, imports).await;
                self.apply_propagations(propagations).await;

                if state == RunState::Stopped {
                    TickOutcome::Stopped
                } else if still_waiting {
                    TickOutcome::Waiting
                } else {
                    TickOutcome::Executed
                }
            }
        };
        outcome
    }

    /// Resolve triggers and admit the resulting blocks. Returns whether the
    /// queue or context changed.
    fn evaluate_triggers(
        &self,
        dest: &DestinationId,
        rt: &mut DestRuntime,
        now: DateTime<Utc>,
    ) -> bool {
        let Some(schedule) = rt.active.clone() else { return false };
        let include_initial = std::mem::take(&mut rt.include_initial);
        let apply_grace = std::mem::take(&mut rt.apply_grace);

        let hits = resolver::resolve_schedule(ResolveInputs {
            schedule: &schedule,
            now,
            dest,
            include_initial,
            apply_grace_period: apply_grace,
            exec_log: &mut rt.state.last_trigger_executions,
            pending_important: &mut rt.pending_important,
            events: &self.events,
        });
        if hits.is_empty() {
            return false;
        }

        let waiting = rt.state.top_context().is_some_and(|ctx| ctx.is_waiting(now));
        let mut changed = false;
        for mut hit in hits {
            // Wait-state admission: urgent always; important to the tail;
            // normal blocks are dropped and re-offered after the wait.
            if waiting && !hit.urgent && !hit.important {
                tracing::debug!(%dest, source = ?hit.source, "normal block dropped during wait");
                continue;
            }
            match hit.source {
                HitSource::Event(ref key) => {
                    if let Some(ctx) = rt.state.top_context_mut() {
                        ctx.set_var(EVENT_VAR, hit.event_payload.take().unwrap_or(Value::Null));
                    }
                    tracing::debug!(%dest, key, "event trigger admitted");
                    rt.queue.push_block_tagged(hit.instructions, hit.important, hit.urgent, true);
                }
                HitSource::Final => {
                    // A final block ends the schedule once it has run
                    hit.instructions.push(Instruction::Terminate {
                        mode: TerminateMode::Immediate,
                        test: None,
                        prevent_unload: false,
                        from_event: true,
                    });
                    rt.queue.push_block(hit.instructions, hit.important, hit.urgent);
                }
                _ => rt.queue.push_block(hit.instructions, hit.important, hit.urgent),
            }
            changed = true;
        }
        changed
    }

    /// Check the internal urgent keys and synthesize their instruction
    /// block. One event per pass keeps the unwind paths ordered.
    fn poll_urgent_events(
        &self,
        dest: &DestinationId,
        rt: &mut DestRuntime,
        now: DateTime<Utc>,
    ) -> bool {
        for key in URGENT_EVENT_KEYS {
            let Some(entry) = self.events.pop_next(dest, key, now) else { continue };
            let prevent_unload = entry
                .payload
                .as_ref()
                .and_then(|payload| payload.get("prevent_unload"))
                .and_then(Value::as_bool)
                .unwrap_or(false);
            let mode = match key {
                INTERNAL_TERMINATE => TerminateMode::Normal,
                INTERNAL_TERMINATE_IMMEDIATE => TerminateMode::Immediate,
                INTERNAL_EXIT_BLOCK => TerminateMode::Block,
                _ => continue,
            };
            tracing::info!(%dest, key, "urgent internal event");
            rt.queue.push_block(
                vec![Instruction::Terminate {
                    mode,
                    test: None,
                    prevent_unload,
                    from_event: true,
                }],
                false,
                true,
            );
            return true;
        }
        false
    }

    /// Execute one queue entry, returning deferred cross-destination work.
    async fn execute_entry(
        &self,
        dest: &DestinationId,
        rt: &mut DestRuntime,
        entry: crate::queue::Entry,
        now: DateTime<Utc>,
    ) -> (Vec<Propagation>, Vec<ImportRequest>) {
        let mut output = Vec::new();
        let mut effects = SideEffects::default();

        let DestRuntime { state, active, queue, .. } = rt;
        let outcome = match (state.context_stack.last_mut(), active.as_ref()) {
            (Some(context), Some(schedule)) => {
                let mut ctx = HandlerCtx {
                    dest,
                    now,
                    context,
                    schedule,
                    queue,
                    events: &self.events,
                    registry: &self.registry,
                    collab: &self.collab,
                    output: &mut output,
                    effects: &mut effects,
                };
                match handlers::execute(&entry.instruction, &mut ctx).await {
                    Ok(outcome) => outcome,
                    Err(e) => {
                        // Handler failure: log, skip the instruction, keep going
                        tracing::warn!(%dest, kind = entry.instruction.kind(), error = %e, "instruction failed");
                        output.push(format!("Error in {}: {}", entry.instruction.kind(), e));
                        Outcome::Continue
                    }
                }
            }
            _ => {
                tracing::warn!(%dest, "instruction with no active schedule; dropping");
                Outcome::Continue
            }
        };

        self.logs.extend(dest, now, output);

        let from_event_block = entry.from_event_block;
        match outcome {
            Outcome::Continue => {}
            Outcome::Pending => rt.queue.push_front(entry),
            Outcome::ExitBlock => rt.queue.remove_non_important(),
            Outcome::Unload => self.perform_unload(dest, rt),
            Outcome::StopRuntime => {
                rt.state.state = RunState::Stopped;
                tracing::info!(%dest, "runtime stopped, stack preserved");
            }
        }

        // All instructions of one event block see the same `_event`; remove
        // it only when the block has fully drained.
        if from_event_block && !rt.queue.iter().any(|queued| queued.from_event_block) {
            if let Some(ctx) = rt.state.top_context_mut() {
                ctx.remove_var(EVENT_VAR);
            }
        }

        // Registry persistence piggybacks on instruction execution
        if !effects.var_writes.is_empty() || !effects.imports_requested.is_empty() {
            if let Err(e) = self.store.save_registry(&self.registry.snapshot()) {
                tracing::warn!(error = %e, "registry save failed; memory remains authoritative");
            }
        }

        let groups = self.collab.groups.groups_of(dest);
        let propagations = effects
            .var_writes
            .iter()
            .flat_map(|(var, value)| {
                self.registry.importers_of(var, dest, &groups).into_iter().map(
                    |(importer, alias)| Propagation {
                        importer,
                        alias,
                        value: value.clone(),
                    },
                )
            })
            .collect();
        (propagations, effects.imports_requested)
    }

    /// Pop the top schedule and its context, restoring the previous
    /// override. Unloading the last schedule instead stops the runtime with
    /// the final frame intact, so the finished context stays inspectable
    /// (and the stacks keep their equal depth).
    fn perform_unload(&self, dest: &DestinationId, rt: &mut DestRuntime) {
        rt.queue.clear();
        if rt.state.stack_depth() <= 1 {
            rt.state.state = RunState::Stopped;
            tracing::info!(%dest, "last schedule finished; stopped");
            return;
        }
        rt.state.pop();
        rt.active = rt.state.top_schedule().and_then(|doc| parse_schedule(doc).ok());
        tracing::info!(%dest, depth = rt.state.stack_depth(), "schedule popped");
    }

    /// Initial sync for fresh imports: read the source's current value and
    /// write it under the alias.
    async fn apply_imports(&self, importer: &DestinationId, imports: Vec<ImportRequest>) {
        for request in imports {
            let owner = match request.source_type {
                marquee_core::ImportSourceType::Destination => {
                    Some(DestinationId::new(request.source.clone()))
                }
                marquee_core::ImportSourceType::Group => self
                    .registry
                    .export_owner(&request.var_name, &ExportScope::Group(request.source.clone())),
                marquee_core::ImportSourceType::Scope => {
                    self.registry.export_owner(&request.var_name, &ExportScope::Global)
                }
            };
            let Some(owner) = owner else { continue };
            let Some(owner_cell) = self.existing_cell(&owner) else { continue };
            let value = {
                let rt = owner_cell.runtime.lock().await;
                rt.state.top_context().and_then(|ctx| ctx.var(&request.var_name).cloned())
            };
            let Some(value) = value else { continue };
            self.write_imported_value(importer, &request.alias, value).await;
        }
    }

    async fn apply_propagations(&self, propagations: Vec<Propagation>) {
        for propagation in propagations {
            self.write_imported_value(
                &propagation.importer,
                &propagation.alias,
                propagation.value,
            )
            .await;
        }
    }

    async fn write_imported_value(&self, dest: &DestinationId, alias: &str, value: Value) {
        let Some(cell) = self.existing_cell(dest) else { return };
        let mut rt = cell.runtime.lock().await;
        if let Some(ctx) = rt.state.top_context_mut() {
            ctx.set_var(alias, value);
            // Imported variable edits persist like any other context change
            self.persist(dest, &mut rt);
            tracing::debug!(%dest, alias, "imported value propagated");
        }
    }

    /// Mirror shared-store views into the snapshot (events, un-executed
    /// important entries).
    fn mirror_shared(&self, dest: &DestinationId, rt: &mut DestRuntime) {
        let (active, history) = self.events.snapshot(dest);
        rt.state.events_active = active;
        rt.state.events_history = history;
        rt.state.important_triggers = rt
            .queue
            .iter()
            .filter(|entry| entry.important)
            .filter_map(|entry| {
                serde_json::to_value(&entry.instruction).ok().map(|doc| TriggerHitRecord {
                    instructions: vec![doc],
                    urgent: entry.urgent,
                    important: true,
                    source: "queue".to_string(),
                    recorded_at: self.clock.now_utc(),
                })
            })
            .collect();
    }

    /// Write the full snapshot. Memory stays authoritative if the disk
    /// write fails.
    fn persist(&self, dest: &DestinationId, rt: &mut DestRuntime) {
        self.mirror_shared(dest, rt);
        rt.state.last_updated = Some(self.clock.now_utc());
        if let Err(e) = self.store.save(dest, &rt.state) {
            tracing::warn!(%dest, error = %e, "state save failed; memory remains authoritative");
        }
    }
}

#[cfg(test)]
#[path = "runtime_tests.rs"]
mod tests;
