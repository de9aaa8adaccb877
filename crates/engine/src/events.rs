// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Process-wide event store.
//!
//! Events are named, possibly-delayed, TTL-bounded signals. Each destination
//! has a map of key → FIFO queue plus a bounded history of recently
//! consumed/expired entries. Consumption is single-shot: there is no peek
//! that does not consume.

use chrono::{DateTime, Duration, Utc};
use marquee_adapters::GroupResolver;
use marquee_core::duration::{parse_duration_value, BareUnit};
use marquee_core::{DestinationId, EventEntry, EventId, EventStatus, MAX_EVENT_HISTORY};
use parking_lot::Mutex;
use serde_json::Value;
use std::collections::{HashMap, VecDeque};

/// Default TTL for events thrown without one.
pub const DEFAULT_TTL_SECS: i64 = 60;

/// Internal urgent event keys polled by the runtime each pass.
pub const INTERNAL_TERMINATE: &str = "__terminate__";
pub const INTERNAL_TERMINATE_IMMEDIATE: &str = "__terminate_immediate__";
pub const INTERNAL_EXIT_BLOCK: &str = "__exit_block__";
pub const URGENT_EVENT_KEYS: [&str; 3] =
    [INTERNAL_TERMINATE, INTERNAL_TERMINATE_IMMEDIATE, INTERNAL_EXIT_BLOCK];

/// Parameters of one `throw`.
#[derive(Debug, Clone, Default)]
pub struct ThrowSpec {
    pub key: String,
    /// Duration value; bare numbers are seconds. Defaults to 60 s.
    pub ttl: Option<Value>,
    /// Delay before the event becomes consumable.
    pub delay: Option<Value>,
    /// Absolute activation time; `active_from = max(now, future_time)`.
    pub future_time: Option<DateTime<Utc>>,
    pub display_name: Option<String>,
    pub payload: Option<Value>,
    pub single_consumer: bool,
}

/// What a `throw` produced.
#[derive(Debug, Clone)]
pub struct ThrowReceipt {
    pub destinations: Vec<DestinationId>,
    pub group: Option<String>,
    pub unique_id: EventId,
    pub active_from: DateTime<Utc>,
}

#[derive(Default)]
struct EventsInner {
    /// dest → key → FIFO of entries.
    active: HashMap<DestinationId, HashMap<String, VecDeque<EventEntry>>>,
    /// dest → bounded ring, newest last.
    history: HashMap<DestinationId, VecDeque<EventEntry>>,
}

/// Shared event store; one per process.
#[derive(Default)]
pub struct EventStore {
    inner: Mutex<EventsInner>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Throw an event into a scope.
    ///
    /// `scope` is a destination id, a group name (fan-out to each member
    /// with its own entry), or `"global"` (fan-out to all destinations).
    pub fn throw(
        &self,
        scope: &str,
        spec: ThrowSpec,
        now: DateTime<Utc>,
        groups: &dyn GroupResolver,
    ) -> Result<ThrowReceipt, crate::EngineError> {
        let (destinations, group) = if scope == "global" {
            (groups.all_destinations(), None)
        } else if groups.is_group(scope) {
            (groups.destinations_of(scope), Some(scope.to_string()))
        } else {
            (vec![DestinationId::new(scope)], None)
        };
        if destinations.is_empty() {
            return Err(crate::EngineError::UnknownScope(scope.to_string()));
        }

        let delay = match &spec.delay {
            Some(value) => Some(
                parse_duration_value(value, BareUnit::Seconds)
                    .map_err(|_| crate::EngineError::BadDuration(value.to_string()))?,
            ),
            None => None,
        };
        let mut active_from = now;
        if let Some(delay) = delay {
            active_from = now + delay;
        } else if let Some(future) = spec.future_time {
            active_from = future.max(now);
        }

        let ttl = spec
            .ttl
            .as_ref()
            .and_then(|value| parse_duration_value(value, BareUnit::Seconds).ok())
            .unwrap_or_else(|| Duration::seconds(DEFAULT_TTL_SECS));
        let expires = active_from + ttl;

        let group_id = (destinations.len() > 1).then(EventId::new);
        let mut first_id = None;

        let mut inner = self.inner.lock();
        for dest in &destinations {
            let entry = EventEntry {
                key: spec.key.clone(),
                active_from,
                expires,
                display_name: spec.display_name.clone(),
                payload: spec.payload.clone(),
                single_consumer: spec.single_consumer,
                created_at: now,
                unique_id: EventId::new(),
                group_id,
                status: EventStatus::Active,
                consumed_by: None,
                consumed_at: None,
            };
            first_id.get_or_insert(entry.unique_id);
            record_history(&mut inner.history, dest, entry.clone());
            inner
                .active
                .entry(dest.clone())
                .or_default()
                .entry(spec.key.clone())
                .or_default()
                .push_back(entry);
        }
        drop(inner);

        let unique_id = group_id.or(first_id).unwrap_or_default();
        tracing::info!(scope, key = %spec.key, count = destinations.len(), "event thrown");
        Ok(ThrowReceipt { destinations, group, unique_id, active_from })
    }

    /// Consume the next matching entry for `(dest, key)`.
    ///
    /// Returns the earliest consumable entry ordered by `(active_from,
    /// created_at)`. Expired entries encountered on the way are moved to
    /// history. Consumption of a single-consumer entry purges its fan-out
    /// family from every peer destination.
    pub fn pop_next(
        &self,
        dest: &DestinationId,
        key: &str,
        now: DateTime<Utc>,
    ) -> Option<EventEntry> {
        let mut inner = self.inner.lock();

        // Move expired entries to history first
        let queue = inner.active.get_mut(dest.as_str())?.get_mut(key)?;
        let mut expired = Vec::new();
        queue.retain(|entry| {
            if entry.is_expired(now) {
                expired.push(entry.clone());
                false
            } else {
                true
            }
        });
        for mut entry in expired {
            entry.mark_expired();
            record_history(&mut inner.history, dest, entry);
        }

        let queue = inner.active.get_mut(dest.as_str())?.get_mut(key)?;
        let index = queue
            .iter()
            .enumerate()
            .filter(|(_, entry)| entry.is_consumable(now))
            .min_by_key(|(_, entry)| (entry.active_from, entry.created_at))
            .map(|(index, _)| index)?;
        let mut entry = queue.remove(index)?;
        entry.mark_consumed(dest, now);
        record_history(&mut inner.history, dest, entry.clone());

        if entry.single_consumer {
            if let Some(group_id) = entry.group_id {
                purge_family(&mut inner, group_id, dest);
            }
        }

        tracing::info!(%dest, key, id = %entry.unique_id, "event consumed");
        Some(entry)
    }

    /// Move every expired entry, for every destination, to history.
    pub fn expire_all(&self, now: DateTime<Utc>) {
        let mut inner = self.inner.lock();
        let dests: Vec<DestinationId> = inner.active.keys().cloned().collect();
        for dest in dests {
            let Some(keys) = inner.active.get_mut(dest.as_str()) else { continue };
            let mut expired = Vec::new();
            for queue in keys.values_mut() {
                queue.retain(|entry| {
                    if entry.is_expired(now) {
                        expired.push(entry.clone());
                        false
                    } else {
                        true
                    }
                });
            }
            keys.retain(|_, queue| !queue.is_empty());
            for mut entry in expired {
                entry.mark_expired();
                record_history(&mut inner.history, &dest, entry);
            }
        }
    }

    /// Drop active entries for a destination, one key or all. Returns the
    /// number removed. History is left alone.
    pub fn clear(&self, dest: &DestinationId, key: Option<&str>) -> usize {
        let mut inner = self.inner.lock();
        let Some(keys) = inner.active.get_mut(dest.as_str()) else {
            return 0;
        };
        match key {
            Some(key) => keys.remove(key).map(|queue| queue.len()).unwrap_or(0),
            None => {
                let count = keys.values().map(VecDeque::len).sum();
                keys.clear();
                count
            }
        }
    }

    /// Active and history views for one destination (persistence, status).
    pub fn snapshot(
        &self,
        dest: &DestinationId,
    ) -> (HashMap<String, Vec<EventEntry>>, Vec<EventEntry>) {
        let inner = self.inner.lock();
        let active = inner
            .active
            .get(dest.as_str())
            .map(|keys| {
                keys.iter()
                    .filter(|(_, queue)| !queue.is_empty())
                    .map(|(key, queue)| (key.clone(), queue.iter().cloned().collect()))
                    .collect()
            })
            .unwrap_or_default();
        let history = inner
            .history
            .get(dest.as_str())
            .map(|ring| ring.iter().cloned().collect())
            .unwrap_or_default();
        (active, history)
    }

    /// Restore a destination's queues from a persisted snapshot.
    pub fn seed(
        &self,
        dest: &DestinationId,
        active: HashMap<String, Vec<EventEntry>>,
        history: Vec<EventEntry>,
    ) {
        let mut inner = self.inner.lock();
        inner.active.insert(
            dest.clone(),
            active
                .into_iter()
                .map(|(key, entries)| (key, entries.into_iter().collect()))
                .collect(),
        );
        inner.history.insert(dest.clone(), history.into_iter().collect());
    }
}

/// Insert or update a history entry by unique id, trimming to the bound.
fn record_history(
    history: &mut HashMap<DestinationId, VecDeque<EventEntry>>,
    dest: &DestinationId,
    entry: EventEntry,
) {
    let ring = history.entry(dest.clone()).or_default();
    if let Some(existing) = ring.iter_mut().find(|e| e.unique_id == entry.unique_id) {
        *existing = entry;
    } else {
        ring.push_back(entry);
    }
    while ring.len() > MAX_EVENT_HISTORY {
        ring.pop_front();
    }
}

/// Remove the remaining entries of a single-consumer fan-out family from
/// every destination other than the consumer.
fn purge_family(inner: &mut EventsInner, group_id: EventId, consumer: &DestinationId) {
    let mut purged = 0usize;
    for (dest, keys) in inner.active.iter_mut() {
        if dest == consumer {
            continue;
        }
        for queue in keys.values_mut() {
            let before = queue.len();
            queue.retain(|entry| entry.group_id != Some(group_id));
            purged += before - queue.len();
        }
    }
    if purged > 0 {
        tracing::debug!(%consumer, %group_id, purged, "single-consumer family purged from peers");
    }
}

#[cfg(test)]
#[path = "events_tests.rs"]
mod tests;
