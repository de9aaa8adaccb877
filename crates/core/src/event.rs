// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event entries: named, possibly-delayed, TTL-bounded signals routed to
//! one or more destinations.

use crate::destination::DestinationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Serialized width of an event id: `evt-` plus a 19-character nanoid.
const EVENT_ID_LEN: usize = 23;

/// Random identifier for one event entry.
///
/// Fan-out copies of a single throw each get their own id; the copies share
/// a `group_id` so single-consumer purging can find the family. Ids are
/// fixed-width ASCII and stored inline — one sits in every queue entry,
/// history slot, and persisted snapshot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId([u8; EVENT_ID_LEN]);

impl EventId {
    /// Generate a fresh random id.
    pub fn new() -> Self {
        let mut bytes = [b'-'; EVENT_ID_LEN];
        bytes[..4].copy_from_slice(b"evt-");
        bytes[4..].copy_from_slice(nanoid::nanoid!(19).as_bytes());
        Self(bytes)
    }

    pub fn as_str(&self) -> &str {
        // Prefix and nanoid alphabet are both single-byte ASCII
        std::str::from_utf8(&self.0).unwrap_or("evt-invalid")
    }
}

impl Default for EventId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl std::fmt::Display for EventId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for EventId {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for EventId {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        // Owned String rather than &str so ids also load from
        // serde_json::Value trees, not just borrowed input
        let s = String::deserialize(deserializer)?;
        let bytes: [u8; EVENT_ID_LEN] = s.as_bytes().try_into().map_err(|_| {
            serde::de::Error::custom(format!(
                "event id must be {} bytes: {:?}",
                EVENT_ID_LEN, s
            ))
        })?;
        Ok(Self(bytes))
    }
}

/// Number of consumed/expired entries retained per destination.
pub const MAX_EVENT_HISTORY: usize = 100;

/// Lifecycle status of an event entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Active,
    Consumed,
    Expired,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EventStatus::Active => "ACTIVE",
            EventStatus::Consumed => "CONSUMED",
            EventStatus::Expired => "EXPIRED",
        })
    }
}

/// One queued event for one destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEntry {
    pub key: String,
    pub active_from: DateTime<Utc>,
    pub expires: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
    #[serde(default)]
    pub single_consumer: bool,
    pub created_at: DateTime<Utc>,
    pub unique_id: EventId,
    /// Shared across the fan-out copies of one throw.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_id: Option<EventId>,
    pub status: EventStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_by: Option<DestinationId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub consumed_at: Option<DateTime<Utc>>,
}

impl EventEntry {
    /// Whether this entry is visible to a consumer at `now`.
    pub fn is_consumable(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Active && self.active_from <= now && self.expires > now
    }

    /// Whether this entry's TTL has elapsed.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires <= now
    }

    /// Mark as consumed by `dest` at `now`.
    pub fn mark_consumed(&mut self, dest: &DestinationId, now: DateTime<Utc>) {
        self.status = EventStatus::Consumed;
        self.consumed_by = Some(dest.clone());
        self.consumed_at = Some(now);
    }

    /// Mark as expired.
    pub fn mark_expired(&mut self) {
        self.status = EventStatus::Expired;
    }

    /// Builder with test defaults: active now, 60 second TTL.
    #[cfg(any(test, feature = "test-support"))]
    pub fn builder() -> EventEntryBuilder {
        EventEntryBuilder::default()
    }
}

/// Test builder covering the fields tests vary; everything else gets the
/// defaults a plain throw would produce.
#[cfg(any(test, feature = "test-support"))]
pub struct EventEntryBuilder {
    key: String,
    active_from: DateTime<Utc>,
    expires: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

#[cfg(any(test, feature = "test-support"))]
impl Default for EventEntryBuilder {
    fn default() -> Self {
        let now = Utc::now();
        Self {
            key: "test-event".to_string(),
            active_from: now,
            expires: now + chrono::Duration::seconds(60),
            created_at: now,
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
impl EventEntryBuilder {
    pub fn key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn active_from(mut self, at: DateTime<Utc>) -> Self {
        self.active_from = at;
        self
    }

    pub fn expires(mut self, at: DateTime<Utc>) -> Self {
        self.expires = at;
        self
    }

    pub fn created_at(mut self, at: DateTime<Utc>) -> Self {
        self.created_at = at;
        self
    }

    pub fn build(self) -> EventEntry {
        EventEntry {
            key: self.key,
            active_from: self.active_from,
            expires: self.expires,
            display_name: None,
            payload: None,
            single_consumer: false,
            created_at: self.created_at,
            unique_id: EventId::new(),
            group_id: None,
            status: EventStatus::Active,
            consumed_by: None,
            consumed_at: None,
        }
    }
}

#[cfg(test)]
#[path = "event_tests.rs"]
mod tests;
