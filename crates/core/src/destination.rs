// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Destination identifier type.
//!
//! A destination is an addressable output target (display, device) owning one
//! scheduler instance. Ids come from external configuration and are arbitrary
//! length, so this is a `String` newtype rather than a fixed-width inline id
//! like [`crate::event::EventId`].

use serde::{Deserialize, Serialize};

/// Identifier for a publish destination.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DestinationId(String);

impl DestinationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for DestinationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for DestinationId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for DestinationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&String> for DestinationId {
    fn from(s: &String) -> Self {
        Self(s.clone())
    }
}

impl AsRef<str> for DestinationId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::borrow::Borrow<str> for DestinationId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl std::ops::Deref for DestinationId {
    type Target = str;

    fn deref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for DestinationId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for DestinationId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == **other
    }
}

#[cfg(test)]
#[path = "destination_tests.rs"]
mod tests;
