// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Persisted form of the exported/imported variable registry.
//!
//! The live registry (with propagation) is an engine concern; this is the
//! process-wide document it snapshots to disk.

use crate::destination::DestinationId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Where an import reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImportSourceType {
    /// A specific destination's context.
    Destination,
    /// The owning destination's value within a named group.
    Group,
    /// The global scope.
    Scope,
}

impl std::fmt::Display for ImportSourceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ImportSourceType::Destination => "destination",
            ImportSourceType::Group => "group",
            ImportSourceType::Scope => "scope",
        })
    }
}

/// One exported variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExportEntry {
    pub owner: DestinationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub friendly_name: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// One importer of an exported variable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportEntry {
    pub imported_as: String,
    pub source_type: ImportSourceType,
    /// Destination id, group name, or "global" depending on `source_type`.
    pub source: String,
    pub timestamp: DateTime<Utc>,
}

/// The whole registry document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RegistryDoc {
    /// varName → export, global scope.
    #[serde(default)]
    pub global: HashMap<String, ExportEntry>,
    /// groupName → varName → export.
    #[serde(default)]
    pub groups: HashMap<String, HashMap<String, ExportEntry>>,
    /// varName → importerId → import.
    #[serde(default)]
    pub imports: HashMap<String, HashMap<DestinationId, ImportEntry>>,
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
