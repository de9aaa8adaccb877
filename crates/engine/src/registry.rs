// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Live exported/imported variable registry.
//!
//! Process-wide map of exports, their importers, and scoped visibility.
//! The registry stores wiring only; variable values live in destination
//! contexts. Propagation (writing a changed value into importer contexts)
//! is driven by the runtime, which asks [`VariableRegistry::importers_of`]
//! after each assignment.

use chrono::{DateTime, Utc};
use marquee_core::{DestinationId, ExportEntry, ImportEntry, ImportSourceType, RegistryDoc};
use parking_lot::Mutex;

/// Where an export is visible.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExportScope {
    Global,
    Group(String),
}

#[derive(Default)]
pub struct VariableRegistry {
    doc: Mutex<RegistryDoc>,
}

impl VariableRegistry {
    pub fn new(doc: RegistryDoc) -> Self {
        Self { doc: Mutex::new(doc) }
    }

    pub fn snapshot(&self) -> RegistryDoc {
        self.doc.lock().clone()
    }

    /// Register (or refresh) an export.
    pub fn register_export(
        &self,
        var: &str,
        owner: &DestinationId,
        friendly_name: Option<String>,
        scope: ExportScope,
        now: DateTime<Utc>,
    ) {
        let entry = ExportEntry { owner: owner.clone(), friendly_name, timestamp: now };
        let mut doc = self.doc.lock();
        match scope {
            ExportScope::Global => {
                doc.global.insert(var.to_string(), entry);
            }
            ExportScope::Group(group) => {
                doc.groups.entry(group).or_default().insert(var.to_string(), entry);
            }
        }
        tracing::info!(var, %owner, "variable exported");
    }

    /// Remove an owner's export of `var` and every downstream import wired
    /// to it. Returns the importers that were detached.
    pub fn remove_export(
        &self,
        var: &str,
        owner: &DestinationId,
        owner_groups: &[String],
    ) -> Vec<DestinationId> {
        let detached = self.importers_of(var, owner, owner_groups);
        let mut doc = self.doc.lock();

        if doc.global.get(var).is_some_and(|e| &e.owner == owner) {
            doc.global.remove(var);
        }
        for exports in doc.groups.values_mut() {
            if exports.get(var).is_some_and(|e| &e.owner == owner) {
                exports.remove(var);
            }
        }
        doc.groups.retain(|_, exports| !exports.is_empty());

        if let Some(importers) = doc.imports.get_mut(var) {
            for (dest, _) in &detached {
                importers.remove(dest.as_str());
            }
            if importers.is_empty() {
                doc.imports.remove(var);
            }
        }
        if !detached.is_empty() {
            tracing::info!(var, %owner, count = detached.len(), "export removed with downstream imports");
        }
        detached.into_iter().map(|(dest, _)| dest).collect()
    }

    /// Register an import of `var_name` by `importer` under `alias`.
    pub fn register_import(
        &self,
        var_name: &str,
        importer: &DestinationId,
        alias: &str,
        source_type: ImportSourceType,
        source: &str,
        now: DateTime<Utc>,
    ) {
        let entry = ImportEntry {
            imported_as: alias.to_string(),
            source_type,
            source: source.to_string(),
            timestamp: now,
        };
        self.doc
            .lock()
            .imports
            .entry(var_name.to_string())
            .or_default()
            .insert(importer.clone(), entry);
        tracing::info!(var_name, %importer, alias, "variable imported");
    }

    /// Remove `importer`'s import of `var_name`.
    pub fn remove_import(&self, var_name: &str, importer: &DestinationId) -> bool {
        let mut doc = self.doc.lock();
        let Some(importers) = doc.imports.get_mut(var_name) else {
            return false;
        };
        let removed = importers.remove(importer.as_str()).is_some();
        if importers.is_empty() {
            doc.imports.remove(var_name);
        }
        removed
    }

    /// The owner of `var` visible from `scope`, if exported.
    pub fn export_owner(&self, var: &str, scope: &ExportScope) -> Option<DestinationId> {
        let doc = self.doc.lock();
        match scope {
            ExportScope::Global => doc.global.get(var).map(|e| e.owner.clone()),
            ExportScope::Group(group) => {
                doc.groups.get(group).and_then(|exports| exports.get(var)).map(|e| e.owner.clone())
            }
        }
    }

    /// Importers that read `owner`'s value of `var`, as
    /// `(importer, local alias)` pairs.
    pub fn importers_of(
        &self,
        var: &str,
        owner: &DestinationId,
        owner_groups: &[String],
    ) -> Vec<(DestinationId, String)> {
        let doc = self.doc.lock();
        let Some(importers) = doc.imports.get(var) else {
            return Vec::new();
        };
        importers
            .iter()
            .filter(|(_, entry)| match entry.source_type {
                ImportSourceType::Destination => entry.source == owner.as_str(),
                ImportSourceType::Scope => {
                    doc.global.get(var).is_some_and(|e| &e.owner == owner)
                }
                ImportSourceType::Group => {
                    owner_groups.iter().any(|g| g == &entry.source)
                        && doc
                            .groups
                            .get(&entry.source)
                            .and_then(|exports| exports.get(var))
                            .is_some_and(|e| &e.owner == owner)
                }
            })
            .map(|(dest, entry)| (dest.clone(), entry.imported_as.clone()))
            .collect()
    }
}

#[cfg(test)]
#[path = "registry_tests.rs"]
mod tests;
