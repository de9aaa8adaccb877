// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Destination and group configuration.
//!
//! Read-only input to the scheduler core: which destinations exist and which
//! named groups they belong to. Loaded from a TOML document.

use crate::destination::DestinationId;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

/// One configured output destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DestinationDef {
    pub id: DestinationId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Network address of the backing device, when there is one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_address: Option<String>,
    #[serde(default)]
    pub groups: Vec<String>,
}

/// The full destination/group map.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DestinationsConfig {
    #[serde(default, rename = "destination")]
    pub destinations: Vec<DestinationDef>,
}

impl DestinationsConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Ok(Self::from_toml_str(&text)?)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(text)
    }

    pub fn all_destinations(&self) -> Vec<DestinationId> {
        self.destinations.iter().map(|d| d.id.clone()).collect()
    }

    pub fn destinations_of(&self, group: &str) -> Vec<DestinationId> {
        self.destinations
            .iter()
            .filter(|d| d.groups.iter().any(|g| g == group))
            .map(|d| d.id.clone())
            .collect()
    }

    pub fn groups_of(&self, dest: &str) -> Vec<String> {
        self.destinations
            .iter()
            .find(|d| d.id == dest)
            .map(|d| d.groups.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, dest: &str) -> bool {
        self.destinations.iter().any(|d| d.id == dest)
    }

    pub fn is_group(&self, name: &str) -> bool {
        self.destinations.iter().any(|d| d.groups.iter().any(|g| g == name))
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
