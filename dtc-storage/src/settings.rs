// Copyright 2025 DTC Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Shared settings document.
//!
//! A project-independent JSON blob owned by the web UI. It is seeded once from
//! the bundled defaults and otherwise only read here.

use serde_json::{Map, Value};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::{Result, StorageError};
use crate::layout::ResultsLayout;

#[derive(Debug, Clone, PartialEq)]
pub enum SettingsState {
    Absent,
    Unreadable { reason: String },
    Present(Value),
}

/// Result of seeding the settings document from defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeedOutcome {
    Seeded,
    AlreadyPresent,
    DefaultsMissing,
}

#[derive(Debug, Clone)]
pub struct SettingsStore {
    path: PathBuf,
}

impl SettingsStore {
    pub fn new(layout: &ResultsLayout) -> Self {
        Self {
            path: layout.settings_path(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load(&self) -> SettingsState {
        let bytes = match fs::read(&self.path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return SettingsState::Absent,
            Err(e) => {
                return SettingsState::Unreadable {
                    reason: e.to_string(),
                }
            }
        };
        match serde_json::from_slice(&bytes) {
            Ok(value) => SettingsState::Present(value),
            Err(e) => SettingsState::Unreadable {
                reason: e.to_string(),
            },
        }
    }

    /// The settings document, or an empty object when absent or unreadable.
    pub fn document(&self) -> Value {
        match self.load() {
            SettingsState::Present(value) => value,
            SettingsState::Absent => Value::Object(Map::new()),
            SettingsState::Unreadable { reason } => {
                warn!("Settings document unreadable, serving empty: {}", reason);
                Value::Object(Map::new())
            }
        }
    }

    /// Copy `defaults` into place unless a settings document already exists.
    pub fn seed_from(&self, defaults: &Path) -> Result<SeedOutcome> {
        if self.path.exists() {
            return Ok(SeedOutcome::AlreadyPresent);
        }
        if !defaults.exists() {
            return Ok(SeedOutcome::DefaultsMissing);
        }
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| StorageError::io(parent, e))?;
        }
        fs::copy(defaults, &self.path).map_err(|e| StorageError::io(&self.path, e))?;
        Ok(SeedOutcome::Seeded)
    }
}
