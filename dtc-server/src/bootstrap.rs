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

//! Startup preparation of the results directory.

use anyhow::{Context, Result};
use dtc_storage::{ResultsLayout, SeedOutcome, SettingsStore};

use crate::config::GatewayConfig;

/// Create the results directory and seed `settings.json` from the defaults
/// template. An existing settings document is never overwritten.
pub fn prepare(config: &GatewayConfig) -> Result<()> {
    let results_dir = &config.storage.results_dir;
    std::fs::create_dir_all(results_dir)
        .with_context(|| format!("Failed to create results directory {:?}", results_dir))?;

    let settings = SettingsStore::new(&ResultsLayout::new(results_dir));
    let defaults = config.storage.defaults_path();
    match settings.seed_from(&defaults)? {
        SeedOutcome::Seeded => {
            tracing::info!("Seeded {:?} from {:?}", settings.path(), defaults)
        }
        SeedOutcome::AlreadyPresent => {
            tracing::debug!("Keeping existing settings at {:?}", settings.path())
        }
        SeedOutcome::DefaultsMissing => {
            tracing::warn!("No defaults template at {:?}, settings start empty", defaults)
        }
    }

    if !config.storage.web_dir.is_dir() {
        tracing::warn!(
            "Web UI directory {:?} does not exist, only the API will be served",
            config.storage.web_dir
        );
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn config_in(dir: &TempDir) -> GatewayConfig {
        let mut config = GatewayConfig::default();
        config.storage.results_dir = dir.path().join("results");
        config.storage.web_dir = dir.path().join("web");
        config
    }

    #[test]
    fn test_prepare_seeds_settings() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        fs::create_dir_all(&config.storage.web_dir).unwrap();
        fs::write(config.storage.web_dir.join("defaults.json"), b"{\"steps\":20}").unwrap();

        prepare(&config).unwrap();

        let seeded = fs::read(config.storage.results_dir.join("settings.json")).unwrap();
        assert_eq!(seeded, b"{\"steps\":20}");
    }

    #[test]
    fn test_prepare_keeps_existing_settings() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);
        fs::create_dir_all(&config.storage.web_dir).unwrap();
        fs::write(config.storage.web_dir.join("defaults.json"), b"{\"steps\":20}").unwrap();
        fs::create_dir_all(&config.storage.results_dir).unwrap();
        fs::write(config.storage.results_dir.join("settings.json"), b"{\"steps\":4}").unwrap();

        prepare(&config).unwrap();

        let kept = fs::read(config.storage.results_dir.join("settings.json")).unwrap();
        assert_eq!(kept, b"{\"steps\":4}");
    }

    #[test]
    fn test_prepare_without_defaults() {
        let dir = TempDir::new().unwrap();
        let config = config_in(&dir);

        prepare(&config).unwrap();

        assert!(config.storage.results_dir.is_dir());
        assert!(!config.storage.results_dir.join("settings.json").exists());
    }
}
