//! Configuration file and database location
//!
//! ```toml
//! [database]
//! path = "/var/lib/press-import/metrics.db"
//!
//! [import]
//! scan_window = 30
//! total_tolerance = 0.5
//! max_in_flight = 16
//! max_consecutive_failures = 5
//!
//! [schedule]
//! mode = "fixed"
//! hours = [24, 24, 24, 24, 24, 16, 0]
//!
//! [[machines]]
//! id = "P-1200"
//! name = "1200 Ton Press"
//! target_rate = 450
//! aliases = ["Press 12"]
//!
//! [[layouts]]
//! name = "weekly-hits"
//! sheet_pattern = "^hits"
//! header_keywords = ["machine"]
//! total_offset = 7
//!
//! [[reference_sets]]
//! name = "crews"
//! table = "crews"
//! references = [{ table = "crew_hours", column = "crew_id" }]
//! ```

pub mod layout;
pub mod repository;

pub use layout::*;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::ingest::aggregate::DEFAULT_TOTAL_TOLERANCE;
use crate::ingest::locate::DEFAULT_SCAN_WINDOW;
use crate::ingest::reconcile::{DEFAULT_MAX_CONSECUTIVE_FAILURES, DEFAULT_MAX_IN_FLIGHT, ReferenceSet};
use crate::ingest::types::{MachineProfile, MachineRegistry, OperatingSchedule};

const APP_DIR: &str = "press-import";

/// Environment variable pointing at the config file
pub const CONFIG_ENV: &str = "PRESS_IMPORT_CONFIG";
/// Environment variable overriding the database path
pub const DATABASE_ENV: &str = "PRESS_IMPORT_DATABASE";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Tuning for the import pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportSettings {
    /// Rows scanned for a header
    #[serde(default = "default_scan_window")]
    pub scan_window: usize,
    /// Sheet total vs day sum difference treated as rounding
    #[serde(default = "default_total_tolerance")]
    pub total_tolerance: f64,
    /// Storage writes in flight
    #[serde(default = "default_max_in_flight")]
    pub max_in_flight: usize,
    /// Failures in a row before the run is abandoned; 0 never abandons
    #[serde(default = "default_max_consecutive_failures")]
    pub max_consecutive_failures: usize,
}

fn default_scan_window() -> usize {
    DEFAULT_SCAN_WINDOW
}

fn default_total_tolerance() -> f64 {
    DEFAULT_TOTAL_TOLERANCE
}

fn default_max_in_flight() -> usize {
    DEFAULT_MAX_IN_FLIGHT
}

fn default_max_consecutive_failures() -> usize {
    DEFAULT_MAX_CONSECUTIVE_FAILURES
}

impl Default for ImportSettings {
    fn default() -> Self {
        ImportSettings {
            scan_window: default_scan_window(),
            total_tolerance: default_total_tolerance(),
            max_in_flight: default_max_in_flight(),
            max_consecutive_failures: default_max_consecutive_failures(),
        }
    }
}

/// Everything read from the config file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub import: ImportSettings,
    #[serde(default)]
    pub schedule: OperatingSchedule,
    #[serde(default)]
    pub machines: Vec<MachineProfile>,
    #[serde(default)]
    pub layouts: Vec<SheetLayout>,
    #[serde(default)]
    pub reference_sets: Vec<ReferenceSet>,
}

impl Config {
    /// Load from an explicit path, `$PRESS_IMPORT_CONFIG`, or the default
    /// location; a missing default file yields the default config
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let (path, required) = match explicit {
            Some(path) => (path.to_path_buf(), true),
            None => match std::env::var_os(CONFIG_ENV) {
                Some(path) => (PathBuf::from(path), true),
                None => (default_config_path()?, false),
            },
        };

        if !path.exists() {
            if required {
                bail!("Config file does not exist: {}", path.display());
            }
            log::debug!("No config at {}, using defaults", path.display());
            return Ok(Config::default());
        }

        Config::from_file(&path)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config = Config::parse(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.import.scan_window == 0 {
            bail!("import.scan_window must be at least 1");
        }
        if !(self.import.total_tolerance.is_finite() && self.import.total_tolerance >= 0.0) {
            bail!("import.total_tolerance must be a non-negative number");
        }
        if let Err(e) = self.schedule.validate() {
            bail!("schedule: {}", e);
        }

        MachineRegistry::new(self.machines.clone())?;

        let mut names = HashSet::new();
        for layout in &self.layouts {
            layout.compile()?;
            if !names.insert(layout.name.as_str()) {
                bail!("Duplicate layout name '{}'", layout.name);
            }
        }

        let mut set_names = HashSet::new();
        for set in &self.reference_sets {
            set.validate()
                .with_context(|| format!("Reference set '{}'", set.name))?;
            if !set_names.insert(set.name.as_str()) {
                bail!("Duplicate reference set name '{}'", set.name);
            }
        }

        Ok(())
    }

    /// Configured layouts, or the default one when none are configured
    pub fn layouts(&self) -> Vec<SheetLayout> {
        if self.layouts.is_empty() {
            vec![SheetLayout::default()]
        } else {
            self.layouts.clone()
        }
    }

    pub fn machine_registry(&self) -> Result<MachineRegistry> {
        MachineRegistry::new(self.machines.clone())
    }

    /// Look up a reference set by name; `shifts` is always available
    pub fn reference_set(&self, name: &str) -> Option<ReferenceSet> {
        self.reference_sets
            .iter()
            .find(|s| s.name == name)
            .cloned()
            .or_else(|| (name == "shifts").then(ReferenceSet::shifts))
    }

    /// `$PRESS_IMPORT_DATABASE`, then `database.path`, then the data directory
    pub fn database_path(&self) -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(DATABASE_ENV) {
            return Ok(PathBuf::from(path));
        }
        if let Some(path) = &self.database.path {
            return Ok(path.clone());
        }
        let data_dir = dirs::data_dir().context("Could not determine data directory")?;
        Ok(data_dir.join(APP_DIR).join("metrics.db"))
    }
}

/// `<config_dir>/press-import/config.toml`
pub fn default_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().context("Could not determine config directory")?;
    Ok(config_dir.join(APP_DIR).join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
        [import]
        max_in_flight = 4

        [schedule]
        mode = "fixed"
        hours = [16, 16, 16, 16, 16, 0, 0]

        [[machines]]
        id = "P-1200"
        name = "1200 Ton Press"
        target_rate = 450
        aliases = ["Press 12"]

        [[machines]]
        id = "P-800"
        name = "800 Ton Press"
        target_rate = 300.5

        [[layouts]]
        name = "weekly-hits"
        sheet_pattern = "^hits"
        header_keywords = ["machine"]
        total_offset = 7

        [[reference_sets]]
        name = "crews"
        table = "crews"
        references = [{ table = "crew_hours", column = "crew_id" }]
    "#;

    #[test]
    fn test_parse_sample_config() {
        let config = Config::parse(SAMPLE).unwrap();

        assert_eq!(config.import.max_in_flight, 4);
        assert_eq!(config.import.scan_window, DEFAULT_SCAN_WINDOW);
        assert_eq!(config.machines.len(), 2);
        assert_eq!(config.machines[0].target_rate, 450.0);
        assert_eq!(config.layouts()[0].total_offset, Some(7));
        assert!(matches!(config.schedule, OperatingSchedule::Fixed { .. }));
        assert_eq!(config.reference_set("crews").unwrap().table, "crews");
        assert_eq!(config.reference_set("shifts"), Some(ReferenceSet::shifts()));
        assert!(config.reference_set("nope").is_none());
    }

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = Config::parse("").unwrap();

        assert_eq!(config.import, ImportSettings::default());
        assert_eq!(config.schedule, OperatingSchedule::default());
        assert_eq!(config.layouts(), vec![SheetLayout::default()]);
    }

    #[test]
    fn test_duplicate_layout_names_rejected() {
        let content = r#"
            [[layouts]]
            name = "a"
            header_keywords = ["machine"]

            [[layouts]]
            name = "a"
            header_keywords = ["press"]
        "#;
        assert!(Config::parse(content).is_err());
    }

    #[test]
    fn test_duplicate_machine_ids_rejected() {
        let content = r#"
            [[machines]]
            id = "P-1"
            name = "One"
            target_rate = 10

            [[machines]]
            id = "P-1"
            name = "Other"
            target_rate = 10
        "#;
        assert!(Config::parse(content).is_err());
    }

    #[test]
    fn test_unsafe_reference_set_rejected() {
        let content = r#"
            [[reference_sets]]
            name = "bad"
            table = "crews; --"
            references = []
        "#;
        assert!(Config::parse(content).is_err());
    }

    #[test]
    fn test_explicit_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(Config::load(Some(&dir.path().join("missing.toml"))).is_err());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = Config::load(Some(&path)).unwrap();
        assert_eq!(config.machines[1].id, "P-800");
    }
}
