//! Engine configuration and validation.
//!
//! Configuration is read from TOML; every field has a default so an empty
//! file is a valid configuration.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Validation result containing all found issues.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// List of validation errors (fatal).
    pub errors: Vec<String>,
    /// List of validation warnings (non-fatal).
    pub warnings: Vec<String>,
}

impl ValidationResult {
    /// Returns true if validation passed (no errors).
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    /// Adds an error to the result.
    pub fn add_error(&mut self, msg: impl Into<String>) {
        self.errors.push(msg.into());
    }

    /// Adds a warning to the result.
    pub fn add_warning(&mut self, msg: impl Into<String>) {
        self.warnings.push(msg.into());
    }

    /// Converts to a Result, failing if there are errors.
    pub fn into_result(self) -> Result<Vec<String>> {
        if self.is_valid() {
            Ok(self.warnings)
        } else {
            Err(Error::Config(self.errors.join("; ")))
        }
    }
}

/// Trait for validatable configuration types.
pub trait Validate {
    /// Validates the configuration and returns any issues found.
    fn validate(&self) -> ValidationResult;
}

/// Settings for the self-healing loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Maximum deploy attempts per run.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Length of one backoff unit in milliseconds. Zero disables waiting.
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,
    /// Cap on the backoff, in units.
    #[serde(default = "default_max_backoff_units")]
    pub max_backoff_units: u32,
}

fn default_max_retries() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

fn default_max_backoff_units() -> u32 {
    8
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_unit_ms: default_backoff_unit_ms(),
            max_backoff_units: default_max_backoff_units(),
        }
    }
}

impl EngineConfig {
    /// Returns the backoff unit as a Duration.
    pub fn backoff_unit(&self) -> Duration {
        Duration::from_millis(self.backoff_unit_ms)
    }

    /// Parses a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Reads and parses a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_toml_str(&text)
    }
}

impl Validate for EngineConfig {
    fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.max_retries == 0 {
            result.add_error("max_retries must be at least 1");
        }

        if self.max_retries > 10 {
            result.add_warning("max_retries > 10 may keep redeploying a failure that cannot heal");
        }

        if self.max_backoff_units == 0 {
            result.add_error("max_backoff_units must be at least 1");
        }

        if self.backoff_unit() > Duration::from_secs(60) {
            result.add_warning("backoff unit over 60 seconds makes a full run take very long");
        }

        result
    }
}
