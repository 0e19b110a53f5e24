//! Settings file for cadence.
//!
//! Read from `.cadence/cadence.toml`. All fields have defaults so a missing
//! or partial file is fine.
//!
//! # Format
//!
//! ```toml
//! [capability]
//! command = "cadence-capability"
//!
//! [pipeline]
//! poll_interval_secs = 5
//! stall_threshold_secs = 900
//! max_attempts = 3
//! ```

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::coordinator::CoordinatorConfig;

/// Settings for the capability-execution boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CapabilitySettings {
    /// Shell command run per stage dispatch (instructions arrive on stdin)
    #[serde(default = "default_capability_command")]
    pub command: String,
}

impl Default for CapabilitySettings {
    fn default() -> Self {
        Self {
            command: default_capability_command(),
        }
    }
}

/// Settings for the coordinator's poll loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineSettings {
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_stall_threshold_secs")]
    pub stall_threshold_secs: u64,
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            stall_threshold_secs: default_stall_threshold_secs(),
            max_attempts: default_max_attempts(),
        }
    }
}

fn default_capability_command() -> String {
    std::env::var("CADENCE_CAPABILITY_CMD").unwrap_or_else(|_| "cadence-capability".to_string())
}

fn default_poll_interval_secs() -> u64 {
    5
}

fn default_stall_threshold_secs() -> u64 {
    900
}

fn default_max_attempts() -> u32 {
    3
}

/// The full `cadence.toml` document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub capability: CapabilitySettings,
    #[serde(default)]
    pub pipeline: PipelineSettings,
}

impl Settings {
    /// Load settings, falling back to defaults when the file is absent.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read settings file: {}", path.display()))?;

        let settings: Settings = toml::from_str(&content)
            .with_context(|| format!("Failed to parse settings TOML: {}", path.display()))?;

        Ok(settings)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize settings to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write settings file: {}", path.display()))?;

        Ok(())
    }

    /// Translate the pipeline section into coordinator knobs.
    pub fn coordinator_config(&self) -> CoordinatorConfig {
        CoordinatorConfig {
            poll_interval: Duration::from_secs(self.pipeline.poll_interval_secs),
            stall_threshold: Duration::from_secs(self.pipeline.stall_threshold_secs),
            max_attempts: self.pipeline.max_attempts,
        }
    }
}
