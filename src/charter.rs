//! Project charter document.
//!
//! A charter declares what the project is for (`goals`), what work belongs to
//! it (`in_scope`), what work does not (`out_of_scope`), and hard rules every
//! request must respect (`constraints`). The alignment gate consumes one
//! charter per workflow start.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single charter rule: a human-readable summary plus the keywords the
/// rule-based judge matches requests against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CharterRule {
    /// Human-readable statement of the rule, cited back to the requester
    pub summary: String,
    /// Lowercased terms that indicate a request touches this rule
    #[serde(default)]
    pub keywords: Vec<String>,
}

impl CharterRule {
    pub fn new(summary: &str, keywords: &[&str]) -> Self {
        Self {
            summary: summary.to_string(),
            keywords: keywords.iter().map(|k| k.to_lowercase()).collect(),
        }
    }

    /// Check whether the request text touches this rule.
    pub fn matches(&self, request: &str) -> bool {
        let request = request.to_lowercase();
        self.keywords.iter().any(|k| request.contains(k.as_str()))
    }
}

/// The charter document consumed by the alignment gate.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Charter {
    #[serde(default)]
    pub goals: Vec<CharterRule>,
    #[serde(default)]
    pub in_scope: Vec<CharterRule>,
    #[serde(default)]
    pub out_of_scope: Vec<CharterRule>,
    #[serde(default)]
    pub constraints: Vec<CharterRule>,
}

impl Charter {
    /// Load a charter from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read charter file: {}", path.display()))?;

        let charter: Charter = toml::from_str(&content)
            .with_context(|| format!("Failed to parse charter TOML: {}", path.display()))?;

        Ok(charter)
    }

    /// Save the charter to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            toml::to_string_pretty(self).context("Failed to serialize charter to TOML")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write charter file: {}", path.display()))?;

        Ok(())
    }

    /// Starter charter written by `cadence init`.
    pub fn starter() -> Self {
        Self {
            goals: vec![CharterRule::new(
                "Describe what this project is for",
                &["example"],
            )],
            in_scope: vec![CharterRule::new(
                "Work this pipeline should accept",
                &["feature", "fix"],
            )],
            out_of_scope: vec![CharterRule::new(
                "Work this pipeline should refuse",
                &["redesign"],
            )],
            constraints: vec![CharterRule::new(
                "Hard rules every request must respect",
                &["secret"],
            )],
        }
    }
}
