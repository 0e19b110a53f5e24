//! Stage definitions and the static stage table.
//!
//! This module provides:
//! - `StageDefinition` describing one unit of pipeline work
//! - `ModelTier` for the cost/quality tier a stage runs at
//! - `StageTable`, the validated set of stages forming a dependency DAG
//! - The built-in seven-stage table used by the reference pipeline

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use crate::errors::StageError;

/// Cost/quality tier requested when invoking the capability for a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ModelTier {
    /// Cheapest tier, for mechanical work
    Fast,
    /// Balanced default
    #[default]
    Standard,
    /// Most capable tier, for open-ended work
    Deep,
}

/// One named unit of pipeline work with declared upstream dependencies and
/// exactly one expected output artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageDefinition {
    /// Stage name (e.g. "design"); unique within a table
    pub name: String,
    /// Position in the pipeline; lower ordinals run first
    pub ordinal: u32,
    /// Names of stages whose artifacts this stage consumes
    #[serde(default)]
    pub required_upstream_artifacts: BTreeSet<String>,
    /// Filename of the artifact this stage must produce
    pub expected_output_artifact: String,
    /// Identifier handed to the capability-execution boundary
    pub capability_id: String,
    /// Tier the capability should run at
    #[serde(default)]
    pub model_tier: ModelTier,
}

impl ModelTier {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fast => "fast",
            Self::Standard => "standard",
            Self::Deep => "deep",
        }
    }
}

impl StageDefinition {
    pub fn new(
        name: &str,
        ordinal: u32,
        upstream: &[&str],
        artifact: &str,
        capability_id: &str,
        model_tier: ModelTier,
    ) -> Self {
        Self {
            name: name.to_string(),
            ordinal,
            required_upstream_artifacts: upstream.iter().map(|s| s.to_string()).collect(),
            expected_output_artifact: artifact.to_string(),
            capability_id: capability_id.to_string(),
            model_tier,
        }
    }
}

/// A validated, ordinal-sorted set of stage definitions.
///
/// Construction rejects duplicate stage names, duplicate output artifacts,
/// unknown dependencies, and dependencies that do not point strictly
/// backwards in ordinal order (which also rules out cycles).
#[derive(Debug, Clone)]
pub struct StageTable {
    stages: Vec<StageDefinition>,
}

impl StageTable {
    pub fn new(mut stages: Vec<StageDefinition>) -> Result<Self, StageError> {
        stages.sort_by_key(|s| s.ordinal);

        let mut seen_names: BTreeSet<&str> = BTreeSet::new();
        for stage in &stages {
            if !seen_names.insert(&stage.name) {
                return Err(StageError::DuplicateStage {
                    stage: stage.name.clone(),
                });
            }
        }

        for (i, a) in stages.iter().enumerate() {
            for b in &stages[i + 1..] {
                if a.expected_output_artifact == b.expected_output_artifact {
                    return Err(StageError::DuplicateArtifact {
                        artifact: a.expected_output_artifact.clone(),
                        first: a.name.clone(),
                        second: b.name.clone(),
                    });
                }
            }
        }

        for stage in &stages {
            for dep in &stage.required_upstream_artifacts {
                let Some(upstream) = stages.iter().find(|s| &s.name == dep) else {
                    return Err(StageError::UnknownDependency {
                        stage: stage.name.clone(),
                        dependency: dep.clone(),
                    });
                };
                if upstream.ordinal >= stage.ordinal {
                    return Err(StageError::OrdinalInversion {
                        stage: stage.name.clone(),
                        dependency: dep.clone(),
                    });
                }
            }
        }

        Ok(Self { stages })
    }

    /// All stages, sorted by ordinal.
    pub fn stages(&self) -> &[StageDefinition] {
        &self.stages
    }

    pub fn len(&self) -> usize {
        self.stages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stages.is_empty()
    }

    /// Look up a stage by name.
    pub fn get(&self, name: &str) -> Option<&StageDefinition> {
        self.stages.iter().find(|s| s.name == name)
    }
}

/// The built-in seven-stage pipeline table.
pub fn default_stage_table() -> StageTable {
    let stages = vec![
        StageDefinition::new(
            "research",
            1,
            &[],
            "research.json",
            "cap.research",
            ModelTier::Deep,
        ),
        StageDefinition::new(
            "design",
            2,
            &["research"],
            "design.json",
            "cap.design",
            ModelTier::Deep,
        ),
        StageDefinition::new(
            "test_authoring",
            3,
            &["design"],
            "test_plan.json",
            "cap.test-authoring",
            ModelTier::Standard,
        ),
        StageDefinition::new(
            "implementation",
            4,
            &["design", "test_authoring"],
            "implementation.json",
            "cap.implementation",
            ModelTier::Deep,
        ),
        StageDefinition::new(
            "review",
            5,
            &["implementation"],
            "review.json",
            "cap.review",
            ModelTier::Standard,
        ),
        StageDefinition::new(
            "security_audit",
            6,
            &["implementation"],
            "security_audit.json",
            "cap.security-audit",
            ModelTier::Deep,
        ),
        StageDefinition::new(
            "docs_sync",
            7,
            &["review", "security_audit"],
            "docs_sync.json",
            "cap.docs-sync",
            ModelTier::Fast,
        ),
    ];

    StageTable::new(stages).expect("built-in stage table is valid")
}
