//! Invocation contract construction and the per-stage dispatch log.
//!
//! The invoker reads every upstream artifact a stage declares, folds their
//! payloads into the instructions handed to the capability boundary, and
//! names the single output path the capability must populate. It does not
//! execute anything itself.

use std::fs;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::artifact::{Artifact, ArtifactStore};
use crate::errors::{ArtifactError, PipelineError, StageError};
use crate::manifest::WorkflowManifest;
use crate::stage::{ModelTier, StageDefinition};

/// Everything the capability boundary needs to run one stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvocationContract {
    pub capability_id: String,
    pub stage_name: String,
    pub workflow_id: String,
    pub model_tier: ModelTier,
    /// Full task instructions, including upstream artifact payloads
    pub instructions: String,
    /// The one path the capability must write its artifact to
    pub expected_artifact_path: PathBuf,
}

/// Composes invocation contracts from the artifact store.
pub struct StageInvoker {
    store: Arc<ArtifactStore>,
}

impl StageInvoker {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    /// Build the contract for one stage.
    ///
    /// Fails fast if any declared upstream artifact is missing or fails to
    /// parse; a stage must never run with partial context.
    pub fn build(
        &self,
        stage: &StageDefinition,
        workflow_id: &str,
    ) -> Result<InvocationContract, PipelineError> {
        let manifest_path = self.store.workflow_dir(workflow_id).join("manifest.json");
        let manifest = WorkflowManifest::load(&manifest_path).map_err(|_| {
            PipelineError::WorkflowNotFound {
                workflow_id: workflow_id.to_string(),
            }
        })?;

        let mut upstream: Vec<Artifact> = Vec::new();
        for dep in &stage.required_upstream_artifacts {
            let artifact =
                self.store
                    .read(workflow_id, dep)
                    .map_err(|e| StageError::UpstreamUnavailable {
                        stage: stage.name.clone(),
                        dependency: dep.clone(),
                        source: e,
                    })?;
            upstream.push(artifact);
        }

        let expected_artifact_path = self.store.artifact_path(workflow_id, &stage.name)?;
        let instructions = compose_instructions(stage, &manifest, &upstream, &expected_artifact_path);

        Ok(InvocationContract {
            capability_id: stage.capability_id.clone(),
            stage_name: stage.name.clone(),
            workflow_id: workflow_id.to_string(),
            model_tier: stage.model_tier,
            instructions,
            expected_artifact_path,
        })
    }
}

fn compose_instructions(
    stage: &StageDefinition,
    manifest: &WorkflowManifest,
    upstream: &[Artifact],
    output_path: &std::path::Path,
) -> String {
    let mut sections = String::new();

    sections.push_str(&format!(
        "## TASK\nYou are the {} stage of workflow {}.\n{}\n",
        stage.name,
        manifest.workflow_id,
        task_summary(&stage.name),
    ));

    sections.push_str(&format!(
        "\n## REQUEST\n{}\n",
        manifest.original_request
    ));

    if !upstream.is_empty() {
        sections.push_str("\n## UPSTREAM ARTIFACTS\n");
        for artifact in upstream {
            sections.push_str(&format!(
                "### {}\n{}\n",
                artifact.stage_name,
                serde_json::to_string_pretty(&artifact.payload)
                    .unwrap_or_else(|_| "{}".to_string()),
            ));
        }
    }

    sections.push_str(&format!(
        r#"
## OUTPUT CONTRACT
Write exactly one JSON document to:
{}
with fields: schema_version (1), stage_name ("{}"), workflow_id ("{}"),
status ("completed"), payload (your output), created_at (RFC 3339).
The file is the only completion signal that counts; write it atomically
(temp file, then rename) and do not write it until the work is done.
"#,
        output_path.display(),
        stage.name,
        manifest.workflow_id,
    ));

    sections
}

fn task_summary(stage_name: &str) -> &'static str {
    match stage_name {
        "research" => "Survey prior art and existing code relevant to the request.",
        "design" => "Produce an architecture for the request grounded in the research.",
        "test_authoring" => "Write the test plan that will verify the implementation.",
        "implementation" => "Implement the design so the authored tests pass.",
        "review" => "Review the implementation for correctness and maintainability.",
        "security_audit" => "Audit the implementation for security defects.",
        "docs_sync" => "Bring project documentation in line with what was built.",
        _ => "Produce this stage's output artifact for the request.",
    }
}

// ---------------------------------------------------------------------------
// Invocation log
// ---------------------------------------------------------------------------

/// One dispatch of a stage to the capability boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationRecord {
    pub stage_name: String,
    pub capability_id: String,
    /// 1-based attempt counter across the workflow's lifetime
    pub attempt: u32,
    pub dispatched_at: DateTime<Utc>,
    /// The capability's advisory outcome, recorded after return; never
    /// treated as a completion signal
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub advisory_outcome: Option<String>,
}

/// Append-only dispatch log, one JSON line per record, one file per stage.
///
/// The health monitor uses this to tell `not_started` apart from `running`,
/// and the coordinator uses it to enforce the re-invocation budget.
pub struct InvocationLog {
    store: Arc<ArtifactStore>,
}

impl InvocationLog {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    fn log_path(&self, workflow_id: &str, stage_name: &str) -> PathBuf {
        self.store
            .workflow_dir(workflow_id)
            .join("invocations")
            .join(format!("{stage_name}.jsonl"))
    }

    /// Record a dispatch before handing the contract to the capability.
    /// Returns the record with its attempt number filled.
    pub fn record_dispatch(
        &self,
        workflow_id: &str,
        stage_name: &str,
        capability_id: &str,
    ) -> Result<InvocationRecord> {
        let attempt = self.attempt_count(workflow_id, stage_name)? + 1;
        let record = InvocationRecord {
            stage_name: stage_name.to_string(),
            capability_id: capability_id.to_string(),
            attempt,
            dispatched_at: Utc::now(),
            advisory_outcome: None,
        };
        self.append(workflow_id, stage_name, &record)?;
        Ok(record)
    }

    /// Record the advisory outcome of an attempt after the capability
    /// returns. Appends a second line for the same attempt number; the
    /// log stays append-only.
    pub fn record_outcome(
        &self,
        workflow_id: &str,
        stage_name: &str,
        attempt: u32,
        capability_id: &str,
        outcome: &str,
    ) -> Result<()> {
        let record = InvocationRecord {
            stage_name: stage_name.to_string(),
            capability_id: capability_id.to_string(),
            attempt,
            dispatched_at: Utc::now(),
            advisory_outcome: Some(outcome.to_string()),
        };
        self.append(workflow_id, stage_name, &record)
    }

    fn append(
        &self,
        workflow_id: &str,
        stage_name: &str,
        record: &InvocationRecord,
    ) -> Result<()> {
        let path = self.log_path(workflow_id, stage_name);
        fs::create_dir_all(path.parent().expect("log path has a parent"))
            .context("Failed to create invocations directory")?;

        let line = serde_json::to_string(record).context("Failed to serialize invocation")?;
        fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .context("Failed to open invocation log")?
            .write_all(format!("{line}\n").as_bytes())
            .context("Failed to write invocation record")?;

        Ok(())
    }

    /// All recorded dispatches for a stage, oldest first.
    pub fn records(&self, workflow_id: &str, stage_name: &str) -> Result<Vec<InvocationRecord>> {
        let path = self.log_path(workflow_id, stage_name);
        if !path.exists() {
            return Ok(Vec::new());
        }

        let content =
            fs::read_to_string(&path).context("Failed to read invocation log")?;

        Ok(content
            .lines()
            .filter(|line| !line.is_empty())
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }

    /// Number of dispatches recorded for a stage (outcome lines share the
    /// attempt number of their dispatch, so this is the max attempt seen).
    pub fn attempt_count(&self, workflow_id: &str, stage_name: &str) -> Result<u32> {
        Ok(self
            .records(workflow_id, stage_name)?
            .iter()
            .map(|r| r.attempt)
            .max()
            .unwrap_or(0))
    }

    /// Timestamp of the most recent dispatch, if any.
    pub fn last_dispatched_at(
        &self,
        workflow_id: &str,
        stage_name: &str,
    ) -> Result<Option<DateTime<Utc>>> {
        Ok(self
            .records(workflow_id, stage_name)?
            .last()
            .map(|r| r.dispatched_at))
    }
}
