//! Versioned, write-once artifact documents and their durable store.
//!
//! An artifact file is the *only* trustworthy signal that a stage completed.
//! Return values, log lines, and textual claims of success from the
//! capability boundary are all advisory; the store is the ground truth every
//! other component re-derives state from.
//!
//! Writes go to a temporary path in the same directory and are renamed into
//! place, so a concurrent reader sees either no file or a fully-written one.
//! A `(workflow_id, stage)` key is never overwritten.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::errors::ArtifactError;
use crate::stage::StageTable;

/// Current artifact document schema version.
pub const SCHEMA_VERSION: u32 = 1;

/// Lifecycle status recorded inside an artifact document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactStatus {
    InProgress,
    Completed,
    Failed,
}

/// One structured document per stage, written once by the capability
/// boundary and read by every downstream consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Artifact {
    pub schema_version: u32,
    pub stage_name: String,
    pub workflow_id: String,
    pub status: ArtifactStatus,
    pub payload: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

impl Artifact {
    /// Whether this artifact counts as stage completion.
    pub fn is_completed(&self) -> bool {
        self.status == ArtifactStatus::Completed
    }
}

/// Durable, per-workflow directory of artifact documents.
///
/// Layout: `<root>/<workflow_id>/artifacts/<expected_output_artifact>`.
pub struct ArtifactStore {
    root: PathBuf,
    table: StageTable,
}

impl ArtifactStore {
    /// Create a store rooted at the workflows directory.
    pub fn new(root: impl Into<PathBuf>, table: StageTable) -> Self {
        Self {
            root: root.into(),
            table,
        }
    }

    pub fn table(&self) -> &StageTable {
        &self.table
    }

    /// Directory holding all state for one workflow.
    pub fn workflow_dir(&self, workflow_id: &str) -> PathBuf {
        self.root.join(workflow_id)
    }

    /// Directory holding the artifact documents for one workflow.
    pub fn artifacts_dir(&self, workflow_id: &str) -> PathBuf {
        self.workflow_dir(workflow_id).join("artifacts")
    }

    /// Full path of the artifact a stage is expected to produce.
    pub fn artifact_path(
        &self,
        workflow_id: &str,
        stage_name: &str,
    ) -> Result<PathBuf, ArtifactError> {
        let stage = self
            .table
            .get(stage_name)
            .ok_or_else(|| ArtifactError::UnknownStage {
                stage: stage_name.to_string(),
            })?;
        Ok(self
            .artifacts_dir(workflow_id)
            .join(&stage.expected_output_artifact))
    }

    /// Check for a durable artifact file without parsing it.
    pub fn exists(&self, workflow_id: &str, stage_name: &str) -> Result<bool, ArtifactError> {
        Ok(self.artifact_path(workflow_id, stage_name)?.exists())
    }

    /// Write a completed artifact for a stage.
    ///
    /// Fails with `AlreadyExists` if the stage already has an artifact;
    /// artifacts are write-once for the lifetime of the workflow.
    pub fn write(
        &self,
        workflow_id: &str,
        stage_name: &str,
        payload: serde_json::Value,
    ) -> Result<Artifact, ArtifactError> {
        let artifact = Artifact {
            schema_version: SCHEMA_VERSION,
            stage_name: stage_name.to_string(),
            workflow_id: workflow_id.to_string(),
            status: ArtifactStatus::Completed,
            payload,
            created_at: Utc::now(),
        };
        let path = self.artifact_path(workflow_id, stage_name)?;
        write_atomic(&artifact, &path, stage_name)?;
        Ok(artifact)
    }

    /// Read and validate a stage's artifact.
    ///
    /// Rejects unknown schema versions and artifacts namespaced to a
    /// different workflow rather than guessing.
    pub fn read(&self, workflow_id: &str, stage_name: &str) -> Result<Artifact, ArtifactError> {
        let path = self.artifact_path(workflow_id, stage_name)?;

        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ArtifactError::NotFound {
                    stage: stage_name.to_string(),
                });
            }
            Err(e) => {
                return Err(ArtifactError::Io {
                    stage: stage_name.to_string(),
                    source: e,
                });
            }
        };

        let artifact: Artifact =
            serde_json::from_str(&content).map_err(|e| ArtifactError::Malformed {
                stage: stage_name.to_string(),
                source: e,
            })?;

        if artifact.schema_version != SCHEMA_VERSION {
            return Err(ArtifactError::SchemaMismatch {
                stage: stage_name.to_string(),
                found: artifact.schema_version,
                supported: SCHEMA_VERSION,
            });
        }

        if artifact.workflow_id != workflow_id {
            return Err(ArtifactError::WorkflowMismatch {
                stage: stage_name.to_string(),
                found: artifact.workflow_id,
                expected: workflow_id.to_string(),
            });
        }

        Ok(artifact)
    }

    /// Last modification time of a stage's artifact file, if present.
    pub fn artifact_mtime(
        &self,
        workflow_id: &str,
        stage_name: &str,
    ) -> Result<Option<std::time::SystemTime>, ArtifactError> {
        let path = self.artifact_path(workflow_id, stage_name)?;
        match std::fs::metadata(&path) {
            Ok(meta) => Ok(meta.modified().ok()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(ArtifactError::Io {
                stage: stage_name.to_string(),
                source: e,
            }),
        }
    }

    /// List workflow ids known to this store, newest-first by directory name.
    pub fn list_workflows(&self) -> Vec<String> {
        let Ok(entries) = std::fs::read_dir(&self.root) else {
            return Vec::new();
        };
        let mut ids: Vec<String> = entries
            .filter_map(|e| e.ok())
            .filter(|e| e.path().is_dir())
            .filter_map(|e| e.file_name().into_string().ok())
            .collect();
        ids.sort();
        ids.reverse();
        ids
    }
}

fn write_atomic(artifact: &Artifact, path: &Path, stage_name: &str) -> Result<(), ArtifactError> {
    let io_err = |source| ArtifactError::Io {
        stage: stage_name.to_string(),
        source,
    };

    if path.exists() {
        return Err(ArtifactError::AlreadyExists {
            stage: stage_name.to_string(),
            path: path.to_path_buf(),
        });
    }

    let dir = path.parent().expect("artifact path has a parent directory");
    std::fs::create_dir_all(dir).map_err(io_err)?;

    let content = serde_json::to_string_pretty(artifact).map_err(|e| ArtifactError::Malformed {
        stage: stage_name.to_string(),
        source: e,
    })?;

    // Temp file in the same directory so the rename stays on one filesystem.
    let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4().simple()));
    std::fs::write(&tmp, content).map_err(io_err)?;

    match std::fs::rename(&tmp, path) {
        Ok(()) => Ok(()),
        Err(e) => {
            let _ = std::fs::remove_file(&tmp);
            Err(io_err(e))
        }
    }
}
