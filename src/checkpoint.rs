//! Checkpoint: the durable record of validated stage completions.
//!
//! A stage name enters the checkpoint if and only if its expected artifact
//! exists on disk *and* parses as a completed document. The single writer
//! path is [`CheckpointManager::validate_and_advance`]; nothing else appends,
//! and nothing ever removes. On restart the coordinator loads the checkpoint
//! and asks the sequencer for the next stage, which picks up exactly where
//! the previous process left off.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::artifact::ArtifactStore;
use crate::errors::ArtifactError;

/// The persisted completion record for one workflow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub workflow_id: String,
    /// Stage names in the order they were validated complete
    pub completed_stage_names: Vec<String>,
    pub last_updated: DateTime<Utc>,
}

impl Checkpoint {
    pub fn empty(workflow_id: &str) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            completed_stage_names: Vec::new(),
            last_updated: Utc::now(),
        }
    }

    /// The completed stages as a set, for the sequencer.
    pub fn completed_set(&self) -> BTreeSet<String> {
        self.completed_stage_names.iter().cloned().collect()
    }

    pub fn contains(&self, stage_name: &str) -> bool {
        self.completed_stage_names.iter().any(|s| s == stage_name)
    }
}

/// Result of a validate-and-advance attempt.
#[derive(Debug, Clone, PartialEq)]
pub enum Advance {
    /// The artifact validated and the checkpoint now records the stage
    Advanced,
    /// No valid completed artifact yet; the checkpoint is unchanged
    NotYetComplete { reason: String },
}

impl Advance {
    pub fn is_advanced(&self) -> bool {
        matches!(self, Self::Advanced)
    }
}

/// Maintains the ordered set of stages confirmed complete.
pub struct CheckpointManager {
    store: Arc<ArtifactStore>,
}

impl CheckpointManager {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self { store }
    }

    fn checkpoint_path(&self, workflow_id: &str) -> PathBuf {
        self.store.workflow_dir(workflow_id).join("checkpoint.json")
    }

    /// Load the checkpoint for a workflow, empty if none was ever persisted.
    pub fn load(&self, workflow_id: &str) -> Result<Checkpoint, ArtifactError> {
        let path = self.checkpoint_path(workflow_id);
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Checkpoint::empty(workflow_id));
            }
            Err(e) => {
                return Err(ArtifactError::Io {
                    stage: "checkpoint".to_string(),
                    source: e,
                });
            }
        };

        serde_json::from_str(&content).map_err(|e| ArtifactError::Malformed {
            stage: "checkpoint".to_string(),
            source: e,
        })
    }

    /// Validate a stage's artifact and, only on success, append the stage to
    /// the checkpoint and persist it.
    ///
    /// This is the sole writer of checkpoint state. It must only ever be
    /// called on a success path, never from cleanup handlers: a checkpoint
    /// entry without a confirming read is the failure mode this design
    /// exists to rule out.
    pub fn validate_and_advance(
        &self,
        workflow_id: &str,
        stage_name: &str,
    ) -> Result<Advance, ArtifactError> {
        if !self.store.exists(workflow_id, stage_name)? {
            return Ok(Advance::NotYetComplete {
                reason: format!("no artifact on disk for stage '{stage_name}'"),
            });
        }

        let artifact = match self.store.read(workflow_id, stage_name) {
            Ok(artifact) => artifact,
            // Unparseable or mis-versioned artifacts are treated exactly
            // like missing ones: never trust a partially-valid document.
            Err(
                e @ (ArtifactError::Malformed { .. }
                | ArtifactError::SchemaMismatch { .. }
                | ArtifactError::WorkflowMismatch { .. }
                | ArtifactError::NotFound { .. }),
            ) => {
                return Ok(Advance::NotYetComplete {
                    reason: e.to_string(),
                });
            }
            Err(e) => return Err(e),
        };

        if !artifact.is_completed() {
            return Ok(Advance::NotYetComplete {
                reason: format!(
                    "artifact for stage '{stage_name}' has status {:?}",
                    artifact.status
                ),
            });
        }

        let mut checkpoint = self.load(workflow_id)?;
        if !checkpoint.contains(stage_name) {
            checkpoint
                .completed_stage_names
                .push(stage_name.to_string());
            checkpoint.last_updated = Utc::now();
            self.persist(&checkpoint)?;
            tracing::info!(workflow_id, stage = stage_name, "checkpoint advanced");
        }

        Ok(Advance::Advanced)
    }

    fn persist(&self, checkpoint: &Checkpoint) -> Result<(), ArtifactError> {
        let io_err = |source| ArtifactError::Io {
            stage: "checkpoint".to_string(),
            source,
        };

        let path = self.checkpoint_path(&checkpoint.workflow_id);
        let dir = path.parent().expect("checkpoint path has a parent");
        std::fs::create_dir_all(dir).map_err(io_err)?;

        let content =
            serde_json::to_string_pretty(checkpoint).map_err(|e| ArtifactError::Malformed {
                stage: "checkpoint".to_string(),
                source: e,
            })?;

        let tmp = dir.join(format!(".{}.tmp", Uuid::new_v4().simple()));
        std::fs::write(&tmp, content).map_err(io_err)?;
        match std::fs::rename(&tmp, &path) {
            Ok(()) => Ok(()),
            Err(e) => {
                let _ = std::fs::remove_file(&tmp);
                Err(io_err(e))
            }
        }
    }
}
