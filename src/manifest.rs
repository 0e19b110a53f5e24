//! Workflow manifest: the immutable record created at workflow start.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;

use crate::alignment::Decision;

/// Created once per run by the coordinator, then never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkflowManifest {
    /// Opaque, unique per run (timestamp-derived)
    pub workflow_id: String,
    /// The request text as the requester submitted it
    pub original_request: String,
    /// SHA-256 hex digest of the request, for audit cross-referencing
    pub request_digest: String,
    /// The alignment gate's verdict for this run
    pub alignment_decision: Decision,
    pub created_at: DateTime<Utc>,
}

impl WorkflowManifest {
    pub fn new(request: &str, decision: Decision) -> Self {
        Self {
            workflow_id: new_workflow_id(),
            original_request: request.to_string(),
            request_digest: request_digest(request),
            alignment_decision: decision,
            created_at: Utc::now(),
        }
    }

    /// Persist the manifest as pretty JSON.
    pub fn save(&self, path: &Path) -> Result<()> {
        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize manifest")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write manifest file: {}", path.display()))?;

        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read manifest file: {}", path.display()))?;

        let manifest: WorkflowManifest = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse manifest JSON: {}", path.display()))?;

        Ok(manifest)
    }
}

/// Generate a fresh workflow id, e.g. `wf-20260805-141530-1a2b3c4d`.
///
/// The timestamp prefix keeps workflow directories listable in creation
/// order; the uuid suffix keeps ids unique within a second.
pub fn new_workflow_id() -> String {
    let stamp = Utc::now().format("%Y%m%d-%H%M%S");
    let suffix = Uuid::new_v4().simple().to_string();
    format!("wf-{stamp}-{}", &suffix[..8])
}

fn request_digest(request: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.as_bytes());
    format!("{:x}", hasher.finalize())
}
