//! Health monitor: derived, ephemeral view of stage liveness.
//!
//! Stages give no push-based status, so health is inferred from durable side
//! effects: artifact existence, artifact directory modification times, and
//! the dispatch log. The result is recomputed on every poll and discarded;
//! it is never a source of truth and never feeds the checkpoint.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::artifact::ArtifactStore;
use crate::checkpoint::CheckpointManager;
use crate::invoker::InvocationLog;

/// Observed liveness of one stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StageState {
    NotStarted,
    Running,
    Stalled,
    Completed,
}

/// Point-in-time health of one stage. Ephemeral; recomputed per poll.
#[derive(Debug, Clone, Serialize)]
pub struct HealthStatus {
    pub stage_name: String,
    pub state: StageState,
    pub last_artifact_mtime: Option<DateTime<Utc>>,
    /// Time since the last observed durable activity, for running/stalled
    #[serde(skip_serializing_if = "Option::is_none")]
    pub idle_duration: Option<Duration>,
}

/// Read-only operator view of a whole workflow.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
    pub workflow_id: String,
    pub percent_complete: f64,
    pub per_stage: Vec<HealthStatus>,
}

/// Polls durable state to classify stages.
pub struct HealthMonitor {
    store: Arc<ArtifactStore>,
    log: InvocationLog,
}

impl HealthMonitor {
    pub fn new(store: Arc<ArtifactStore>) -> Self {
        Self {
            log: InvocationLog::new(store.clone()),
            store,
        }
    }

    /// Classify one stage.
    ///
    /// - `completed`: a valid completed artifact exists
    /// - `not_started`: no artifact and no dispatch record
    /// - `running`: durable activity within `stall_threshold`
    /// - `stalled`: dispatched, but no durable activity within the threshold
    pub fn status(
        &self,
        workflow_id: &str,
        stage_name: &str,
        stall_threshold: Duration,
    ) -> Result<HealthStatus> {
        let artifact_mtime = self
            .store
            .artifact_mtime(workflow_id, stage_name)?
            .map(DateTime::<Utc>::from);

        if let Ok(artifact) = self.store.read(workflow_id, stage_name) {
            if artifact.is_completed() {
                return Ok(HealthStatus {
                    stage_name: stage_name.to_string(),
                    state: StageState::Completed,
                    last_artifact_mtime: artifact_mtime,
                    idle_duration: None,
                });
            }
        }

        let last_dispatch = self.log.last_dispatched_at(workflow_id, stage_name)?;
        if last_dispatch.is_none() && artifact_mtime.is_none() {
            return Ok(HealthStatus {
                stage_name: stage_name.to_string(),
                state: StageState::NotStarted,
                last_artifact_mtime: None,
                idle_duration: None,
            });
        }

        // The capability stages its artifact in the same directory before the
        // final rename, so directory mtime is the freshest durable signal.
        let dir_mtime = std::fs::metadata(self.store.artifacts_dir(workflow_id))
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from);

        let last_activity = [artifact_mtime, dir_mtime, last_dispatch]
            .into_iter()
            .flatten()
            .max()
            .unwrap_or_else(Utc::now);

        let idle = (Utc::now() - last_activity).to_std().unwrap_or_default();
        let state = if idle <= stall_threshold {
            StageState::Running
        } else {
            StageState::Stalled
        };

        Ok(HealthStatus {
            stage_name: stage_name.to_string(),
            state,
            last_artifact_mtime: artifact_mtime,
            idle_duration: Some(idle),
        })
    }

    /// Operator status query: percent complete plus per-stage health.
    ///
    /// Read-only and side-effect free; safe to call at any time, including
    /// while a stage is executing.
    pub fn report(&self, workflow_id: &str, stall_threshold: Duration) -> Result<StatusReport> {
        let stage_names: Vec<String> = self
            .store
            .table()
            .stages()
            .iter()
            .map(|s| s.name.clone())
            .collect();

        let mut per_stage = Vec::with_capacity(stage_names.len());
        for name in &stage_names {
            per_stage.push(self.status(workflow_id, name, stall_threshold)?);
        }

        let completed = per_stage
            .iter()
            .filter(|h| h.state == StageState::Completed)
            .count();
        let percent_complete = if per_stage.is_empty() {
            100.0
        } else {
            completed as f64 / per_stage.len() as f64 * 100.0
        };

        Ok(StatusReport {
            workflow_id: workflow_id.to_string(),
            percent_complete,
            per_stage,
        })
    }
}

/// Cross-check used in tests and the status command: health must never call
/// a stage completed that the checkpoint could not validate.
pub fn consistent_with_checkpoint(
    report: &StatusReport,
    checkpoints: &CheckpointManager,
) -> Result<bool> {
    let checkpoint = checkpoints.load(&report.workflow_id)?;
    for status in &report.per_stage {
        if checkpoint.contains(&status.stage_name) && status.state != StageState::Completed {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stage::default_stage_table;
    use serde_json::json;
    use tempfile::tempdir;

    const THRESHOLD: Duration = Duration::from_secs(600);

    fn setup() -> (HealthMonitor, Arc<ArtifactStore>, tempfile::TempDir) {
        let dir = tempdir().unwrap();
        let store = Arc::new(ArtifactStore::new(
            dir.path().join("workflows"),
            default_stage_table(),
        ));
        (HealthMonitor::new(store.clone()), store, dir)
    }

    #[test]
    fn test_not_started_without_artifact_or_dispatch() {
        let (monitor, _store, _dir) = setup();
        let status = monitor.status("wf-1", "research", THRESHOLD).unwrap();
        assert_eq!(status.state, StageState::NotStarted);
        assert!(status.last_artifact_mtime.is_none());
        assert!(status.idle_duration.is_none());
    }

    #[test]
    fn test_completed_with_valid_artifact() {
        let (monitor, store, _dir) = setup();
        store.write("wf-1", "research", json!({})).unwrap();

        let status = monitor.status("wf-1", "research", THRESHOLD).unwrap();
        assert_eq!(status.state, StageState::Completed);
        assert!(status.last_artifact_mtime.is_some());
    }

    #[test]
    fn test_running_after_recent_dispatch() {
        let (monitor, store, _dir) = setup();
        let log = InvocationLog::new(store);
        log.record_dispatch("wf-1", "research", "cap.research")
            .unwrap();

        let status = monitor.status("wf-1", "research", THRESHOLD).unwrap();
        assert_eq!(status.state, StageState::Running);
        assert!(status.idle_duration.is_some());
    }

    #[test]
    fn test_stalled_when_dispatch_is_older_than_threshold() {
        let (monitor, store, _dir) = setup();
        let log = InvocationLog::new(store);
        log.record_dispatch("wf-1", "research", "cap.research")
            .unwrap();

        // Zero threshold: any dispatch in the past counts as stalled.
        let status = monitor
            .status("wf-1", "research", Duration::ZERO)
            .unwrap();
        assert_eq!(status.state, StageState::Stalled);
        assert!(status.idle_duration.unwrap() >= Duration::ZERO);
    }

    #[test]
    fn test_malformed_artifact_is_not_completed() {
        let (monitor, store, _dir) = setup();
        let path = store.artifact_path("wf-1", "research").unwrap();
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "{broken").unwrap();

        let status = monitor.status("wf-1", "research", THRESHOLD).unwrap();
        // A file exists, so the stage was attempted; it just isn't complete.
        assert_ne!(status.state, StageState::Completed);
        assert_ne!(status.state, StageState::NotStarted);
    }

    #[test]
    fn test_report_counts_percent_complete() {
        let (monitor, store, _dir) = setup();
        store.write("wf-1", "research", json!({})).unwrap();
        store.write("wf-1", "design", json!({})).unwrap();

        let report = monitor.report("wf-1", THRESHOLD).unwrap();
        assert_eq!(report.per_stage.len(), 7);
        let expected = 2.0 / 7.0 * 100.0;
        assert!((report.percent_complete - expected).abs() < 1e-9);
        assert_eq!(report.per_stage[0].state, StageState::Completed);
        assert_eq!(report.per_stage[2].state, StageState::NotStarted);
    }

    #[test]
    fn test_report_is_side_effect_free() {
        let (monitor, store, _dir) = setup();
        store.write("wf-1", "research", json!({})).unwrap();

        monitor.report("wf-1", THRESHOLD).unwrap();
        monitor.report("wf-1", THRESHOLD).unwrap();

        // Polling must not create or alter durable state beyond the artifact.
        let workflow_dir = store.workflow_dir("wf-1");
        assert!(!workflow_dir.join("checkpoint.json").exists());
    }

    #[test]
    fn test_health_consistent_with_checkpoint() {
        let (monitor, store, _dir) = setup();
        let checkpoints = CheckpointManager::new(store.clone());

        store.write("wf-1", "research", json!({})).unwrap();
        checkpoints.validate_and_advance("wf-1", "research").unwrap();

        let report = monitor.report("wf-1", THRESHOLD).unwrap();
        assert!(consistent_with_checkpoint(&report, &checkpoints).unwrap());
    }
}
