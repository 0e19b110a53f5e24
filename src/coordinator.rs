//! Top-level control loop.
//!
//! The coordinator runs the alignment gate once, then repeatedly asks the
//! sequencer for the next stage, dispatches it across the capability
//! boundary, and polls durable state until the checkpoint advances or the
//! operator intervenes. A capability's return value is recorded for the
//! audit trail but never trusted: the only way a stage completes is a valid
//! artifact observed by `validate_and_advance`.
//!
//! Abort happens only between stage boundaries (after a validate attempt,
//! before the next dispatch) because there is no control channel into an
//! executing capability. The workflow stays resumable from its checkpoint.

use std::sync::Arc;
use std::time::Duration;

use crate::alignment::{AlignmentGate, Decision};
use crate::artifact::ArtifactStore;
use crate::capability::{Capability, CompletionSignal};
use crate::charter::Charter;
use crate::checkpoint::{Advance, CheckpointManager};
use crate::errors::PipelineError;
use crate::gates::{StallDecision, StallGate};
use crate::health::{HealthMonitor, StageState};
use crate::invoker::{InvocationLog, StageInvoker};
use crate::manifest::WorkflowManifest;
use crate::sequencer::{self, NextStage};
use crate::stage::StageDefinition;
use crate::ui::PipelineUI;

/// Loop tuning knobs; defaults come from `cadence.toml`.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// How often durable state is re-polled while a stage shows activity
    pub poll_interval: Duration,
    /// Idle time after which a stage is reported stalled
    pub stall_threshold: Duration,
    /// Dispatches allowed per stage before the run fails
    pub max_attempts: u32,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            stall_threshold: Duration::from_secs(900),
            max_attempts: 3,
        }
    }
}

/// How a workflow run ended (errors aside).
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// Every stage validated complete
    Completed { workflow_id: String },
    /// The alignment gate halted the pipeline before any stage ran
    Halted {
        workflow_id: String,
        decision: Decision,
    },
}

pub struct Coordinator {
    store: Arc<ArtifactStore>,
    checkpoints: CheckpointManager,
    invoker: StageInvoker,
    log: InvocationLog,
    monitor: HealthMonitor,
    capability: Box<dyn Capability>,
    alignment: AlignmentGate,
    stall_gate: StallGate,
    config: CoordinatorConfig,
    ui: Option<Arc<PipelineUI>>,
}

impl Coordinator {
    pub fn new(
        store: Arc<ArtifactStore>,
        capability: Box<dyn Capability>,
        config: CoordinatorConfig,
    ) -> Self {
        Self {
            checkpoints: CheckpointManager::new(store.clone()),
            invoker: StageInvoker::new(store.clone()),
            log: InvocationLog::new(store.clone()),
            monitor: HealthMonitor::new(store.clone()),
            store,
            capability,
            alignment: AlignmentGate::default(),
            stall_gate: StallGate::auto(StallDecision::Reinvoke),
            config,
            ui: None,
        }
    }

    pub fn with_alignment_gate(mut self, gate: AlignmentGate) -> Self {
        self.alignment = gate;
        self
    }

    pub fn with_stall_gate(mut self, gate: StallGate) -> Self {
        self.stall_gate = gate;
        self
    }

    pub fn with_ui(mut self, ui: Arc<PipelineUI>) -> Self {
        self.ui = Some(ui);
        self
    }

    /// Start a fresh workflow: evaluate alignment, persist the manifest,
    /// and, only for an aligned request, run the stage loop.
    pub async fn run(
        &self,
        request: &str,
        charter: &Charter,
    ) -> Result<RunOutcome, PipelineError> {
        let decision = self.alignment.evaluate(request, charter);
        let manifest = WorkflowManifest::new(request, decision.clone());
        self.persist_manifest(&manifest)?;

        if !decision.is_aligned() {
            if let Some(ui) = &self.ui {
                ui.pipeline_halted(&manifest.workflow_id, &decision);
            }
            return Ok(RunOutcome::Halted {
                workflow_id: manifest.workflow_id,
                decision,
            });
        }

        self.drive(&manifest.workflow_id).await
    }

    /// Resume a previously-started workflow from its checkpoint.
    ///
    /// The persisted alignment decision is honored as-is; the gate is not
    /// re-run. Stages already validated complete are never re-invoked; a
    /// stage whose prior invocation left no valid artifact runs again.
    pub async fn resume(&self, workflow_id: &str) -> Result<RunOutcome, PipelineError> {
        let manifest_path = self.store.workflow_dir(workflow_id).join("manifest.json");
        let manifest =
            WorkflowManifest::load(&manifest_path).map_err(|_| PipelineError::WorkflowNotFound {
                workflow_id: workflow_id.to_string(),
            })?;

        if !manifest.alignment_decision.is_aligned() {
            return Ok(RunOutcome::Halted {
                workflow_id: manifest.workflow_id,
                decision: manifest.alignment_decision,
            });
        }

        self.drive(workflow_id).await
    }

    fn persist_manifest(&self, manifest: &WorkflowManifest) -> Result<(), PipelineError> {
        let workflow_dir = self.store.workflow_dir(&manifest.workflow_id);
        std::fs::create_dir_all(&workflow_dir).map_err(|e| {
            PipelineError::Other(anyhow::Error::new(e).context("Failed to create workflow dir"))
        })?;
        manifest.save(&workflow_dir.join("manifest.json"))?;
        Ok(())
    }

    async fn drive(&self, workflow_id: &str) -> Result<RunOutcome, PipelineError> {
        let table = self.store.table().clone();

        loop {
            let checkpoint = self.checkpoints.load(workflow_id)?;
            let stage = match sequencer::next(&table, &checkpoint.completed_set()) {
                NextStage::PipelineComplete => {
                    tracing::info!(workflow_id, "pipeline complete");
                    if let Some(ui) = &self.ui {
                        ui.pipeline_complete(workflow_id);
                    }
                    return Ok(RunOutcome::Completed {
                        workflow_id: workflow_id.to_string(),
                    });
                }
                NextStage::Run(stage) => stage,
            };

            // A valid artifact may already be on disk (e.g. the process died
            // after the capability wrote but before the checkpoint advanced).
            // Validate before spending an invocation on it.
            if self
                .checkpoints
                .validate_and_advance(workflow_id, &stage.name)?
                .is_advanced()
            {
                if let Some(ui) = &self.ui {
                    ui.stage_complete(&stage.name);
                }
                continue;
            }

            self.run_stage(workflow_id, &stage).await?;
        }
    }

    /// Dispatch one stage until its artifact validates, the attempt budget
    /// runs out, or the operator aborts.
    async fn run_stage(
        &self,
        workflow_id: &str,
        stage: &StageDefinition,
    ) -> Result<(), PipelineError> {
        loop {
            let attempts = self
                .log
                .attempt_count(workflow_id, &stage.name)
                .map_err(PipelineError::Other)?;
            if attempts >= self.config.max_attempts {
                return Err(PipelineError::AttemptsExhausted {
                    stage: stage.name.clone(),
                    attempts,
                });
            }

            let contract = self.invoker.build(stage, workflow_id)?;
            let record = self
                .log
                .record_dispatch(workflow_id, &stage.name, &stage.capability_id)
                .map_err(PipelineError::Other)?;

            if let Some(ui) = &self.ui {
                ui.start_stage(stage, record.attempt, self.config.max_attempts);
            }

            let signal = match self.capability.invoke(&contract).await {
                Ok(signal) => signal,
                // A failed dispatch is just another advisory non-signal; the
                // stall gate decides what happens next.
                Err(e) => CompletionSignal::failed(format!("invocation error: {e:#}")),
            };
            self.log
                .record_outcome(
                    workflow_id,
                    &stage.name,
                    record.attempt,
                    &stage.capability_id,
                    &signal.detail,
                )
                .map_err(PipelineError::Other)?;
            tracing::debug!(
                stage = %stage.name,
                claimed_success = signal.claimed_success,
                detail = %signal.detail,
                "advisory completion signal recorded; deriving truth from artifacts"
            );

            match self.await_artifact(workflow_id, stage).await? {
                StageWait::Advanced => {
                    if let Some(ui) = &self.ui {
                        ui.stage_complete(&stage.name);
                    }
                    return Ok(());
                }
                StageWait::Reinvoke => continue,
            }
        }
    }

    /// Poll durable state until the stage validates or the stall gate says
    /// otherwise.
    async fn await_artifact(
        &self,
        workflow_id: &str,
        stage: &StageDefinition,
    ) -> Result<StageWait, PipelineError> {
        loop {
            match self
                .checkpoints
                .validate_and_advance(workflow_id, &stage.name)?
            {
                Advance::Advanced => return Ok(StageWait::Advanced),
                Advance::NotYetComplete { reason } => {
                    let health = self.monitor.status(
                        workflow_id,
                        &stage.name,
                        self.config.stall_threshold,
                    )?;

                    match health.state {
                        StageState::Running | StageState::Completed => {
                            if let Some(ui) = &self.ui {
                                ui.stage_waiting(&stage.name, &reason);
                            }
                            tokio::time::sleep(self.config.poll_interval).await;
                        }
                        StageState::Stalled | StageState::NotStarted => {
                            tracing::warn!(stage = %stage.name, %reason, "stage stalled");
                            if let Some(ui) = &self.ui {
                                ui.stage_stalled(&stage.name, health.idle_duration);
                            }
                            match self.stall_gate.decide(stage, &health)? {
                                StallDecision::Wait => {
                                    tokio::time::sleep(self.config.poll_interval).await;
                                }
                                StallDecision::Reinvoke => return Ok(StageWait::Reinvoke),
                                StallDecision::Abort => {
                                    return Err(PipelineError::Aborted {
                                        stage: stage.name.clone(),
                                    });
                                }
                            }
                        }
                    }
                }
            }
        }
    }
}

enum StageWait {
    Advanced,
    Reinvoke,
}
