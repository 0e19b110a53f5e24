//! Capability-execution boundary.
//!
//! A capability is the external, opaque mechanism that performs a stage's
//! work in an isolated context. It may run for seconds or hours, may never
//! return, and cannot reliably signal completion through any in-process
//! channel. Whatever it returns is a [`CompletionSignal`], advisory only;
//! the coordinator re-derives truth from the artifact store afterwards.

use std::path::PathBuf;
use std::time::Instant;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;

use crate::invoker::InvocationContract;

/// Best-effort, untrusted signal returned by a capability invocation.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionSignal {
    /// What the capability claims happened; never a ground truth
    pub claimed_success: bool,
    /// Short human-readable detail (exit status, error text)
    pub detail: String,
}

impl CompletionSignal {
    pub fn claimed(detail: impl Into<String>) -> Self {
        Self {
            claimed_success: true,
            detail: detail.into(),
        }
    }

    pub fn failed(detail: impl Into<String>) -> Self {
        Self {
            claimed_success: false,
            detail: detail.into(),
        }
    }
}

/// The execution boundary consumed by the coordinator.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Run one stage to (claimed) completion. Blocking and long-running;
    /// the only durable effect that counts is the artifact file the
    /// contract names.
    async fn invoke(&self, contract: &InvocationContract) -> Result<CompletionSignal>;
}

/// Capability backed by an external command, run via `sh -c`.
///
/// The contract's instructions are piped to the child's stdin; the
/// capability id, stage, workflow, tier, and expected output path are
/// exported as `CADENCE_CAPABILITY`, `CADENCE_STAGE`, `CADENCE_WORKFLOW`,
/// `CADENCE_TIER`, and `CADENCE_OUTPUT`. The child's combined output is
/// written to a per-stage log file. The child is expected (but never
/// trusted) to write the artifact at `expected_artifact_path`.
pub struct ProcessCapability {
    command: String,
    log_dir: PathBuf,
}

impl ProcessCapability {
    pub fn new(command: impl Into<String>, log_dir: impl Into<PathBuf>) -> Self {
        Self {
            command: command.into(),
            log_dir: log_dir.into(),
        }
    }
}

#[async_trait]
impl Capability for ProcessCapability {
    async fn invoke(&self, contract: &InvocationContract) -> Result<CompletionSignal> {
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        let log_file = self.log_dir.join(format!(
            "{}-{}.log",
            contract.workflow_id, contract.stage_name
        ));

        let start = Instant::now();
        tracing::info!(
            capability = %contract.capability_id,
            stage = %contract.stage_name,
            tier = contract.model_tier.as_str(),
            "dispatching capability"
        );

        let mut child = Command::new("sh")
            .arg("-c")
            .arg(&self.command)
            .env("CADENCE_CAPABILITY", &contract.capability_id)
            .env("CADENCE_STAGE", &contract.stage_name)
            .env("CADENCE_WORKFLOW", &contract.workflow_id)
            .env("CADENCE_TIER", contract.model_tier.as_str())
            .env("CADENCE_OUTPUT", &contract.expected_artifact_path)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .spawn()
            .with_context(|| format!("Failed to spawn capability command '{}'", self.command))?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(contract.instructions.as_bytes())
                .await
                .context("Failed to write instructions to capability stdin")?;
            stdin
                .shutdown()
                .await
                .context("Failed to close capability stdin")?;
        }

        let output = child
            .wait_with_output()
            .await
            .context("Failed to wait for capability process")?;

        let mut log = Vec::with_capacity(output.stdout.len() + output.stderr.len());
        log.extend_from_slice(&output.stdout);
        log.extend_from_slice(&output.stderr);
        std::fs::write(&log_file, &log).context("Failed to write capability log")?;

        let exit_code = output.status.code().unwrap_or(-1);
        let elapsed = start.elapsed();
        tracing::info!(
            stage = %contract.stage_name,
            exit_code,
            elapsed_secs = elapsed.as_secs(),
            "capability returned (advisory)"
        );

        let detail = format!("exit code {exit_code} after {:.1}s", elapsed.as_secs_f64());
        if output.status.success() {
            Ok(CompletionSignal::claimed(detail))
        } else {
            Ok(CompletionSignal::failed(detail))
        }
    }
}
