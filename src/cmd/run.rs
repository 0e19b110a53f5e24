use std::sync::Arc;

use anyhow::{Context, Result, anyhow, bail};

use cadence::artifact::ArtifactStore;
use cadence::capability::ProcessCapability;
use cadence::charter::Charter;
use cadence::config::Config;
use cadence::coordinator::{Coordinator, RunOutcome};
use cadence::gates::{StallDecision, StallGate};
use cadence::stage::default_stage_table;
use cadence::ui::PipelineUI;

/// `cadence run`: execute a workflow for a request, or resume one.
///
/// `--yes` answers every stall with a re-invoke (bounded by the attempt
/// budget); otherwise the operator is prompted.
pub async fn cmd_run(
    config: &Config,
    request: Option<&str>,
    resume: Option<&str>,
    yes: bool,
) -> Result<()> {
    if !config.is_initialized() {
        bail!("Not initialized. Run 'cadence init' and edit the charter first.");
    }
    config.ensure_directories()?;

    let charter = Charter::load(&config.charter_file)?;
    let table = default_stage_table();
    let total_stages = table.len() as u64;
    let store = Arc::new(ArtifactStore::new(config.workflows_dir.clone(), table));

    let capability = Box::new(ProcessCapability::new(
        config.settings.capability.command.clone(),
        config.log_dir.clone(),
    ));

    let stall_gate = if yes {
        StallGate::auto(StallDecision::Reinvoke)
    } else {
        StallGate::interactive()
    };

    let ui = Arc::new(PipelineUI::new(total_stages, config.verbose));

    let coordinator = Coordinator::new(store, capability, config.settings.coordinator_config())
        .with_stall_gate(stall_gate)
        .with_ui(ui.clone());

    let outcome = match (request, resume) {
        (_, Some(workflow_id)) => coordinator
            .resume(workflow_id)
            .await
            .with_context(|| format!("Failed to resume workflow {workflow_id}"))?,
        (Some(request), None) => {
            coordinator
                .run(request, &charter)
                .await
                .context("Workflow failed")?
        }
        (None, None) => bail!("Provide a request, or --resume <workflow_id>."),
    };

    match outcome {
        RunOutcome::Completed { workflow_id } => {
            println!("Workflow {workflow_id} completed.");
            Ok(())
        }
        RunOutcome::Halted {
            workflow_id,
            decision,
        } => Err(anyhow!(
            "Workflow {workflow_id} halted by alignment gate: {}",
            serde_json::to_string(&decision).unwrap_or_default()
        )),
    }
}
