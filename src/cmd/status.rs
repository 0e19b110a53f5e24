use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use console::style;

use cadence::artifact::ArtifactStore;
use cadence::config::Config;
use cadence::health::HealthMonitor;
use cadence::stage::default_stage_table;
use cadence::ui::print_status_report;

/// `cadence status`: read-only operator view.
///
/// With a workflow id, prints percent complete and per-stage health; without
/// one, lists known workflows. Safe to run while a workflow is executing.
pub fn cmd_status(config: &Config, workflow_id: Option<&str>) -> Result<()> {
    if !config.is_initialized() {
        println!("Not initialized. Run 'cadence init' first.");
        return Ok(());
    }

    let store = Arc::new(ArtifactStore::new(
        config.workflows_dir.clone(),
        default_stage_table(),
    ));

    let Some(workflow_id) = workflow_id else {
        let workflows = store.list_workflows();
        if workflows.is_empty() {
            println!("No workflows found.");
        } else {
            println!("Workflows (newest first):");
            for id in workflows {
                println!("  {id}");
            }
        }
        return Ok(());
    };

    let stall_threshold = Duration::from_secs(config.settings.pipeline.stall_threshold_secs);
    let monitor = HealthMonitor::new(store);
    let report = monitor.report(workflow_id, stall_threshold)?;
    print_status_report(&report);

    Ok(())
}

/// `cadence stages`: print the static stage table.
pub fn cmd_stages() -> Result<()> {
    let table = default_stage_table();

    println!("Pipeline stages:");
    for stage in table.stages() {
        let deps = if stage.required_upstream_artifacts.is_empty() {
            "-".to_string()
        } else {
            stage
                .required_upstream_artifacts
                .iter()
                .cloned()
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "  {} {:<16} {:<10} needs: {:<32} -> {}",
            style(stage.ordinal).yellow(),
            stage.name,
            stage.model_tier.as_str(),
            deps,
            style(&stage.expected_output_artifact).dim()
        );
    }

    Ok(())
}
