//! Next-stage selection over the stage table.
//!
//! Selection is a pure function of the set of completed stage names: among
//! stages whose upstream dependencies are all completed, pick the one with
//! the lowest ordinal that is not itself completed. The table is a DAG, so
//! independent stages are permitted, but execution stays sequential.

use std::collections::BTreeSet;

use crate::stage::{StageDefinition, StageTable};

/// Outcome of asking the sequencer for the next stage.
#[derive(Debug, Clone, PartialEq)]
pub enum NextStage {
    /// Run this stage next
    Run(StageDefinition),
    /// Every stage in the table is complete
    PipelineComplete,
}

impl NextStage {
    pub fn is_complete(&self) -> bool {
        matches!(self, Self::PipelineComplete)
    }
}

/// Select the next stage to run given the completed set.
///
/// Never returns a stage whose `required_upstream_artifacts` is not a subset
/// of `completed`.
pub fn next(table: &StageTable, completed: &BTreeSet<String>) -> NextStage {
    let remaining: Vec<&StageDefinition> = table
        .stages()
        .iter()
        .filter(|s| !completed.contains(&s.name))
        .collect();

    if remaining.is_empty() {
        return NextStage::PipelineComplete;
    }

    // Stages are ordinal-sorted in the table, so the first runnable stage
    // is the lowest-ordinal one.
    for stage in remaining {
        if stage
            .required_upstream_artifacts
            .iter()
            .all(|dep| completed.contains(dep))
        {
            return NextStage::Run(stage.clone());
        }
    }

    // Unreachable for a validated table: every incomplete stage with the
    // lowest ordinal among incompletes has only lower-ordinal dependencies.
    NextStage::PipelineComplete
}
