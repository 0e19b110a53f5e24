//! Operator stall gate.
//!
//! Timeouts are advisory in this design: when a stage stalls, the engine
//! does not kill anything (it has no control channel into the capability).
//! Instead an operator decides whether to keep waiting, re-invoke the stage,
//! or abort the workflow at the next stage boundary.

use anyhow::Result;
use dialoguer::{Select, theme::ColorfulTheme};

use crate::health::HealthStatus;
use crate::stage::StageDefinition;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum StallDecision {
    /// Keep polling for a durable update
    Wait,
    /// Dispatch the stage to the capability boundary again
    Reinvoke,
    /// Stop the workflow; it stays resumable from the checkpoint
    Abort,
}

/// Decides what to do about a stalled stage.
pub struct StallGate {
    auto: Option<StallDecision>,
}

impl StallGate {
    /// Prompt the operator on every stall.
    pub fn interactive() -> Self {
        Self { auto: None }
    }

    /// Always take the same decision (e.g. `--yes` re-invokes up to the
    /// attempt budget).
    pub fn auto(decision: StallDecision) -> Self {
        Self {
            auto: Some(decision),
        }
    }

    pub fn decide(&self, stage: &StageDefinition, health: &HealthStatus) -> Result<StallDecision> {
        if let Some(decision) = self.auto {
            return Ok(decision);
        }
        self.prompt_operator(stage, health)
    }

    fn prompt_operator(
        &self,
        stage: &StageDefinition,
        health: &HealthStatus,
    ) -> Result<StallDecision> {
        let idle = health
            .idle_duration
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "unknown".to_string());

        let options = &[
            "Wait for a durable update",
            "Re-invoke this stage",
            "Abort the workflow (resumable later)",
        ];

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt(format!(
                "Stage '{}' has been idle for {idle}. What now?",
                stage.name
            ))
            .items(options)
            .default(0)
            .interact()?;

        match selection {
            0 => Ok(StallDecision::Wait),
            1 => Ok(StallDecision::Reinvoke),
            2 => Ok(StallDecision::Abort),
            _ => unreachable!(),
        }
    }
}
