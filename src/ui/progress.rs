use std::time::Duration;

use console::style;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use crate::alignment::Decision;
use crate::health::{StageState, StatusReport};
use crate::stage::StageDefinition;
use crate::ui::icons::{CHECK, CROSS, GATE, HOURGLASS, SPARKLE};

/// Terminal UI for the coordinator, rendered via `indicatif`.
///
/// Two bars are stacked vertically:
/// - Stage bar — tracks how many stages have validated complete
/// - Poll bar — spinner showing the current stage and what the engine is
///   waiting on
pub struct PipelineUI {
    multi: MultiProgress,
    stage_bar: ProgressBar,
    poll_bar: ProgressBar,
    verbose: bool,
}

impl PipelineUI {
    /// Create the UI. `total_stages` sizes the stage bar.
    pub fn new(total_stages: u64, verbose: bool) -> Self {
        let multi = MultiProgress::new();

        let stage_style = ProgressStyle::default_bar()
            .template("{prefix:.bold.dim} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .expect("progress bar template is a valid static string")
            .progress_chars("█▓▒░");

        let stage_bar = multi.add(ProgressBar::new(total_stages));
        stage_bar.set_style(stage_style);
        stage_bar.set_prefix("Stages");

        let poll_style = ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {msg}")
            .expect("progress bar template is a valid static string");

        let poll_bar = multi.add(ProgressBar::new_spinner());
        poll_bar.set_style(poll_style);
        poll_bar.set_prefix(" Stage");

        Self {
            multi,
            stage_bar,
            poll_bar,
            verbose,
        }
    }

    /// Print a line via `MultiProgress`, falling back to `eprintln!` if the
    /// rich UI fails.
    fn print_line(&self, msg: impl AsRef<str>) {
        if self.multi.println(msg.as_ref()).is_err() {
            eprintln!("{}", msg.as_ref());
        }
    }

    /// Header block printed once before the stage loop starts.
    pub fn print_pipeline_header(&self, workflow_id: &str, request: &str) {
        self.print_line("");
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line(format!(
            "{} Workflow {}",
            style("▶").green().bold(),
            style(workflow_id).yellow().bold()
        ));
        self.print_line(format!("{}  {}", style("Request:").dim(), request));
        self.print_line(format!("{}", style("═".repeat(70)).cyan()));
        self.print_line("");
    }

    /// Announce a stage dispatch and start the spinner.
    pub fn start_stage(&self, stage: &StageDefinition, attempt: u32, max_attempts: u32) {
        self.stage_bar.set_message(format!(
            "{}: {}",
            style(stage.ordinal).yellow(),
            stage.name
        ));
        self.poll_bar.set_message(format!(
            "{} via {} (attempt {}/{})",
            style(&stage.name).cyan(),
            stage.capability_id,
            attempt,
            max_attempts
        ));
        self.poll_bar.enable_steady_tick(Duration::from_millis(100));
        self.print_line(format!(
            "{} Dispatching {} (tier: {}, attempt {}/{})",
            HOURGLASS,
            style(&stage.name).cyan().bold(),
            stage.model_tier.as_str(),
            attempt,
            max_attempts
        ));
    }

    /// Show what the poll loop is waiting on.
    pub fn stage_waiting(&self, stage_name: &str, reason: &str) {
        self.poll_bar.set_message(format!(
            "{} {}",
            style(stage_name).cyan(),
            style(format!("({reason})")).dim()
        ));
        if self.verbose {
            self.print_line(format!("    {} {}", style("→").dim(), style(reason).dim()));
        }
    }

    /// A stage crossed the stall threshold.
    pub fn stage_stalled(&self, stage_name: &str, idle: Option<Duration>) {
        let idle = idle
            .map(|d| format!("{}s", d.as_secs()))
            .unwrap_or_else(|| "unknown".to_string());
        self.print_line(format!(
            "{} {}",
            GATE,
            style(format!("Stage {stage_name} stalled (idle {idle})"))
                .red()
                .bold()
        ));
    }

    /// A stage's artifact validated and the checkpoint advanced.
    pub fn stage_complete(&self, stage_name: &str) {
        self.stage_bar.inc(1);
        self.poll_bar.finish_with_message(format!(
            "{CHECK} {stage_name} validated"
        ));
        self.print_line(format!(
            "{} Stage {} complete",
            CHECK,
            style(stage_name).green().bold()
        ));
    }

    /// All stages validated.
    pub fn pipeline_complete(&self, workflow_id: &str) {
        self.stage_bar.finish();
        self.print_line(format!(
            "\n{} Workflow {} complete\n",
            SPARKLE,
            style(workflow_id).green().bold()
        ));
    }

    /// The alignment gate halted the workflow before any stage ran.
    pub fn pipeline_halted(&self, workflow_id: &str, decision: &Decision) {
        let detail = match decision {
            Decision::Aligned => return,
            Decision::Rejected { reason } => format!("rejected: {reason}"),
            Decision::NeedsClarification { question } => {
                format!("needs clarification: {question}")
            }
        };
        self.print_line(format!(
            "{} Workflow {} halted: {}",
            CROSS,
            style(workflow_id).red().bold(),
            detail
        ));
    }
}

/// Render a status report as a stage-per-line table.
pub fn print_status_report(report: &StatusReport) {
    println!(
        "Workflow {}: {:.0}% complete",
        style(&report.workflow_id).yellow().bold(),
        report.percent_complete
    );
    for status in &report.per_stage {
        let (icon, label) = match status.state {
            StageState::Completed => (CHECK, style("completed").green()),
            StageState::Running => (HOURGLASS, style("running").cyan()),
            StageState::Stalled => (GATE, style("stalled").red()),
            StageState::NotStarted => (" ", style("not started").dim()),
        };
        let idle = status
            .idle_duration
            .map(|d| format!(" (idle {}s)", d.as_secs()))
            .unwrap_or_default();
        println!("  {icon} {:<16} {label}{idle}", status.stage_name);
    }
}
