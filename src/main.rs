use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod cmd;

use cadence::config::Config;

#[derive(Parser)]
#[command(name = "cadence")]
#[command(version, about = "Multi-stage pipeline orchestration engine")]
pub struct Cli {
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Auto-answer the stall gate with re-invoke (bounded by the attempt budget)
    #[arg(long, global = true)]
    pub yes: bool,

    #[arg(long, global = true)]
    pub project_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a cadence project (.cadence/ with a starter charter)
    Init,
    /// Run a workflow for a request, or resume one with --resume
    Run {
        /// The request to pipeline through the stages
        request: Option<String>,

        /// Resume a previously-started workflow from its checkpoint
        #[arg(long)]
        resume: Option<String>,
    },
    /// Show workflow health, or list workflows when no id is given
    Status {
        workflow_id: Option<String>,
    },
    /// Print the static stage table
    Stages,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let project_dir = match cli.project_dir.clone() {
        Some(dir) => dir,
        None => std::env::current_dir().context("Failed to get current directory")?,
    };
    let config = Config::new(project_dir, cli.verbose)?;

    match &cli.command {
        Commands::Init => cmd::cmd_init(&config)?,
        Commands::Run { request, resume } => {
            cmd::cmd_run(&config, request.as_deref(), resume.as_deref(), cli.yes).await?
        }
        Commands::Status { workflow_id } => cmd::cmd_status(&config, workflow_id.as_deref())?,
        Commands::Stages => cmd::cmd_stages()?,
    }

    Ok(())
}
