use anyhow::Result;
use console::style;

use cadence::charter::Charter;
use cadence::config::Config;
use cadence::settings::Settings;

/// `cadence init`: scaffold the `.cadence/` directory.
///
/// Idempotent: an initialized project is left untouched.
pub fn cmd_init(config: &Config) -> Result<()> {
    if config.is_initialized() {
        println!(
            "{} Project already initialized at {}",
            style("→").dim(),
            config.cadence_dir.display()
        );
        return Ok(());
    }

    config.ensure_directories()?;

    if !config.charter_file.exists() {
        Charter::starter().save(&config.charter_file)?;
    }
    if !config.settings_file.exists() {
        Settings::default().save(&config.settings_file)?;
    }

    println!(
        "{} Initialized cadence project at {}",
        style("✓").green(),
        config.cadence_dir.display()
    );
    println!(
        "  Edit {} to describe your charter before running a workflow.",
        style(config.charter_file.display()).yellow()
    );

    Ok(())
}
