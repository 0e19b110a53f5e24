use anyhow::{Context, Result};
use std::path::PathBuf;

use crate::settings::Settings;

/// Runtime configuration for cadence.
///
/// Resolves the `.cadence/` project layout and loads `cadence.toml`.
#[derive(Debug, Clone)]
pub struct Config {
    pub project_dir: PathBuf,
    pub cadence_dir: PathBuf,
    pub charter_file: PathBuf,
    pub settings_file: PathBuf,
    pub workflows_dir: PathBuf,
    pub log_dir: PathBuf,
    pub settings: Settings,
    pub verbose: bool,
}

impl Config {
    pub fn new(project_dir: PathBuf, verbose: bool) -> Result<Self> {
        let project_dir = project_dir
            .canonicalize()
            .context("Failed to resolve project directory")?;

        let cadence_dir = project_dir.join(".cadence");
        let charter_file = cadence_dir.join("charter.toml");
        let settings_file = cadence_dir.join("cadence.toml");
        let workflows_dir = cadence_dir.join("workflows");
        let log_dir = cadence_dir.join("logs");

        let settings = Settings::load_or_default(&settings_file)?;

        Ok(Self {
            project_dir,
            cadence_dir,
            charter_file,
            settings_file,
            workflows_dir,
            log_dir,
            settings,
            verbose,
        })
    }

    /// Whether `cadence init` has been run here.
    pub fn is_initialized(&self) -> bool {
        self.cadence_dir.exists() && self.charter_file.exists()
    }

    pub fn ensure_directories(&self) -> Result<()> {
        std::fs::create_dir_all(&self.workflows_dir)
            .context("Failed to create workflows directory")?;
        std::fs::create_dir_all(&self.log_dir).context("Failed to create log directory")?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_resolves_cadence_layout() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), false).unwrap();

        let root = dir.path().canonicalize().unwrap();
        assert_eq!(config.cadence_dir, root.join(".cadence"));
        assert_eq!(config.charter_file, root.join(".cadence/charter.toml"));
        assert_eq!(config.settings_file, root.join(".cadence/cadence.toml"));
        assert_eq!(config.workflows_dir, root.join(".cadence/workflows"));
        assert!(!config.is_initialized());
    }

    #[test]
    fn test_config_missing_project_dir_is_an_error() {
        let result = Config::new(PathBuf::from("/nonexistent/project"), false);
        assert!(result.is_err());
    }

    #[test]
    fn test_ensure_directories() {
        let dir = tempdir().unwrap();
        let config = Config::new(dir.path().to_path_buf(), false).unwrap();
        config.ensure_directories().unwrap();
        assert!(config.workflows_dir.exists());
        assert!(config.log_dir.exists());
    }

    #[test]
    fn test_config_picks_up_settings_file() {
        let dir = tempdir().unwrap();
        let cadence_dir = dir.path().join(".cadence");
        std::fs::create_dir_all(&cadence_dir).unwrap();
        std::fs::write(
            cadence_dir.join("cadence.toml"),
            "[pipeline]\nmax_attempts = 9\n",
        )
        .unwrap();

        let config = Config::new(dir.path().to_path_buf(), false).unwrap();
        assert_eq!(config.settings.pipeline.max_attempts, 9);
    }
}
