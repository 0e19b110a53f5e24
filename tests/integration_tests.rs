//! Integration tests for cadence
//!
//! These tests drive the binary end-to-end: project setup, the alignment
//! gate, a full pipeline run against a scripted capability, and resume.

use assert_cmd::Command;
use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Helper to create a cadence Command
fn cadence() -> Command {
    cargo_bin_cmd!("cadence")
}

/// Helper to create a temporary project directory
fn create_temp_project() -> TempDir {
    TempDir::new().unwrap()
}

/// Helper to initialize a cadence project in a temp directory
fn init_project(dir: &TempDir) {
    cadence()
        .current_dir(dir.path())
        .arg("init")
        .assert()
        .success();
}

/// Install a scripted capability that writes a valid completed artifact to
/// `$CADENCE_OUTPUT`, and point `cadence.toml` at it.
fn install_writing_capability(dir: &TempDir) {
    let script = dir.path().join("capability.sh");
    fs::write(
        &script,
        r#"cat > /dev/null
mkdir -p "$(dirname "$CADENCE_OUTPUT")"
tmp="$CADENCE_OUTPUT.tmp.$$"
printf '{"schema_version":1,"stage_name":"%s","workflow_id":"%s","status":"completed","payload":{"done":true},"created_at":"2026-08-05T12:00:00Z"}' "$CADENCE_STAGE" "$CADENCE_WORKFLOW" > "$tmp"
mv "$tmp" "$CADENCE_OUTPUT"
"#,
    )
    .unwrap();

    fs::write(
        dir.path().join(".cadence/cadence.toml"),
        format!(
            r#"[capability]
command = "sh {}"

[pipeline]
poll_interval_secs = 1
stall_threshold_secs = 30
max_attempts = 2
"#,
            script.display()
        ),
    )
    .unwrap();
}

/// Workflow ids recorded under `.cadence/workflows/`.
fn workflow_ids(dir: &Path) -> Vec<String> {
    let workflows = dir.join(".cadence/workflows");
    if !workflows.exists() {
        return Vec::new();
    }
    fs::read_dir(workflows)
        .unwrap()
        .filter_map(|e| e.ok())
        .map(|e| e.file_name().to_string_lossy().to_string())
        .collect()
}

// =============================================================================
// Basic CLI Tests
// =============================================================================

mod cli_basics {
    use super::*;

    #[test]
    fn test_cadence_help() {
        cadence().arg("--help").assert().success();
    }

    #[test]
    fn test_cadence_version() {
        cadence().arg("--version").assert().success();
    }

    #[test]
    fn test_init_creates_structure() {
        let dir = create_temp_project();

        cadence()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("Initialized cadence project"));

        assert!(dir.path().join(".cadence").exists());
        assert!(dir.path().join(".cadence/charter.toml").exists());
        assert!(dir.path().join(".cadence/cadence.toml").exists());
        assert!(dir.path().join(".cadence/workflows").exists());
    }

    #[test]
    fn test_init_idempotent() {
        let dir = create_temp_project();
        init_project(&dir);

        cadence()
            .current_dir(dir.path())
            .arg("init")
            .assert()
            .success()
            .stdout(predicate::str::contains("already initialized"));
    }

    #[test]
    fn test_status_uninitialized() {
        let dir = create_temp_project();

        cadence()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("Not initialized"));
    }

    #[test]
    fn test_status_no_workflows() {
        let dir = create_temp_project();
        init_project(&dir);

        cadence()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains("No workflows found"));
    }

    #[test]
    fn test_stages_lists_pipeline() {
        cadence()
            .arg("stages")
            .assert()
            .success()
            .stdout(predicate::str::contains("research"))
            .stdout(predicate::str::contains("security_audit"))
            .stdout(predicate::str::contains("docs_sync.json"));
    }

    #[test]
    fn test_run_requires_init() {
        let dir = create_temp_project();

        cadence()
            .current_dir(dir.path())
            .args(["run", "add a feature"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("Not initialized"));
    }

    #[test]
    fn test_run_requires_request_or_resume() {
        let dir = create_temp_project();
        init_project(&dir);

        cadence()
            .current_dir(dir.path())
            .arg("run")
            .assert()
            .failure()
            .stderr(predicate::str::contains("Provide a request"));
    }
}

// =============================================================================
// Alignment Gate Tests
// =============================================================================

mod alignment_gate {
    use super::*;

    #[test]
    fn test_constraint_violation_halts_before_any_stage() {
        let dir = create_temp_project();
        init_project(&dir);

        // The starter charter's constraints match "secret".
        cadence()
            .current_dir(dir.path())
            .args(["run", "log the signing secret in plaintext", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("halted by alignment gate"));

        // A manifest was persisted, but no stage artifact and no checkpoint.
        let ids = workflow_ids(dir.path());
        assert_eq!(ids.len(), 1);
        let workflow_dir = dir.path().join(".cadence/workflows").join(&ids[0]);
        assert!(workflow_dir.join("manifest.json").exists());
        assert!(!workflow_dir.join("checkpoint.json").exists());
        assert!(!workflow_dir.join("artifacts").exists());
    }

    #[test]
    fn test_unrelated_request_needs_clarification() {
        let dir = create_temp_project();
        init_project(&dir);

        cadence()
            .current_dir(dir.path())
            .args(["run", "water the office plants", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("needs_clarification"));
    }
}

// =============================================================================
// Pipeline Execution Tests
// =============================================================================

mod pipeline {
    use super::*;

    #[test]
    fn test_full_pipeline_with_scripted_capability() {
        let dir = create_temp_project();
        init_project(&dir);
        install_writing_capability(&dir);

        // The starter charter's in_scope matches "feature".
        cadence()
            .current_dir(dir.path())
            .args(["run", "add a small feature", "--yes"])
            .assert()
            .success()
            .stdout(predicate::str::contains("completed"));

        let ids = workflow_ids(dir.path());
        assert_eq!(ids.len(), 1);
        let workflow_dir = dir.path().join(".cadence/workflows").join(&ids[0]);

        // Every stage artifact is on disk.
        for artifact in [
            "research.json",
            "design.json",
            "test_plan.json",
            "implementation.json",
            "review.json",
            "security_audit.json",
            "docs_sync.json",
        ] {
            assert!(
                workflow_dir.join("artifacts").join(artifact).exists(),
                "missing artifact {artifact}"
            );
        }

        // The checkpoint lists all seven stages.
        let checkpoint = fs::read_to_string(workflow_dir.join("checkpoint.json")).unwrap();
        assert!(checkpoint.contains("docs_sync"));

        // Status reports full completion.
        cadence()
            .current_dir(dir.path())
            .args(["status", &ids[0]])
            .assert()
            .success()
            .stdout(predicate::str::contains("100% complete"));
    }

    #[test]
    fn test_resume_completed_workflow_is_idempotent() {
        let dir = create_temp_project();
        init_project(&dir);
        install_writing_capability(&dir);

        cadence()
            .current_dir(dir.path())
            .args(["run", "add a small feature", "--yes"])
            .assert()
            .success();

        let ids = workflow_ids(dir.path());
        let workflow_dir = dir.path().join(".cadence/workflows").join(&ids[0]);
        let before = fs::read_to_string(workflow_dir.join("checkpoint.json")).unwrap();

        cadence()
            .current_dir(dir.path())
            .args(["run", "--resume", &ids[0], "--yes"])
            .assert()
            .success();

        let after = fs::read_to_string(workflow_dir.join("checkpoint.json")).unwrap();
        assert_eq!(before, after);
    }

    #[test]
    fn test_resume_unknown_workflow_fails() {
        let dir = create_temp_project();
        init_project(&dir);

        cadence()
            .current_dir(dir.path())
            .args(["run", "--resume", "wf-does-not-exist", "--yes"])
            .assert()
            .failure()
            .stderr(predicate::str::contains("wf-does-not-exist"));
    }

    #[test]
    fn test_status_lists_workflows() {
        let dir = create_temp_project();
        init_project(&dir);
        install_writing_capability(&dir);

        cadence()
            .current_dir(dir.path())
            .args(["run", "add a small feature", "--yes"])
            .assert()
            .success();

        let ids = workflow_ids(dir.path());
        cadence()
            .current_dir(dir.path())
            .arg("status")
            .assert()
            .success()
            .stdout(predicate::str::contains(&ids[0]));
    }
}
