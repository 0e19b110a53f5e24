//! Typed error hierarchy for the cadence orchestrator.
//!
//! Three top-level enums cover the three subsystems:
//! - `ArtifactError` — artifact store read/write failures
//! - `StageError` — stage table validation and dependency failures
//! - `PipelineError` — coordinator-level workflow failures

use thiserror::Error;

/// Errors from the artifact store.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("No artifact found for stage '{stage}'")]
    NotFound { stage: String },

    #[error("Stage '{stage}' is not in the stage table")]
    UnknownStage { stage: String },

    #[error("Artifact for stage '{stage}' already exists at {path}")]
    AlreadyExists {
        stage: String,
        path: std::path::PathBuf,
    },

    #[error("Artifact for stage '{stage}' has unsupported schema version {found} (supported: {supported})")]
    SchemaMismatch {
        stage: String,
        found: u32,
        supported: u32,
    },

    #[error("Artifact for stage '{stage}' is malformed: {source}")]
    Malformed {
        stage: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Artifact for stage '{stage}' was written for workflow '{found}', expected '{expected}'")]
    WorkflowMismatch {
        stage: String,
        found: String,
        expected: String,
    },

    #[error("Failed to access artifact for stage '{stage}': {source}")]
    Io {
        stage: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from stage table construction and dependency resolution.
#[derive(Debug, Error)]
pub enum StageError {
    #[error("Stage '{stage}' declared more than once")]
    DuplicateStage { stage: String },

    #[error("Stages '{first}' and '{second}' both declare output artifact '{artifact}'")]
    DuplicateArtifact {
        artifact: String,
        first: String,
        second: String,
    },

    #[error("Stage '{stage}' depends on unknown stage '{dependency}'")]
    UnknownDependency { stage: String, dependency: String },

    #[error("Stage '{stage}' depends on stage '{dependency}' with an equal or higher ordinal")]
    OrdinalInversion { stage: String, dependency: String },

    #[error("Stage '{stage}' requires upstream artifact from '{dependency}': {source}")]
    UpstreamUnavailable {
        stage: String,
        dependency: String,
        #[source]
        source: ArtifactError,
    },
}

/// Errors from the coordinator-level workflow loop.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Workflow '{workflow_id}' not found")]
    WorkflowNotFound { workflow_id: String },

    #[error("Stage '{stage}' exhausted {attempts} invocation attempts without a valid artifact")]
    AttemptsExhausted { stage: String, attempts: u32 },

    #[error("Workflow aborted by operator before stage '{stage}'")]
    Aborted { stage: String },

    #[error("Capability invocation for stage '{stage}' failed: {message}")]
    InvocationFailed { stage: String, message: String },

    #[error(transparent)]
    Artifact(#[from] ArtifactError),

    #[error(transparent)]
    Stage(#[from] StageError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn artifact_error_not_found_is_matchable() {
        let err = ArtifactError::NotFound {
            stage: "design".into(),
        };
        match &err {
            ArtifactError::NotFound { stage } => assert_eq!(stage, "design"),
            _ => panic!("Expected NotFound variant"),
        }
        assert!(err.to_string().contains("design"));
    }

    #[test]
    fn artifact_error_schema_mismatch_carries_versions() {
        let err = ArtifactError::SchemaMismatch {
            stage: "research".into(),
            found: 9,
            supported: 1,
        };
        match &err {
            ArtifactError::SchemaMismatch {
                found, supported, ..
            } => {
                assert_eq!(*found, 9);
                assert_eq!(*supported, 1);
            }
            _ => panic!("Expected SchemaMismatch"),
        }
    }

    #[test]
    fn stage_error_upstream_unavailable_carries_source() {
        let inner = ArtifactError::NotFound {
            stage: "research".into(),
        };
        let err = StageError::UpstreamUnavailable {
            stage: "design".into(),
            dependency: "research".into(),
            source: inner,
        };
        assert!(err.to_string().contains("design"));
        assert!(err.to_string().contains("research"));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn pipeline_error_converts_from_artifact_error() {
        let inner = ArtifactError::NotFound {
            stage: "review".into(),
        };
        let err: PipelineError = inner.into();
        assert!(matches!(err, PipelineError::Artifact(_)));
    }

    #[test]
    fn pipeline_error_attempts_exhausted_carries_counts() {
        let err = PipelineError::AttemptsExhausted {
            stage: "implementation".into(),
            attempts: 3,
        };
        assert!(err.to_string().contains('3'));
    }

    #[test]
    fn all_error_types_implement_std_error_trait() {
        fn assert_std_error<E: std::error::Error>(_: &E) {}
        assert_std_error(&ArtifactError::NotFound { stage: "x".into() });
        assert_std_error(&StageError::DuplicateStage { stage: "x".into() });
        assert_std_error(&PipelineError::Aborted { stage: "x".into() });
    }
}
