use thiserror::Error;

/// Where a validation failure message points the reader for more detail.
pub const SECURITY_DOC: &str = "docs/SECURITY.md";

#[derive(Debug, Error)]
pub enum AutodevError {
    #[error("not initialized: run 'autodev init'")]
    NotInitialized,

    #[error("{what}; expected {expected} (see: {doc})", doc = SECURITY_DOC)]
    Validation { what: String, expected: String },

    #[error("checkpoint not found for workflow '{0}'")]
    CheckpointNotFound(String),

    #[error("artifact not found: {workflow_id}/{stage}")]
    ArtifactNotFound { workflow_id: String, stage: String },

    #[error("invalid stage '{0}': expected one of researcher, planner, test-master, implementer, reviewer, security-auditor, doc-master")]
    InvalidStage(String),

    #[error("invalid stage order: {0}")]
    StageOrder(String),

    #[error("invalid artifact status '{0}': expected in_progress, completed or failed")]
    InvalidArtifactStatus(String),

    #[error("git: {0}")]
    Git(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

impl AutodevError {
    pub fn validation(what: impl Into<String>, expected: impl Into<String>) -> Self {
        AutodevError::Validation {
            what: what.into(),
            expected: expected.into(),
        }
    }

    /// True for anything a caller should treat as "does not exist yet".
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AutodevError::CheckpointNotFound(_) | AutodevError::ArtifactNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, AutodevError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_message_names_expectation_and_doc() {
        let err = AutodevError::validation("agent name contains spaces", "[A-Za-z0-9_-]+");
        let msg = err.to_string();
        assert!(msg.contains("agent name contains spaces"));
        assert!(msg.contains("expected [A-Za-z0-9_-]+"));
        assert!(msg.contains(SECURITY_DOC));
    }

    #[test]
    fn not_found_classification() {
        assert!(AutodevError::CheckpointNotFound("x".into()).is_not_found());
        assert!(!AutodevError::NotInitialized.is_not_found());
    }
}
