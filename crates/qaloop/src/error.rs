//! Error types for the qaloop library.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for qaloop operations.
#[derive(Debug, Error)]
pub enum QaError {
    /// Error reading or accessing a file.
    #[error("IO error for '{path}': {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON serialization/deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Error from the CSV library.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error saving or loading workspace state.
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// A unit, module or record that does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A curriculum unit that cannot be processed.
    #[error("Invalid unit: {0}")]
    InvalidUnit(String),

    /// Publication refused because the authorizing score is too low.
    #[error("Module {module_id} scored {score:.2}, below the {threshold:.2} publication threshold")]
    BelowThreshold {
        module_id: String,
        score: f64,
        threshold: f64,
    },

    /// A collaborator call failed.
    #[error(transparent)]
    Collaborator(#[from] CollaboratorError),
}

/// Result type alias for qaloop operations.
pub type Result<T> = std::result::Result<T, QaError>;

/// The collaborator step a call belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Step {
    Validate,
    Import,
    CollectFeedback,
    Refine,
}

impl Step {
    /// Get a human-readable label.
    pub fn label(&self) -> &'static str {
        match self {
            Step::Validate => "validate",
            Step::Import => "import",
            Step::CollectFeedback => "collect_feedback",
            Step::Refine => "refine",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Failure of a single collaborator call.
///
/// Timeouts are reported as [`CollaboratorError::Unavailable`]; there is no
/// separate timeout class.
#[derive(Debug, Clone, PartialEq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CollaboratorError {
    /// Network failure, timeout, or server-side fault.
    #[error("{step} collaborator unavailable: {message}")]
    Unavailable { step: Step, message: String },

    /// Malformed input, unknown unit, or malformed response.
    #[error("{step} collaborator rejected the request: {message}")]
    Rejected { step: Step, message: String },

    /// The call was never issued because the caller cancelled.
    #[error("{step} call cancelled before it was issued")]
    Cancelled { step: Step },
}

impl CollaboratorError {
    pub fn unavailable(step: Step, message: impl Into<String>) -> Self {
        CollaboratorError::Unavailable {
            step,
            message: message.into(),
        }
    }

    pub fn rejected(step: Step, message: impl Into<String>) -> Self {
        CollaboratorError::Rejected {
            step,
            message: message.into(),
        }
    }

    /// The step that produced this error.
    pub fn step(&self) -> Step {
        match self {
            CollaboratorError::Unavailable { step, .. }
            | CollaboratorError::Rejected { step, .. }
            | CollaboratorError::Cancelled { step } => *step,
        }
    }

    /// Short name of the error class.
    pub fn kind(&self) -> &'static str {
        match self {
            CollaboratorError::Unavailable { .. } => "CollaboratorUnavailable",
            CollaboratorError::Rejected { .. } => "CollaboratorRejected",
            CollaboratorError::Cancelled { .. } => "Cancelled",
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, CollaboratorError::Cancelled { .. })
    }
}

/// Result of a collaborator call.
pub type CallResult<T> = std::result::Result<T, CollaboratorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collaborator_error_names_step() {
        let err = CollaboratorError::unavailable(Step::Validate, "timed out after 30s");
        assert_eq!(err.step(), Step::Validate);
        assert_eq!(err.kind(), "CollaboratorUnavailable");
        assert_eq!(
            err.to_string(),
            "validate collaborator unavailable: timed out after 30s"
        );
    }

    #[test]
    fn test_collaborator_error_serializes_with_kind_tag() {
        let err = CollaboratorError::rejected(Step::Import, "unit 9 not found");
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "rejected");
        assert_eq!(json["step"], "import");

        let back: CollaboratorError = serde_json::from_value(json).unwrap();
        assert_eq!(back, err);
    }

    #[test]
    fn test_qa_error_wraps_collaborator_error() {
        let err: QaError = CollaboratorError::Cancelled { step: Step::Refine }.into();
        assert!(err.to_string().contains("refine call cancelled"));
    }
}
