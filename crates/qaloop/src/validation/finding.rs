//! Findings reported by quality checks.

use serde::{Deserialize, Serialize};

/// Severity level of a finding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Informational only, may not require action.
    Info,
    /// Potential issue that should be reviewed.
    Warning,
    /// Definite issue that should be addressed.
    Error,
}

impl Severity {
    pub fn label(&self) -> &'static str {
        match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Error => "error",
        }
    }
}

/// A single problem (or note) found in a unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,

    /// Where in the unit the finding applies (e.g. `sub_units[3].summary`).
    pub location: String,

    pub message: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recommendation: Option<String>,
}

impl Finding {
    pub fn new(severity: Severity, location: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            severity,
            location: location.into(),
            message: message.into(),
            recommendation: None,
        }
    }

    pub fn error(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Error, location, message)
    }

    pub fn warning(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, location, message)
    }

    pub fn info(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::new(Severity::Info, location, message)
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendation = Some(recommendation.into());
        self
    }

    /// Issue line as it appears in a quality report.
    pub fn issue_line(&self) -> String {
        format!("[{}] {}: {}", self.severity.label(), self.location, self.message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_issue_line() {
        let finding = Finding::error("sub_units[0].summary", "Contains placeholder text: '{{'");
        assert_eq!(
            finding.issue_line(),
            "[error] sub_units[0].summary: Contains placeholder text: '{{'"
        );
    }
}
