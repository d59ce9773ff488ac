//! Cycle outcomes and results.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{CollaboratorError, Step};
use crate::model::{
    FeedbackSummary, ImportReceipt, QualityReport, RefineReceipt, RefinementInstruction, UnitId,
};

/// How a single-unit cycle ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CycleOutcome {
    /// The validator call failed.
    ValidationFailed { error: CollaboratorError },

    /// The unit scored below the threshold and refinement was not allowed.
    RejectedLowQuality { score: f64, issues: Vec<String> },

    /// The importer call failed. Reports produced so far are kept.
    ImportFailed { error: CollaboratorError },

    /// Imported, and the module has no learners yet.
    ImportedNoFeedback,

    /// Imported with learner feedback. `degraded` feedback was not refined.
    Imported { degraded: bool },

    /// Refined once, then re-validated and imported.
    RefinedAndImported,

    /// The refined unit still scored below the threshold.
    RefinementExhausted { reason: String },

    /// The refiner call failed.
    RefinementFailed { error: CollaboratorError },

    /// The feedback collector call failed after a successful import.
    FeedbackFailed { error: CollaboratorError },

    /// The unit passed but automatic import is disabled.
    AwaitingImport,

    /// The unit was refined but automatic re-validation is disabled.
    AwaitingValidation,

    /// The caller cancelled before the named step was issued.
    Cancelled { step: Step },
}

impl CycleOutcome {
    /// Outcome tag name.
    pub fn label(&self) -> &'static str {
        match self {
            CycleOutcome::ValidationFailed { .. } => "ValidationFailed",
            CycleOutcome::RejectedLowQuality { .. } => "RejectedLowQuality",
            CycleOutcome::ImportFailed { .. } => "ImportFailed",
            CycleOutcome::ImportedNoFeedback => "ImportedNoFeedback",
            CycleOutcome::Imported { .. } => "Imported",
            CycleOutcome::RefinedAndImported => "RefinedAndImported",
            CycleOutcome::RefinementExhausted { .. } => "RefinementExhausted",
            CycleOutcome::RefinementFailed { .. } => "RefinementFailed",
            CycleOutcome::FeedbackFailed { .. } => "FeedbackFailed",
            CycleOutcome::AwaitingImport => "AwaitingImport",
            CycleOutcome::AwaitingValidation => "AwaitingValidation",
            CycleOutcome::Cancelled { .. } => "Cancelled",
        }
    }

    /// Whether the unit ended up imported.
    pub fn is_imported(&self) -> bool {
        matches!(
            self,
            CycleOutcome::ImportedNoFeedback
                | CycleOutcome::Imported { .. }
                | CycleOutcome::RefinedAndImported
        )
    }

    /// The collaborator failure behind this outcome, if any.
    pub fn error(&self) -> Option<&CollaboratorError> {
        match self {
            CycleOutcome::ValidationFailed { error }
            | CycleOutcome::ImportFailed { error }
            | CycleOutcome::RefinementFailed { error }
            | CycleOutcome::FeedbackFailed { error } => Some(error),
            _ => None,
        }
    }

    /// Outcome for a failed collaborator call at `step`.
    pub(crate) fn from_failure(error: CollaboratorError) -> Self {
        if let CollaboratorError::Cancelled { step } = error {
            return CycleOutcome::Cancelled { step };
        }
        match error.step() {
            Step::Validate => CycleOutcome::ValidationFailed { error },
            Step::Import => CycleOutcome::ImportFailed { error },
            Step::CollectFeedback => CycleOutcome::FeedbackFailed { error },
            Step::Refine => CycleOutcome::RefinementFailed { error },
        }
    }
}

/// Everything a cycle produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CycleResult {
    pub unit_id: UnitId,

    pub outcome: CycleOutcome,

    /// Threshold the reports were judged against.
    pub threshold: f64,

    pub auto_refine: bool,

    /// Every quality report produced, oldest first.
    pub reports: Vec<QualityReport>,

    /// Every successful import, oldest first.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub imports: Vec<ImportReceipt>,

    /// Feedback collected before any refinement.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<FeedbackSummary>,

    /// Why the feedback counted as degraded.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub degradation: Vec<String>,

    /// Instructions sent to the refiner.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<RefinementInstruction>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refinement: Option<RefineReceipt>,

    pub started_at: DateTime<Utc>,

    pub completed_at: DateTime<Utc>,
}

impl CycleResult {
    pub(crate) fn start(unit_id: UnitId, threshold: f64, auto_refine: bool) -> Self {
        let now = Utc::now();
        Self {
            unit_id,
            outcome: CycleOutcome::AwaitingValidation,
            threshold,
            auto_refine,
            reports: Vec::new(),
            imports: Vec::new(),
            feedback: None,
            degradation: Vec::new(),
            instructions: None,
            refinement: None,
            started_at: now,
            completed_at: now,
        }
    }

    pub(crate) fn finish(mut self, outcome: CycleOutcome) -> Self {
        self.outcome = outcome;
        self.completed_at = Utc::now();
        self
    }

    pub fn latest_report(&self) -> Option<&QualityReport> {
        self.reports.last()
    }

    pub fn latest_import(&self) -> Option<&ImportReceipt> {
        self.imports.last()
    }

    /// Issues from the last available quality report.
    pub fn issues(&self) -> &[String] {
        match &self.outcome {
            CycleOutcome::RejectedLowQuality { issues, .. } => issues,
            _ => self
                .latest_report()
                .map(|r| r.issues.as_slice())
                .unwrap_or(&[]),
        }
    }

    /// Number of validator calls that produced a report.
    pub fn validations(&self) -> usize {
        self.reports.len()
    }

    pub fn was_refined(&self) -> bool {
        self.refinement.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_wire_tag() {
        let outcome = CycleOutcome::RejectedLowQuality {
            score: 6.0,
            issues: vec!["Missing spiral review".to_string()],
        };
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["outcome"], "rejected_low_quality");
        assert_eq!(json["score"], 6.0);
    }

    #[test]
    fn test_cancelled_failure_maps_to_cancelled() {
        let outcome = CycleOutcome::from_failure(CollaboratorError::Cancelled { step: Step::Import });
        assert_eq!(outcome, CycleOutcome::Cancelled { step: Step::Import });
        assert!(outcome.error().is_none());
    }

    #[test]
    fn test_failure_maps_to_step_outcome() {
        let error = CollaboratorError::unavailable(Step::CollectFeedback, "down");
        let outcome = CycleOutcome::from_failure(error.clone());
        assert_eq!(outcome.label(), "FeedbackFailed");
        assert_eq!(outcome.error(), Some(&error));
    }

    #[test]
    fn test_issues_prefer_rejection_list() {
        let report = QualityReport::new("6", 6.0).with_issue("from report");
        let mut result = CycleResult::start(UnitId::from(6u32), 7.5, false);
        result.reports.push(report);
        let result = result.finish(CycleOutcome::RejectedLowQuality {
            score: 6.0,
            issues: vec!["from report".to_string()],
        });
        assert_eq!(result.issues(), ["from report".to_string()]);
    }
}
