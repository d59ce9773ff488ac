//! Quality reports produced by validation.

use std::sync::atomic::{AtomicU64, Ordering};

use chrono::{DateTime, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::unit::{CurriculumUnit, UnitId};

/// Upper bound of the quality scale.
pub const MAX_SCORE: f64 = 10.0;

/// Result of validating one curriculum unit snapshot.
///
/// Reports are immutable records: every validation call creates a new one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    /// Unique identifier for this report.
    pub id: String,

    /// Unit the report belongs to.
    pub unit_id: UnitId,

    /// Version of the unit that was validated, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_version: Option<u32>,

    /// Digest of the validated snapshot, when known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit_digest: Option<String>,

    /// Aggregate score on a 0-10 scale.
    pub score: f64,

    /// Sub-metric scores, in the order the validator reported them.
    #[serde(default)]
    pub sub_scores: IndexMap<String, f64>,

    /// Human-readable issue descriptions.
    #[serde(default)]
    pub issues: Vec<String>,

    #[serde(default)]
    pub recommendations: Vec<String>,

    /// The validator's own pass/fail verdict.
    pub passed: bool,

    pub created_at: DateTime<Utc>,
}

impl QualityReport {
    /// Create a report with an aggregate score and no detail.
    pub fn new(unit_id: impl Into<UnitId>, score: f64) -> Self {
        Self {
            id: generate_report_id(),
            unit_id: unit_id.into(),
            unit_version: None,
            unit_digest: None,
            score,
            sub_scores: IndexMap::new(),
            issues: Vec::new(),
            recommendations: Vec::new(),
            passed: false,
            created_at: Utc::now(),
        }
    }

    /// Record which unit snapshot was validated.
    pub fn with_snapshot(mut self, unit: &CurriculumUnit) -> Self {
        self.unit_version = Some(unit.version);
        self.unit_digest = Some(unit.digest());
        self
    }

    pub fn with_sub_score(mut self, name: impl Into<String>, score: f64) -> Self {
        self.sub_scores.insert(name.into(), score);
        self
    }

    pub fn with_issue(mut self, issue: impl Into<String>) -> Self {
        self.issues.push(issue.into());
        self
    }

    pub fn with_issues(mut self, issues: Vec<String>) -> Self {
        self.issues = issues;
        self
    }

    pub fn with_recommendation(mut self, recommendation: impl Into<String>) -> Self {
        self.recommendations.push(recommendation.into());
        self
    }

    /// Set the pass/fail verdict against a threshold.
    pub fn with_verdict(mut self, threshold: f64) -> Self {
        self.passed = self.meets(threshold);
        self
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self
    }

    /// Whether the aggregate score meets or exceeds the threshold.
    pub fn meets(&self, threshold: f64) -> bool {
        self.score >= threshold
    }

    /// Check that every score is finite and on the 0-10 scale.
    pub fn check_scale(&self) -> std::result::Result<(), String> {
        check_score("score", self.score)?;
        for (name, score) in &self.sub_scores {
            check_score(name, *score)?;
        }
        Ok(())
    }

    /// Sub-metrics scoring below the threshold, in report order.
    pub fn weak_metrics(&self, threshold: f64) -> Vec<(&str, f64)> {
        self.sub_scores
            .iter()
            .filter(|(_, score)| **score < threshold)
            .map(|(name, score)| (name.as_str(), *score))
            .collect()
    }
}

fn check_score(name: &str, score: f64) -> std::result::Result<(), String> {
    if !score.is_finite() || !(0.0..=MAX_SCORE).contains(&score) {
        return Err(format!(
            "{} must be a number between 0 and {}, got {}",
            name, MAX_SCORE, score
        ));
    }
    Ok(())
}

/// Generate a unique report ID.
fn generate_report_id() -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(1);
    format!("qr_{:04}", COUNTER.fetch_add(1, Ordering::SeqCst))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_threshold_is_inclusive() {
        let report = QualityReport::new("5", 7.5);
        assert!(report.meets(7.5));
        assert!(!report.meets(7.6));
    }

    #[test]
    fn test_with_verdict() {
        assert!(QualityReport::new("5", 8.2).with_verdict(7.5).passed);
        assert!(!QualityReport::new("6", 6.0).with_verdict(7.5).passed);
    }

    #[test]
    fn test_check_scale_rejects_out_of_range() {
        assert!(QualityReport::new("1", 8.0).check_scale().is_ok());
        assert!(QualityReport::new("1", 10.5).check_scale().is_err());
        assert!(QualityReport::new("1", f64::NAN).check_scale().is_err());
        assert!(
            QualityReport::new("1", 8.0)
                .with_sub_score("concept_clarity", -1.0)
                .check_scale()
                .is_err()
        );
    }

    #[test]
    fn test_weak_metrics_keep_report_order() {
        let report = QualityReport::new("2", 6.0)
            .with_sub_score("structural_coherence", 9.0)
            .with_sub_score("spiral_learning_coverage", 4.0)
            .with_sub_score("content_completeness", 6.0);

        let weak = report.weak_metrics(7.5);
        assert_eq!(
            weak,
            vec![("spiral_learning_coverage", 4.0), ("content_completeness", 6.0)]
        );
    }

    #[test]
    fn test_report_ids_are_unique() {
        let a = QualityReport::new("1", 5.0);
        let b = QualityReport::new("1", 5.0);
        assert_ne!(a.id, b.id);
    }
}
