//! Rule-based quality checks for curriculum units.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::model::{CurriculumUnit, QualityReport, UnitId, MAX_SCORE};

use super::finding::{Finding, Severity};

/// Template text left behind by generation.
const PLACEHOLDER_PATTERNS: &[&str] = &[
    "[brief description",
    "[activity description",
    "[concept",
    "{{",
    "Week Title",
    "Weekly Theme",
    "Students will be able to...",
    "Students will demonstrate...",
];

/// Bracketed authoring instructions such as `[insert vocabulary here]`.
static BRACKET_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\[(insert|add|describe|todo|tbd)\b[^\]]*\]").expect("valid placeholder regex")
});

/// Words that carry no topic information in an objective.
const OBJECTIVE_STOPWORDS: &[&str] = &[
    "students", "student", "learners", "learner", "should", "would", "their", "about",
    "understand", "demonstrate", "identify", "explain", "apply", "using", "through",
    "between", "which", "these", "those", "every", "other",
];

pub const STRUCTURAL_COHERENCE: &str = "structural_coherence";
pub const CONTENT_COMPLETENESS: &str = "content_completeness";
pub const SPIRAL_LEARNING_COVERAGE: &str = "spiral_learning_coverage";
pub const ASSESSMENT_ALIGNMENT: &str = "assessment_alignment";

/// What a check needs to know beyond the unit itself.
#[derive(Debug, Clone)]
pub struct CheckContext {
    /// Units that come before this one, in curriculum order.
    pub prior_units: Vec<UnitId>,
    /// Number of sub-units a complete unit has.
    pub expected_sub_units: usize,
    /// Minimum fraction of items that must revisit prior units.
    pub min_spiral_coverage: f64,
}

impl Default for CheckContext {
    fn default() -> Self {
        Self {
            prior_units: Vec::new(),
            expected_sub_units: 4,
            min_spiral_coverage: 0.25,
        }
    }
}

impl CheckContext {
    pub fn with_prior_units(mut self, prior_units: Vec<UnitId>) -> Self {
        self.prior_units = prior_units;
        self
    }
}

/// Score and findings from one check.
#[derive(Debug, Clone)]
pub struct CheckResult {
    /// Score on the 0-10 scale.
    pub score: f64,
    pub findings: Vec<Finding>,
}

impl CheckResult {
    fn from_penalty(penalty: f64, findings: Vec<Finding>) -> Self {
        Self {
            score: (MAX_SCORE - penalty).clamp(0.0, MAX_SCORE),
            findings,
        }
    }
}

/// Trait for quality checks.
pub trait QualityCheck: Send + Sync {
    /// Sub-metric name this check reports under.
    fn metric(&self) -> &'static str;

    /// Evaluate a unit.
    fn evaluate(&self, unit: &CurriculumUnit, context: &CheckContext) -> CheckResult;
}

/// Checks that the unit has its full set of sub-units, each with a title,
/// summary and at least one item.
pub struct StructureCheck;

impl QualityCheck for StructureCheck {
    fn metric(&self) -> &'static str {
        STRUCTURAL_COHERENCE
    }

    fn evaluate(&self, unit: &CurriculumUnit, context: &CheckContext) -> CheckResult {
        if unit.sub_units.is_empty() {
            return CheckResult {
                score: 0.0,
                findings: vec![
                    Finding::error("sub_units", "Unit has no sub-units")
                        .with_recommendation("Generate the full sequence of sub-units"),
                ],
            };
        }

        let mut findings = Vec::new();
        let mut penalty = 0.0;

        let expected = context.expected_sub_units.max(1);
        let missing = expected.saturating_sub(unit.sub_units.len());
        if missing > 0 {
            penalty += MAX_SCORE / expected as f64 * missing as f64;
            findings.push(
                Finding::error(
                    "sub_units",
                    format!(
                        "Expected {} sub-units, found {}",
                        expected,
                        unit.sub_units.len()
                    ),
                )
                .with_recommendation("Generate the missing sub-units"),
            );
        }

        for (idx, sub) in unit.sub_units.iter().enumerate() {
            let loc = format!("sub_units[{}]", idx);
            if sub.title.trim().is_empty() {
                penalty += 1.0;
                findings.push(Finding::warning(format!("{}.title", loc), "Title is empty"));
            }
            if sub.summary.trim().is_empty() {
                penalty += 0.5;
                findings.push(Finding::warning(format!("{}.summary", loc), "Summary is empty"));
            }
            if sub.items.is_empty() {
                penalty += 1.5;
                findings.push(
                    Finding::error(format!("{}.items", loc), "Sub-unit has no lesson items")
                        .with_recommendation("Add practice items to every sub-unit"),
                );
            }
        }

        CheckResult::from_penalty(penalty, findings)
    }
}

/// Detects placeholder text and empty descriptive fields.
pub struct CompletenessCheck;

impl QualityCheck for CompletenessCheck {
    fn metric(&self) -> &'static str {
        CONTENT_COMPLETENESS
    }

    fn evaluate(&self, unit: &CurriculumUnit, _context: &CheckContext) -> CheckResult {
        let mut findings = Vec::new();
        let mut penalty = 0.0;

        for (location, text) in unit.text_fields() {
            if let Some(pattern) = find_placeholder(text) {
                penalty += 2.0;
                findings.push(
                    Finding::error(location, format!("Contains placeholder text: '{}'", pattern))
                        .with_recommendation("Replace template placeholders with real content"),
                );
            }
        }

        if unit.focus.trim().is_empty() {
            penalty += 0.5;
            findings.push(Finding::warning("focus", "Focus tag is empty"));
        }

        for (idx, sub) in unit.sub_units.iter().enumerate() {
            if sub.guidelines.trim().is_empty() {
                penalty += 0.5;
                findings.push(Finding::warning(
                    format!("sub_units[{}].guidelines", idx),
                    "Tutor guidelines are empty",
                ));
            }
        }

        CheckResult::from_penalty(penalty, findings)
    }
}

/// Returns the first placeholder pattern found in the text.
pub fn find_placeholder(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    for pattern in PLACEHOLDER_PATTERNS {
        if lower.contains(&pattern.to_lowercase()) {
            return Some(pattern.to_string());
        }
    }
    BRACKET_PLACEHOLDER
        .find(text)
        .map(|m| m.as_str().to_string())
}

/// Checks that enough content revisits prior units.
pub struct SpiralCheck;

impl QualityCheck for SpiralCheck {
    fn metric(&self) -> &'static str {
        SPIRAL_LEARNING_COVERAGE
    }

    fn evaluate(&self, unit: &CurriculumUnit, context: &CheckContext) -> CheckResult {
        if context.prior_units.is_empty() {
            return CheckResult {
                score: MAX_SCORE,
                findings: vec![Finding::info(
                    "spiral_refs",
                    "First unit does not require spiral review",
                )],
            };
        }

        let mut findings = Vec::new();
        let mut penalty = 0.0;

        let coverage = unit.spiral_coverage();
        let minimum = context.min_spiral_coverage;
        if minimum > 0.0 && coverage < minimum {
            penalty += MAX_SCORE * (1.0 - coverage / minimum);
            let recent: Vec<String> = context
                .prior_units
                .iter()
                .rev()
                .take(3)
                .map(|u| u.to_string())
                .collect();
            findings.push(
                Finding::error(
                    "sub_units",
                    format!(
                        "Spiral review covers {:.0}% of items (minimum {:.0}%)",
                        coverage * 100.0,
                        minimum * 100.0
                    ),
                )
                .with_recommendation(format!(
                    "Add spiral review items from units {}",
                    recent.join(", ")
                )),
            );
        }

        if unit.spiral_refs.is_empty() {
            penalty += 1.0;
            findings.push(Finding::warning(
                "spiral_refs",
                "Unit declares no prior units to review",
            ));
        }

        let mut referenced: Vec<&UnitId> = unit.spiral_refs.iter().collect();
        for item in unit.sub_units.iter().flat_map(|s| s.items.iter()) {
            if let Some(reviewed) = &item.reviews {
                if !referenced.contains(&reviewed) {
                    referenced.push(reviewed);
                }
            }
        }
        for reference in referenced {
            if !context.prior_units.contains(reference) {
                penalty += 1.0;
                findings.push(Finding::warning(
                    "spiral_refs",
                    format!("References unit {} which is not a prior unit", reference),
                ));
            }
        }

        CheckResult::from_penalty(penalty, findings)
    }
}

/// Checks that learning objectives are reflected in the unit content.
pub struct AlignmentCheck;

impl QualityCheck for AlignmentCheck {
    fn metric(&self) -> &'static str {
        ASSESSMENT_ALIGNMENT
    }

    fn evaluate(&self, unit: &CurriculumUnit, _context: &CheckContext) -> CheckResult {
        if unit.objectives.is_empty() {
            return CheckResult {
                score: MAX_SCORE / 2.0,
                findings: vec![
                    Finding::warning("objectives", "Unit has no learning objectives")
                        .with_recommendation("State measurable objectives for the unit"),
                ],
            };
        }

        let content = unit_content(unit);
        let mut findings = Vec::new();
        let mut covered = 0usize;

        for (idx, objective) in unit.objectives.iter().enumerate() {
            let keywords = objective_keywords(objective);
            if keywords.is_empty() || keywords.iter().any(|k| content.contains(k.as_str())) {
                covered += 1;
            } else {
                findings.push(
                    Finding::warning(
                        format!("objectives[{}]", idx),
                        format!("Objective is not reflected in the content: '{}'", objective),
                    )
                    .with_recommendation("Add items that practice every objective"),
                );
            }
        }

        CheckResult {
            score: MAX_SCORE * covered as f64 / unit.objectives.len() as f64,
            findings,
        }
    }
}

fn unit_content(unit: &CurriculumUnit) -> String {
    let mut parts = vec![unit.focus.to_lowercase()];
    for concept in &unit.concepts {
        parts.push(concept.to_lowercase());
    }
    for sub in &unit.sub_units {
        parts.push(sub.summary.to_lowercase());
        parts.push(sub.guidelines.to_lowercase());
        for item in &sub.items {
            parts.push(item.prompt.to_lowercase());
        }
    }
    parts.join("\n")
}

fn objective_keywords(objective: &str) -> Vec<String> {
    objective
        .split(|c: char| !c.is_alphanumeric())
        .map(|w| w.to_lowercase())
        .filter(|w| w.chars().count() >= 5 && !OBJECTIVE_STOPWORDS.contains(&w.as_str()))
        .collect()
}

/// Runs weighted checks and produces a quality report.
pub struct QualityEngine {
    checks: Vec<(Box<dyn QualityCheck>, f64)>,
}

impl QualityEngine {
    /// Create an engine with the standard checks and weights.
    pub fn new() -> Self {
        Self {
            checks: vec![
                (Box::new(StructureCheck), 0.3),
                (Box::new(CompletenessCheck), 0.3),
                (Box::new(SpiralCheck), 0.2),
                (Box::new(AlignmentCheck), 0.2),
            ],
        }
    }

    /// Create an engine with no checks.
    pub fn empty() -> Self {
        Self { checks: Vec::new() }
    }

    /// Add a check with a relative weight.
    pub fn with_check(mut self, check: impl QualityCheck + 'static, weight: f64) -> Self {
        self.checks.push((Box::new(check), weight));
        self
    }

    /// Validate a unit and build a report judged against `threshold`.
    pub fn assess(
        &self,
        unit: &CurriculumUnit,
        context: &CheckContext,
        threshold: f64,
    ) -> QualityReport {
        let mut report = QualityReport::new(unit.id.clone(), 0.0).with_snapshot(unit);
        let mut findings = Vec::new();
        let mut weighted = 0.0;
        let mut total_weight = 0.0;

        for (check, weight) in &self.checks {
            let result = check.evaluate(unit, context);
            report
                .sub_scores
                .insert(check.metric().to_string(), round2(result.score));
            weighted += result.score * weight;
            total_weight += weight;
            findings.extend(result.findings);
        }

        report.score = if total_weight > 0.0 {
            round2(weighted / total_weight)
        } else {
            MAX_SCORE
        };

        for finding in &findings {
            if finding.severity >= Severity::Warning {
                report.issues.push(finding.issue_line());
            }
            if let Some(rec) = &finding.recommendation {
                if !report.recommendations.contains(rec) {
                    report.recommendations.push(rec.clone());
                }
            }
        }

        report.with_verdict(threshold)
    }
}

impl Default for QualityEngine {
    fn default() -> Self {
        Self::new()
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
