//! Markdown rendering of cycle and batch results.
//!
//! Rendering reads nothing but its input: no clock, no environment, no
//! storage. Scores use fixed precision and sub-scores keep the order the
//! validator reported them in, so equal inputs render byte-identical text.

use crate::error::CollaboratorError;
use crate::model::{FeedbackSummary, QualityReport, RefinementInstruction};
use crate::orchestrator::{BatchResult, BatchStatus, CycleOutcome, CycleResult};

/// Something [`format_report`] can render.
#[derive(Debug, Clone, Copy)]
pub enum ReportSubject<'a> {
    Cycle(&'a CycleResult),
    Batch(&'a BatchResult),
}

impl<'a> From<&'a CycleResult> for ReportSubject<'a> {
    fn from(result: &'a CycleResult) -> Self {
        ReportSubject::Cycle(result)
    }
}

impl<'a> From<&'a BatchResult> for ReportSubject<'a> {
    fn from(result: &'a BatchResult) -> Self {
        ReportSubject::Batch(result)
    }
}

/// Render a cycle or batch result as Markdown.
pub fn format_report<'a>(subject: impl Into<ReportSubject<'a>>) -> String {
    let lines = match subject.into() {
        ReportSubject::Cycle(result) => cycle_lines(result),
        ReportSubject::Batch(result) => batch_lines(result),
    };
    let mut text = lines.join("\n");
    text.push('\n');
    text
}

fn cycle_lines(result: &CycleResult) -> Vec<String> {
    let mut lines = vec![
        format!("# Quality Cycle: Unit {}", result.unit_id),
        String::new(),
        format!("- **Outcome:** {}", result.outcome.label()),
        format!("- **Threshold:** {:.2}", result.threshold),
        format!("- **Auto-refine:** {}", yes_no(result.auto_refine)),
        format!("- **Validations:** {}", result.validations()),
    ];
    lines.extend(outcome_detail(&result.outcome));

    if !result.reports.is_empty() {
        lines.push(String::new());
        lines.push("## Quality Reports".to_string());
        for (index, report) in result.reports.iter().enumerate() {
            lines.push(String::new());
            lines.extend(report_lines(index + 1, report, result.threshold));
        }
    }

    if !result.imports.is_empty() {
        lines.push(String::new());
        lines.push("## Import".to_string());
        for receipt in &result.imports {
            lines.push(String::new());
            lines.push(format!("- **Module:** {}", receipt.module_id));
            lines.push(format!("- **Status:** {}", receipt.status));
        }
    }

    if let Some(feedback) = &result.feedback {
        lines.push(String::new());
        lines.push("## Learner Feedback".to_string());
        lines.push(String::new());
        lines.extend(feedback_lines(feedback));
        if !result.degradation.is_empty() {
            lines.push(String::new());
            lines.push("**Degraded:**".to_string());
            lines.extend(result.degradation.iter().map(|r| format!("- {}", r)));
        }
    }

    if let Some(instructions) = &result.instructions {
        lines.push(String::new());
        lines.push("## Refinement".to_string());
        lines.push(String::new());
        lines.extend(instruction_lines(instructions));
        if let Some(receipt) = &result.refinement {
            lines.push(String::new());
            lines.push(format!("- **Refiner status:** {}", receipt.status.label()));
        }
    }

    lines
}

fn outcome_detail(outcome: &CycleOutcome) -> Vec<String> {
    match outcome {
        CycleOutcome::RejectedLowQuality { score, .. } => {
            vec![format!("- **Score:** {:.2}", score)]
        }
        CycleOutcome::RefinementExhausted { reason } => {
            vec![format!("- **Reason:** {}", reason)]
        }
        CycleOutcome::Imported { degraded } => {
            vec![format!("- **Degraded:** {}", yes_no(*degraded))]
        }
        CycleOutcome::Cancelled { step } => vec![format!("- **Cancelled at:** {}", step)],
        _ => outcome.error().map(error_lines).unwrap_or_default(),
    }
}

fn error_lines(error: &CollaboratorError) -> Vec<String> {
    vec![
        format!("- **Failed step:** {}", error.step()),
        format!("- **Error:** {} ({})", error, error.kind()),
    ]
}

fn report_lines(number: usize, report: &QualityReport, threshold: f64) -> Vec<String> {
    let verdict = if report.meets(threshold) {
        "meets threshold"
    } else {
        "below threshold"
    };
    let mut lines = vec![format!(
        "### Validation {}: {:.2} ({})",
        number, report.score, verdict
    )];

    if !report.sub_scores.is_empty() {
        lines.push(String::new());
        lines.push("| Metric | Score |".to_string());
        lines.push("|--------|-------|".to_string());
        for (name, score) in &report.sub_scores {
            lines.push(format!("| {} | {:.2} |", cell(name), score));
        }
    }

    if !report.issues.is_empty() {
        lines.push(String::new());
        lines.push("**Issues:**".to_string());
        lines.extend(report.issues.iter().map(|i| format!("- {}", i)));
    }

    if !report.recommendations.is_empty() {
        lines.push(String::new());
        lines.push("**Recommendations:**".to_string());
        lines.extend(report.recommendations.iter().map(|r| format!("- {}", r)));
    }

    lines
}

fn feedback_lines(feedback: &FeedbackSummary) -> Vec<String> {
    if feedback.is_empty() {
        return vec!["No learner activity yet.".to_string()];
    }

    let grade = feedback
        .average_grade
        .map(|g| g.to_string())
        .unwrap_or_else(|| "n/a".to_string());
    let mut lines = vec![
        format!("- **Learners:** {}", feedback.learner_count),
        format!(
            "- **Completion rate:** {:.1}%",
            feedback.completion_rate * 100.0
        ),
        format!("- **Average grade:** {}", grade),
        format!(
            "- **Time to mastery:** {:.1} min average, {:.1} min median",
            feedback.time_to_mastery.average_minutes, feedback.time_to_mastery.median_minutes
        ),
    ];

    if !feedback.misconceptions.is_empty() {
        lines.push(String::new());
        lines.push("**Misconceptions:**".to_string());
        for m in &feedback.misconceptions {
            lines.push(format!(
                "- {} (seen {} times, {} severity)",
                m.concept, m.frequency, m.severity
            ));
        }
    }

    if !feedback.struggling_concepts.is_empty() {
        lines.push(String::new());
        lines.push("**Struggling concepts:**".to_string());
        for c in &feedback.struggling_concepts {
            lines.push(format!("- {} ({} difficulty)", c.concept, c.difficulty));
        }
    }

    lines
}

fn instruction_lines(instructions: &RefinementInstruction) -> Vec<String> {
    if instructions.is_empty() {
        return vec!["No modifications derived.".to_string()];
    }

    let mut lines = vec![
        "| Priority | Action | Concept | Reason |".to_string(),
        "|----------|--------|---------|--------|".to_string(),
    ];
    for m in &instructions.modifications {
        lines.push(format!(
            "| {} | {} | {} | {} |",
            m.priority,
            m.action,
            m.target_concept.as_deref().map(cell).unwrap_or_else(|| "-".to_string()),
            cell(&m.reason)
        ));
    }
    lines
}

fn batch_lines(result: &BatchResult) -> Vec<String> {
    let summary = &result.summary;
    let mean = summary
        .mean_score
        .map(|m| format!("{:.2}", m))
        .unwrap_or_else(|| "n/a".to_string());

    let mut lines = vec![
        "# Batch Validation".to_string(),
        String::new(),
        format!("- **Units:** {}", summary.total),
        format!("- **Threshold:** {:.2}", result.threshold),
        format!("- **Passed:** {}", summary.passed),
        format!("- **Failed:** {}", summary.failed),
        format!("- **Errored:** {}", summary.errored),
        format!("- **Skipped:** {}", summary.skipped),
        format!("- **Mean score:** {}", mean),
    ];

    if result.entries.is_empty() {
        return lines;
    }

    lines.push(String::new());
    lines.push("| Unit | Status | Score | Detail |".to_string());
    lines.push("|------|--------|-------|--------|".to_string());
    for entry in &result.entries {
        let (score, detail) = match &entry.status {
            BatchStatus::Validated { report, .. } => {
                (format!("{:.2}", report.score), report.issues.join("; "))
            }
            BatchStatus::Errored { error } => ("-".to_string(), error.to_string()),
            BatchStatus::Skipped => ("-".to_string(), "cancelled".to_string()),
        };
        lines.push(format!(
            "| {} | {} | {} | {} |",
            cell(entry.unit_id.as_str()),
            entry.status.label(),
            score,
            cell(&detail)
        ));
    }

    lines
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Escape text for a Markdown table cell.
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}
