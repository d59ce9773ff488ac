//! Conversion of curriculum units into deployable modules.

use std::fmt::Write;

use crate::error::{QaError, Result};
use crate::model::{CurriculumUnit, Module, ModuleId, PublicationStatus, QualityReport};

/// Longest sub-unit summary copied into the exercises text.
pub const MAX_SUMMARY_CHARS: usize = 500;

/// Builds a [`Module`] from a unit and the report that authorized it.
#[derive(Debug, Clone)]
pub struct ModuleBuilder {
    tutor_name: String,
}

impl Default for ModuleBuilder {
    fn default() -> Self {
        Self {
            tutor_name: "the tutor".to_string(),
        }
    }
}

impl ModuleBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tutor_name(mut self, name: impl Into<String>) -> Self {
        self.tutor_name = name.into();
        self
    }

    /// Build a draft module. Publication is decided by the store.
    pub fn build(
        &self,
        unit: &CurriculumUnit,
        report: &QualityReport,
    ) -> Result<Module> {
        if report.unit_id != unit.id {
            return Err(QaError::InvalidUnit(format!(
                "report {} belongs to unit {}, not {}",
                report.id, report.unit_id, unit.id
            )));
        }

        Ok(Module {
            id: ModuleId::for_unit(&unit.id),
            unit_id: unit.id.clone(),
            unit_version: unit.version,
            title: module_title(unit),
            instructions: self.instructions(unit),
            knowledge_base: knowledge_base(unit),
            exercises: exercises(unit),
            status: PublicationStatus::Draft,
            authorizing_report: report.id.clone(),
            authorizing_score: report.score,
            revision: 0,
            published_at: None,
        })
    }

    fn instructions(&self, unit: &CurriculumUnit) -> String {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "You are {}, guiding learners with questions rather than answers.",
            self.tutor_name
        );
        if !unit.focus.is_empty() {
            let _ = writeln!(out, "\n**Focus:** {}", unit.focus);
        }

        if !unit.objectives.is_empty() {
            let _ = writeln!(out, "\n**Mastery Goals:**");
            for objective in &unit.objectives {
                let _ = writeln!(out, "- {}", objective);
            }
        }

        if !unit.sub_units.is_empty() {
            let _ = writeln!(out, "\n**Learning Sequence:**");
            for (idx, sub) in unit.sub_units.iter().enumerate() {
                let _ = writeln!(out, "{}. {}", idx + 1, sub.title);
                if !sub.guidelines.is_empty() {
                    let _ = writeln!(out, "   {}", sub.guidelines);
                }
            }
        }
        out
    }
}

fn module_title(unit: &CurriculumUnit) -> String {
    if unit.title.trim().is_empty() {
        format!("Unit {}", unit.id)
    } else {
        unit.title.clone()
    }
}

fn knowledge_base(unit: &CurriculumUnit) -> String {
    let mut parts = Vec::new();
    if !unit.focus.is_empty() {
        parts.push(format!("**Focus:**\n{}", unit.focus));
    }
    if !unit.concepts.is_empty() {
        parts.push(format!("**Core Concepts:**\n{}", unit.concepts.join(", ")));
    }
    if !unit.objectives.is_empty() {
        parts.push(format!("**Objectives:**\n{}", unit.objectives.join("\n")));
    }
    parts.join("\n\n")
}

fn exercises(unit: &CurriculumUnit) -> String {
    let mut out = String::new();
    for (idx, sub) in unit.sub_units.iter().enumerate() {
        let _ = writeln!(out, "### {}: {}", idx + 1, sub.title);
        if !sub.summary.is_empty() {
            let _ = writeln!(out, "{}", truncate(&sub.summary, MAX_SUMMARY_CHARS));
        }
        for item in &sub.items {
            match &item.reviews {
                Some(prior) => {
                    let _ = writeln!(out, "- {} (review of unit {})", item.prompt, prior);
                }
                None => {
                    let _ = writeln!(out, "- {}", item.prompt);
                }
            }
        }
        out.push('\n');
    }
    out
}

/// Cut text to at most `max` characters, marking the cut with `...`.
fn truncate(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    let cut: String = text.chars().take(max).collect();
    format!("{}...", cut)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{LessonItem, SubUnit, UnitId};

    fn unit() -> CurriculumUnit {
        CurriculumUnit::new(5u32, "Week 5: First Declension")
            .with_focus("first declension nouns")
            .with_concepts(vec!["declension".to_string(), "nominative".to_string()])
            .with_objectives(vec!["Decline puella".to_string()])
            .with_sub_unit(
                SubUnit::new("Discovery")
                    .with_summary("Meet the first declension")
                    .with_guidelines("Start from English plurals")
                    .with_item(LessonItem::new("Decline puella"))
                    .with_item(LessonItem::review("Recall sum", UnitId::from(4u32))),
            )
    }

    #[test]
    fn test_build_module() {
        let unit = unit();
        let report = QualityReport::new(unit.id.clone(), 8.2).with_verdict(7.5);
        let module = ModuleBuilder::new().build(&unit, &report).unwrap();

        assert_eq!(module.id.as_str(), "module-5");
        assert_eq!(module.status, PublicationStatus::Draft);
        assert_eq!(module.authorizing_report, report.id);
        assert_eq!(module.authorizing_score, 8.2);
        assert!(module.published_at.is_none());
        assert!(module.instructions.contains("1. Discovery"));
        assert!(module.knowledge_base.contains("declension, nominative"));
        assert!(module.exercises.contains("- Recall sum (review of unit 4)"));
    }

    #[test]
    fn test_build_rejects_foreign_report() {
        let report = QualityReport::new("6", 9.0);
        let err = ModuleBuilder::new().build(&unit(), &report).unwrap_err();
        assert!(matches!(err, QaError::InvalidUnit(_)));
    }

    #[test]
    fn test_long_summaries_are_truncated() {
        let mut unit = unit();
        unit.sub_units[0].summary = "x".repeat(600);
        let report = QualityReport::new(unit.id.clone(), 8.0);
        let module = ModuleBuilder::new().build(&unit, &report).unwrap();

        let expected = format!("{}...", "x".repeat(MAX_SUMMARY_CHARS));
        assert!(module.exercises.contains(&expected));
        assert!(!module.exercises.contains(&"x".repeat(501)));
    }
}
