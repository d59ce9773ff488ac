//! When feedback counts as degraded, and what to ask the refiner for.

use crate::config::LoopConfig;
use crate::model::{
    ActionType, FeedbackSummary, Grade, Level, Modification, Priority, QualityReport,
    RefinementInstruction, UnitId,
};
use crate::validation::{CONTENT_COMPLETENESS, SPIRAL_LEARNING_COVERAGE, STRUCTURAL_COHERENCE};

/// Number of misconceptions turned into prevention instructions.
const MISCONCEPTIONS_ADDRESSED: usize = 2;

/// Decides whether a module's learner outcomes call for refinement.
///
/// Feedback is degraded when there is at least one learner and any of:
/// completion rate below the floor, a misconception seen more often than
/// the threshold, or an average grade below the grade floor.
#[derive(Debug, Clone, PartialEq)]
pub struct DegradationPolicy {
    pub completion_floor: f64,
    pub misconception_threshold: usize,
    pub grade_floor: Grade,
}

impl DegradationPolicy {
    pub fn from_config(config: &LoopConfig) -> Self {
        Self {
            completion_floor: config.completion_floor,
            misconception_threshold: config.misconception_threshold,
            grade_floor: config.grade_floor,
        }
    }

    pub fn is_degraded(&self, feedback: &FeedbackSummary) -> bool {
        !self.reasons(feedback).is_empty()
    }

    /// Human-readable reasons the feedback is degraded. Empty when it is not.
    pub fn reasons(&self, feedback: &FeedbackSummary) -> Vec<String> {
        let mut reasons = Vec::new();
        if feedback.is_empty() {
            return reasons;
        }

        if feedback.completion_rate < self.completion_floor {
            reasons.push(format!(
                "completion rate {:.0}% is below the {:.0}% floor",
                feedback.completion_rate * 100.0,
                self.completion_floor * 100.0
            ));
        }
        for m in &feedback.misconceptions {
            if m.frequency > self.misconception_threshold {
                reasons.push(format!(
                    "misconception '{}' seen {} times (limit {})",
                    m.concept, m.frequency, self.misconception_threshold
                ));
            }
        }
        if let Some(grade) = feedback.average_grade {
            if grade < self.grade_floor {
                reasons.push(format!(
                    "average grade {} is below {}",
                    grade, self.grade_floor
                ));
            }
        }
        reasons
    }
}

/// Build the refinement instructions for a unit.
///
/// Feedback-driven changes come first, then one change per quality
/// sub-metric below the threshold. The result is ordered by priority
/// and contains no duplicate (action, concept) pairs.
pub fn derive_instructions(
    unit_id: &UnitId,
    feedback: &FeedbackSummary,
    report: Option<&QualityReport>,
    config: &LoopConfig,
) -> RefinementInstruction {
    let mut modifications = Vec::new();

    if !feedback.is_empty() {
        if feedback.completion_rate < config.completion_floor {
            modifications.push(Modification::new(
                ActionType::ReduceContentDensity,
                Priority::High,
                format!(
                    "Only {:.0}% completion rate",
                    feedback.completion_rate * 100.0
                ),
            ));
        }

        if let Some(grade) = feedback.average_grade {
            if grade < config.grade_floor {
                modifications.push(Modification::new(
                    ActionType::AddGuidedPractice,
                    Priority::High,
                    format!("Average grade is {}", grade),
                ));
            }
        }

        for m in feedback.misconceptions.iter().take(MISCONCEPTIONS_ADDRESSED) {
            modifications.push(
                Modification::new(
                    ActionType::AddMisconceptionPrevention,
                    Priority::High,
                    format!("Common error with {}", m.concept),
                )
                .targeting(&m.concept),
            );
        }

        let average = feedback.time_to_mastery.average_minutes;
        if average > config.max_mastery_minutes {
            modifications.push(Modification::new(
                ActionType::OptimizeLessonDuration,
                Priority::Medium,
                format!("Takes {:.0} min average to master", average),
            ));
        }

        for concept in &feedback.struggling_concepts {
            if concept.difficulty == Level::High {
                modifications.push(
                    Modification::new(
                        ActionType::AddGuidedPractice,
                        Priority::Medium,
                        format!("Learners struggle with {}", concept.concept),
                    )
                    .targeting(&concept.concept),
                );
            }
        }
    }

    if let Some(report) = report {
        for (metric, score) in report.weak_metrics(config.quality_threshold) {
            modifications.push(Modification::new(
                action_for_metric(metric),
                Priority::High,
                format!("{} scored {:.1}", metric, score),
            ));
        }
    }

    // sort_by_key is stable, so equal priorities keep insertion order.
    modifications.sort_by_key(|m| m.priority);
    let mut seen = Vec::new();
    modifications.retain(|m| {
        let key = (m.action, m.target_concept.clone());
        if seen.contains(&key) {
            false
        } else {
            seen.push(key);
            true
        }
    });

    RefinementInstruction {
        unit_id: unit_id.clone(),
        modifications,
    }
}

fn action_for_metric(metric: &str) -> ActionType {
    match metric {
        SPIRAL_LEARNING_COVERAGE => ActionType::AddSpiralReview,
        CONTENT_COMPLETENESS => ActionType::ReplacePlaceholders,
        STRUCTURAL_COHERENCE => ActionType::RestructureSubUnits,
        _ => ActionType::Revise,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Misconception, ModuleId, StrugglingConcept, TimeToMastery};

    fn feedback(learners: usize, completion: f64) -> FeedbackSummary {
        FeedbackSummary {
            learner_count: learners,
            completion_rate: completion,
            ..FeedbackSummary::empty(ModuleId::from("module-5"))
        }
    }

    #[test]
    fn test_no_learners_is_never_degraded() {
        let policy = DegradationPolicy::from_config(&LoopConfig::default());
        assert!(!policy.is_degraded(&feedback(0, 0.0)));
    }

    #[test]
    fn test_degradation_triggers() {
        let policy = DegradationPolicy::from_config(&LoopConfig::default());

        assert!(!policy.is_degraded(&feedback(10, 0.7)));
        assert!(policy.is_degraded(&feedback(10, 0.69)));

        let mut fb = feedback(10, 0.9);
        fb.misconceptions.push(Misconception {
            concept: "ablative".to_string(),
            frequency: 3,
            severity: Level::Medium,
        });
        assert!(!policy.is_degraded(&fb));
        fb.misconceptions[0].frequency = 4;
        assert!(policy.is_degraded(&fb));

        let mut fb = feedback(10, 0.9);
        fb.average_grade = Some(Grade::C);
        assert!(policy.is_degraded(&fb));
        fb.average_grade = Some(Grade::CPlus);
        assert!(!policy.is_degraded(&fb));
    }

    #[test]
    fn test_instructions_from_feedback() {
        let mut fb = feedback(12, 0.5);
        fb.average_grade = Some(Grade::C);
        fb.time_to_mastery = TimeToMastery {
            average_minutes: 75.0,
            median_minutes: 70.0,
        };
        for (concept, frequency) in [("ablative", 6), ("genitive", 4), ("dative", 2)] {
            fb.misconceptions.push(Misconception {
                concept: concept.to_string(),
                frequency,
                severity: Level::High,
            });
        }
        fb.struggling_concepts.push(StrugglingConcept {
            concept: "ablative".to_string(),
            difficulty: Level::High,
        });

        let instruction =
            derive_instructions(&UnitId::from(5u32), &fb, None, &LoopConfig::default());
        let actions: Vec<(ActionType, Option<&str>)> = instruction
            .modifications
            .iter()
            .map(|m| (m.action, m.target_concept.as_deref()))
            .collect();

        assert_eq!(
            actions,
            vec![
                (ActionType::ReduceContentDensity, None),
                (ActionType::AddGuidedPractice, None),
                (ActionType::AddMisconceptionPrevention, Some("ablative")),
                (ActionType::AddMisconceptionPrevention, Some("genitive")),
                (ActionType::OptimizeLessonDuration, None),
                (ActionType::AddGuidedPractice, Some("ablative")),
            ]
        );
    }

    #[test]
    fn test_instructions_from_weak_report() {
        let report = QualityReport::new("7", 6.0)
            .with_sub_score(STRUCTURAL_COHERENCE, 9.0)
            .with_sub_score(SPIRAL_LEARNING_COVERAGE, 2.0)
            .with_sub_score("concept_clarity", 5.0);
        let fb = FeedbackSummary::empty(ModuleId::from("module-7"));

        let instruction =
            derive_instructions(&UnitId::from(7u32), &fb, Some(&report), &LoopConfig::default());
        let actions: Vec<ActionType> = instruction.modifications.iter().map(|m| m.action).collect();
        assert_eq!(actions, vec![ActionType::AddSpiralReview, ActionType::Revise]);
        assert!(instruction.modifications.iter().all(|m| m.priority == Priority::High));
    }

    #[test]
    fn test_duplicate_actions_removed() {
        let report = QualityReport::new("7", 6.0)
            .with_sub_score("concept_clarity", 5.0)
            .with_sub_score("engagement", 4.0);
        let fb = FeedbackSummary::empty(ModuleId::from("module-7"));

        let instruction =
            derive_instructions(&UnitId::from(7u32), &fb, Some(&report), &LoopConfig::default());
        assert_eq!(instruction.modifications.len(), 1);
        assert_eq!(instruction.modifications[0].action, ActionType::Revise);
    }
}
