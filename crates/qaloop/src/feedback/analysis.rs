//! Aggregation of interaction records into feedback summaries.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::model::{
    FeedbackSummary, Grade, Level, Misconception, ModuleId, StrugglingConcept, TimeToMastery,
};

use super::records::{InteractionLog, LearnerProgress, Role};

/// Phrases a tutor uses when correcting a learner.
const CORRECTION_PHRASES: &[&str] = &[
    "actually",
    "not quite",
    "let's reconsider",
    "common mistake",
    "remember that",
];

/// Concept assigned when a message mentions no known concept.
pub const GENERAL_UNDERSTANDING: &str = "general_understanding";

const TOP_N: usize = 5;

/// Builds feedback summaries from raw interaction logs.
#[derive(Debug, Clone, Default)]
pub struct FeedbackAnalyzer {
    vocabulary: Vec<String>,
}

impl FeedbackAnalyzer {
    /// Create an analyzer that recognises the given concepts in messages.
    pub fn new(vocabulary: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            vocabulary: vocabulary
                .into_iter()
                .map(|c| c.into().to_lowercase())
                .filter(|c| !c.is_empty())
                .collect(),
        }
    }

    /// Summarize a module's interaction log.
    pub fn summarize(&self, module_id: ModuleId, log: &InteractionLog) -> FeedbackSummary {
        let learners: BTreeSet<&str> = log.progress.iter().map(|p| p.learner_id.as_str()).collect();
        if learners.is_empty() {
            return FeedbackSummary::empty(module_id);
        }

        FeedbackSummary {
            module_id,
            learner_count: learners.len(),
            completion_rate: completion_rate(&log.progress),
            average_grade: average_grade(&log.progress),
            time_to_mastery: time_to_mastery(&log.progress),
            misconceptions: self.misconceptions(log),
            struggling_concepts: self.struggling_concepts(log),
        }
    }

    /// First vocabulary concept mentioned in a message.
    pub fn extract_concept(&self, message: &str) -> String {
        let lower = message.to_lowercase();
        self.vocabulary
            .iter()
            .find(|c| lower.contains(c.as_str()))
            .cloned()
            .unwrap_or_else(|| GENERAL_UNDERSTANDING.to_string())
    }

    fn misconceptions(&self, log: &InteractionLog) -> Vec<Misconception> {
        let mut counts: IndexMap<String, usize> = IndexMap::new();

        for conversation in &log.conversations {
            for pair in conversation.messages.windows(2) {
                let (learner, tutor) = (&pair[0], &pair[1]);
                if learner.role != Role::User || tutor.role != Role::Assistant {
                    continue;
                }
                let correction = tutor.content.to_lowercase();
                if CORRECTION_PHRASES.iter().any(|p| correction.contains(p)) {
                    *counts.entry(self.extract_concept(&learner.content)).or_insert(0) += 1;
                }
            }
        }

        rank(counts)
            .into_iter()
            .map(|(concept, frequency)| Misconception {
                concept,
                frequency,
                severity: if frequency > 3 { Level::High } else { Level::Medium },
            })
            .collect()
    }

    fn struggling_concepts(&self, log: &InteractionLog) -> Vec<StrugglingConcept> {
        let mut counts: IndexMap<String, usize> = IndexMap::new();

        for message in log.conversations.iter().flat_map(|c| c.messages.iter()) {
            let concept = self.extract_concept(&message.content);
            if concept != GENERAL_UNDERSTANDING {
                *counts.entry(concept).or_insert(0) += 1;
            }
        }

        for summary in log.memory_summaries.iter().filter(|s| s.is_struggling()) {
            for concept in &summary.key_concepts {
                let concept = concept.trim().to_lowercase();
                if !concept.is_empty() {
                    *counts.entry(concept).or_insert(0) += 1;
                }
            }
        }

        rank(counts)
            .into_iter()
            .map(|(concept, turns)| StrugglingConcept {
                concept,
                difficulty: difficulty_for(turns),
            })
            .collect()
    }
}

/// Top entries by count, ties kept in first-seen order.
fn rank(counts: IndexMap<String, usize>) -> Vec<(String, usize)> {
    let mut ranked: Vec<(String, usize)> = counts.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1));
    ranked.truncate(TOP_N);
    ranked
}

fn difficulty_for(turns: usize) -> Level {
    if turns > 10 {
        Level::High
    } else if turns > 5 {
        Level::Medium
    } else {
        Level::Low
    }
}

fn completion_rate(progress: &[LearnerProgress]) -> f64 {
    if progress.is_empty() {
        return 0.0;
    }
    let completed = progress.iter().filter(|p| p.completed).count();
    round_to(completed as f64 / progress.len() as f64, 3)
}

fn average_grade(progress: &[LearnerProgress]) -> Option<Grade> {
    let points: Vec<f64> = progress
        .iter()
        .filter_map(|p| p.grade.map(|g| g.points()))
        .collect();
    if points.is_empty() {
        return None;
    }
    Some(Grade::from_points(points.iter().sum::<f64>() / points.len() as f64))
}

fn time_to_mastery(progress: &[LearnerProgress]) -> TimeToMastery {
    let mut times: Vec<f64> = progress
        .iter()
        .filter(|p| p.completed)
        .map(|p| p.minutes_spent)
        .collect();
    if times.is_empty() {
        return TimeToMastery::default();
    }
    times.sort_by(|a, b| a.total_cmp(b));

    let average = times.iter().sum::<f64>() / times.len() as f64;
    TimeToMastery {
        average_minutes: round_to(average, 1),
        median_minutes: round_to(times[times.len() / 2], 1),
    }
}

fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}
