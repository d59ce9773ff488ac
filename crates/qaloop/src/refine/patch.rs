//! Applies refinement instructions to curriculum units.

use crate::model::{
    ActionType, CurriculumUnit, LessonItem, Modification, RefinementInstruction, SubUnit, UnitId,
};
use crate::validation::find_placeholder;

/// Spiral coverage a refined unit is brought up to.
pub const TARGET_SPIRAL_COVERAGE: f64 = 0.25;

/// Sub-units with more items than this are split in two.
pub const MAX_ITEMS_PER_SUB_UNIT: usize = 6;

/// Number of recent prior units spiral review draws from.
const SPIRAL_WINDOW: usize = 3;

/// Upper bound on review items added in one pass.
const MAX_SPIRAL_ITEMS: usize = 64;

/// Produces the next version of a unit from a refinement instruction.
#[derive(Debug, Clone)]
pub struct UnitPatcher {
    expected_sub_units: usize,
}

impl Default for UnitPatcher {
    fn default() -> Self {
        Self {
            expected_sub_units: 4,
        }
    }
}

impl UnitPatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_expected_sub_units(mut self, count: usize) -> Self {
        self.expected_sub_units = count;
        self
    }

    /// Apply every modification and return the new version.
    ///
    /// `prior_units` are the units preceding this one, in curriculum order.
    pub fn apply(
        &self,
        unit: &CurriculumUnit,
        instruction: &RefinementInstruction,
        prior_units: &[UnitId],
    ) -> CurriculumUnit {
        let mut next = unit.clone();
        next.version = unit.version + 1;

        for modification in &instruction.modifications {
            match modification.action {
                ActionType::AddSpiralReview => add_spiral_review(&mut next, prior_units),
                ActionType::ReplacePlaceholders => replace_placeholders(&mut next),
                ActionType::RestructureSubUnits => self.restructure(&mut next),
                ActionType::AddMisconceptionPrevention => {
                    add_misconception_prevention(&mut next, modification)
                }
                ActionType::AddGuidedPractice => add_guided_practice(&mut next, modification),
                ActionType::ReduceContentDensity => split_dense_sub_units(&mut next),
                ActionType::OptimizeLessonDuration | ActionType::Revise => {}
            }
            next.revision_notes.push(revision_note(next.version, modification));
        }

        next
    }

    fn restructure(&self, unit: &mut CurriculumUnit) {
        let topic = topic_of(unit);
        while unit.sub_units.len() < self.expected_sub_units {
            let n = unit.sub_units.len() + 1;
            unit.sub_units.push(
                SubUnit::new(format!("Part {}", n))
                    .with_summary(format!("Practice {}", topic))
                    .with_guidelines("Ask guiding questions before giving answers")
                    .with_item(LessonItem::new(format!("Practice {}", topic))),
            );
        }

        for (idx, sub) in unit.sub_units.iter_mut().enumerate() {
            if sub.title.trim().is_empty() {
                sub.title = format!("Part {}", idx + 1);
            }
            if sub.summary.trim().is_empty() {
                sub.summary = format!("{}: {}", sub.title, topic);
            }
            if sub.items.is_empty() {
                sub.items.push(LessonItem::new(format!("Practice {}", topic)));
            }
        }
    }
}

fn topic_of(unit: &CurriculumUnit) -> String {
    if !unit.focus.trim().is_empty() {
        unit.focus.clone()
    } else if !unit.title.trim().is_empty() {
        unit.title.clone()
    } else {
        format!("unit {}", unit.id)
    }
}

fn add_spiral_review(unit: &mut CurriculumUnit, prior_units: &[UnitId]) {
    let recent: Vec<&UnitId> = prior_units.iter().rev().take(SPIRAL_WINDOW).collect();
    if recent.is_empty() {
        return;
    }
    if unit.sub_units.is_empty() {
        unit.sub_units.push(SubUnit::new("Spiral Review"));
    }

    let mut added = 0;
    while unit.spiral_coverage() < TARGET_SPIRAL_COVERAGE && added < MAX_SPIRAL_ITEMS {
        let prior = recent[added % recent.len()];
        let slot = added % unit.sub_units.len();
        unit.sub_units[slot].items.push(LessonItem::review(
            format!("Spiral review: revisit unit {}", prior),
            prior.clone(),
        ));
        unit.spiral_refs.insert(prior.clone());
        added += 1;
    }

    // Reviews already present may have left the declared refs empty.
    if unit.spiral_refs.is_empty() {
        for prior in recent {
            unit.spiral_refs.insert(prior.clone());
        }
    }
}

fn replace_placeholders(unit: &mut CurriculumUnit) {
    let topic = topic_of(unit);

    if find_placeholder(&unit.title).is_some() {
        unit.title = format!("Unit {}", unit.id);
    }
    if find_placeholder(&unit.focus).is_some() {
        unit.focus.clear();
    }
    for objective in &mut unit.objectives {
        if find_placeholder(objective).is_some() {
            *objective = format!("Apply {}", topic);
        }
    }
    for (idx, sub) in unit.sub_units.iter_mut().enumerate() {
        if find_placeholder(&sub.title).is_some() {
            sub.title = format!("Part {}", idx + 1);
        }
        if find_placeholder(&sub.summary).is_some() {
            sub.summary = format!("{}: {}", sub.title, topic);
        }
        if find_placeholder(&sub.guidelines).is_some() {
            sub.guidelines = "Ask guiding questions before giving answers".to_string();
        }
        for item in &mut sub.items {
            if find_placeholder(&item.prompt).is_some() {
                item.prompt = format!("Practice {}", topic);
            }
        }
    }
}

fn add_misconception_prevention(unit: &mut CurriculumUnit, modification: &Modification) {
    let Some(concept) = modification.target_concept.as_deref() else {
        return;
    };
    if unit.sub_units.is_empty() {
        unit.sub_units.push(SubUnit::new("Part 1"));
    }
    unit.sub_units[0].items.insert(
        0,
        LessonItem::new(format!("Common mistake check: {}", concept)),
    );
    if !unit.concepts.iter().any(|c| c.eq_ignore_ascii_case(concept)) {
        unit.concepts.push(concept.to_string());
    }
}

fn add_guided_practice(unit: &mut CurriculumUnit, modification: &Modification) {
    let concept = modification
        .target_concept
        .clone()
        .unwrap_or_else(|| topic_of(unit));
    if unit.sub_units.is_empty() {
        unit.sub_units.push(SubUnit::new("Part 1"));
    }

    let needle = concept.to_lowercase();
    let slot = unit
        .sub_units
        .iter()
        .position(|s| {
            s.summary.to_lowercase().contains(&needle)
                || s.items.iter().any(|i| i.prompt.to_lowercase().contains(&needle))
        })
        .unwrap_or(0);
    unit.sub_units[slot]
        .items
        .push(LessonItem::new(format!("Guided practice: {}, step by step", concept)));
}

fn split_dense_sub_units(unit: &mut CurriculumUnit) {
    let mut split = Vec::with_capacity(unit.sub_units.len());
    for mut sub in unit.sub_units.drain(..) {
        if sub.items.len() > MAX_ITEMS_PER_SUB_UNIT {
            let rest = sub.items.split_off(sub.items.len().div_ceil(2));
            let second = SubUnit {
                title: format!("{} (continued)", sub.title),
                summary: sub.summary.clone(),
                guidelines: sub.guidelines.clone(),
                items: rest,
            };
            split.push(sub);
            split.push(second);
        } else {
            split.push(sub);
        }
    }
    unit.sub_units = split;
}

fn revision_note(version: u32, modification: &Modification) -> String {
    match &modification.target_concept {
        Some(concept) => format!(
            "v{}: {} ({}): {}",
            version, modification.action, concept, modification.reason
        ),
        None => format!("v{}: {}: {}", version, modification.action, modification.reason),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Priority;

    fn unit_without_review() -> CurriculumUnit {
        let mut unit = CurriculumUnit::new(3u32, "Week 3").with_focus("second declension");
        for day in 1..=4 {
            unit = unit.with_sub_unit(
                SubUnit::new(format!("Day {}", day))
                    .with_summary("Practice")
                    .with_item(LessonItem::new("Decline servus"))
                    .with_item(LessonItem::new("Translate"))
                    .with_item(LessonItem::new("Chant")),
            );
        }
        unit
    }

    fn instruction(mods: Vec<Modification>) -> RefinementInstruction {
        RefinementInstruction {
            unit_id: UnitId::from(3u32),
            modifications: mods,
        }
    }

    #[test]
    fn test_spiral_review_reaches_target() {
        let unit = unit_without_review();
        let priors = vec![UnitId::from(1u32), UnitId::from(2u32)];
        let next = UnitPatcher::new().apply(
            &unit,
            &instruction(vec![Modification::new(
                ActionType::AddSpiralReview,
                Priority::High,
                "spiral_learning_coverage scored 0.0",
            )]),
            &priors,
        );

        assert!(next.spiral_coverage() >= TARGET_SPIRAL_COVERAGE);
        assert_eq!(next.review_item_count(), 4);
        assert!(next.spiral_refs.contains(&UnitId::from(2u32)));
        assert_eq!(next.version, 2);
        assert_eq!(next.revision_notes.len(), 1);
        assert!(next.revision_notes[0].starts_with("v2: add_spiral_review"));
    }

    #[test]
    fn test_spiral_review_without_prior_units_is_noop() {
        let unit = unit_without_review();
        let next = UnitPatcher::new().apply(
            &unit,
            &instruction(vec![Modification::new(ActionType::AddSpiralReview, Priority::High, "")]),
            &[],
        );
        assert_eq!(next.item_count(), unit.item_count());
    }

    #[test]
    fn test_placeholders_replaced() {
        let mut unit = unit_without_review();
        unit.sub_units[1].summary = "[brief description of day 2]".to_string();
        unit.sub_units[2].items[0].prompt = "{{activity}}".to_string();

        let next = UnitPatcher::new().apply(
            &unit,
            &instruction(vec![Modification::new(
                ActionType::ReplacePlaceholders,
                Priority::High,
                "content_completeness scored 6.0",
            )]),
            &[],
        );

        assert!(next.text_fields().iter().all(|(_, t)| find_placeholder(t).is_none()));
        assert_eq!(next.sub_units[1].summary, "Day 2: second declension");
    }

    #[test]
    fn test_restructure_fills_missing_sub_units() {
        let mut unit = unit_without_review();
        unit.sub_units.truncate(1);
        unit.sub_units[0].summary.clear();

        let next = UnitPatcher::new().apply(
            &unit,
            &instruction(vec![Modification::new(
                ActionType::RestructureSubUnits,
                Priority::High,
                "",
            )]),
            &[],
        );
        assert_eq!(next.sub_units.len(), 4);
        assert_eq!(next.sub_units[3].title, "Part 4");
        assert!(!next.sub_units[0].summary.is_empty());
    }

    #[test]
    fn test_dense_sub_units_are_split() {
        let mut unit = unit_without_review();
        for i in 0..5 {
            unit.sub_units[0].items.push(LessonItem::new(format!("Extra {}", i)));
        }
        let next = UnitPatcher::new().apply(
            &unit,
            &instruction(vec![Modification::new(
                ActionType::ReduceContentDensity,
                Priority::High,
                "Only 40% completion rate",
            )]),
            &[],
        );

        assert_eq!(next.sub_units.len(), 5);
        assert_eq!(next.sub_units[0].items.len(), 4);
        assert_eq!(next.sub_units[1].title, "Day 1 (continued)");
        assert_eq!(next.item_count(), unit.item_count());
    }

    #[test]
    fn test_misconception_item_goes_first() {
        let unit = unit_without_review();
        let next = UnitPatcher::new().apply(
            &unit,
            &instruction(vec![Modification::new(
                ActionType::AddMisconceptionPrevention,
                Priority::High,
                "Common error with ablative",
            )
            .targeting("ablative")]),
            &[],
        );
        assert_eq!(next.sub_units[0].items[0].prompt, "Common mistake check: ablative");
        assert!(next.concepts.contains(&"ablative".to_string()));
        assert_eq!(
            next.revision_notes[0],
            "v2: add_misconception_prevention (ablative): Common error with ablative"
        );
    }
}
