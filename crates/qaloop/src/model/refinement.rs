//! Refinement instructions sent to the refiner.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::unit::UnitId;

/// Kind of change requested from the refiner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    /// Break dense content into smaller parts.
    ReduceContentDensity,
    /// Add scaffolded practice steps.
    AddGuidedPractice,
    /// Teach a commonly misunderstood concept explicitly and early.
    AddMisconceptionPrevention,
    /// Trim scope so the module can be mastered faster.
    OptimizeLessonDuration,
    /// Add items that revisit prior units.
    AddSpiralReview,
    /// Remove template placeholder text.
    ReplacePlaceholders,
    /// Fill in missing sub-unit structure.
    RestructureSubUnits,
    /// General revision of a weak metric.
    Revise,
}

impl ActionType {
    pub fn label(&self) -> &'static str {
        match self {
            ActionType::ReduceContentDensity => "reduce_content_density",
            ActionType::AddGuidedPractice => "add_guided_practice",
            ActionType::AddMisconceptionPrevention => "add_misconception_prevention",
            ActionType::OptimizeLessonDuration => "optimize_lesson_duration",
            ActionType::AddSpiralReview => "add_spiral_review",
            ActionType::ReplacePlaceholders => "replace_placeholders",
            ActionType::RestructureSubUnits => "restructure_sub_units",
            ActionType::Revise => "revise",
        }
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Priority of a modification. Sorts highest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Priority {
    High,
    Medium,
    Low,
}

impl Priority {
    pub fn label(&self) -> &'static str {
        match self {
            Priority::High => "high",
            Priority::Medium => "medium",
            Priority::Low => "low",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One requested change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Modification {
    #[serde(rename = "type")]
    pub action: ActionType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_concept: Option<String>,

    pub priority: Priority,

    /// Why the change is requested.
    #[serde(default)]
    pub reason: String,
}

impl Modification {
    pub fn new(action: ActionType, priority: Priority, reason: impl Into<String>) -> Self {
        Self {
            action,
            target_concept: None,
            priority,
            reason: reason.into(),
        }
    }

    pub fn targeting(mut self, concept: impl Into<String>) -> Self {
        self.target_concept = Some(concept.into());
        self
    }
}

/// The set of changes requested for one unit in one cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementInstruction {
    pub unit_id: UnitId,
    pub modifications: Vec<Modification>,
}

impl RefinementInstruction {
    pub fn new(unit_id: UnitId) -> Self {
        Self {
            unit_id,
            modifications: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.modifications.is_empty()
    }
}

/// Refiner's acknowledgement status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RefineStatus {
    Completed,
    Queued,
    #[serde(other)]
    Unknown,
}

impl RefineStatus {
    pub fn label(&self) -> &'static str {
        match self {
            RefineStatus::Completed => "completed",
            RefineStatus::Queued => "queued",
            RefineStatus::Unknown => "unknown",
        }
    }
}

/// Result of a refine call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefineReceipt {
    pub unit_id: UnitId,
    pub status: RefineStatus,
}
