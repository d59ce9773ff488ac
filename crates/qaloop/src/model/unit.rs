//! Curriculum units: the generated blocks of content the loop works on.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifier of a curriculum unit (for example a week number).
///
/// Numeric identifiers order numerically, so unit "10" sorts after unit "9".
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UnitId(String);

impl UnitId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Numeric value of the identifier, if it is a plain number.
    pub fn ordinal(&self) -> Option<u64> {
        self.0.trim().parse().ok()
    }

    fn sort_key(&self) -> (u8, u64, &str) {
        match self.ordinal() {
            Some(n) => (0, n, &self.0),
            None => (1, 0, &self.0),
        }
    }
}

impl Ord for UnitId {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

impl PartialOrd for UnitId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for UnitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for UnitId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UnitId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<u32> for UnitId {
    fn from(n: u32) -> Self {
        Self(n.to_string())
    }
}

/// A single lesson item (question, activity, drill line).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LessonItem {
    /// Text shown to the learner.
    pub prompt: String,

    /// Prior unit this item revisits, if it is spiral review content.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<UnitId>,
}

impl LessonItem {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reviews: None,
        }
    }

    /// Create an item that reviews material from a prior unit.
    pub fn review(prompt: impl Into<String>, unit: UnitId) -> Self {
        Self {
            prompt: prompt.into(),
            reviews: Some(unit),
        }
    }

    pub fn is_review(&self) -> bool {
        self.reviews.is_some()
    }
}

/// An ordered part of a unit (for example one teaching day).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubUnit {
    pub title: String,

    #[serde(default)]
    pub summary: String,

    /// Guidance for the tutor delivering this part.
    #[serde(default)]
    pub guidelines: String,

    #[serde(default)]
    pub items: Vec<LessonItem>,
}

impl SubUnit {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            summary: String::new(),
            guidelines: String::new(),
            items: Vec::new(),
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_guidelines(mut self, guidelines: impl Into<String>) -> Self {
        self.guidelines = guidelines.into();
        self
    }

    pub fn with_item(mut self, item: LessonItem) -> Self {
        self.items.push(item);
        self
    }
}

fn default_version() -> u32 {
    1
}

/// A generated block of curriculum content.
///
/// Units are never deleted. Refinement produces a new version and the
/// previous one is kept as history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurriculumUnit {
    pub id: UnitId,

    pub title: String,

    /// Grammar or topic focus tag.
    #[serde(default)]
    pub focus: String,

    /// Concept vocabulary taught in this unit.
    #[serde(default)]
    pub concepts: Vec<String>,

    #[serde(default)]
    pub objectives: Vec<String>,

    #[serde(default)]
    pub sub_units: Vec<SubUnit>,

    /// Prior units this unit reviews.
    #[serde(default)]
    pub spiral_refs: BTreeSet<UnitId>,

    #[serde(default = "default_version")]
    pub version: u32,

    #[serde(default)]
    pub revision_notes: Vec<String>,
}

impl CurriculumUnit {
    pub fn new(id: impl Into<UnitId>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            focus: String::new(),
            concepts: Vec::new(),
            objectives: Vec::new(),
            sub_units: Vec::new(),
            spiral_refs: BTreeSet::new(),
            version: 1,
            revision_notes: Vec::new(),
        }
    }

    pub fn with_focus(mut self, focus: impl Into<String>) -> Self {
        self.focus = focus.into();
        self
    }

    pub fn with_concepts(mut self, concepts: Vec<String>) -> Self {
        self.concepts = concepts;
        self
    }

    pub fn with_objectives(mut self, objectives: Vec<String>) -> Self {
        self.objectives = objectives;
        self
    }

    pub fn with_sub_unit(mut self, sub_unit: SubUnit) -> Self {
        self.sub_units.push(sub_unit);
        self
    }

    pub fn with_spiral_ref(mut self, unit: impl Into<UnitId>) -> Self {
        self.spiral_refs.insert(unit.into());
        self
    }

    /// Total number of lesson items across all sub-units.
    pub fn item_count(&self) -> usize {
        self.sub_units.iter().map(|s| s.items.len()).sum()
    }

    /// Number of lesson items that revisit a prior unit.
    pub fn review_item_count(&self) -> usize {
        self.sub_units
            .iter()
            .flat_map(|s| s.items.iter())
            .filter(|i| i.is_review())
            .count()
    }

    /// Fraction of lesson items that revisit prior material (0.0-1.0).
    pub fn spiral_coverage(&self) -> f64 {
        let total = self.item_count();
        if total == 0 {
            return 0.0;
        }
        self.review_item_count() as f64 / total as f64
    }

    /// All free-text fields with their location, in document order.
    pub fn text_fields(&self) -> Vec<(String, &str)> {
        let mut fields = vec![
            ("title".to_string(), self.title.as_str()),
            ("focus".to_string(), self.focus.as_str()),
        ];
        for (i, objective) in self.objectives.iter().enumerate() {
            fields.push((format!("objectives[{}]", i), objective.as_str()));
        }
        for (s_idx, sub) in self.sub_units.iter().enumerate() {
            let loc = format!("sub_units[{}]", s_idx);
            fields.push((format!("{}.title", loc), sub.title.as_str()));
            fields.push((format!("{}.summary", loc), sub.summary.as_str()));
            fields.push((format!("{}.guidelines", loc), sub.guidelines.as_str()));
            for (i_idx, item) in sub.items.iter().enumerate() {
                fields.push((format!("{}.items[{}]", loc, i_idx), item.prompt.as_str()));
            }
        }
        fields
    }

    /// SHA-256 digest of this snapshot, used to tie quality reports to a version.
    pub fn digest(&self) -> String {
        let bytes = serde_json::to_vec(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(&bytes);
        format!("sha256:{:x}", hasher.finalize())
    }
}
