//! Aggregated learner performance for a deployed module.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::module::ModuleId;

/// Letter grade on an ordinal scale, lowest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum Grade {
    #[serde(rename = "F")]
    F,
    #[serde(rename = "D")]
    D,
    #[serde(rename = "D+")]
    DPlus,
    #[serde(rename = "C-")]
    CMinus,
    #[serde(rename = "C")]
    C,
    #[serde(rename = "C+")]
    CPlus,
    #[serde(rename = "B-")]
    BMinus,
    #[serde(rename = "B")]
    B,
    #[serde(rename = "B+")]
    BPlus,
    #[serde(rename = "A-")]
    AMinus,
    #[serde(rename = "A")]
    A,
    #[serde(rename = "A+")]
    APlus,
}

impl Grade {
    /// Grade points on a 4.3 scale.
    pub fn points(&self) -> f64 {
        match self {
            Grade::APlus => 4.3,
            Grade::A => 4.0,
            Grade::AMinus => 3.7,
            Grade::BPlus => 3.3,
            Grade::B => 3.0,
            Grade::BMinus => 2.7,
            Grade::CPlus => 2.3,
            Grade::C => 2.0,
            Grade::CMinus => 1.7,
            Grade::DPlus => 1.3,
            Grade::D => 1.0,
            Grade::F => 0.0,
        }
    }

    /// Map an average grade-point value back to a letter.
    ///
    /// Averages never round up to A+; anything at or above 4.0 is an A.
    pub fn from_points(points: f64) -> Self {
        let p = points + 1e-9;
        if p >= 4.0 {
            Grade::A
        } else if p >= 3.7 {
            Grade::AMinus
        } else if p >= 3.3 {
            Grade::BPlus
        } else if p >= 3.0 {
            Grade::B
        } else if p >= 2.7 {
            Grade::BMinus
        } else if p >= 2.3 {
            Grade::CPlus
        } else if p >= 2.0 {
            Grade::C
        } else if p >= 1.7 {
            Grade::CMinus
        } else if p >= 1.3 {
            Grade::DPlus
        } else if p >= 1.0 {
            Grade::D
        } else {
            Grade::F
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Grade::APlus => "A+",
            Grade::A => "A",
            Grade::AMinus => "A-",
            Grade::BPlus => "B+",
            Grade::B => "B",
            Grade::BMinus => "B-",
            Grade::CPlus => "C+",
            Grade::C => "C",
            Grade::CMinus => "C-",
            Grade::DPlus => "D+",
            Grade::D => "D",
            Grade::F => "F",
        }
    }
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for Grade {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "A+" => Ok(Grade::APlus),
            "A" => Ok(Grade::A),
            "A-" => Ok(Grade::AMinus),
            "B+" => Ok(Grade::BPlus),
            "B" => Ok(Grade::B),
            "B-" => Ok(Grade::BMinus),
            "C+" => Ok(Grade::CPlus),
            "C" => Ok(Grade::C),
            "C-" => Ok(Grade::CMinus),
            "D+" => Ok(Grade::DPlus),
            "D" => Ok(Grade::D),
            "F" => Ok(Grade::F),
            other => Err(format!("Unknown grade: {}", other)),
        }
    }
}

/// Three-tier level used for severity and difficulty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Low,
    Medium,
    High,
}

impl Level {
    pub fn label(&self) -> &'static str {
        match self {
            Level::Low => "low",
            Level::Medium => "medium",
            Level::High => "high",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Time learners needed to complete the module, in minutes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeToMastery {
    #[serde(rename = "average", alias = "average_minutes")]
    pub average_minutes: f64,
    #[serde(rename = "median", alias = "median_minutes")]
    pub median_minutes: f64,
}

/// A recurring learner error pattern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Misconception {
    pub concept: String,
    pub frequency: usize,
    pub severity: Level,
}

/// A concept learners find hard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrugglingConcept {
    pub concept: String,
    pub difficulty: Level,
}

/// Learner performance metrics for one module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackSummary {
    pub module_id: ModuleId,

    pub learner_count: usize,

    /// Fraction of learners who completed the module (0.0-1.0).
    pub completion_rate: f64,

    /// Average grade, absent when no grades were recorded.
    #[serde(default)]
    pub average_grade: Option<Grade>,

    #[serde(default)]
    pub time_to_mastery: TimeToMastery,

    /// Ranked by frequency, most frequent first.
    #[serde(default)]
    pub misconceptions: Vec<Misconception>,

    /// Ranked by difficulty, hardest first.
    #[serde(default)]
    pub struggling_concepts: Vec<StrugglingConcept>,
}

impl FeedbackSummary {
    /// Summary with no learner data.
    pub fn empty(module_id: ModuleId) -> Self {
        Self {
            module_id,
            learner_count: 0,
            completion_rate: 0.0,
            average_grade: None,
            time_to_mastery: TimeToMastery::default(),
            misconceptions: Vec::new(),
            struggling_concepts: Vec::new(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.learner_count == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grade_order() {
        assert!(Grade::APlus > Grade::A);
        assert!(Grade::CPlus > Grade::C);
        assert!(Grade::D > Grade::F);
    }

    #[test]
    fn test_grade_from_points() {
        assert_eq!(Grade::from_points(4.15), Grade::A);
        assert_eq!(Grade::from_points(3.5), Grade::BPlus);
        assert_eq!(Grade::from_points(2.7), Grade::BMinus);
        assert_eq!(Grade::from_points(2.0), Grade::C);
        assert_eq!(Grade::from_points(0.4), Grade::F);
    }

    #[test]
    fn test_grade_parse_and_wire_format() {
        assert_eq!("b+".parse::<Grade>().unwrap(), Grade::BPlus);
        assert!("E".parse::<Grade>().is_err());

        let json = serde_json::to_string(&Grade::CMinus).unwrap();
        assert_eq!(json, "\"C-\"");
    }

    #[test]
    fn test_summary_wire_shape() {
        let json = r#"{
            "module_id": "module-5",
            "learner_count": 12,
            "completion_rate": 0.75,
            "average_grade": "B",
            "time_to_mastery": {"average": 42.5, "median": 40.0},
            "misconceptions": [{"concept": "ablative", "frequency": 4, "severity": "high"}],
            "struggling_concepts": [{"concept": "ablative", "difficulty": "medium"}]
        }"#;
        let summary: FeedbackSummary = serde_json::from_str(json).unwrap();
        assert_eq!(summary.learner_count, 12);
        assert_eq!(summary.average_grade, Some(Grade::B));
        assert_eq!(summary.time_to_mastery.median_minutes, 40.0);
        assert_eq!(summary.misconceptions[0].severity, Level::High);
        assert!(!summary.is_empty());
    }

    #[test]
    fn test_empty_summary() {
        let summary = FeedbackSummary::empty(ModuleId::from("module-1"));
        assert!(summary.is_empty());
        assert_eq!(summary.average_grade, None);
    }
}
