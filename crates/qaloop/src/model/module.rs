//! Deployable modules: the learner-facing form of a unit.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::unit::UnitId;

/// Identifier of a deployed module.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModuleId(String);

impl ModuleId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Module identifier derived from the source unit.
    pub fn for_unit(unit_id: &UnitId) -> Self {
        Self(format!("module-{}", unit_id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModuleId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ModuleId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ModuleId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Module of a numbered unit.
impl From<u32> for ModuleId {
    fn from(n: u32) -> Self {
        Self::for_unit(&UnitId::from(n))
    }
}

/// Publication status of a module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PublicationStatus {
    Draft,
    Published,
}

impl PublicationStatus {
    pub fn label(&self) -> &'static str {
        match self {
            PublicationStatus::Draft => "draft",
            PublicationStatus::Published => "published",
        }
    }
}

impl fmt::Display for PublicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// The deployed counterpart of a curriculum unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Module {
    pub id: ModuleId,

    /// Source unit.
    pub unit_id: UnitId,

    /// Version of the source unit this module was built from.
    pub unit_version: u32,

    pub title: String,

    /// Instructional prompt for the tutor.
    pub instructions: String,

    /// Knowledge-base text.
    pub knowledge_base: String,

    /// Exercises and examples text.
    pub exercises: String,

    pub status: PublicationStatus,

    /// Quality report that authorized the import.
    pub authorizing_report: String,

    pub authorizing_score: f64,

    /// Incremented on every republication.
    #[serde(default)]
    pub revision: u32,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_at: Option<DateTime<Utc>>,
}

/// Result of an import call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImportReceipt {
    pub module_id: ModuleId,
    pub status: PublicationStatus,
}
