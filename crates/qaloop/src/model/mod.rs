//! Data model shared by the orchestrator and its collaborators.

mod feedback;
mod module;
mod quality;
mod refinement;
mod unit;

pub use feedback::{FeedbackSummary, Grade, Level, Misconception, StrugglingConcept, TimeToMastery};
pub use module::{ImportReceipt, Module, ModuleId, PublicationStatus};
pub use quality::{MAX_SCORE, QualityReport};
pub use refinement::{
    ActionType, Modification, Priority, RefineReceipt, RefineStatus, RefinementInstruction,
};
pub use unit::{CurriculumUnit, LessonItem, SubUnit, UnitId};
