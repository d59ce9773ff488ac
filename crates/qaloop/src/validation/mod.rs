//! Local quality engine for curriculum units.

mod checks;
mod finding;

pub use checks::{
    find_placeholder, AlignmentCheck, CheckContext, CheckResult, CompletenessCheck, QualityCheck,
    QualityEngine, SpiralCheck, StructureCheck, ASSESSMENT_ALIGNMENT, CONTENT_COMPLETENESS,
    SPIRAL_LEARNING_COVERAGE, STRUCTURAL_COHERENCE,
};
pub use finding::{Finding, Severity};
