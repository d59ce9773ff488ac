//! Refinement: producing the next version of a unit.

mod patch;

pub use patch::{UnitPatcher, MAX_ITEMS_PER_SUB_UNIT, TARGET_SPIRAL_COVERAGE};
