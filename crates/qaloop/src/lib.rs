//! qaloop: a curriculum quality loop.
//!
//! qaloop validates curriculum units, imports the ones that meet a quality
//! threshold as learner-facing modules, reads learner outcomes back, and
//! refines units whose quality or outcomes fall short.
//!
//! # Core Principles
//!
//! - **Bounded**: a cycle refines a unit at most once, so it always terminates
//! - **Typed outcomes**: every cycle ends in one [`CycleOutcome`], never a bare error
//! - **Isolated failures**: one unit failing never aborts a batch
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use qaloop::{format_report, Collaborators, LoopConfig, QualityLoop, ScriptedCollaborators, UnitId};
//!
//! # async fn run() {
//! let mock = ScriptedCollaborators::new().with_scores("5", &[8.2]);
//! let quality_loop = QualityLoop::new(Collaborators::shared(Arc::new(mock)), LoopConfig::default());
//!
//! let result = quality_loop.run_cycle(&UnitId::from("5"), true).await;
//! println!("{}", format_report(&result));
//! # }
//! ```

pub mod collaborator;
pub mod config;
pub mod error;
pub mod feedback;
pub mod import;
pub mod model;
pub mod orchestrator;
pub mod refine;
pub mod report;
pub mod store;
pub mod validation;

pub use collaborator::{
    Collaborators, FeedbackCollector, HttpCollaborators, HttpConfig, Importer, LocalCollaborators,
    Refiner, ScriptedCollaborators, Validator,
};
pub use config::LoopConfig;
pub use error::{CallResult, CollaboratorError, QaError, Result, Step};
pub use model::{
    CurriculumUnit, FeedbackSummary, ImportReceipt, Module, ModuleId, QualityReport,
    RefinementInstruction, UnitId,
};
pub use orchestrator::{
    BatchEntry, BatchResult, BatchStatus, BatchSummary, CycleOutcome, CycleResult, QualityLoop,
};
pub use report::{format_report, ReportSubject};
pub use store::Workspace;
