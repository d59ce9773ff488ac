//! Collaborator traits.

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::CallResult;
use crate::model::{
    FeedbackSummary, ImportReceipt, ModuleId, QualityReport, RefineReceipt,
    RefinementInstruction, UnitId,
};

/// Scores a curriculum unit.
#[async_trait]
pub trait Validator: Send + Sync {
    /// Get the collaborator name.
    fn name(&self) -> &str;

    /// Validate the current version of a unit and return a new report.
    async fn validate(&self, unit_id: &UnitId) -> CallResult<QualityReport>;
}

/// Turns a validated unit into a published module.
#[async_trait]
pub trait Importer: Send + Sync {
    /// Get the collaborator name.
    fn name(&self) -> &str;

    /// Import one unit.
    async fn import(&self, unit_id: &UnitId) -> CallResult<ImportReceipt>;

    /// Import several units. Results are returned in input order.
    async fn import_batch(&self, unit_ids: &[UnitId]) -> Vec<(UnitId, CallResult<ImportReceipt>)> {
        let mut results = Vec::with_capacity(unit_ids.len());
        for unit_id in unit_ids {
            results.push((unit_id.clone(), self.import(unit_id).await));
        }
        results
    }
}

/// Aggregates learner interactions for a module.
#[async_trait]
pub trait FeedbackCollector: Send + Sync {
    /// Get the collaborator name.
    fn name(&self) -> &str;

    /// Summarize learner outcomes. Zero learners is a valid result.
    async fn collect(&self, module_id: &ModuleId) -> CallResult<FeedbackSummary>;
}

/// Regenerates or patches a unit.
#[async_trait]
pub trait Refiner: Send + Sync {
    /// Get the collaborator name.
    fn name(&self) -> &str;

    async fn refine(&self, instruction: &RefinementInstruction) -> CallResult<RefineReceipt>;
}

/// The four collaborators the loop drives.
#[derive(Clone)]
pub struct Collaborators {
    pub validator: Arc<dyn Validator>,
    pub importer: Arc<dyn Importer>,
    pub feedback: Arc<dyn FeedbackCollector>,
    pub refiner: Arc<dyn Refiner>,
}

impl Collaborators {
    pub fn new(
        validator: Arc<dyn Validator>,
        importer: Arc<dyn Importer>,
        feedback: Arc<dyn FeedbackCollector>,
        refiner: Arc<dyn Refiner>,
    ) -> Self {
        Self {
            validator,
            importer,
            feedback,
            refiner,
        }
    }

    /// Use one value for all four roles.
    pub fn shared<T>(inner: Arc<T>) -> Self
    where
        T: Validator + Importer + FeedbackCollector + Refiner + 'static,
    {
        Self {
            validator: inner.clone(),
            importer: inner.clone(),
            feedback: inner.clone(),
            refiner: inner,
        }
    }
}

impl std::fmt::Debug for Collaborators {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Collaborators")
            .field("validator", &self.validator.name())
            .field("importer", &self.importer.name())
            .field("feedback", &self.feedback.name())
            .field("refiner", &self.refiner.name())
            .finish()
    }
}
