//! Collaborators backed by a local workspace.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CallResult, CollaboratorError, QaError, Step};
use crate::feedback::FeedbackAnalyzer;
use crate::import::ModuleBuilder;
use crate::model::{
    FeedbackSummary, ImportReceipt, ModuleId, QualityReport, RefineReceipt, RefineStatus,
    RefinementInstruction, UnitId,
};
use crate::refine::UnitPatcher;
use crate::store::Workspace;
use crate::validation::{CheckContext, QualityEngine};

use super::provider::{FeedbackCollector, Importer, Refiner, Validator};

/// Validates, imports, analyzes and refines units held in a [`Workspace`].
pub struct LocalCollaborators {
    workspace: Arc<RwLock<Workspace>>,
    engine: QualityEngine,
    builder: ModuleBuilder,
    patcher: UnitPatcher,
    threshold: f64,
}

impl LocalCollaborators {
    pub fn new(workspace: Arc<RwLock<Workspace>>, threshold: f64) -> Self {
        Self {
            workspace,
            engine: QualityEngine::new(),
            builder: ModuleBuilder::new(),
            patcher: UnitPatcher::new(),
            threshold,
        }
    }

    pub fn with_engine(mut self, engine: QualityEngine) -> Self {
        self.engine = engine;
        self
    }

    pub fn with_builder(mut self, builder: ModuleBuilder) -> Self {
        self.builder = builder;
        self
    }

    pub fn workspace(&self) -> Arc<RwLock<Workspace>> {
        self.workspace.clone()
    }
}

fn rejected(step: Step, error: QaError) -> CollaboratorError {
    CollaboratorError::rejected(step, error.to_string())
}

#[async_trait]
impl Validator for LocalCollaborators {
    fn name(&self) -> &str {
        "local"
    }

    async fn validate(&self, unit_id: &UnitId) -> CallResult<QualityReport> {
        let mut ws = self.workspace.write().await;
        let unit = ws.require_unit(unit_id).map_err(|e| rejected(Step::Validate, e))?;

        let context = CheckContext::default().with_prior_units(ws.prior_units(unit_id));
        let report = self.engine.assess(unit, &context, self.threshold);
        debug!(unit = %unit_id, score = report.score, "Assessed unit");

        ws.record_report(report.clone());
        Ok(report)
    }
}

#[async_trait]
impl Importer for LocalCollaborators {
    fn name(&self) -> &str {
        "local"
    }

    async fn import(&self, unit_id: &UnitId) -> CallResult<ImportReceipt> {
        let mut ws = self.workspace.write().await;
        let unit = ws.require_unit(unit_id).map_err(|e| rejected(Step::Import, e))?;

        let digest = unit.digest();
        let report = ws
            .reports(unit_id)
            .iter()
            .rev()
            .find(|r| r.unit_digest.as_deref() == Some(digest.as_str()))
            .ok_or_else(|| {
                CollaboratorError::rejected(
                    Step::Import,
                    format!(
                        "unit {} version {} has not been validated",
                        unit_id, unit.version
                    ),
                )
            })?;

        let module = self
            .builder
            .build(unit, report)
            .map_err(|e| rejected(Step::Import, e))?;
        ws.publish(module, self.threshold)
            .map_err(|e| rejected(Step::Import, e))
    }
}

#[async_trait]
impl FeedbackCollector for LocalCollaborators {
    fn name(&self) -> &str {
        "local"
    }

    async fn collect(&self, module_id: &ModuleId) -> CallResult<FeedbackSummary> {
        let ws = self.workspace.read().await;
        let module = ws.module(module_id).ok_or_else(|| {
            CollaboratorError::rejected(
                Step::CollectFeedback,
                format!("module {} not found", module_id),
            )
        })?;

        let mut vocabulary: Vec<String> = Vec::new();
        if let Some(unit) = ws.unit(&module.unit_id) {
            vocabulary.extend(unit.concepts.iter().cloned());
            if !unit.focus.is_empty() {
                vocabulary.push(unit.focus.clone());
            }
        }

        let log = ws.interaction_log(&module.unit_id);
        Ok(FeedbackAnalyzer::new(vocabulary).summarize(module_id.clone(), &log))
    }
}

#[async_trait]
impl Refiner for LocalCollaborators {
    fn name(&self) -> &str {
        "local"
    }

    async fn refine(&self, instruction: &RefinementInstruction) -> CallResult<RefineReceipt> {
        let mut ws = self.workspace.write().await;
        let unit_id = &instruction.unit_id;
        let unit = ws.require_unit(unit_id).map_err(|e| rejected(Step::Refine, e))?;

        let prior = ws.prior_units(unit_id);
        let next = self.patcher.apply(unit, instruction, &prior);
        debug!(
            unit = %unit_id,
            version = next.version,
            modifications = instruction.modifications.len(),
            "Patched unit"
        );
        ws.upsert_unit(next).map_err(|e| rejected(Step::Refine, e))?;

        Ok(RefineReceipt {
            unit_id: unit_id.clone(),
            status: RefineStatus::Completed,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CurriculumUnit, LessonItem, PublicationStatus, SubUnit};

    fn workspace_with(unit: CurriculumUnit) -> Arc<RwLock<Workspace>> {
        let mut ws = Workspace::new();
        ws.upsert_unit(unit).unwrap();
        Arc::new(RwLock::new(ws))
    }

    fn first_unit() -> CurriculumUnit {
        let mut unit = CurriculumUnit::new(1u32, "Week 1: Sum")
            .with_focus("the verb sum")
            .with_objectives(vec!["Conjugate the verb sum".to_string()]);
        for day in 1..=4 {
            unit = unit.with_sub_unit(
                SubUnit::new(format!("Day {}", day))
                    .with_summary("Chant sum, es, est")
                    .with_guidelines("Ask before telling")
                    .with_item(LessonItem::new("Conjugate sum")),
            );
        }
        unit
    }

    #[tokio::test]
    async fn test_validate_records_report() {
        let local = LocalCollaborators::new(workspace_with(first_unit()), 7.5);
        let report = local.validate(&UnitId::from(1u32)).await.unwrap();

        assert_eq!(report.score, 10.0);
        let ws = local.workspace();
        let ws = ws.read().await;
        assert_eq!(ws.reports(&UnitId::from(1u32)).len(), 1);
    }

    #[tokio::test]
    async fn test_import_requires_validation_of_current_version() {
        let local = LocalCollaborators::new(workspace_with(first_unit()), 7.5);
        let err = local.import(&UnitId::from(1u32)).await.unwrap_err();
        assert!(err.to_string().contains("has not been validated"));

        local.validate(&UnitId::from(1u32)).await.unwrap();
        let receipt = local.import(&UnitId::from(1u32)).await.unwrap();
        assert_eq!(receipt.status, PublicationStatus::Published);
        assert_eq!(receipt.module_id.as_str(), "module-1");
    }

    #[tokio::test]
    async fn test_unknown_unit_is_rejected() {
        let local = LocalCollaborators::new(Arc::new(RwLock::new(Workspace::new())), 7.5);
        let err = local.validate(&UnitId::from(9u32)).await.unwrap_err();
        assert_eq!(err.kind(), "CollaboratorRejected");
        assert_eq!(err.step(), Step::Validate);
    }

    #[tokio::test]
    async fn test_collect_without_learners() {
        let local = LocalCollaborators::new(workspace_with(first_unit()), 7.5);
        local.validate(&UnitId::from(1u32)).await.unwrap();
        let receipt = local.import(&UnitId::from(1u32)).await.unwrap();

        let summary = local.collect(&receipt.module_id).await.unwrap();
        assert!(summary.is_empty());
    }
}
