//! The single-unit validate, import, feedback and refine cycle.

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{CallResult, CollaboratorError, Step};
use crate::feedback::{DegradationPolicy, derive_instructions};
use crate::model::{FeedbackSummary, ModuleId, QualityReport, UnitId};

use super::guard::guarded;
use super::outcome::{CycleOutcome, CycleResult};
use super::QualityLoop;

/// Why a refinement was requested.
enum RefineTrigger {
    LowQuality,
    DegradedFeedback(FeedbackSummary),
}

impl QualityLoop {
    /// Run one cycle for a unit with a fresh cancellation token.
    pub async fn run_cycle(&self, unit_id: &UnitId, auto_refine: bool) -> CycleResult {
        self.run_cycle_with(unit_id, auto_refine, &CancellationToken::new())
            .await
    }

    /// Run one cycle for a unit.
    ///
    /// Steps run strictly in order. A unit is refined at most once, so the
    /// validator is called at most twice and the refiner at most once.
    /// Feedback is only collected before a refinement.
    pub async fn run_cycle_with(
        &self,
        unit_id: &UnitId,
        auto_refine: bool,
        cancel: &CancellationToken,
    ) -> CycleResult {
        let config = &self.config;
        let threshold = config.quality_threshold;
        info!(unit = %unit_id, auto_refine, threshold, "Starting cycle");

        let mut result = CycleResult::start(unit_id.clone(), threshold, auto_refine);
        let outcome = self.drive(unit_id, auto_refine, cancel, &mut result).await;
        let result = result.finish(outcome);

        info!(
            unit = %unit_id,
            outcome = result.outcome.label(),
            validations = result.validations(),
            "Cycle finished"
        );
        result
    }

    async fn drive(
        &self,
        unit_id: &UnitId,
        auto_refine: bool,
        cancel: &CancellationToken,
        result: &mut CycleResult,
    ) -> CycleOutcome {
        let config = &self.config;
        let policy = DegradationPolicy::from_config(config);
        let target = unit_id.as_str();
        let mut refined = false;

        loop {
            let report = match self.validate(unit_id, cancel).await {
                Ok(report) => report,
                Err(error) => return CycleOutcome::from_failure(error),
            };
            let score = report.score;
            let passed = report.meets(config.quality_threshold);
            result.reports.push(report);

            let trigger = if !passed {
                info!(unit = %unit_id, score, threshold = config.quality_threshold, "Below quality threshold");
                if !auto_refine {
                    return CycleOutcome::RejectedLowQuality {
                        score,
                        issues: result.issues().to_vec(),
                    };
                }
                if refined {
                    return CycleOutcome::RefinementExhausted {
                        reason: format!(
                            "score {:.2} still below {:.2} after refinement",
                            score, config.quality_threshold
                        ),
                    };
                }
                RefineTrigger::LowQuality
            } else {
                if !config.auto_import {
                    return CycleOutcome::AwaitingImport;
                }

                let receipt = match guarded(
                    Step::Import,
                    target,
                    config.call_timeout,
                    cancel,
                    self.collaborators.importer.import(unit_id),
                )
                .await
                {
                    Ok(receipt) => receipt,
                    Err(error) => return CycleOutcome::from_failure(error),
                };
                debug!(unit = %unit_id, module = %receipt.module_id, "Imported");
                let module_id = receipt.module_id.clone();
                result.imports.push(receipt);

                // The refined revision has no learner activity of its own yet.
                if refined {
                    return CycleOutcome::RefinedAndImported;
                }

                let feedback = match guarded(
                    Step::CollectFeedback,
                    module_id.as_str(),
                    config.call_timeout,
                    cancel,
                    self.collaborators.feedback.collect(&module_id),
                )
                .await
                {
                    Ok(feedback) => feedback,
                    Err(error) => return CycleOutcome::from_failure(error),
                };
                result.feedback = Some(feedback.clone());

                if feedback.is_empty() {
                    return CycleOutcome::ImportedNoFeedback;
                }

                let reasons = policy.reasons(&feedback);
                if reasons.is_empty() {
                    return CycleOutcome::Imported { degraded: false };
                }
                info!(unit = %unit_id, reasons = reasons.len(), "Learner feedback degraded");
                result.degradation = reasons;

                if !auto_refine {
                    return CycleOutcome::Imported { degraded: true };
                }
                RefineTrigger::DegradedFeedback(feedback)
            };

            let feedback = match trigger {
                RefineTrigger::LowQuality => FeedbackSummary::empty(ModuleId::for_unit(unit_id)),
                RefineTrigger::DegradedFeedback(feedback) => feedback,
            };
            let instructions =
                derive_instructions(unit_id, &feedback, result.latest_report(), config);
            debug!(
                unit = %unit_id,
                modifications = instructions.modifications.len(),
                "Derived refinement instructions"
            );
            result.instructions = Some(instructions.clone());

            let receipt = match guarded(
                Step::Refine,
                target,
                config.call_timeout,
                cancel,
                self.collaborators.refiner.refine(&instructions),
            )
            .await
            {
                Ok(receipt) => receipt,
                Err(error) => return CycleOutcome::from_failure(error),
            };
            result.refinement = Some(receipt);
            refined = true;

            if !config.auto_validate {
                return CycleOutcome::AwaitingValidation;
            }
        }
    }

    /// Validate through the guard and reject scores off the 0-10 scale.
    pub(crate) async fn validate(
        &self,
        unit_id: &UnitId,
        cancel: &CancellationToken,
    ) -> CallResult<QualityReport> {
        let report = guarded(
            Step::Validate,
            unit_id.as_str(),
            self.config.call_timeout,
            cancel,
            self.collaborators.validator.validate(unit_id),
        )
        .await?;

        if let Err(message) = report.check_scale() {
            let error = CollaboratorError::rejected(Step::Validate, message);
            warn!(unit = %unit_id, kind = error.kind(), "{}", error);
            return Err(error);
        }
        Ok(report)
    }
}
