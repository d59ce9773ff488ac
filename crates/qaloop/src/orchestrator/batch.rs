//! Batch validation across many units.

use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::error::{CallResult, CollaboratorError, Step};
use crate::model::{ImportReceipt, QualityReport, UnitId};

use super::QualityLoop;
use super::guard::guarded;

/// What happened to one unit in a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum BatchStatus {
    /// The validator answered. `passed` is judged against the loop threshold.
    Validated { report: QualityReport, passed: bool },

    /// The validator call failed.
    Errored { error: CollaboratorError },

    /// Cancelled before the call was issued.
    Skipped,
}

impl BatchStatus {
    pub fn label(&self) -> &'static str {
        match self {
            BatchStatus::Validated { passed: true, .. } => "passed",
            BatchStatus::Validated { passed: false, .. } => "failed",
            BatchStatus::Errored { .. } => "errored",
            BatchStatus::Skipped => "skipped",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEntry {
    pub unit_id: UnitId,
    pub status: BatchStatus,
}

impl BatchEntry {
    pub fn score(&self) -> Option<f64> {
        match &self.status {
            BatchStatus::Validated { report, .. } => Some(report.score),
            _ => None,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self.status, BatchStatus::Validated { passed: true, .. })
    }

    pub fn error(&self) -> Option<&CollaboratorError> {
        match &self.status {
            BatchStatus::Errored { error } => Some(error),
            _ => None,
        }
    }
}

/// Aggregate counts for a batch.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchSummary {
    pub total: usize,
    pub validated: usize,
    pub passed: usize,
    pub failed: usize,
    pub errored: usize,
    pub skipped: usize,
    /// Mean score of validated units only. `None` when nothing validated.
    pub mean_score: Option<f64>,
}

impl BatchSummary {
    pub fn from_entries(entries: &[BatchEntry]) -> Self {
        let mut summary = BatchSummary {
            total: entries.len(),
            ..Default::default()
        };
        let mut score_sum = 0.0;

        for entry in entries {
            match &entry.status {
                BatchStatus::Validated { report, passed } => {
                    summary.validated += 1;
                    score_sum += report.score;
                    if *passed {
                        summary.passed += 1;
                    } else {
                        summary.failed += 1;
                    }
                }
                BatchStatus::Errored { .. } => summary.errored += 1,
                BatchStatus::Skipped => summary.skipped += 1,
            }
        }

        if summary.validated > 0 {
            let mean = score_sum / summary.validated as f64;
            summary.mean_score = Some((mean * 100.0).round() / 100.0);
        }
        summary
    }
}

/// Result of a batch validation, entries in input order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub entries: Vec<BatchEntry>,
    pub summary: BatchSummary,
    pub threshold: f64,
    pub started_at: DateTime<Utc>,
    pub completed_at: DateTime<Utc>,
}

impl BatchResult {
    /// Units that validated at or above the threshold.
    pub fn passed_units(&self) -> Vec<UnitId> {
        self.entries
            .iter()
            .filter(|e| e.passed())
            .map(|e| e.unit_id.clone())
            .collect()
    }
}

impl QualityLoop {
    /// Validate many units with a fresh cancellation token.
    pub async fn run_batch(&self, unit_ids: &[UnitId]) -> BatchResult {
        self.run_batch_with(unit_ids, &CancellationToken::new()).await
    }

    /// Validate many units independently.
    ///
    /// At most `max_concurrent` validator calls are in flight. One unit's
    /// failure never stops the others, and entries come back in input order
    /// whatever order the calls complete in.
    pub async fn run_batch_with(
        &self,
        unit_ids: &[UnitId],
        cancel: &CancellationToken,
    ) -> BatchResult {
        let threshold = self.config.quality_threshold;
        let concurrency = self.config.max_concurrent.max(1);
        let started_at = Utc::now();
        info!(units = unit_ids.len(), concurrency, threshold, "Starting batch");

        let mut indexed: Vec<(usize, BatchEntry)> = stream::iter(unit_ids.iter().cloned().enumerate())
            .map(|(index, unit_id)| async move {
                let status = match self.validate(&unit_id, cancel).await {
                    Ok(report) => {
                        let passed = report.meets(threshold);
                        BatchStatus::Validated { report, passed }
                    }
                    Err(CollaboratorError::Cancelled { .. }) => BatchStatus::Skipped,
                    Err(error) => BatchStatus::Errored { error },
                };
                (index, BatchEntry { unit_id, status })
            })
            .buffer_unordered(concurrency)
            .collect()
            .await;

        indexed.sort_by_key(|(index, _)| *index);
        let entries: Vec<BatchEntry> = indexed.into_iter().map(|(_, entry)| entry).collect();
        let summary = BatchSummary::from_entries(&entries);

        info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            errored = summary.errored,
            skipped = summary.skipped,
            "Batch finished"
        );

        BatchResult {
            entries,
            summary,
            threshold,
            started_at,
            completed_at: Utc::now(),
        }
    }

    /// Import every unit that passed a batch in one batch import call.
    ///
    /// If the batch call itself fails or is cancelled, every unit carries
    /// that error.
    pub async fn import_passed(
        &self,
        batch: &BatchResult,
        cancel: &CancellationToken,
    ) -> Vec<(UnitId, CallResult<ImportReceipt>)> {
        let unit_ids = batch.passed_units();
        if unit_ids.is_empty() {
            return Vec::new();
        }
        info!(units = unit_ids.len(), "Importing passed units");

        let target = format!("{} units", unit_ids.len());
        let importer = &self.collaborators.importer;
        let outcome = guarded(
            Step::Import,
            &target,
            self.config.call_timeout,
            cancel,
            async { Ok(importer.import_batch(&unit_ids).await) },
        )
        .await;

        match outcome {
            Ok(results) => results,
            Err(error) => unit_ids
                .into_iter()
                .map(|unit_id| (unit_id, Err(error.clone())))
                .collect(),
        }
    }
}
