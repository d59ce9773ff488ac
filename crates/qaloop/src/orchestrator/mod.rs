//! Orchestration of the quality loop.
//!
//! [`QualityLoop`] composes the four collaborators into a sequential
//! per-unit cycle and a concurrent batch validation sweep. It holds no
//! state of its own beyond its configuration; everything a run produces is
//! returned in a [`CycleResult`] or [`BatchResult`].

mod batch;
mod cycle;
mod guard;
mod outcome;

pub use batch::{BatchEntry, BatchResult, BatchStatus, BatchSummary};
pub use outcome::{CycleOutcome, CycleResult};

use crate::collaborator::Collaborators;
use crate::config::LoopConfig;

/// Runs cycles and batches against a set of collaborators.
#[derive(Debug, Clone)]
pub struct QualityLoop {
    collaborators: Collaborators,
    config: LoopConfig,
}

impl QualityLoop {
    pub fn new(collaborators: Collaborators, config: LoopConfig) -> Self {
        Self {
            collaborators,
            config,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }
}
