//! Scripted collaborators for tests and dry runs.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{CallResult, CollaboratorError, Step};
use crate::model::{
    FeedbackSummary, ImportReceipt, ModuleId, PublicationStatus, QualityReport, RefineReceipt,
    RefineStatus, RefinementInstruction, UnitId,
};

use super::provider::{FeedbackCollector, Importer, Refiner, Validator};

/// One recorded collaborator call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub step: Step,
    /// Unit or module the call was about.
    pub target: String,
}

/// Collaborators that answer from a script and record every call.
///
/// Each validation of a unit takes the next score from its sequence; the
/// last score repeats once the sequence runs out.
pub struct ScriptedCollaborators {
    threshold: f64,
    default_score: Option<f64>,
    scores: Mutex<HashMap<UnitId, VecDeque<f64>>>,
    issues: HashMap<UnitId, Vec<String>>,
    sub_scores: HashMap<UnitId, Vec<(String, f64)>>,
    validate_failures: HashMap<UnitId, CollaboratorError>,
    validate_delays: HashMap<UnitId, Duration>,
    import_failures: HashMap<UnitId, CollaboratorError>,
    feedback: Mutex<HashMap<ModuleId, VecDeque<FeedbackSummary>>>,
    feedback_failures: HashSet<ModuleId>,
    refine_failure: Option<CollaboratorError>,
    calls: Mutex<Vec<Call>>,
    refine_requests: Mutex<Vec<RefinementInstruction>>,
}

impl Default for ScriptedCollaborators {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedCollaborators {
    pub fn new() -> Self {
        Self {
            threshold: 7.5,
            default_score: None,
            scores: Mutex::new(HashMap::new()),
            issues: HashMap::new(),
            sub_scores: HashMap::new(),
            validate_failures: HashMap::new(),
            validate_delays: HashMap::new(),
            import_failures: HashMap::new(),
            feedback: Mutex::new(HashMap::new()),
            feedback_failures: HashSet::new(),
            refine_failure: None,
            calls: Mutex::new(Vec::new()),
            refine_requests: Mutex::new(Vec::new()),
        }
    }

    /// Threshold used for the validator's own `passed` flag.
    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    /// Score returned for units without a script.
    pub fn with_default_score(mut self, score: f64) -> Self {
        self.default_score = Some(score);
        self
    }

    /// Scores returned by successive validations of a unit.
    pub fn with_scores(self, unit: impl Into<UnitId>, scores: &[f64]) -> Self {
        locked(&self.scores).insert(unit.into(), scores.iter().copied().collect());
        self
    }

    pub fn with_issues(mut self, unit: impl Into<UnitId>, issues: &[&str]) -> Self {
        self.issues
            .insert(unit.into(), issues.iter().map(|s| s.to_string()).collect());
        self
    }

    pub fn with_sub_scores(mut self, unit: impl Into<UnitId>, sub_scores: &[(&str, f64)]) -> Self {
        self.sub_scores.insert(
            unit.into(),
            sub_scores.iter().map(|(n, s)| (n.to_string(), *s)).collect(),
        );
        self
    }

    pub fn with_validate_failure(mut self, unit: impl Into<UnitId>, error: CollaboratorError) -> Self {
        self.validate_failures.insert(unit.into(), error);
        self
    }

    /// Delay before a unit's validation answers.
    pub fn with_validate_delay(mut self, unit: impl Into<UnitId>, delay: Duration) -> Self {
        self.validate_delays.insert(unit.into(), delay);
        self
    }

    pub fn with_import_failure(mut self, unit: impl Into<UnitId>, error: CollaboratorError) -> Self {
        self.import_failures.insert(unit.into(), error);
        self
    }

    /// Feedback returned by successive collections for a module.
    ///
    /// Modules without a script have no learners.
    pub fn with_feedback(self, summaries: Vec<FeedbackSummary>) -> Self {
        {
            let mut map = locked(&self.feedback);
            for summary in summaries {
                map.entry(summary.module_id.clone())
                    .or_default()
                    .push_back(summary);
            }
        }
        self
    }

    pub fn with_feedback_failure(mut self, module: impl Into<ModuleId>) -> Self {
        self.feedback_failures.insert(module.into());
        self
    }

    pub fn with_refine_failure(mut self, error: CollaboratorError) -> Self {
        self.refine_failure = Some(error);
        self
    }

    /// All calls in the order they were made.
    pub fn calls(&self) -> Vec<Call> {
        locked(&self.calls).clone()
    }

    /// Number of calls made for one step.
    pub fn call_count(&self, step: Step) -> usize {
        self.calls().iter().filter(|c| c.step == step).count()
    }

    /// Instructions received by the refiner.
    pub fn refine_requests(&self) -> Vec<RefinementInstruction> {
        locked(&self.refine_requests).clone()
    }

    fn record(&self, step: Step, target: impl ToString) {
        locked(&self.calls).push(Call {
            step,
            target: target.to_string(),
        });
    }

    fn next_score(&self, unit_id: &UnitId) -> Option<f64> {
        let mut map = locked(&self.scores);
        match map.get_mut(unit_id) {
            Some(queue) if queue.len() > 1 => queue.pop_front(),
            Some(queue) => queue.front().copied(),
            None => self.default_score,
        }
    }

    fn next_feedback(&self, module_id: &ModuleId) -> FeedbackSummary {
        let mut map = locked(&self.feedback);
        let scripted = map.get_mut(module_id).and_then(|queue| {
            if queue.len() > 1 {
                queue.pop_front()
            } else {
                queue.front().cloned()
            }
        });
        scripted.unwrap_or_else(|| FeedbackSummary::empty(module_id.clone()))
    }
}

/// Lock a script, recovering it if a panicking test poisoned the mutex.
fn locked<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[async_trait]
impl Validator for ScriptedCollaborators {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn validate(&self, unit_id: &UnitId) -> CallResult<QualityReport> {
        self.record(Step::Validate, unit_id);

        if let Some(delay) = self.validate_delays.get(unit_id) {
            tokio::time::sleep(*delay).await;
        }
        if let Some(error) = self.validate_failures.get(unit_id) {
            return Err(error.clone());
        }

        let score = self.next_score(unit_id).ok_or_else(|| {
            CollaboratorError::rejected(Step::Validate, format!("unit {} not found", unit_id))
        })?;

        let mut report = QualityReport::new(unit_id.clone(), score)
            .with_issues(self.issues.get(unit_id).cloned().unwrap_or_default());
        if let Some(sub_scores) = self.sub_scores.get(unit_id) {
            for (name, value) in sub_scores {
                report = report.with_sub_score(name.clone(), *value);
            }
        }
        Ok(report.with_verdict(self.threshold))
    }
}

#[async_trait]
impl Importer for ScriptedCollaborators {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn import(&self, unit_id: &UnitId) -> CallResult<ImportReceipt> {
        self.record(Step::Import, unit_id);

        if let Some(error) = self.import_failures.get(unit_id) {
            return Err(error.clone());
        }
        Ok(ImportReceipt {
            module_id: ModuleId::for_unit(unit_id),
            status: PublicationStatus::Published,
        })
    }
}

#[async_trait]
impl FeedbackCollector for ScriptedCollaborators {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn collect(&self, module_id: &ModuleId) -> CallResult<FeedbackSummary> {
        self.record(Step::CollectFeedback, module_id);

        if self.feedback_failures.contains(module_id) {
            return Err(CollaboratorError::unavailable(
                Step::CollectFeedback,
                "analytics service unreachable",
            ));
        }
        Ok(self.next_feedback(module_id))
    }
}

#[async_trait]
impl Refiner for ScriptedCollaborators {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn refine(&self, instruction: &RefinementInstruction) -> CallResult<RefineReceipt> {
        self.record(Step::Refine, &instruction.unit_id);
        locked(&self.refine_requests).push(instruction.clone());

        if let Some(error) = &self.refine_failure {
            return Err(error.clone());
        }
        Ok(RefineReceipt {
            unit_id: instruction.unit_id.clone(),
            status: RefineStatus::Completed,
        })
    }
}
