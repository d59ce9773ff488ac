//! Property-based tests for the quality loop.
//!
//! Properties checked:
//! 1. **Ordering**: batch entries come back in input order
//! 2. **Mean**: errored units never count toward the batch mean
//! 3. **Gating**: without refinement, a low score is never imported
//! 4. **Termination**: a cycle validates at most twice and refines at most once
//! 5. **Determinism**: rendering the same result twice gives identical text
//!
//! # Running Property Tests
//!
//! ```bash
//! PROPTEST_CASES=1000 cargo test -p qaloop --test property_tests
//! ```

use std::sync::Arc;
use std::time::Duration;

use proptest::prelude::*;

use qaloop::{
    format_report, CollaboratorError, Collaborators, FeedbackSummary, LoopConfig, ModuleId,
    QualityLoop, ScriptedCollaborators, Step, UnitId,
};

// =============================================================================
// Test Strategies
// =============================================================================

/// One scripted unit: `None` fails validation, otherwise the score.
#[derive(Debug, Clone)]
struct UnitScript {
    score: Option<f64>,
    delay_ms: u64,
}

fn unit_script() -> impl Strategy<Value = UnitScript> {
    (
        prop_oneof![
            1 => Just(None),
            4 => (0u32..=100).prop_map(|n| Some(f64::from(n) / 10.0)),
        ],
        0u64..200,
    )
        .prop_map(|(score, delay_ms)| UnitScript { score, delay_ms })
}

fn score() -> impl Strategy<Value = f64> {
    (0u32..=100).prop_map(|n| f64::from(n) / 10.0)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .start_paused(true)
        .build()
        .expect("Failed to build runtime")
}

fn scripted_batch(scripts: &[UnitScript]) -> (ScriptedCollaborators, Vec<UnitId>) {
    let mut mock = ScriptedCollaborators::new();
    let mut ids = Vec::new();
    for (i, script) in scripts.iter().enumerate() {
        let id = UnitId::from(format!("u{}", i));
        mock = match script.score {
            Some(score) => mock.with_scores(id.clone(), &[score]),
            None => mock.with_validate_failure(
                id.clone(),
                CollaboratorError::unavailable(Step::Validate, "down"),
            ),
        };
        mock = mock.with_validate_delay(id.clone(), Duration::from_millis(script.delay_ms));
        ids.push(id);
    }
    (mock, ids)
}

fn build_loop(mock: ScriptedCollaborators, config: LoopConfig) -> (QualityLoop, Arc<ScriptedCollaborators>) {
    let mock = Arc::new(mock);
    (QualityLoop::new(Collaborators::shared(mock.clone()), config), mock)
}

// =============================================================================
// Batch Properties
// =============================================================================

proptest! {
    #[test]
    fn batch_preserves_input_order(
        scripts in prop::collection::vec(unit_script(), 0..24),
        concurrency in 1usize..8,
    ) {
        let (mock, ids) = scripted_batch(&scripts);
        let (quality_loop, _) = build_loop(mock, LoopConfig::default().with_max_concurrent(concurrency));

        let result = runtime().block_on(quality_loop.run_batch(&ids));

        let output: Vec<UnitId> = result.entries.iter().map(|e| e.unit_id.clone()).collect();
        prop_assert_eq!(output, ids);
    }

    #[test]
    fn batch_mean_excludes_errors(scripts in prop::collection::vec(unit_script(), 1..24)) {
        let (mock, ids) = scripted_batch(&scripts);
        let (quality_loop, _) = build_loop(mock, LoopConfig::default());

        let result = runtime().block_on(quality_loop.run_batch(&ids));

        let scores: Vec<f64> = scripts.iter().filter_map(|s| s.score).collect();
        prop_assert_eq!(result.summary.errored, scripts.len() - scores.len());
        prop_assert_eq!(result.summary.validated, scores.len());
        match result.summary.mean_score {
            None => prop_assert!(scores.is_empty()),
            Some(mean) => {
                let expected = scores.iter().sum::<f64>() / scores.len() as f64;
                prop_assert!((mean - expected).abs() <= 0.005 + 1e-9);
            }
        }
    }
}

// =============================================================================
// Cycle Properties
// =============================================================================

proptest! {
    #[test]
    fn low_score_without_refine_never_imports(first in score(), threshold in score()) {
        prop_assume!(first < threshold);
        let (quality_loop, mock) = build_loop(
            ScriptedCollaborators::new().with_scores("1", &[first]),
            LoopConfig::default().with_threshold(threshold),
        );

        let result = runtime().block_on(quality_loop.run_cycle(&UnitId::from("1"), false));

        prop_assert_eq!(result.outcome.label(), "RejectedLowQuality");
        prop_assert_eq!(mock.call_count(Step::Import), 0);
    }

    #[test]
    fn cycle_is_bounded(
        scores in prop::collection::vec(score(), 1..4),
        learners in 0usize..30,
        completion in 0u32..=100,
        auto_refine in any::<bool>(),
    ) {
        let summary = FeedbackSummary {
            learner_count: learners,
            completion_rate: f64::from(completion) / 100.0,
            ..FeedbackSummary::empty(ModuleId::from("module-1"))
        };
        let (quality_loop, mock) = build_loop(
            ScriptedCollaborators::new()
                .with_scores("1", &scores)
                .with_feedback(vec![summary]),
            LoopConfig::default(),
        );

        let result = runtime().block_on(quality_loop.run_cycle(&UnitId::from("1"), auto_refine));

        prop_assert!(mock.call_count(Step::Validate) <= 2);
        prop_assert!(mock.call_count(Step::Refine) <= 1);
        prop_assert_eq!(result.reports.len(), mock.call_count(Step::Validate));
        prop_assert!(mock.call_count(Step::CollectFeedback) <= 1);
        prop_assert_eq!(result.imports.len(), mock.call_count(Step::Import));
        if !auto_refine {
            prop_assert_eq!(mock.call_count(Step::Refine), 0);
        }
    }

    #[test]
    fn report_rendering_is_deterministic(scores in prop::collection::vec(score(), 1..3)) {
        let (quality_loop, _) = build_loop(
            ScriptedCollaborators::new()
                .with_scores("1", &scores)
                .with_issues("1", &["Missing review | spiral"]),
            LoopConfig::default(),
        );

        let result = runtime().block_on(quality_loop.run_cycle(&UnitId::from("1"), true));
        let copy = result.clone();

        prop_assert_eq!(format_report(&result), format_report(&result));
        prop_assert_eq!(format_report(&result), format_report(&copy));
    }
}
