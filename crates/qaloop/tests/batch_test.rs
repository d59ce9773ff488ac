//! Integration tests for batch validation.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use qaloop::{
    BatchStatus, CollaboratorError, Collaborators, LoopConfig, QualityLoop, ScriptedCollaborators,
    Step, UnitId,
};

fn quality_loop(
    mock: ScriptedCollaborators,
    config: LoopConfig,
) -> (QualityLoop, Arc<ScriptedCollaborators>) {
    let mock = Arc::new(mock);
    let quality_loop = QualityLoop::new(Collaborators::shared(mock.clone()), config);
    (quality_loop, mock)
}

fn units(ids: &[&str]) -> Vec<UnitId> {
    ids.iter().map(|id| UnitId::from(*id)).collect()
}

#[tokio::test]
async fn test_mean_excludes_errored_units() {
    let (quality_loop, _) = quality_loop(
        ScriptedCollaborators::new()
            .with_scores("A", &[9.0])
            .with_validate_failure("B", CollaboratorError::unavailable(Step::Validate, "down"))
            .with_scores("C", &[7.0]),
        LoopConfig::default(),
    );

    let result = quality_loop.run_batch(&units(&["A", "B", "C"])).await;

    assert_eq!(result.summary.total, 3);
    assert_eq!(result.summary.validated, 2);
    assert_eq!(result.summary.passed, 1);
    assert_eq!(result.summary.failed, 1);
    assert_eq!(result.summary.errored, 1);
    assert_eq!(result.summary.mean_score, Some(8.0));
}

#[tokio::test(start_paused = true)]
async fn test_entries_keep_input_order_when_calls_finish_out_of_order() {
    let (quality_loop, _) = quality_loop(
        ScriptedCollaborators::new()
            .with_default_score(8.0)
            .with_validate_delay("1", Duration::from_secs(5))
            .with_validate_delay("2", Duration::from_secs(3))
            .with_validate_delay("3", Duration::from_secs(1)),
        LoopConfig::default().with_max_concurrent(3),
    );

    let input = units(&["1", "2", "3", "4"]);
    let result = quality_loop.run_batch(&input).await;

    let output: Vec<UnitId> = result.entries.iter().map(|e| e.unit_id.clone()).collect();
    assert_eq!(output, input);
}

#[tokio::test(start_paused = true)]
async fn test_timed_out_unit_does_not_abort_batch() {
    let (quality_loop, mock) = quality_loop(
        ScriptedCollaborators::new()
            .with_default_score(8.0)
            .with_validate_delay("12", Duration::from_secs(300)),
        LoopConfig::default().with_call_timeout(Duration::from_secs(30)),
    );

    let input: Vec<UnitId> = (1..=35u32).map(UnitId::from).collect();
    let result = quality_loop.run_batch(&input).await;

    assert_eq!(result.entries.len(), 35);
    assert_eq!(result.summary.validated, 34);
    assert_eq!(result.summary.errored, 1);
    assert_eq!(mock.call_count(Step::Validate), 35);

    let entry = &result.entries[11];
    assert_eq!(entry.unit_id.as_str(), "12");
    let error = entry.error().expect("unit 12 errored");
    assert_eq!(error.kind(), "CollaboratorUnavailable");
    assert_eq!(error.step(), Step::Validate);
}

#[tokio::test]
async fn test_passed_uses_loop_threshold() {
    let (quality_loop, _) = quality_loop(
        ScriptedCollaborators::new()
            .with_threshold(5.0)
            .with_scores("1", &[6.0]),
        LoopConfig::default(),
    );

    let result = quality_loop.run_batch(&units(&["1"])).await;

    match &result.entries[0].status {
        BatchStatus::Validated { report, passed } => {
            assert!(report.passed, "validator's own verdict is kept");
            assert!(!passed);
        }
        other => panic!("expected Validated, got {:?}", other),
    }
}

#[tokio::test]
async fn test_cancelled_batch_skips_units() {
    let (quality_loop, mock) = quality_loop(
        ScriptedCollaborators::new().with_default_score(8.0),
        LoopConfig::default(),
    );
    let cancel = CancellationToken::new();
    cancel.cancel();

    let result = quality_loop
        .run_batch_with(&units(&["1", "2"]), &cancel)
        .await;

    assert_eq!(result.summary.skipped, 2);
    assert_eq!(result.summary.mean_score, None);
    assert!(mock.calls().is_empty());
}

#[tokio::test]
async fn test_empty_batch() {
    let (quality_loop, _) = quality_loop(ScriptedCollaborators::new(), LoopConfig::default());

    let result = quality_loop.run_batch(&[]).await;

    assert!(result.entries.is_empty());
    assert_eq!(result.summary.mean_score, None);
}

#[tokio::test]
async fn test_import_passed_imports_only_passing_units() {
    let (quality_loop, mock) = quality_loop(
        ScriptedCollaborators::new()
            .with_scores("1", &[9.0])
            .with_scores("2", &[4.0])
            .with_scores("3", &[8.0])
            .with_import_failure("3", CollaboratorError::rejected(Step::Import, "duplicate")),
        LoopConfig::default(),
    );
    let cancel = CancellationToken::new();

    let batch = quality_loop.run_batch(&units(&["1", "2", "3"])).await;
    let imports = quality_loop.import_passed(&batch, &cancel).await;

    let ids: Vec<&str> = imports.iter().map(|(id, _)| id.as_str()).collect();
    assert_eq!(ids, vec!["1", "3"]);
    assert_eq!(imports[0].1.as_ref().unwrap().module_id.as_str(), "module-1");
    assert!(imports[1].1.is_err());
    assert_eq!(mock.call_count(Step::Import), 2);
}

#[tokio::test]
async fn test_import_passed_after_cancel_issues_nothing() {
    let (quality_loop, mock) = quality_loop(
        ScriptedCollaborators::new().with_default_score(9.0),
        LoopConfig::default(),
    );

    let batch = quality_loop.run_batch(&units(&["1"])).await;
    let cancel = CancellationToken::new();
    cancel.cancel();
    let imports = quality_loop.import_passed(&batch, &cancel).await;

    assert_eq!(imports.len(), 1);
    assert!(imports[0].1.as_ref().unwrap_err().is_cancelled());
    assert_eq!(mock.call_count(Step::Import), 0);
}
