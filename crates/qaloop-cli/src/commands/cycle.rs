//! Cycle command - run validate, import, feedback and refine for one unit.

use std::path::PathBuf;

use colored::Colorize;
use qaloop::{format_report, CycleOutcome, UnitId};
use tokio_util::sync::CancellationToken;

use super::{write_json, GlobalOptions, Session};

pub async fn run(
    options: &GlobalOptions,
    unit: String,
    no_refine: bool,
    json_output: bool,
    output: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = options.loop_config()?;
    let auto_refine = config.auto_refine && !no_refine;
    let session = Session::open(options, config)?;

    if options.verbose {
        eprintln!(
            "{} unit {} (threshold {:.2}, auto-refine {})",
            "Running cycle for".cyan(),
            unit.white().bold(),
            session.quality_loop.config().quality_threshold,
            auto_refine
        );
    }

    let result = session
        .quality_loop
        .run_cycle_with(&UnitId::from(unit), auto_refine, &cancel)
        .await;
    session.save().await?;

    if let Some(path) = &output {
        write_json(&result, path)?;
        eprintln!("{} {}", "Result written to".green(), path.display());
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", format_report(&result));
    }

    let label = result.outcome.label();
    let styled = match &result.outcome {
        CycleOutcome::ImportedNoFeedback
        | CycleOutcome::Imported { degraded: false }
        | CycleOutcome::RefinedAndImported => label.green().bold(),
        CycleOutcome::Imported { degraded: true }
        | CycleOutcome::RejectedLowQuality { .. }
        | CycleOutcome::AwaitingImport
        | CycleOutcome::AwaitingValidation
        | CycleOutcome::Cancelled { .. } => label.yellow().bold(),
        _ => label.red().bold(),
    };
    eprintln!("{} {}", "Outcome:".bold(), styled);

    if let Some(error) = result.outcome.error() {
        return Err(format!("Cycle for unit {} failed: {}", result.unit_id, error).into());
    }
    Ok(())
}
