//! Batch command - validate many units, optionally importing those that pass.

use std::path::PathBuf;

use colored::Colorize;
use qaloop::{format_report, UnitId};
use tokio_util::sync::CancellationToken;

use super::{write_json, GlobalOptions, Session};
use crate::cli::parse_range;

#[allow(clippy::too_many_arguments)]
pub async fn run(
    options: &GlobalOptions,
    units: Vec<String>,
    range: Option<String>,
    concurrency: Option<usize>,
    import_passed: bool,
    json_output: bool,
    output: Option<PathBuf>,
    cancel: CancellationToken,
) -> Result<(), Box<dyn std::error::Error>> {
    let units = match range {
        Some(range) => parse_range(&range)?,
        None => units,
    };
    if units.is_empty() {
        return Err("No units given".into());
    }
    let unit_ids: Vec<UnitId> = units.into_iter().map(UnitId::from).collect();

    let mut config = options.loop_config()?;
    if let Some(concurrency) = concurrency {
        config = config.with_max_concurrent(concurrency);
        config.validate()?;
    }
    let session = Session::open(options, config)?;

    if options.verbose {
        eprintln!(
            "{} {} units ({} at a time)",
            "Validating".cyan(),
            unit_ids.len().to_string().white().bold(),
            session.quality_loop.config().max_concurrent
        );
    }

    let result = session
        .quality_loop
        .run_batch_with(&unit_ids, &cancel)
        .await;

    if let Some(path) = &output {
        write_json(&result, path)?;
        eprintln!("{} {}", "Result written to".green(), path.display());
    }

    if json_output {
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!("{}", format_report(&result));
    }

    let summary = &result.summary;
    eprintln!(
        "{} {} passed, {} failed, {} errored, {} skipped",
        "Batch:".bold(),
        summary.passed.to_string().green(),
        summary.failed.to_string().yellow(),
        summary.errored.to_string().red(),
        summary.skipped
    );

    if import_passed {
        let imports = session.quality_loop.import_passed(&result, &cancel).await;
        for (unit_id, outcome) in &imports {
            match outcome {
                Ok(receipt) => eprintln!(
                    "  {} unit {} -> {}",
                    "imported".green(),
                    unit_id,
                    receipt.module_id
                ),
                Err(error) => eprintln!("  {} unit {}: {}", "failed".red(), unit_id, error),
            }
        }
        if imports.is_empty() {
            eprintln!("  {}", "No units passed; nothing imported".dimmed());
        }
    }

    session.save().await?;
    Ok(())
}
