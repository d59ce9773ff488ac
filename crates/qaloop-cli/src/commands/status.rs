//! Status command - show units, scores and published modules in a workspace.

use colored::Colorize;
use qaloop::Workspace;
use serde::Serialize;

use super::GlobalOptions;

#[derive(Debug, Serialize)]
struct UnitStatus {
    unit_id: String,
    title: String,
    version: u32,
    earlier_versions: usize,
    latest_score: Option<f64>,
    validated_current_version: bool,
    published_module: Option<String>,
    module_revision: Option<u32>,
    learners: usize,
}

pub fn run(options: &GlobalOptions, json_output: bool) -> Result<(), Box<dyn std::error::Error>> {
    let threshold = options.loop_config()?.quality_threshold;
    let workspace = Workspace::load_dir(&options.workspace)?;
    let statuses = collect(&workspace);

    if json_output {
        let status = serde_json::json!({
            "workspace": options.workspace.display().to_string(),
            "threshold": threshold,
            "units": statuses,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
        return Ok(());
    }

    println!(
        "{} {}",
        "Workspace status for".cyan().bold(),
        options.workspace.display().to_string().white()
    );
    println!();

    if statuses.is_empty() {
        println!("  {}", "No units found".dimmed());
        return Ok(());
    }

    let published = statuses.iter().filter(|s| s.published_module.is_some()).count();
    println!(
        "Units: {}   Published: {}   Threshold: {:.2}",
        statuses.len().to_string().white().bold(),
        published.to_string().green(),
        threshold
    );
    println!();

    for status in &statuses {
        let score = match status.latest_score {
            Some(score) if score >= threshold => format!("{:.2}", score).green(),
            Some(score) => format!("{:.2}", score).red(),
            None => "-".dimmed(),
        };
        let stale = if status.latest_score.is_some() && !status.validated_current_version {
            " (stale)".yellow().to_string()
        } else {
            String::new()
        };
        let module = match (&status.published_module, status.module_revision) {
            (Some(id), Some(revision)) => format!("{} r{}", id, revision).normal(),
            _ => "unpublished".dimmed(),
        };

        println!(
            "  {} {} v{}  score {}{}  {}  learners {}",
            "•".cyan(),
            status.unit_id.white().bold(),
            status.version,
            score,
            stale,
            module,
            status.learners
        );
        if options.verbose {
            println!("      {}", status.title.dimmed());
        }
    }

    Ok(())
}

fn collect(workspace: &Workspace) -> Vec<UnitStatus> {
    workspace
        .unit_ids()
        .into_iter()
        .filter_map(|id| {
            let unit = workspace.unit(&id)?;
            let latest = workspace.latest_report(&id);
            let digest = unit.digest();
            let module = workspace.published_module(&id);
            let learners = {
                let log = workspace.interaction_log(&id);
                let mut ids: Vec<&str> = log.progress.iter().map(|p| p.learner_id.as_str()).collect();
                ids.sort_unstable();
                ids.dedup();
                ids.len()
            };

            Some(UnitStatus {
                unit_id: id.to_string(),
                title: unit.title.clone(),
                version: unit.version,
                earlier_versions: workspace.history(&id).len(),
                latest_score: latest.map(|r| r.score),
                validated_current_version: latest
                    .is_some_and(|r| r.unit_digest.as_deref() == Some(digest.as_str())),
                published_module: module.map(|m| m.id.to_string()),
                module_revision: module.map(|m| m.revision),
                learners,
            })
        })
        .collect()
}
