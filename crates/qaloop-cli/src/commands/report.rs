//! Report command - re-render a saved cycle or batch result.

use std::path::PathBuf;

use qaloop::store::load_json;
use qaloop::{format_report, BatchResult, CycleResult};
use serde_json::Value;

pub fn run(file: PathBuf, _verbose: bool) -> Result<(), Box<dyn std::error::Error>> {
    if !file.exists() {
        return Err(format!("Result file not found: {}", file.display()).into());
    }

    let value: Value = load_json(&file)?;
    let text = if value.get("entries").is_some() {
        let batch: BatchResult = serde_json::from_value(value)?;
        format_report(&batch)
    } else if value.get("outcome").is_some() {
        let cycle: CycleResult = serde_json::from_value(value)?;
        format_report(&cycle)
    } else {
        return Err(format!(
            "{} is neither a cycle nor a batch result",
            file.display()
        )
        .into());
    };

    print!("{}", text);
    Ok(())
}
