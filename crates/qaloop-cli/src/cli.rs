//! CLI argument definitions using clap.

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// qaloop: validate, import, collect feedback on, and refine curriculum units
#[derive(Parser)]
#[command(name = "qaloop")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Collaborator backend
    #[arg(long, global = true, default_value = "local", env = "QALOOP_BACKEND")]
    pub backend: Backend,

    /// Workspace directory for the local backend
    #[arg(short, long, global = true, default_value = ".", env = "QALOOP_WORKSPACE")]
    pub workspace: PathBuf,

    /// Minimum quality score (0-10) for import
    #[arg(long, global = true)]
    pub threshold: Option<f64>,

    /// Timeout for each collaborator call, in seconds
    #[arg(long, global = true)]
    pub timeout_secs: Option<f64>,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run the full quality cycle for one unit
    Cycle {
        /// Unit identifier (e.g. a week number)
        #[arg(value_name = "UNIT")]
        unit: String,

        /// Do not refine when quality or learner outcomes fall short
        #[arg(long)]
        no_refine: bool,

        /// Print the result as JSON instead of Markdown
        #[arg(long)]
        json: bool,

        /// Also write the result as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Validate many units
    Batch {
        /// Unit identifiers
        #[arg(value_name = "UNITS", required_unless_present = "range")]
        units: Vec<String>,

        /// Numeric range of units, inclusive (e.g. 1..35)
        #[arg(long, conflicts_with = "units")]
        range: Option<String>,

        /// Maximum validator calls in flight
        #[arg(short, long)]
        concurrency: Option<usize>,

        /// Import every unit that passed
        #[arg(long)]
        import_passed: bool,

        /// Print the result as JSON instead of Markdown
        #[arg(long)]
        json: bool,

        /// Also write the result as JSON to this path
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Render a saved cycle or batch result as Markdown
    Report {
        /// Path to a result JSON file written with --output
        #[arg(value_name = "RESULT_JSON")]
        file: PathBuf,
    },

    /// Show units, scores and published modules in a workspace
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },
}

/// Where collaborator calls go.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Backend {
    /// Built-in engine over the local workspace
    #[default]
    Local,
    /// Remote service (requires QALOOP_COLLABORATOR_URL)
    Http,
    /// Scripted answers for dry runs
    Mock,
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "local" => Ok(Backend::Local),
            "http" | "remote" => Ok(Backend::Http),
            "mock" | "test" => Ok(Backend::Mock),
            _ => Err(format!("Unknown backend: {}. Use: local, http, or mock.", s)),
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Backend::Local => write!(f, "local"),
            Backend::Http => write!(f, "http"),
            Backend::Mock => write!(f, "mock"),
        }
    }
}

/// Parse an inclusive numeric range such as `1..35` or `1..=35`.
pub fn parse_range(range: &str) -> Result<Vec<String>, String> {
    let (start, end) = range
        .split_once("..")
        .ok_or_else(|| format!("Invalid range '{}': expected START..END", range))?;
    let end = end.trim_start_matches('=');

    let start: u32 = start
        .trim()
        .parse()
        .map_err(|_| format!("Invalid range start '{}'", start))?;
    let end: u32 = end
        .trim()
        .parse()
        .map_err(|_| format!("Invalid range end '{}'", end))?;
    if start > end {
        return Err(format!("Invalid range '{}': start is after end", range));
    }

    Ok((start..=end).map(|n| n.to_string()).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_range() {
        assert_eq!(parse_range("3..5").unwrap(), vec!["3", "4", "5"]);
        assert_eq!(parse_range("1..=2").unwrap(), vec!["1", "2"]);
        assert!(parse_range("5..3").is_err());
        assert!(parse_range("a..b").is_err());
        assert!(parse_range("7").is_err());
    }

    #[test]
    fn test_backend_from_str() {
        assert_eq!("HTTP".parse::<Backend>().unwrap(), Backend::Http);
        assert!("ftp".parse::<Backend>().is_err());
    }
}
