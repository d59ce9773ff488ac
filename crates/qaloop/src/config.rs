//! Loop configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{QaError, Result};
use crate::model::{Grade, MAX_SCORE};

pub const ENV_QUALITY_THRESHOLD: &str = "QALOOP_QUALITY_THRESHOLD";
pub const ENV_COMPLETION_FLOOR: &str = "QALOOP_COMPLETION_FLOOR";
pub const ENV_MISCONCEPTION_THRESHOLD: &str = "QALOOP_MISCONCEPTION_THRESHOLD";
pub const ENV_AUTO_VALIDATE: &str = "QALOOP_AUTO_VALIDATE";
pub const ENV_AUTO_IMPORT: &str = "QALOOP_AUTO_IMPORT";
pub const ENV_AUTO_REFINE: &str = "QALOOP_AUTO_REFINE";
pub const ENV_MAX_CONCURRENT: &str = "QALOOP_MAX_CONCURRENT";
pub const ENV_CALL_TIMEOUT_SECS: &str = "QALOOP_CALL_TIMEOUT_SECS";

/// Configuration for the quality loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Minimum aggregate score (0-10) required to import a unit.
    pub quality_threshold: f64,

    /// Completion rate below which feedback counts as degraded.
    pub completion_floor: f64,

    /// Misconception frequency above which feedback counts as degraded.
    pub misconception_threshold: usize,

    /// Average grade below which feedback counts as degraded.
    pub grade_floor: Grade,

    /// Average mastery time above which lessons are flagged as too long.
    pub max_mastery_minutes: f64,

    /// Re-validate automatically after a refinement.
    pub auto_validate: bool,

    /// Import units that pass validation.
    pub auto_import: bool,

    /// Refine units that fail validation or show degraded feedback.
    pub auto_refine: bool,

    /// Maximum number of validator calls in flight during a batch.
    pub max_concurrent: usize,

    /// Timeout applied to every collaborator call.
    pub call_timeout: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            quality_threshold: 7.5,
            completion_floor: 0.7,
            misconception_threshold: 3,
            grade_floor: Grade::CPlus,
            max_mastery_minutes: 60.0,
            auto_validate: true,
            auto_import: true,
            auto_refine: true,
            max_concurrent: 4,
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl LoopConfig {
    /// Read configuration from `QALOOP_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from a key lookup, falling back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(v) = lookup(ENV_QUALITY_THRESHOLD) {
            config.quality_threshold = parse_number(ENV_QUALITY_THRESHOLD, &v)?;
        }
        if let Some(v) = lookup(ENV_COMPLETION_FLOOR) {
            config.completion_floor = parse_number(ENV_COMPLETION_FLOOR, &v)?;
        }
        if let Some(v) = lookup(ENV_MISCONCEPTION_THRESHOLD) {
            config.misconception_threshold = parse_number(ENV_MISCONCEPTION_THRESHOLD, &v)?;
        }
        if let Some(v) = lookup(ENV_AUTO_VALIDATE) {
            config.auto_validate = parse_flag(ENV_AUTO_VALIDATE, &v)?;
        }
        if let Some(v) = lookup(ENV_AUTO_IMPORT) {
            config.auto_import = parse_flag(ENV_AUTO_IMPORT, &v)?;
        }
        if let Some(v) = lookup(ENV_AUTO_REFINE) {
            config.auto_refine = parse_flag(ENV_AUTO_REFINE, &v)?;
        }
        if let Some(v) = lookup(ENV_MAX_CONCURRENT) {
            config.max_concurrent = parse_number(ENV_MAX_CONCURRENT, &v)?;
        }
        if let Some(v) = lookup(ENV_CALL_TIMEOUT_SECS) {
            let secs: f64 = parse_number(ENV_CALL_TIMEOUT_SECS, &v)?;
            config.call_timeout = timeout_from_secs(ENV_CALL_TIMEOUT_SECS, secs)?;
        }

        config.validate()?;
        Ok(config)
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.quality_threshold = threshold;
        self
    }

    pub fn with_auto_refine(mut self, auto_refine: bool) -> Self {
        self.auto_refine = auto_refine;
        self
    }

    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent;
        self
    }

    pub fn with_call_timeout(mut self, call_timeout: Duration) -> Self {
        self.call_timeout = call_timeout;
        self
    }

    /// Check that every setting is in range.
    pub fn validate(&self) -> Result<()> {
        if !self.quality_threshold.is_finite()
            || !(0.0..=MAX_SCORE).contains(&self.quality_threshold)
        {
            return Err(QaError::Config(format!(
                "quality threshold must be between 0 and {}, got {}",
                MAX_SCORE, self.quality_threshold
            )));
        }
        if !self.completion_floor.is_finite() || !(0.0..=1.0).contains(&self.completion_floor) {
            return Err(QaError::Config(format!(
                "completion floor must be between 0 and 1, got {}",
                self.completion_floor
            )));
        }
        if !self.max_mastery_minutes.is_finite() || self.max_mastery_minutes < 0.0 {
            return Err(QaError::Config(format!(
                "max mastery minutes must be non-negative, got {}",
                self.max_mastery_minutes
            )));
        }
        if self.max_concurrent == 0 {
            return Err(QaError::Config(
                "max concurrent calls must be at least 1".to_string(),
            ));
        }
        if self.call_timeout.is_zero() {
            return Err(QaError::Config("call timeout must be positive".to_string()));
        }
        Ok(())
    }
}

/// Convert a number of seconds into a call timeout.
///
/// The value must be positive and fit in a `Duration`.
pub fn timeout_from_secs(name: &str, secs: f64) -> Result<Duration> {
    if !secs.is_finite() || secs <= 0.0 {
        return Err(QaError::Config(format!(
            "{} must be a positive number of seconds, got {}",
            name, secs
        )));
    }
    Duration::try_from_secs_f64(secs)
        .map_err(|e| QaError::Config(format!("{} is out of range ({}): {}", name, secs, e)))
}

fn parse_number<T: std::str::FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| QaError::Config(format!("{} has an invalid value: '{}'", key, value)))
}

fn parse_flag(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(QaError::Config(format!(
            "{} must be true or false, got '{}'",
            key, value
        ))),
    }
}
