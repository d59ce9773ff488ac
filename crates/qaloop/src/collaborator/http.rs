//! Collaborators reached over HTTP.

use std::time::Duration;

use async_trait::async_trait;
use indexmap::IndexMap;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::{CallResult, CollaboratorError, QaError, Result, Step};
use crate::model::{
    FeedbackSummary, Grade, ImportReceipt, Misconception, ModuleId, PublicationStatus,
    QualityReport, RefineReceipt, RefinementInstruction, StrugglingConcept, TimeToMastery, UnitId,
};

use super::provider::{FeedbackCollector, Importer, Refiner, Validator};

pub const ENV_COLLABORATOR_URL: &str = "QALOOP_COLLABORATOR_URL";
pub const ENV_API_TOKEN: &str = "QALOOP_API_TOKEN";

/// Connection settings for the collaborator service.
#[derive(Debug, Clone, PartialEq)]
pub struct HttpConfig {
    /// Base URL, e.g. `http://localhost:8000/api/integration`.
    pub base_url: String,

    /// Bearer token sent with every request.
    pub token: Option<String>,

    /// Client-side request timeout.
    pub timeout: Duration,
}

impl HttpConfig {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: Duration::from_secs(60),
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Read settings from the environment.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let base_url = lookup(ENV_COLLABORATOR_URL)
            .filter(|v| !v.trim().is_empty())
            .ok_or_else(|| {
                QaError::Config(format!("{} environment variable not set", ENV_COLLABORATOR_URL))
            })?;

        let mut config = Self::new(base_url);
        if let Some(token) = lookup(ENV_API_TOKEN).filter(|v| !v.trim().is_empty()) {
            config.token = Some(token);
        }
        Ok(config)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path)
    }
}

/// All four collaborators behind one HTTP service.
pub struct HttpCollaborators {
    client: Client,
    config: HttpConfig,
}

impl HttpCollaborators {
    pub fn new(config: HttpConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(build_headers(&config)?)
            .build()
            .map_err(|e| QaError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, config })
    }

    pub fn config(&self) -> &HttpConfig {
        &self.config
    }

    async fn post<B, R>(&self, step: Step, path: &str, body: &B) -> CallResult<R>
    where
        B: Serialize + ?Sized + Sync,
        R: DeserializeOwned,
    {
        let url = self.config.endpoint(path);
        debug!(step = %step, url = %url, "POST");

        let response = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(|e| CollaboratorError::unavailable(step, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(classify_status(step, status, &text));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| CollaboratorError::unavailable(step, format!("reading body failed: {}", e)))?;
        serde_json::from_slice(&bytes)
            .map_err(|e| CollaboratorError::rejected(step, format!("malformed response: {}", e)))
    }
}

fn build_headers(config: &HttpConfig) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    if let Some(token) = &config.token {
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|e| QaError::Config(format!("Invalid API token: {}", e)))?,
        );
    }
    Ok(headers)
}

/// Map a non-success status to the collaborator error taxonomy.
///
/// Server faults are `Unavailable`; client errors are `Rejected`.
pub fn classify_status(step: Step, status: StatusCode, body: &str) -> CollaboratorError {
    let detail = body.trim();
    let message = if detail.is_empty() {
        format!("HTTP {}", status)
    } else {
        format!("HTTP {}: {}", status, truncate(detail, 200))
    };

    if status.is_server_error()
        || status == StatusCode::REQUEST_TIMEOUT
        || status == StatusCode::TOO_MANY_REQUESTS
    {
        CollaboratorError::unavailable(step, message)
    } else {
        CollaboratorError::rejected(step, message)
    }
}

fn truncate(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

/// Validator response body.
#[derive(Debug, Deserialize)]
pub struct ValidateResponse {
    pub score: f64,
    #[serde(default)]
    pub sub_scores: IndexMap<String, f64>,
    #[serde(default)]
    pub issues: Vec<String>,
    #[serde(default)]
    pub recommendations: Vec<String>,
    pub passed: bool,
}

impl ValidateResponse {
    pub fn into_report(self, unit_id: &UnitId) -> CallResult<QualityReport> {
        let mut report = QualityReport::new(unit_id.clone(), self.score).with_issues(self.issues);
        report.sub_scores = self.sub_scores;
        report.recommendations = self.recommendations;
        report.passed = self.passed;
        report
            .check_scale()
            .map_err(|m| CollaboratorError::rejected(Step::Validate, m))?;
        Ok(report)
    }
}

/// One entry of a batch import response.
#[derive(Debug, Deserialize)]
pub struct BatchImportEntry {
    pub unit_id: UnitId,
    #[serde(default)]
    pub module_id: Option<ModuleId>,
    #[serde(default)]
    pub status: Option<PublicationStatus>,
    #[serde(default)]
    pub error: Option<String>,
}

impl BatchImportEntry {
    fn into_result(self) -> CallResult<ImportReceipt> {
        if let Some(error) = self.error {
            return Err(CollaboratorError::rejected(Step::Import, error));
        }
        match (self.module_id, self.status) {
            (Some(module_id), Some(status)) => Ok(ImportReceipt { module_id, status }),
            _ => Err(CollaboratorError::rejected(
                Step::Import,
                format!("incomplete batch entry for unit {}", self.unit_id),
            )),
        }
    }
}

/// Match batch entries to the requested units, in request order.
pub fn match_batch_entries(
    unit_ids: &[UnitId],
    entries: Vec<BatchImportEntry>,
) -> Vec<(UnitId, CallResult<ImportReceipt>)> {
    let mut by_unit: IndexMap<UnitId, BatchImportEntry> =
        entries.into_iter().map(|e| (e.unit_id.clone(), e)).collect();

    unit_ids
        .iter()
        .map(|unit_id| {
            let result = match by_unit.shift_remove(unit_id) {
                Some(entry) => entry.into_result(),
                None => Err(CollaboratorError::rejected(
                    Step::Import,
                    format!("unit {} missing from batch response", unit_id),
                )),
            };
            (unit_id.clone(), result)
        })
        .collect()
}

/// Feedback collector response body.
#[derive(Debug, Deserialize)]
pub struct FeedbackResponse {
    #[serde(default)]
    pub learner_count: usize,
    #[serde(default)]
    pub completion_rate: f64,
    /// Letter grade; `N/A` or empty when no grades were recorded.
    #[serde(default)]
    pub average_grade: Option<String>,
    #[serde(default)]
    pub time_to_mastery: TimeToMastery,
    #[serde(default)]
    pub misconceptions: Vec<Misconception>,
    #[serde(default)]
    pub struggling_concepts: Vec<StrugglingConcept>,
}

impl FeedbackResponse {
    pub fn into_summary(self, module_id: &ModuleId) -> CallResult<FeedbackSummary> {
        if !(0.0..=1.0).contains(&self.completion_rate) {
            return Err(CollaboratorError::rejected(
                Step::CollectFeedback,
                format!("completion rate {} is outside [0, 1]", self.completion_rate),
            ));
        }

        let average_grade = match self.average_grade.as_deref().map(str::trim) {
            None | Some("") | Some("N/A") => None,
            Some(letter) => Some(
                letter
                    .parse::<Grade>()
                    .map_err(|e| CollaboratorError::rejected(Step::CollectFeedback, e))?,
            ),
        };

        Ok(FeedbackSummary {
            module_id: module_id.clone(),
            learner_count: self.learner_count,
            completion_rate: self.completion_rate,
            average_grade,
            time_to_mastery: self.time_to_mastery,
            misconceptions: self.misconceptions,
            struggling_concepts: self.struggling_concepts,
        })
    }
}

#[async_trait]
impl Validator for HttpCollaborators {
    fn name(&self) -> &str {
        "http"
    }

    async fn validate(&self, unit_id: &UnitId) -> CallResult<QualityReport> {
        let response: ValidateResponse = self
            .post(Step::Validate, "validate", &json!({ "unit_id": unit_id }))
            .await?;
        response.into_report(unit_id)
    }
}

#[async_trait]
impl Importer for HttpCollaborators {
    fn name(&self) -> &str {
        "http"
    }

    async fn import(&self, unit_id: &UnitId) -> CallResult<ImportReceipt> {
        self.post(Step::Import, "import", &json!({ "unit_id": unit_id }))
            .await
    }

    async fn import_batch(&self, unit_ids: &[UnitId]) -> Vec<(UnitId, CallResult<ImportReceipt>)> {
        let response: CallResult<Vec<BatchImportEntry>> = self
            .post(Step::Import, "import/batch", &json!({ "unit_ids": unit_ids }))
            .await;
        match response {
            Ok(entries) => match_batch_entries(unit_ids, entries),
            Err(error) => unit_ids
                .iter()
                .map(|u| (u.clone(), Err(error.clone())))
                .collect(),
        }
    }
}

#[async_trait]
impl FeedbackCollector for HttpCollaborators {
    fn name(&self) -> &str {
        "http"
    }

    async fn collect(&self, module_id: &ModuleId) -> CallResult<FeedbackSummary> {
        let response: FeedbackResponse = self
            .post(Step::CollectFeedback, "feedback", &json!({ "module_id": module_id }))
            .await?;
        response.into_summary(module_id)
    }
}

#[async_trait]
impl Refiner for HttpCollaborators {
    fn name(&self) -> &str {
        "http"
    }

    async fn refine(&self, instruction: &RefinementInstruction) -> CallResult<RefineReceipt> {
        self.post(Step::Refine, "refine", instruction).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_config_from_lookup() {
        let vars: HashMap<&str, &str> = [
            (ENV_COLLABORATOR_URL, "http://localhost:8000/api/"),
            (ENV_API_TOKEN, "secret"),
        ]
        .into_iter()
        .collect();
        let config = HttpConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string())).unwrap();

        assert_eq!(config.token.as_deref(), Some("secret"));
        assert_eq!(config.endpoint("validate"), "http://localhost:8000/api/validate");
    }

    #[test]
    fn test_config_requires_url() {
        let err = HttpConfig::from_lookup(|_| None).unwrap_err();
        assert!(err.to_string().contains(ENV_COLLABORATOR_URL));
    }

    #[test]
    fn test_status_classification() {
        let err = classify_status(Step::Validate, StatusCode::BAD_GATEWAY, "");
        assert_eq!(err.kind(), "CollaboratorUnavailable");

        let err = classify_status(Step::Import, StatusCode::NOT_FOUND, "Week 40 not found");
        assert_eq!(err.kind(), "CollaboratorRejected");
        assert!(err.to_string().contains("Week 40 not found"));
    }

    #[test]
    fn test_validate_response_to_report() {
        let body = r#"{"score": 8.2, "sub_scores": {"concept_clarity": 8.5, "spiral_learning_coverage": 7.9},
                       "issues": ["Day 3 summary is thin"], "passed": true}"#;
        let response: ValidateResponse = serde_json::from_str(body).unwrap();
        let report = response.into_report(&UnitId::from(5u32)).unwrap();

        assert_eq!(report.score, 8.2);
        assert!(report.passed);
        let names: Vec<&String> = report.sub_scores.keys().collect();
        assert_eq!(names, vec!["concept_clarity", "spiral_learning_coverage"]);
    }

    #[test]
    fn test_out_of_scale_score_is_rejected() {
        let response: ValidateResponse =
            serde_json::from_str(r#"{"score": 82, "passed": true}"#).unwrap();
        let err = response.into_report(&UnitId::from(5u32)).unwrap_err();
        assert_eq!(err.kind(), "CollaboratorRejected");
    }

    #[test]
    fn test_feedback_response_grade_na() {
        let body = r#"{"learner_count": 0, "completion_rate": 0.0, "average_grade": "N/A",
                       "time_to_mastery": {"average_minutes": 0, "median_minutes": 0}}"#;
        let response: FeedbackResponse = serde_json::from_str(body).unwrap();
        let summary = response.into_summary(&ModuleId::from("module-5")).unwrap();
        assert!(summary.is_empty());
        assert_eq!(summary.average_grade, None);
    }

    #[test]
    fn test_batch_entries_follow_request_order() {
        let entries: Vec<BatchImportEntry> = serde_json::from_str(
            r#"[{"unit_id": "3", "module_id": "module-3", "status": "published"},
                {"unit_id": "1", "error": "unit 1 has not passed validation"}]"#,
        )
        .unwrap();
        let units = vec![UnitId::from(1u32), UnitId::from(2u32), UnitId::from(3u32)];
        let results = match_batch_entries(&units, entries);

        assert_eq!(results[0].0.as_str(), "1");
        assert!(results[0].1.is_err());
        assert!(results[1].1.as_ref().unwrap_err().to_string().contains("missing"));
        assert_eq!(results[2].1.as_ref().unwrap().module_id.as_str(), "module-3");
    }
}
