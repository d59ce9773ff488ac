//! Raw learner interaction records.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{QaError, Result};
use crate::model::Grade;

/// Progress of one learner through a module.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LearnerProgress {
    pub learner_id: String,

    #[serde(default)]
    pub completed: bool,

    #[serde(default)]
    pub grade: Option<Grade>,

    #[serde(default)]
    pub minutes_spent: f64,
}

impl LearnerProgress {
    pub fn new(learner_id: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            completed: false,
            grade: None,
            minutes_spent: 0.0,
        }
    }

    pub fn completed(mut self, minutes_spent: f64) -> Self {
        self.completed = true;
        self.minutes_spent = minutes_spent;
        self
    }

    pub fn with_grade(mut self, grade: Grade) -> Self {
        self.grade = Some(grade);
        self
    }
}

/// Speaker of a tutoring message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
}

impl Message {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// A tutoring conversation with one learner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Conversation {
    pub learner_id: String,
    #[serde(default)]
    pub messages: Vec<Message>,
}

impl Conversation {
    pub fn new(learner_id: impl Into<String>) -> Self {
        Self {
            learner_id: learner_id.into(),
            messages: Vec::new(),
        }
    }

    pub fn with_message(mut self, message: Message) -> Self {
        self.messages.push(message);
        self
    }
}

/// The tutor's running summary of what a learner understands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySummary {
    pub learner_id: String,

    /// Free-form level such as `beginner`, `struggling`, or `proficient`.
    #[serde(default)]
    pub understanding_level: String,

    #[serde(default)]
    pub key_concepts: Vec<String>,
}

impl MemorySummary {
    /// Whether the tutor judged the learner to be having difficulty.
    pub fn is_struggling(&self) -> bool {
        matches!(
            self.understanding_level.trim().to_lowercase().as_str(),
            "beginner" | "struggling"
        )
    }
}

/// All interaction records collected for one module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InteractionLog {
    #[serde(default)]
    pub progress: Vec<LearnerProgress>,

    #[serde(default)]
    pub conversations: Vec<Conversation>,

    #[serde(default)]
    pub memory_summaries: Vec<MemorySummary>,
}

impl InteractionLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, progress: LearnerProgress) -> Self {
        self.progress.push(progress);
        self
    }

    pub fn with_conversation(mut self, conversation: Conversation) -> Self {
        self.conversations.push(conversation);
        self
    }

    pub fn with_memory_summary(mut self, summary: MemorySummary) -> Self {
        self.memory_summaries.push(summary);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.progress.is_empty() && self.conversations.is_empty() && self.memory_summaries.is_empty()
    }

    /// Append another log's records to this one.
    pub fn merge(&mut self, other: InteractionLog) {
        self.progress.extend(other.progress);
        self.conversations.extend(other.conversations);
        self.memory_summaries.extend(other.memory_summaries);
    }

    /// Load a log from a JSON file.
    pub fn load_json(path: &Path) -> Result<Self> {
        let file = File::open(path).map_err(|e| QaError::Io {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(serde_json::from_reader(file)?)
    }
}

/// Read learner progress rows from a CSV file.
///
/// Expected header: `learner_id,completed,grade,minutes_spent`. An empty
/// grade cell means no grade was recorded.
pub fn read_progress_csv(path: &Path) -> Result<Vec<LearnerProgress>> {
    let file = File::open(path).map_err(|e| QaError::Io {
        path: path.to_path_buf(),
        source: e,
    })?;
    read_progress_from(file)
}

/// Read learner progress rows from any CSV source.
pub fn read_progress_from<R: Read>(reader: R) -> Result<Vec<LearnerProgress>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut rows = Vec::new();
    for record in csv_reader.deserialize() {
        let row: LearnerProgress = record?;
        rows.push(row);
    }
    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_read_progress_csv() {
        let data = "learner_id,completed,grade,minutes_spent\n\
                    s1,true,B+,42.5\n\
                    s2,false,,10\n";
        let rows = read_progress_from(data.as_bytes()).unwrap();

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].grade, Some(Grade::BPlus));
        assert!(rows[0].completed);
        assert_eq!(rows[1].grade, None);
        assert_eq!(rows[1].minutes_spent, 10.0);
    }

    #[test]
    fn test_read_progress_csv_rejects_bad_grade() {
        let data = "learner_id,completed,grade,minutes_spent\ns1,true,E,5\n";
        let err = read_progress_from(data.as_bytes()).unwrap_err();
        assert!(matches!(err, QaError::Csv(_)));
    }

    #[test]
    fn test_log_json_shape() {
        let json = r#"{
            "progress": [{"learner_id": "s1", "completed": true, "grade": "A", "minutes_spent": 30}],
            "conversations": [{"learner_id": "s1", "messages": [
                {"role": "user", "content": "Is puellae nominative?"},
                {"role": "assistant", "content": "Not quite, it is genitive here."}
            ]}],
            "memory_summaries": [{"learner_id": "s1", "understanding_level": "Struggling", "key_concepts": ["genitive"]}]
        }"#;
        let log: InteractionLog = serde_json::from_str(json).unwrap();
        assert_eq!(log.conversations[0].messages[1].role, Role::Assistant);
        assert!(log.memory_summaries[0].is_struggling());
        assert!(!log.is_empty());
    }
}
