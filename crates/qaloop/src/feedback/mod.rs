//! Learner feedback: interaction records, analytics and refinement policy.

mod analysis;
mod policy;
mod records;

pub use analysis::{FeedbackAnalyzer, GENERAL_UNDERSTANDING};
pub use policy::{derive_instructions, DegradationPolicy};
pub use records::{
    read_progress_csv, read_progress_from, Conversation, InteractionLog, LearnerProgress,
    MemorySummary, Message, Role,
};
