//! The four collaborators the loop drives, and their implementations.
//!
//! - [`HttpCollaborators`]: a remote service speaking JSON over HTTP
//! - [`LocalCollaborators`]: the built-in engine over a local [`Workspace`](crate::store::Workspace)
//! - [`ScriptedCollaborators`]: deterministic answers for tests and dry runs

mod http;
mod local;
mod mock;
mod provider;

pub use http::{
    classify_status, match_batch_entries, BatchImportEntry, FeedbackResponse, HttpCollaborators,
    HttpConfig, ValidateResponse, ENV_API_TOKEN, ENV_COLLABORATOR_URL,
};
pub use local::LocalCollaborators;
pub use mock::{Call, ScriptedCollaborators};
pub use provider::{Collaborators, FeedbackCollector, Importer, Refiner, Validator};
