//! Workspace persistence.

mod persistence;
mod workspace;

pub use persistence::{list_dirs, list_json_files, load_json, save_json};
pub use workspace::Workspace;
