//! Import: turning validated units into deployable modules.

mod builder;

pub use builder::{ModuleBuilder, MAX_SUMMARY_CHARS};
