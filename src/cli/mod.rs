//! CLI command handlers

pub mod commands;

pub use commands::{grades, logs, prepare, project_root, PrepareOverrides};
