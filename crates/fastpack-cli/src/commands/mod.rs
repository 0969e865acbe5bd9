//! Subcommand implementations.
//!
//! Every command that reports a result prints either one JSON object on
//! stdout (`--json`) or human-readable lines, and exits with status 1 on
//! failure.

pub mod build;
pub mod graph;
pub mod resolve;
pub mod serve;

use fastpack_core::{BundleError, Bundler, Config};
use serde::Serialize;
use std::path::Path;
use std::sync::Arc;

/// Error object shared by all JSON outputs.
#[derive(Debug, Serialize)]
pub struct ErrorJson {
    pub code: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
}

impl From<&BundleError> for ErrorJson {
    fn from(err: &BundleError) -> Self {
        Self {
            code: err.code(),
            message: err.to_string(),
            path: err.path().map(|p| p.display().to_string()),
        }
    }
}

/// Discover the config and construct a bundler with the built-in transforms.
pub fn load_bundler(cwd: &Path, config: Option<&Path>) -> Result<Bundler, BundleError> {
    let config = Config::discover(cwd, config)?;
    Bundler::new(Arc::new(config))
}

/// Human-readable error on stderr.
pub fn print_error(err: &BundleError) {
    eprintln!("error: {err}");
    if let Some(path) = err.path() {
        eprintln!("  at {}", path.display());
    }
}

/// `path` relative to `root` when inside it, for display.
pub fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
