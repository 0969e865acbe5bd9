use crate::codes;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Every way a build can fail.
///
/// All variants are fatal to the current build. Nothing is written to the
/// output path once one of these has been produced.
#[derive(Error, Debug)]
pub enum BundleError {
    #[error("Failed to parse config at {}: {source}", .path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid config: {message}")]
    ConfigInvalid { message: String },

    #[error("No config file found in {}", .dir.display())]
    ConfigNotFound { dir: PathBuf },

    #[error("Cannot resolve '{specifier}' from {}", .from.display())]
    Resolution { specifier: String, from: PathBuf },

    #[error("Cyclic dependency: {}", format_cycle(.cycle))]
    CyclicDependency { cycle: Vec<PathBuf> },

    #[error("Transform '{transform}' failed for {}: {message}", .path.display())]
    Transform {
        path: PathBuf,
        transform: String,
        message: String,
    },

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl BundleError {
    #[must_use]
    pub fn invalid(message: impl Into<String>) -> Self {
        Self::ConfigInvalid {
            message: message.into(),
        }
    }

    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Stable machine-readable code, see [`crate::codes`].
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::ConfigParse { .. } => codes::CONFIG_PARSE_ERROR,
            Self::ConfigInvalid { .. } => codes::CONFIG_INVALID,
            Self::ConfigNotFound { .. } => codes::CONFIG_NOT_FOUND,
            Self::Resolution { .. } => codes::RESOLUTION_ERROR,
            Self::CyclicDependency { .. } => codes::CYCLIC_DEPENDENCY,
            Self::Transform { .. } => codes::TRANSFORM_ERROR,
            Self::Io { .. } => codes::IO_ERROR,
            Self::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// The file most closely associated with the failure, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            Self::ConfigParse { path, .. } | Self::Transform { path, .. } | Self::Io { path, .. } => {
                Some(path)
            }
            Self::ConfigNotFound { dir } => Some(dir),
            Self::Resolution { from, .. } => Some(from),
            Self::CyclicDependency { cycle } => cycle.first().map(PathBuf::as_path),
            Self::ConfigInvalid { .. } | Self::Internal(_) => None,
        }
    }
}

fn format_cycle(cycle: &[PathBuf]) -> String {
    cycle
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(" -> ")
}
