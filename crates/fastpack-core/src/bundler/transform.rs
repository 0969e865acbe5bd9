//! Transform registry.
//!
//! A transform turns the source text of one file into script text, e.g.
//! compiling an Elm module to JavaScript. Rules in the config refer to
//! transforms by id; the registry maps those ids to implementations.
//!
//! ## Example
//!
//! ```ignore
//! use fastpack_core::bundler::{TransformContext, TransformFailure, TransformRegistry};
//!
//! let registry = TransformRegistry::with_builtins().register(
//!     "upper",
//!     |source: &str, _ctx: &TransformContext<'_>| -> Result<String, TransformFailure> {
//!         Ok(source.to_uppercase())
//!     },
//! );
//! ```

use super::rules::TransformOptions;
use super::transforms::{ElmTransform, JsonTransform, RawTransform};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

/// Why a transform rejected a file.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{message}")]
pub struct TransformFailure {
    pub message: String,
}

impl TransformFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<std::io::Error> for TransformFailure {
    fn from(err: std::io::Error) -> Self {
        Self::new(err.to_string())
    }
}

/// What a transform knows about the file it is working on.
#[derive(Debug, Clone, Copy)]
pub struct TransformContext<'a> {
    /// Absolute, canonical path of the module.
    pub path: &'a Path,
    /// Project root.
    pub root: &'a Path,
    /// Options from the matching rule.
    pub options: &'a TransformOptions,
}

impl TransformContext<'_> {
    /// Boolean option: missing is `false`; `true`/`1`/`yes`/empty are true,
    /// `false`/`0`/`no` false, anything else an error.
    pub fn flag(&self, key: &str) -> Result<bool, TransformFailure> {
        match self.options.get(key).map(|v| v.trim().to_ascii_lowercase()) {
            None => Ok(false),
            Some(v) if v.is_empty() || v == "true" || v == "1" || v == "yes" => Ok(true),
            Some(v) if v == "false" || v == "0" || v == "no" => Ok(false),
            Some(v) => Err(TransformFailure::new(format!(
                "option '{key}' expects a boolean, got '{v}'"
            ))),
        }
    }

    /// Reject options this transform does not understand.
    pub fn expect_only(&self, known: &[&str]) -> Result<(), TransformFailure> {
        match self.options.keys().find(|k| !known.contains(&k.as_str())) {
            Some(unknown) => Err(TransformFailure::new(format!(
                "unknown option '{unknown}' (expected one of: {})",
                known.join(", ")
            ))),
            None => Ok(()),
        }
    }
}

/// A source-to-source transform.
pub trait Transform: Send + Sync {
    fn transform(&self, source: &str, ctx: &TransformContext<'_>) -> Result<String, TransformFailure>;

    /// Files or directories outside the module graph that the output for
    /// `ctx.path` depends on. A change under any of them calls for a rebuild.
    fn watch_paths(&self, _ctx: &TransformContext<'_>) -> Vec<PathBuf> {
        Vec::new()
    }
}

impl<F> Transform for F
where
    F: Fn(&str, &TransformContext<'_>) -> Result<String, TransformFailure> + Send + Sync,
{
    fn transform(&self, source: &str, ctx: &TransformContext<'_>) -> Result<String, TransformFailure> {
        self(source, ctx)
    }
}

/// Transform implementations keyed by id.
#[derive(Clone, Default)]
pub struct TransformRegistry {
    transforms: HashMap<String, Arc<dyn Transform>>,
}

impl std::fmt::Debug for TransformRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut ids: Vec<_> = self.transforms.keys().collect();
        ids.sort();
        f.debug_struct("TransformRegistry").field("ids", &ids).finish()
    }
}

impl TransformRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in transforms and their webpack-style aliases.
    #[must_use]
    pub fn with_builtins() -> Self {
        let elm: Arc<dyn Transform> = Arc::new(ElmTransform);
        let raw: Arc<dyn Transform> = Arc::new(RawTransform);
        let json: Arc<dyn Transform> = Arc::new(JsonTransform);

        let mut registry = Self::new();
        for id in ["elm", "elm-webpack", "elm-webpack-loader"] {
            registry.insert(id, Arc::clone(&elm));
        }
        for id in ["raw", "raw-loader", "text"] {
            registry.insert(id, Arc::clone(&raw));
        }
        for id in ["json", "json-loader"] {
            registry.insert(id, Arc::clone(&json));
        }
        registry
    }

    /// Add or replace a transform.
    #[must_use]
    pub fn register(mut self, id: impl Into<String>, transform: impl Transform + 'static) -> Self {
        self.insert(id, Arc::new(transform));
        self
    }

    fn insert(&mut self, id: impl Into<String>, transform: Arc<dyn Transform>) {
        self.transforms.insert(id.into(), transform);
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Arc<dyn Transform>> {
        self.transforms.get(id)
    }

    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.transforms.contains_key(id)
    }
}
