//! Bundle output emission.
//!
//! The bundle is the transformed sources concatenated byte-for-byte in graph
//! order. It is written with [`atomic_write`], so the previous bundle stays in
//! place until the new one is complete.

use crate::error::BundleError;
use fastpack_util::fs::atomic_write;
use fastpack_util::hash::short_hash;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Transformed source per module path.
pub type TransformedSources = HashMap<PathBuf, String>;

/// What was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BundleOutput {
    /// Bundle file path.
    pub path: PathBuf,
    /// Modules included, in emit order.
    pub modules: Vec<PathBuf>,
    pub size_bytes: usize,
    /// Short BLAKE3 digest of the bundle contents.
    pub hash: String,
    /// Paths outside the graph that transforms depend on.
    pub watch_paths: Vec<PathBuf>,
}

/// Concatenate transformed sources in `order`.
///
/// Every path in `order` must have an entry in `sources`.
pub fn render_bundle(
    order: &[PathBuf],
    sources: &TransformedSources,
) -> Result<String, BundleError> {
    let capacity = order
        .iter()
        .filter_map(|p| sources.get(p))
        .map(String::len)
        .sum();
    let mut code = String::with_capacity(capacity);
    for path in order {
        let source = sources.get(path).ok_or_else(|| {
            BundleError::Internal(format!("no transformed source for {}", path.display()))
        })?;
        code.push_str(source);
    }
    Ok(code)
}

/// Render the bundle and atomically write it to `out_file`.
pub fn emit_bundle(
    order: &[PathBuf],
    sources: &TransformedSources,
    out_file: &Path,
) -> Result<BundleOutput, BundleError> {
    let code = render_bundle(order, sources)?;
    atomic_write(out_file, code.as_bytes()).map_err(|e| BundleError::io(out_file, e))?;

    let hash = short_hash(code.as_bytes());
    debug!(path = %out_file.display(), bytes = code.len(), %hash, "Wrote bundle");

    Ok(BundleOutput {
        path: out_file.to_path_buf(),
        modules: order.to_vec(),
        size_bytes: code.len(),
        hash,
        watch_paths: Vec::new(),
    })
}
