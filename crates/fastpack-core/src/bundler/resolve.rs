//! Import specifier resolution.
//!
//! Resolves import specifiers to absolute file paths.
//!
//! ## Order
//!
//! 1. A specifier with an extension that exists verbatim is used as-is.
//! 2. Each configured extension is appended in order (`""` is the exact path).
//! 3. A directory resolves through its `package.json` `main`, then `index`.
//! 4. Specifiers that are not relative or absolute are tried next to the
//!    importer first, then in each module directory (`node_modules`) found
//!    walking up from the importer.

use crate::config::Config;
use crate::error::BundleError;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing::trace;

/// Filesystem module resolver.
#[derive(Debug, Clone)]
pub struct Resolver {
    extensions: Vec<String>,
    module_directories: Vec<String>,
}

impl Resolver {
    #[must_use]
    pub fn new(extensions: Vec<String>, module_directories: Vec<String>) -> Self {
        Self {
            extensions,
            module_directories,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(
            config.resolvable_extensions.clone(),
            config.module_directories.clone(),
        )
    }

    /// Resolve `specifier` as imported from a file in `from_dir`.
    ///
    /// The returned path is canonical.
    pub fn resolve(&self, specifier: &str, from_dir: &Path) -> Result<PathBuf, BundleError> {
        let not_found = || BundleError::Resolution {
            specifier: specifier.to_string(),
            from: from_dir.to_path_buf(),
        };
        if specifier.is_empty() {
            return Err(not_found());
        }

        if let Some(found) = self.resolve_path(&from_dir.join(specifier)) {
            return canonical(&found);
        }

        if !is_path_like(specifier) {
            for dir in from_dir.ancestors() {
                for modules in &self.module_directories {
                    let candidate = dir.join(modules).join(specifier);
                    if let Some(found) = self.resolve_path(&candidate) {
                        return canonical(&found);
                    }
                }
            }
        }

        Err(not_found())
    }

    /// File first, then directory.
    fn resolve_path(&self, target: &Path) -> Option<PathBuf> {
        self.resolve_file(target)
            .or_else(|| self.resolve_directory(target))
    }

    fn resolve_file(&self, target: &Path) -> Option<PathBuf> {
        if target.extension().is_some() && target.is_file() {
            return Some(target.to_path_buf());
        }

        self.extensions.iter().find_map(|ext| {
            let candidate = with_suffix(target, ext);
            trace!(candidate = %candidate.display(), "probe");
            candidate.is_file().then_some(candidate)
        })
    }

    fn resolve_directory(&self, dir: &Path) -> Option<PathBuf> {
        if !dir.is_dir() {
            return None;
        }

        if let Some(main) = package_main(dir) {
            let main_path = dir.join(main);
            if let Some(found) = self
                .resolve_file(&main_path)
                .or_else(|| self.resolve_file(&main_path.join("index")))
            {
                return Some(found);
            }
        }

        self.resolve_file(&dir.join("index"))
    }
}

/// `./x`, `../x`, `.`, `..` or an absolute path.
fn is_path_like(specifier: &str) -> bool {
    specifier == "."
        || specifier == ".."
        || specifier.starts_with("./")
        || specifier.starts_with("../")
        || Path::new(specifier).is_absolute()
}

/// Append `suffix` to the full file name (`jquery.min` + `.js`), unlike
/// `Path::with_extension` which would replace `.min`.
fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// The `main` field of `dir/package.json`, if present and a string.
fn package_main(dir: &Path) -> Option<String> {
    let text = std::fs::read_to_string(dir.join("package.json")).ok()?;
    let json: serde_json::Value = serde_json::from_str(&text).ok()?;
    json.get("main")
        .and_then(serde_json::Value::as_str)
        .filter(|m| !m.is_empty())
        .map(str::to_string)
}

fn canonical(path: &Path) -> Result<PathBuf, BundleError> {
    dunce::canonicalize(path).map_err(|e| BundleError::io(path, e))
}
