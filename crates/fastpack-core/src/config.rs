//! Bundle configuration: on-disk schema, discovery and validation.
//!
//! A project is described by one JSON file, `fastpack.config.json` by default:
//!
//! ```json
//! {
//!   "entry": "./src/static/index.js",
//!   "output": { "path": "./dist", "filename": "bundle.js", "publicPath": "/static/" },
//!   "module": {
//!     "rules": [
//!       { "test": "\\.elm$", "exclude": ["elm-stuff", "node_modules"],
//!         "loader": "elm-webpack?verbose=true&warn=true" }
//!     ]
//!   },
//!   "resolve": { "extensions": ["", ".js", ".elm"] },
//!   "devServer": { "port": 8080 }
//! }
//! ```
//!
//! Unknown fields are rejected. Relative paths are taken relative to the
//! directory holding the config file, which also becomes the project root.

use crate::bundler::{parse_loader, RuleSet, TransformOptions, TransformRule};
use crate::error::BundleError;
use regex_lite::Regex;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file names in discovery order.
pub const CONFIG_FILES: &[&str] = &["fastpack.config.json", "fastpack.json"];

/// Default coalescing window for file change bursts.
pub const DEFAULT_DEBOUNCE_MS: u64 = 50;

const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 8080;

/// Validated, immutable bundle configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Project root: directory of the config file.
    pub root: PathBuf,
    /// Absolute path of the entry module as declared (not yet resolved).
    pub entry_path: PathBuf,
    /// Absolute output directory.
    pub output_path: PathBuf,
    /// URL prefix the output directory is served under. Empty or `/.../`.
    pub output_public_path: String,
    /// Bundle file name inside `output_path`.
    pub output_filename: String,
    pub transform_rules: RuleSet,
    /// Probe order for extensionless specifiers; `""` means the exact path.
    pub resolvable_extensions: Vec<String>,
    /// Directory names searched upwards for non-relative specifiers.
    pub module_directories: Vec<String>,
    pub dev_server: DevServerConfig,
}

/// Settings for `fastpack serve`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevServerConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub debounce: Duration,
}

impl Default for DevServerConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
        }
    }
}

impl Config {
    /// Find a config file in `dir`.
    #[must_use]
    pub fn find(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load the config at `explicit` (relative to `cwd`), or discover one in `cwd`.
    pub fn discover(cwd: &Path, explicit: Option<&Path>) -> Result<Self, BundleError> {
        let path = match explicit {
            Some(p) if p.is_absolute() => p.to_path_buf(),
            Some(p) => cwd.join(p),
            None => Self::find(cwd).ok_or_else(|| BundleError::ConfigNotFound {
                dir: cwd.to_path_buf(),
            })?,
        };
        Self::load(&path)
    }

    /// Read and validate a config file.
    pub fn load(path: &Path) -> Result<Self, BundleError> {
        let text = std::fs::read_to_string(path).map_err(|e| BundleError::io(path, e))?;
        let path = dunce::canonicalize(path).map_err(|e| BundleError::io(path, e))?;
        let root = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        Self::from_json(&text, &root, &path)
    }

    /// Parse config text. `root` anchors relative paths, `origin` names the
    /// source in error messages.
    pub fn from_json(text: &str, root: &Path, origin: &Path) -> Result<Self, BundleError> {
        let file: ConfigFile =
            serde_json::from_str(text).map_err(|source| BundleError::ConfigParse {
                path: origin.to_path_buf(),
                source,
            })?;
        file.validate(root)
    }

    /// Same config with dev mode switched on or off.
    #[must_use]
    pub fn with_dev_server(mut self, enabled: bool) -> Self {
        self.dev_server.enabled = enabled;
        self
    }

    #[must_use]
    pub fn dev_server_enabled(&self) -> bool {
        self.dev_server.enabled
    }

    /// `output_path/output_filename`.
    #[must_use]
    pub fn output_file(&self) -> PathBuf {
        self.output_path.join(&self.output_filename)
    }

    /// URL path the bundle is served at, e.g. `/static/bundle.js`.
    #[must_use]
    pub fn bundle_url(&self) -> String {
        let prefix = if self.output_public_path.is_empty() {
            "/"
        } else {
            self.output_public_path.as_str()
        };
        format!("{prefix}{}", self.output_filename)
    }
}

// ---------------------------------------------------------------------------
// On-disk schema
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct ConfigFile {
    entry: String,
    output: OutputDecl,
    #[serde(default)]
    module: ModuleDecl,
    #[serde(default)]
    resolve: ResolveDecl,
    #[serde(default)]
    dev_server: Option<DevServerDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct OutputDecl {
    path: String,
    filename: String,
    #[serde(default)]
    public_path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
struct ModuleDecl {
    #[serde(default)]
    rules: Vec<RuleDecl>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleDecl {
    test: String,
    #[serde(default)]
    exclude: Vec<String>,
    #[serde(default)]
    transform: Option<String>,
    #[serde(default)]
    options: TransformOptions,
    #[serde(default)]
    loader: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ResolveDecl {
    #[serde(default = "default_extensions")]
    extensions: Vec<String>,
    #[serde(default = "default_modules")]
    modules: Vec<String>,
}

impl Default for ResolveDecl {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
            modules: default_modules(),
        }
    }
}

fn default_extensions() -> Vec<String> {
    vec![String::new(), ".js".to_string()]
}

fn default_modules() -> Vec<String> {
    vec!["node_modules".to_string()]
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
struct DevServerDecl {
    #[serde(default)]
    enabled: bool,
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,
    #[serde(default = "default_debounce_ms")]
    debounce_ms: u64,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_debounce_ms() -> u64 {
    DEFAULT_DEBOUNCE_MS
}

impl ConfigFile {
    fn validate(self, root: &Path) -> Result<Config, BundleError> {
        if self.entry.trim().is_empty() {
            return Err(BundleError::invalid("`entry` must not be empty"));
        }
        if self.output.path.trim().is_empty() {
            return Err(BundleError::invalid("`output.path` must not be empty"));
        }
        let filename = self.output.filename.trim();
        if filename.is_empty()
            || filename.contains(['/', '\\'])
            || filename == "."
            || filename == ".."
        {
            return Err(BundleError::invalid(format!(
                "`output.filename` must be a plain file name, got '{}'",
                self.output.filename
            )));
        }

        for ext in &self.resolve.extensions {
            if !ext.is_empty() && !ext.starts_with('.') {
                return Err(BundleError::invalid(format!(
                    "`resolve.extensions` entries must be empty or start with '.', got '{ext}'"
                )));
            }
        }

        let rules = self
            .module
            .rules
            .into_iter()
            .enumerate()
            .map(|(index, decl)| decl.into_rule(index))
            .collect::<Result<Vec<_>, _>>()?;

        let dev_server = self.dev_server.map_or_else(DevServerConfig::default, |d| {
            DevServerConfig {
                enabled: d.enabled,
                host: d.host,
                port: d.port,
                debounce: Duration::from_millis(d.debounce_ms),
            }
        });

        Ok(Config {
            root: root.to_path_buf(),
            entry_path: root.join(self.entry.trim()),
            output_path: root.join(self.output.path.trim()),
            output_public_path: normalize_public_path(&self.output.public_path),
            output_filename: filename.to_string(),
            transform_rules: RuleSet::new(rules),
            resolvable_extensions: self.resolve.extensions,
            module_directories: self.resolve.modules,
            dev_server,
        })
    }
}

impl RuleDecl {
    fn into_rule(self, index: usize) -> Result<TransformRule, BundleError> {
        let (transform_id, transform_options) = match (self.transform, self.loader) {
            (Some(id), None) => (id, self.options),
            (None, Some(loader)) => {
                if !self.options.is_empty() {
                    return Err(BundleError::invalid(format!(
                        "rule {index}: pass options in the `loader` query or use `transform`, not both"
                    )));
                }
                parse_loader(&loader)
            }
            (Some(_), Some(_)) => {
                return Err(BundleError::invalid(format!(
                    "rule {index}: set either `transform` or `loader`, not both"
                )))
            }
            (None, None) => {
                return Err(BundleError::invalid(format!(
                    "rule {index}: missing `transform` (or `loader`)"
                )))
            }
        };
        if transform_id.is_empty() {
            return Err(BundleError::invalid(format!(
                "rule {index}: transform id must not be empty"
            )));
        }

        let compile = |source: &str, field: &str| {
            Regex::new(source).map_err(|e| {
                BundleError::invalid(format!("rule {index}: invalid `{field}` regex '{source}': {e}"))
            })
        };
        let pattern = compile(&self.test, "test")?;
        let exclude_patterns = self
            .exclude
            .iter()
            .map(|source| compile(source, "exclude"))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(TransformRule {
            pattern,
            exclude_patterns,
            transform_id,
            transform_options,
        })
    }
}

/// `""` and `"/"` stay as-is; anything else gets exactly one leading and trailing `/`.
fn normalize_public_path(raw: &str) -> String {
    let trimmed = raw.trim().trim_matches('/');
    if trimmed.is_empty() {
        if raw.trim().is_empty() {
            String::new()
        } else {
            "/".to_string()
        }
    } else {
        format!("/{trimmed}/")
    }
}
