//! Config-driven bundler.
//!
//! Bundles an entry module and everything it statically imports into a
//! single output file.
//!
//! ## Usage
//!
//! ```ignore
//! use fastpack_core::{Bundler, Config};
//!
//! let config = Config::discover(&cwd, None)?;
//! let bundler = Bundler::new(Arc::new(config))?;
//! let output = bundler.bundle()?;
//! println!("wrote {}", output.path.display());
//! ```
//!
//! ## Architecture
//!
//! 1. **Resolution** - Resolve import specifiers to file paths
//! 2. **Selection** - Pick the first matching transform rule per file
//! 3. **Graph** - Depth-first walk from the entry, rejecting cycles
//! 4. **Transform** - Run the selected transform on every module
//! 5. **Emit** - Concatenate in graph order and write atomically
//!
//! Each call to [`Bundler::bundle`] is independent; nothing is cached
//! between builds.

mod emit;
mod graph;
mod resolve;
mod rules;
mod transform;
mod transforms;

pub use emit::{emit_bundle, render_bundle, BundleOutput, TransformedSources};
pub use graph::{Module, ModuleGraph, ModuleId};
pub use resolve::Resolver;
pub use rules::{match_subject, parse_loader, RuleSet, TransformOptions, TransformRule};
pub use transform::{Transform, TransformContext, TransformFailure, TransformRegistry};
pub use transforms::{ElmTransform, JsonTransform, RawTransform};

use crate::config::Config;
use crate::error::BundleError;
use crate::imports::scan_imports;
use fastpack_util::fs::read_utf8;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info};

/// Extensions whose sources are scanned for imports. Files without an
/// extension are scanned too; everything else is a leaf.
const SCRIPT_EXTENSIONS: &[&str] = &["js", "mjs", "cjs", "jsx"];

/// The main bundler.
#[derive(Debug, Clone)]
pub struct Bundler {
    config: Arc<Config>,
    resolver: Resolver,
    transforms: TransformRegistry,
}

impl Bundler {
    /// Bundler with the built-in transforms.
    pub fn new(config: Arc<Config>) -> Result<Self, BundleError> {
        Self::with_registry(config, TransformRegistry::with_builtins())
    }

    /// Bundler with a custom transform registry.
    ///
    /// Fails if a rule names a transform the registry does not have, so a
    /// typo in the config is reported before any file is read.
    pub fn with_registry(
        config: Arc<Config>,
        transforms: TransformRegistry,
    ) -> Result<Self, BundleError> {
        for (index, rule) in config.transform_rules.iter().enumerate() {
            if !transforms.contains(&rule.transform_id) {
                return Err(BundleError::invalid(format!(
                    "rule {index}: unknown transform '{}'",
                    rule.transform_id
                )));
            }
        }

        Ok(Self {
            resolver: Resolver::from_config(&config),
            config,
            transforms,
        })
    }

    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Resolve `specifier` as imported from a file in `from_dir`.
    pub fn resolve_module(&self, specifier: &str, from_dir: &Path) -> Result<PathBuf, BundleError> {
        self.resolver.resolve(specifier, from_dir)
    }

    /// The rule that applies to `path`, or `None` for pass-through.
    #[must_use]
    pub fn select_transform(&self, path: &Path) -> Option<&TransformRule> {
        self.config
            .transform_rules
            .select(&match_subject(&self.config.root, path))
    }

    /// Resolve the configured entry module.
    pub fn resolve_entry(&self) -> Result<PathBuf, BundleError> {
        let entry = &self.config.entry_path;
        let dir = entry.parent().unwrap_or(&self.config.root);
        let name = entry
            .file_name()
            .map(|n| format!("./{}", n.to_string_lossy()))
            .unwrap_or_default();
        self.resolver.resolve(&name, dir)
    }

    /// Walk the static import graph from the entry.
    ///
    /// Imports are followed depth-first in source order and modules are
    /// recorded in post-order, so [`ModuleGraph::order`] lists dependencies
    /// before dependents. An import that leads back to a module still being
    /// visited is a [`BundleError::CyclicDependency`].
    pub fn build_graph(&self) -> Result<ModuleGraph, BundleError> {
        struct Frame {
            id: ModuleId,
            deps: Vec<PathBuf>,
            next: usize,
        }

        #[derive(Clone, Copy, PartialEq, Eq)]
        enum Mark {
            Visiting,
            Done,
        }

        let entry = self.resolve_entry()?;
        let mut graph = ModuleGraph::new();
        let mut marks: Vec<Mark> = Vec::new();

        let (entry_id, entry_deps) = self.load_module(&mut graph, entry)?;
        marks.push(Mark::Visiting);
        let mut stack = vec![Frame {
            id: entry_id,
            deps: entry_deps,
            next: 0,
        }];

        while let Some(frame) = stack.last_mut() {
            let Some(dep_path) = frame.deps.get(frame.next).cloned() else {
                let id = frame.id;
                marks[id] = Mark::Done;
                graph.push_order(id);
                stack.pop();
                continue;
            };
            frame.next += 1;
            let from = frame.id;

            if let Some(dep_id) = graph.id_by_path(&dep_path) {
                graph.add_dependency(from, dep_id);
                if marks[dep_id] == Mark::Visiting {
                    let start = stack.iter().position(|f| f.id == dep_id).unwrap_or(0);
                    let mut cycle: Vec<PathBuf> = stack[start..]
                        .iter()
                        .filter_map(|f| graph.get(f.id).map(|m| m.path.clone()))
                        .collect();
                    cycle.push(dep_path);
                    return Err(BundleError::CyclicDependency { cycle });
                }
                continue;
            }

            let (dep_id, deps) = self.load_module(&mut graph, dep_path)?;
            marks.push(Mark::Visiting);
            graph.add_dependency(from, dep_id);
            stack.push(Frame {
                id: dep_id,
                deps,
                next: 0,
            });
        }

        debug!(modules = graph.len(), "Built module graph");
        Ok(graph)
    }

    /// Read a module, scan it, and resolve its static imports.
    ///
    /// Returns the new module id and its resolved dependencies in source
    /// order, duplicates removed.
    fn load_module(
        &self,
        graph: &mut ModuleGraph,
        path: PathBuf,
    ) -> Result<(ModuleId, Vec<PathBuf>), BundleError> {
        let source = read_utf8(&path).map_err(|e| BundleError::io(&path, e))?;

        let imports = if is_script(&path) {
            scan_imports(&source)
        } else {
            Vec::new()
        };

        let dir = path.parent().unwrap_or(&self.config.root);
        let mut deps: Vec<PathBuf> = Vec::new();
        for import in imports.iter().filter(|i| i.kind.is_static()) {
            let resolved = self.resolver.resolve(&import.specifier, dir)?;
            debug!(
                from = %path.display(),
                specifier = %import.specifier,
                resolved = %resolved.display(),
                "Resolved import"
            );
            if !deps.contains(&resolved) {
                deps.push(resolved);
            }
        }

        let id = graph.add(Module::new(path, source, imports));
        Ok((id, deps))
    }

    /// Run the selected transform over every module in the graph.
    ///
    /// Stops at the first failure; nothing is written here.
    pub fn apply_transforms(&self, graph: &ModuleGraph) -> Result<TransformedSources, BundleError> {
        let mut out = TransformedSources::with_capacity(graph.len());

        for module in graph.ordered_modules() {
            let transformed = match self.select_transform(&module.path) {
                None => module.source.clone(),
                Some(rule) => {
                    let transform = self.transforms.get(&rule.transform_id).ok_or_else(|| {
                        BundleError::invalid(format!("unknown transform '{}'", rule.transform_id))
                    })?;
                    let ctx = TransformContext {
                        path: &module.path,
                        root: &self.config.root,
                        options: &rule.transform_options,
                    };
                    debug!(path = %module.path.display(), transform = %rule.transform_id, "Transforming");
                    transform
                        .transform(&module.source, &ctx)
                        .map_err(|failure| BundleError::Transform {
                            path: module.path.clone(),
                            transform: rule.transform_id.clone(),
                            message: failure.message,
                        })?
                }
            };
            out.insert(module.path.clone(), transformed);
        }

        Ok(out)
    }

    /// Paths outside the graph that the selected transforms depend on, such
    /// as the source directories of an Elm project. Sorted and deduplicated.
    #[must_use]
    pub fn watch_paths(&self, graph: &ModuleGraph) -> Vec<PathBuf> {
        let mut paths = BTreeSet::new();
        for module in graph.ordered_modules() {
            let Some(rule) = self.select_transform(&module.path) else {
                continue;
            };
            let Some(transform) = self.transforms.get(&rule.transform_id) else {
                continue;
            };
            let ctx = TransformContext {
                path: &module.path,
                root: &self.config.root,
                options: &rule.transform_options,
            };
            paths.extend(transform.watch_paths(&ctx));
        }
        paths.into_iter().collect()
    }

    /// Full pipeline: graph, transforms, atomic emit.
    pub fn bundle(&self) -> Result<BundleOutput, BundleError> {
        let graph = self.build_graph()?;
        let sources = self.apply_transforms(&graph)?;
        let mut output =
            emit_bundle(&graph.ordered_paths(), &sources, &self.config.output_file())?;
        output.watch_paths = self.watch_paths(&graph);

        info!(
            entry = %graph.entry().map(|m| m.path.display().to_string()).unwrap_or_default(),
            modules = output.modules.len(),
            bytes = output.size_bytes,
            hash = %output.hash,
            "Bundle written to {}",
            output.path.display()
        );
        Ok(output)
    }
}

fn is_script(path: &Path) -> bool {
    match path.extension().and_then(|e| e.to_str()) {
        None => true,
        Some(ext) => SCRIPT_EXTENSIONS.contains(&ext),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::{tempdir, TempDir};

    fn project(files: &[(&str, &str)], rules: &str) -> (TempDir, Bundler) {
        let dir = tempdir().unwrap();
        for (name, contents) in files {
            let path = dir.path().join(name);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(path, contents).unwrap();
        }
        let text = format!(
            r#"{{
                "entry": "./index.js",
                "output": {{ "path": "dist", "filename": "bundle.js" }},
                "module": {{ "rules": [{rules}] }},
                "resolve": {{ "extensions": ["", ".js", ".elm"] }}
            }}"#
        );
        let root = dunce::canonicalize(dir.path()).unwrap();
        let config = Config::from_json(&text, &root, &root.join("fastpack.config.json")).unwrap();
        let bundler = Bundler::new(Arc::new(config)).unwrap();
        (dir, bundler)
    }

    fn names(graph: &ModuleGraph) -> Vec<String> {
        graph
            .ordered_paths()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect()
    }

    #[test]
    fn test_graph_order_dependencies_first() {
        let (_dir, bundler) = project(
            &[
                ("index.js", "import a from './a';\nimport b from './b';\n"),
                ("a.js", "import c from './c';\n"),
                ("b.js", "import c from './c';\n"),
                ("c.js", "export default 1;\n"),
            ],
            "",
        );
        let graph = bundler.build_graph().unwrap();
        assert_eq!(names(&graph), vec!["c.js", "a.js", "b.js", "index.js"]);
    }

    #[test]
    fn test_cycle_detected_with_chain() {
        let (_dir, bundler) = project(
            &[
                ("index.js", "require('./a');\n"),
                ("a.js", "require('./b');\n"),
                ("b.js", "require('./a');\n"),
            ],
            "",
        );
        match bundler.build_graph().unwrap_err() {
            BundleError::CyclicDependency { cycle } => {
                let names: Vec<_> = cycle
                    .iter()
                    .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
                    .collect();
                assert_eq!(names, vec!["a.js", "b.js", "a.js"]);
            }
            other => panic!("expected cycle, got {other}"),
        }
    }

    #[test]
    fn test_self_import_is_cycle() {
        let (_dir, bundler) = project(&[("index.js", "import './index';\n")], "");
        assert!(matches!(
            bundler.build_graph(),
            Err(BundleError::CyclicDependency { .. })
        ));
    }

    #[test]
    fn test_non_script_modules_are_leaves() {
        let (_dir, bundler) = project(
            &[
                ("index.js", "var Elm = require('./Main');\n"),
                ("Main.elm", "import Html exposing (text)\nimport \"./not-a-path\"\n"),
            ],
            r#"{ "test": "\\.elm$", "transform": "raw" }"#,
        );
        let graph = bundler.build_graph().unwrap();
        assert_eq!(names(&graph), vec!["Main.elm", "index.js"]);
        assert!(graph.get(1).unwrap().imports.is_empty());
    }

    #[test]
    fn test_watch_paths_include_elm_source_directories() {
        let (dir, bundler) = project(
            &[
                ("index.js", "var Elm = require('./src/Main');\n"),
                ("src/Main.elm", "module Main exposing (main)\nimport Page\n"),
                ("src/Page.elm", "module Page exposing (view)\n"),
                ("elm.json", r#"{ "source-directories": ["src"] }"#),
            ],
            r#"{ "test": "\\.elm$", "transform": "elm" }"#,
        );
        let root = dunce::canonicalize(dir.path()).unwrap();
        let graph = bundler.build_graph().unwrap();

        assert!(graph.id_by_path(&root.join("src/Page.elm")).is_none());
        assert_eq!(bundler.watch_paths(&graph), vec![root.join("src")]);
    }

    #[test]
    fn test_non_utf8_source_is_io_error_naming_file() {
        let (dir, bundler) = project(&[("index.js", "require('./bin');\n")], "");
        fs::write(dir.path().join("bin.js"), [b'x', 0xFF, 0xFE]).unwrap();

        let err = bundler.build_graph().unwrap_err();
        assert_eq!(err.code(), crate::codes::IO_ERROR);
        assert!(err.path().unwrap().ends_with("bin.js"));
        assert!(err.to_string().contains("invalid UTF-8"));
    }

    #[test]
    fn test_dynamic_imports_not_followed() {
        let (_dir, bundler) = project(&[("index.js", "import('./missing-lazy');\n")], "");
        let graph = bundler.build_graph().unwrap();
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn test_missing_import_is_resolution_error() {
        let (_dir, bundler) = project(&[("index.js", "import x from './nope';\n")], "");
        let err = bundler.build_graph().unwrap_err();
        assert_eq!(err.code(), crate::codes::RESOLUTION_ERROR);
    }

    #[test]
    fn test_unknown_transform_rejected_at_construction() {
        let dir = tempdir().unwrap();
        let text = r#"{
            "entry": "index.js",
            "output": { "path": "dist", "filename": "bundle.js" },
            "module": { "rules": [ { "test": "\\.ts$", "transform": "typescript" } ] }
        }"#;
        let config = Config::from_json(text, dir.path(), &dir.path().join("c.json")).unwrap();
        let err = Bundler::new(Arc::new(config)).unwrap_err();
        assert!(err.to_string().contains("typescript"));
    }

    #[test]
    fn test_select_transform_uses_relative_subject() {
        let (dir, bundler) = project(
            &[("index.js", "")],
            r#"{ "test": "^src/.*\\.elm$", "exclude": ["elm-stuff"], "transform": "raw" }"#,
        );
        let root = dunce::canonicalize(dir.path()).unwrap();
        assert!(bundler.select_transform(&root.join("src/Main.elm")).is_some());
        assert!(bundler
            .select_transform(&root.join("src/elm-stuff/Dep.elm"))
            .is_none());
        assert!(bundler.select_transform(&root.join("index.js")).is_none());
    }

    #[test]
    fn test_transform_failure_carries_path() {
        let (_dir, bundler) = project(
            &[("index.js", "require('./data.json');\n"), ("data.json", "{ broken")],
            r#"{ "test": "\\.json$", "transform": "json" }"#,
        );
        let graph = bundler.build_graph().unwrap();
        match bundler.apply_transforms(&graph).unwrap_err() {
            BundleError::Transform { path, transform, .. } => {
                assert!(path.ends_with("data.json"));
                assert_eq!(transform, "json");
            }
            other => panic!("expected transform error, got {other}"),
        }
    }
}
