//! Module dependency graph.
//!
//! Holds every module reached from the entry and the order they are emitted
//! in: a depth-first post-order, so each module comes after everything it
//! imports.

use crate::imports::Import;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Unique identifier for a module in the graph.
pub type ModuleId = usize;

/// A module in the dependency graph.
#[derive(Debug, Clone)]
pub struct Module {
    /// Absolute, canonical path.
    pub path: PathBuf,
    /// Source as read from disk.
    pub source: String,
    /// Imports found in the source (empty for non-script modules).
    pub imports: Vec<Import>,
    /// Modules this one statically imports, in source order.
    pub dependencies: Vec<ModuleId>,
}

impl Module {
    #[must_use]
    pub fn new(path: PathBuf, source: String, imports: Vec<Import>) -> Self {
        Self {
            path,
            source,
            imports,
            dependencies: Vec::new(),
        }
    }
}

/// The module dependency graph.
#[derive(Debug, Default)]
pub struct ModuleGraph {
    modules: Vec<Module>,
    path_to_id: HashMap<PathBuf, ModuleId>,
    order: Vec<ModuleId>,
}

impl ModuleGraph {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a module, returning its ID. The first module added is the entry.
    pub fn add(&mut self, module: Module) -> ModuleId {
        let id = self.modules.len();
        self.path_to_id.insert(module.path.clone(), id);
        self.modules.push(module);
        id
    }

    #[must_use]
    pub fn get(&self, id: ModuleId) -> Option<&Module> {
        self.modules.get(id)
    }

    #[must_use]
    pub fn id_by_path(&self, path: &Path) -> Option<ModuleId> {
        self.path_to_id.get(path).copied()
    }

    /// The entry module, if the graph is non-empty.
    #[must_use]
    pub fn entry(&self) -> Option<&Module> {
        self.modules.first()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Record an edge `from -> to`. Repeated edges are kept once.
    pub(crate) fn add_dependency(&mut self, from: ModuleId, to: ModuleId) {
        let deps = &mut self.modules[from].dependencies;
        if !deps.contains(&to) {
            deps.push(to);
        }
    }

    /// Mark `id` as finished: all of its dependencies are already in order.
    pub(crate) fn push_order(&mut self, id: ModuleId) {
        self.order.push(id);
    }

    /// Emit order: dependencies before dependents, entry last.
    #[must_use]
    pub fn order(&self) -> &[ModuleId] {
        &self.order
    }

    /// Emit order as paths.
    #[must_use]
    pub fn ordered_paths(&self) -> Vec<PathBuf> {
        self.order
            .iter()
            .map(|&id| self.modules[id].path.clone())
            .collect()
    }

    /// Modules in emit order.
    pub fn ordered_modules(&self) -> impl Iterator<Item = &Module> {
        self.order.iter().map(|&id| &self.modules[id])
    }

    /// Every file the graph was built from.
    pub fn files(&self) -> impl Iterator<Item = &Path> {
        self.modules.iter().map(|m| m.path.as_path())
    }

    pub fn iter(&self) -> impl Iterator<Item = (ModuleId, &Module)> {
        self.modules.iter().enumerate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn module(path: &str) -> Module {
        Module::new(PathBuf::from(path), String::new(), Vec::new())
    }

    #[test]
    fn test_empty_graph() {
        let graph = ModuleGraph::new();
        assert!(graph.is_empty());
        assert!(graph.entry().is_none());
        assert!(graph.order().is_empty());
    }

    #[test]
    fn test_add_and_lookup() {
        let mut graph = ModuleGraph::new();
        let a = graph.add(module("/p/a.js"));
        let b = graph.add(module("/p/b.js"));

        assert_eq!(graph.id_by_path(Path::new("/p/b.js")), Some(b));
        assert_eq!(graph.entry().unwrap().path, Path::new("/p/a.js"));
        assert_eq!(graph.len(), 2);

        graph.add_dependency(a, b);
        graph.add_dependency(a, b);
        assert_eq!(graph.get(a).unwrap().dependencies, vec![b]);
    }

    #[test]
    fn test_ordered_paths_follow_push_order() {
        let mut graph = ModuleGraph::new();
        let entry = graph.add(module("/p/index.js"));
        let dep = graph.add(module("/p/Main.elm"));
        graph.push_order(dep);
        graph.push_order(entry);

        assert_eq!(
            graph.ordered_paths(),
            vec![PathBuf::from("/p/Main.elm"), PathBuf::from("/p/index.js")]
        );
        assert_eq!(graph.files().count(), 2);
    }
}
