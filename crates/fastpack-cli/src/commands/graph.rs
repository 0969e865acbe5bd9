//! `fastpack graph` command implementation.
//!
//! Prints the modules in bundle order without transforming or writing
//! anything.

use super::{display_relative, load_bundler, print_error, ErrorJson};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct GraphResultJson {
    ok: bool,
    modules: Vec<GraphModuleJson>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

#[derive(Serialize)]
struct GraphModuleJson {
    path: String,
    /// `null` for pass-through modules.
    transform: Option<String>,
    /// Resolved static dependencies, as paths.
    dependencies: Vec<String>,
}

/// Run the graph command.
pub fn run(cwd: &Path, config: Option<&Path>, json: bool) -> Result<()> {
    let result = load_bundler(cwd, config).and_then(|bundler| {
        let graph = bundler.build_graph()?;
        let modules = graph
            .ordered_modules()
            .map(|module| GraphModuleJson {
                path: module.path.display().to_string(),
                transform: bundler
                    .select_transform(&module.path)
                    .map(|rule| rule.transform_id.clone()),
                dependencies: module
                    .dependencies
                    .iter()
                    .filter_map(|&id| graph.get(id))
                    .map(|dep| dep.path.display().to_string())
                    .collect(),
            })
            .collect::<Vec<_>>();
        Ok((bundler.config().root.clone(), modules))
    });

    match result {
        Ok((root, modules)) => {
            if json {
                let json_result = GraphResultJson {
                    ok: true,
                    modules,
                    error: None,
                };
                println!("{}", serde_json::to_string(&json_result).into_diagnostic()?);
            } else {
                for (index, module) in modules.iter().enumerate() {
                    println!(
                        "  {:>3}  {}  [{}]",
                        index + 1,
                        display_relative(&root, Path::new(&module.path)),
                        module.transform.as_deref().unwrap_or("-")
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let json_result = GraphResultJson {
                    ok: false,
                    modules: Vec::new(),
                    error: Some(ErrorJson::from(&e)),
                };
                println!("{}", serde_json::to_string(&json_result).into_diagnostic()?);
            } else {
                print_error(&e);
            }
            std::process::exit(1);
        }
    }
}
