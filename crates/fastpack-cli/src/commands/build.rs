//! `fastpack build` command implementation.
//!
//! Runs the pipeline once and writes the bundle.

use super::{display_relative, load_bundler, print_error, ErrorJson};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::Path;
use std::time::Instant;

/// JSON output for the build command.
#[derive(Serialize)]
struct BuildResultJson {
    ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    entry: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    outfile: Option<String>,
    modules: Vec<String>,
    size_bytes: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    hash: Option<String>,
    duration_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

/// Run the build command.
pub fn run(cwd: &Path, config: Option<&Path>, json: bool) -> Result<()> {
    let start = Instant::now();

    let result = load_bundler(cwd, config).and_then(|bundler| {
        let output = bundler.bundle()?;
        Ok((bundler.config().root.clone(), output))
    });

    let duration_ms = start.elapsed().as_millis() as u64;

    match result {
        Ok((root, output)) => {
            let entry = output.modules.last().map(|p| p.display().to_string());
            if json {
                let json_result = BuildResultJson {
                    ok: true,
                    entry,
                    outfile: Some(output.path.display().to_string()),
                    modules: output
                        .modules
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect(),
                    size_bytes: output.size_bytes,
                    hash: Some(output.hash.clone()),
                    duration_ms,
                    error: None,
                };
                println!("{}", serde_json::to_string(&json_result).into_diagnostic()?);
            } else {
                let size_kb = output.size_bytes as f64 / 1024.0;
                println!(
                    "  {} -> {} ({} modules, {:.1}KB, {}ms)",
                    output
                        .modules
                        .last()
                        .map(|p| display_relative(&root, p))
                        .unwrap_or_default(),
                    display_relative(&root, &output.path),
                    output.modules.len(),
                    size_kb,
                    duration_ms
                );
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let json_result = BuildResultJson {
                    ok: false,
                    entry: None,
                    outfile: None,
                    modules: Vec::new(),
                    size_bytes: 0,
                    hash: None,
                    duration_ms,
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
