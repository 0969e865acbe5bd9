//! `fastpack resolve` command implementation.

use super::{load_bundler, print_error, ErrorJson};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;
use std::path::{Path, PathBuf};

#[derive(Serialize)]
struct ResolveResultJson {
    ok: bool,
    specifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    from: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    resolved: Option<String>,
    /// Transform the resolved file would go through.
    #[serde(skip_serializing_if = "Option::is_none")]
    transform: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<ErrorJson>,
}

/// Run the resolve command.
///
/// `from` is taken relative to `cwd`; without it, the project root is used.
pub fn run(
    cwd: &Path,
    config: Option<&Path>,
    specifier: &str,
    from: Option<&Path>,
    json: bool,
) -> Result<()> {
    let mut from_dir: Option<PathBuf> = None;
    let result = load_bundler(cwd, config).and_then(|bundler| {
        let dir = match from {
            Some(dir) => cwd.join(dir),
            None => bundler.config().root.clone(),
        };
        from_dir = Some(dir.clone());
        let resolved = bundler.resolve_module(specifier, &dir)?;
        let transform = bundler
            .select_transform(&resolved)
            .map(|rule| rule.transform_id.clone());
        Ok((resolved, transform))
    });

    match result {
        Ok((resolved, transform)) => {
            if json {
                let json_result = ResolveResultJson {
                    ok: true,
                    specifier: specifier.to_string(),
                    from: from_dir.map(|d| d.display().to_string()),
                    resolved: Some(resolved.display().to_string()),
                    transform,
                    error: None,
                };
                println!("{}", serde_json::to_string(&json_result).into_diagnostic()?);
            } else {
                println!("{}", resolved.display());
            }
            Ok(())
        }
        Err(e) => {
            if json {
                let json_result = ResolveResultJson {
                    ok: false,
                    specifier: specifier.to_string(),
                    from: from_dir.map(|d| d.display().to_string()),
                    resolved: None,
                    transform: None,
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
