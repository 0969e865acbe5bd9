//! Elm compiler transform.
//!
//! Compiles an Elm entry module with `elm make` and returns the generated
//! JavaScript. The compiler resolves the module's Elm imports itself, so an
//! `.elm` file is a leaf in the bundle graph.
//!
//! Options (all optional):
//!
//! - `cwd`: directory to run the compiler in, relative to the project root.
//!   Defaults to the nearest ancestor of the module containing `elm.json`.
//! - `pathToElm`: compiler binary, default `elm`.
//! - `debug`, `optimize`: pass `--debug` / `--optimize`.
//! - `verbose`: log the compiler invocation at info level.
//! - `warn`: forward compiler stderr output as warnings.

use crate::bundler::transform::{Transform, TransformContext, TransformFailure};
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, info, warn};

const KNOWN_OPTIONS: &[&str] = &["cwd", "pathToElm", "debug", "optimize", "verbose", "warn"];

/// Project marker looked up from the module's directory.
const ELM_PROJECT_FILE: &str = "elm.json";

#[derive(Debug, Clone, Copy, Default)]
pub struct ElmTransform;

#[derive(Debug, Clone, PartialEq, Eq)]
struct ElmOptions {
    cwd: PathBuf,
    binary: String,
    debug: bool,
    optimize: bool,
    verbose: bool,
    warn: bool,
}

impl ElmOptions {
    fn from_context(ctx: &TransformContext<'_>) -> Result<Self, TransformFailure> {
        ctx.expect_only(KNOWN_OPTIONS)?;

        let debug = ctx.flag("debug")?;
        let optimize = ctx.flag("optimize")?;
        if debug && optimize {
            return Err(TransformFailure::new(
                "options 'debug' and 'optimize' cannot be combined",
            ));
        }

        let cwd = match ctx.options.get("cwd") {
            Some(dir) => ctx.root.join(dir),
            None => find_elm_project(ctx.path).unwrap_or_else(|| {
                ctx.path.parent().unwrap_or(ctx.root).to_path_buf()
            }),
        };

        Ok(Self {
            cwd,
            binary: ctx
                .options
                .get("pathToElm")
                .cloned()
                .unwrap_or_else(|| "elm".to_string()),
            debug,
            optimize,
            verbose: ctx.flag("verbose")?,
            warn: ctx.flag("warn")?,
        })
    }
}

/// Nearest ancestor directory of `module` holding an `elm.json`.
fn find_elm_project(module: &Path) -> Option<PathBuf> {
    module
        .ancestors()
        .skip(1)
        .find(|dir| dir.join(ELM_PROJECT_FILE).is_file())
        .map(Path::to_path_buf)
}

impl Transform for ElmTransform {
    fn transform(&self, _source: &str, ctx: &TransformContext<'_>) -> Result<String, TransformFailure> {
        let options = ElmOptions::from_context(ctx)?;

        // `elm make` insists on a `.js` output name.
        let output = tempfile::Builder::new()
            .prefix("fastpack-elm-")
            .suffix(".js")
            .tempfile()?;

        let mut command = Command::new(&options.binary);
        command
            .arg("make")
            .arg(ctx.path)
            .arg(format!("--output={}", output.path().display()))
            .current_dir(&options.cwd);
        if options.debug {
            command.arg("--debug");
        }
        if options.optimize {
            command.arg("--optimize");
        }

        if options.verbose {
            info!(cwd = %options.cwd.display(), command = ?command, "Compiling Elm module");
        } else {
            debug!(path = %ctx.path.display(), "Compiling Elm module");
        }

        let result = command.output().map_err(|e| {
            TransformFailure::new(format!("failed to run '{}': {e}", options.binary))
        })?;

        let stderr = String::from_utf8_lossy(&result.stderr);
        if !result.status.success() {
            let stdout = String::from_utf8_lossy(&result.stdout);
            let detail = if stderr.trim().is_empty() {
                stdout.trim()
            } else {
                stderr.trim()
            };
            return Err(TransformFailure::new(format!(
                "elm make exited with {}: {detail}",
                result.status
            )));
        }
        if options.warn && !stderr.trim().is_empty() {
            warn!(path = %ctx.path.display(), "{}", stderr.trim());
        }

        Ok(std::fs::read_to_string(output.path())?)
    }

    /// The Elm project's source directories: `elm make` compiles every module
    /// the entry imports from them, none of which are in the bundle graph.
    fn watch_paths(&self, ctx: &TransformContext<'_>) -> Vec<PathBuf> {
        match ElmOptions::from_context(ctx) {
            Ok(options) => source_directories(&options.cwd),
            Err(_) => Vec::new(),
        }
    }
}

/// `source-directories` of `project/elm.json` as absolute paths.
///
/// Package projects have no such field and keep their modules in `src`.
/// Without an `elm.json` there is nothing to watch.
fn source_directories(project: &Path) -> Vec<PathBuf> {
    let Ok(text) = std::fs::read_to_string(project.join(ELM_PROJECT_FILE)) else {
        return Vec::new();
    };
    let json: serde_json::Value = serde_json::from_str(&text).unwrap_or_default();

    let dirs: Vec<&str> = match json.get("source-directories").and_then(|d| d.as_array()) {
        Some(dirs) => dirs.iter().filter_map(serde_json::Value::as_str).collect(),
        None => vec!["src"],
    };
    dirs.into_iter()
        .map(|dir| {
            let path = project.join(dir);
            dunce::canonicalize(&path).unwrap_or(path)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bundler::TransformOptions;
    use tempfile::tempdir;

    fn options(pairs: &[(&str, &str)]) -> TransformOptions {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_defaults_use_elm_project_dir() {
        let dir = tempdir().unwrap();
        let project = dir.path().join("app");
        std::fs::create_dir_all(project.join("src")).unwrap();
        std::fs::write(project.join("elm.json"), "{}").unwrap();
        let module = project.join("src").join("Main.elm");

        let opts = options(&[]);
        let ctx = TransformContext {
            path: &module,
            root: dir.path(),
            options: &opts,
        };
        let parsed = ElmOptions::from_context(&ctx).unwrap();
        assert_eq!(parsed.cwd, project);
        assert_eq!(parsed.binary, "elm");
        assert!(!parsed.verbose && !parsed.warn && !parsed.debug);
    }

    #[test]
    fn test_webpack_loader_options_accepted() {
        let opts = options(&[("verbose", "true"), ("warn", "true"), ("cwd", "elm")]);
        let ctx = TransformContext {
            path: Path::new("/p/src/Main.elm"),
            root: Path::new("/p"),
            options: &opts,
        };
        let parsed = ElmOptions::from_context(&ctx).unwrap();
        assert!(parsed.verbose);
        assert!(parsed.warn);
        assert_eq!(parsed.cwd, Path::new("/p/elm"));
    }

    #[test]
    fn test_rejects_unknown_and_conflicting_options() {
        let unknown = options(&[("maxInstances", "2")]);
        let ctx = TransformContext {
            path: Path::new("/p/Main.elm"),
            root: Path::new("/p"),
            options: &unknown,
        };
        assert!(ElmOptions::from_context(&ctx).is_err());

        let conflicting = options(&[("debug", "true"), ("optimize", "true")]);
        let ctx = TransformContext {
            path: Path::new("/p/Main.elm"),
            root: Path::new("/p"),
            options: &conflicting,
        };
        assert!(ElmOptions::from_context(&ctx).is_err());
    }

    #[test]
    fn test_watch_paths_are_elm_source_directories() {
        let dir = tempdir().unwrap();
        let project = dunce::canonicalize(dir.path()).unwrap();
        std::fs::create_dir_all(project.join("src")).unwrap();
        std::fs::create_dir_all(project.join("shared")).unwrap();
        std::fs::write(
            project.join("elm.json"),
            r#"{ "type": "application", "source-directories": ["src", "shared"] }"#,
        )
        .unwrap();
        let module = project.join("src").join("Main.elm");

        let opts = options(&[]);
        let ctx = TransformContext {
            path: &module,
            root: &project,
            options: &opts,
        };
        assert_eq!(
            ElmTransform.watch_paths(&ctx),
            vec![project.join("src"), project.join("shared")]
        );
    }

    #[test]
    fn test_watch_paths_package_and_missing_project() {
        let dir = tempdir().unwrap();
        let project = dunce::canonicalize(dir.path()).unwrap();
        std::fs::create_dir_all(project.join("pkg").join("src")).unwrap();
        std::fs::write(project.join("pkg").join("elm.json"), r#"{ "type": "package" }"#).unwrap();

        let opts = options(&[]);
        let module = project.join("pkg").join("src").join("Main.elm");
        let ctx = TransformContext {
            path: &module,
            root: &project,
            options: &opts,
        };
        assert_eq!(
            ElmTransform.watch_paths(&ctx),
            vec![project.join("pkg").join("src")]
        );

        let loose = project.join("Loose.elm");
        let ctx = TransformContext {
            path: &loose,
            root: &project,
            options: &opts,
        };
        assert!(ElmTransform.watch_paths(&ctx).is_empty());
    }

    #[test]
    fn test_missing_compiler_is_transform_failure() {
        let dir = tempdir().unwrap();
        let module = dir.path().join("Main.elm");
        std::fs::write(&module, "module Main exposing (main)\n").unwrap();

        let opts = options(&[("pathToElm", "/nonexistent/bin/elm-for-fastpack-tests")]);
        let ctx = TransformContext {
            path: &module,
            root: dir.path(),
            options: &opts,
        };
        let err = ElmTransform.transform("", &ctx).unwrap_err();
        assert!(err.message.contains("failed to run"), "{}", err.message);
    }
}
