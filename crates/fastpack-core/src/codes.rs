//! Stable error codes for bundle failures.
//!
//! All codes are SCREAMING_SNAKE_CASE and stable across versions; they are
//! what `--json` output reports in `error.code`.

/// Config file could not be parsed as JSON or does not match the schema.
pub const CONFIG_PARSE_ERROR: &str = "CONFIG_PARSE_ERROR";

/// Config file parsed but failed validation (bad regex, unknown transform, ...).
pub const CONFIG_INVALID: &str = "CONFIG_INVALID";

/// No config file was found in the working directory.
pub const CONFIG_NOT_FOUND: &str = "CONFIG_NOT_FOUND";

/// An import specifier did not resolve to a file.
pub const RESOLUTION_ERROR: &str = "RESOLUTION_ERROR";

/// The static import graph contains a cycle.
pub const CYCLIC_DEPENDENCY: &str = "CYCLIC_DEPENDENCY";

/// A registered transform rejected a file.
pub const TRANSFORM_ERROR: &str = "TRANSFORM_ERROR";

/// Reading a source or writing the bundle failed.
pub const IO_ERROR: &str = "IO_ERROR";

/// Invariant violation inside the pipeline.
pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
