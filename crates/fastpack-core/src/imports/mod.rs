//! Import discovery for script modules.
//!
//! Provides a lightweight scanner that finds module specifiers without a full parse.

mod scan;

pub use scan::{scan_imports, Import, ImportKind};
