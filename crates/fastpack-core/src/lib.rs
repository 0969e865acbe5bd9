#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::return_self_not_must_use)]

pub mod bundler;
pub mod codes;
pub mod config;
pub mod error;
pub mod imports;

pub use bundler::{BundleOutput, Bundler, ModuleGraph, Resolver, TransformRegistry};
pub use config::{Config, DevServerConfig};
pub use error::BundleError;
pub use imports::{scan_imports, Import, ImportKind};
