#![deny(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

//! Shared utilities for fastpack.
//!
//! Pure helpers with no logging dependencies. Logging is owned by the CLI
//! crate; the core crate logs through `tracing` macros.

pub mod fs;
pub mod hash;
