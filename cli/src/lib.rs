//! Preflight CLI support library
//!
//! Report rendering and CLI error types live here so the binary stays a
//! thin argument-parsing and orchestration layer, and so rendering can be
//! integration-tested without spawning the binary.

pub mod error;
pub mod render;

pub use error::{CliError, Result};
