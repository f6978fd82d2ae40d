//! Foundation types for gemway.
//!
//! This crate holds the pieces every other gemway crate shares: the
//! [`GeminiUrl`] value type and its relative-reference resolver, the
//! TOML-backed configuration, and the error taxonomy.

pub mod config;
pub mod error;
pub mod url;

pub use config::GemwayConfig;
pub use error::{ErrorKind, GemwayError, Result};
pub use url::{DEFAULT_PORT, GeminiUrl, Resolved, resolve};
