//! Outer surfaces of gemway: the HTTP fetch boundary and the terminal
//! browser, plus the startup plumbing both binaries share.

pub mod commands;
pub mod render;
pub mod routes;

use std::path::Path;

use gemway_types::{GemwayConfig, Result};

/// Environment variable naming a config file when no CLI argument is given.
pub const CONFIG_ENV: &str = "GEMWAY_CONFIG";

/// Load configuration from the first CLI argument, else `GEMWAY_CONFIG`,
/// else built-in defaults.
pub fn load_config() -> Result<GemwayConfig> {
    let path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var(CONFIG_ENV).ok());
    config_from(path.as_deref())
}

pub fn config_from(path: Option<&str>) -> Result<GemwayConfig> {
    match path {
        Some(path) => GemwayConfig::load(Path::new(path)),
        None => {
            log::info!("No config file given, using defaults");
            Ok(GemwayConfig::default())
        },
    }
}
