//! Host configuration.
//!
//! An optional `mtr.toml` next to the source file tunes the run without
//! command-line flags:
//!
//! ```toml
//! [run]
//! stack_capacity = 4096
//! disassemble = true
//! log = "matiria=debug"
//! ```

use serde::Deserialize;
use std::path::Path;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub run: RunSection,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunSection {
    /// Value stack capacity in slots; defaults to the engine's.
    pub stack_capacity: Option<usize>,
    /// Print the bytecode of every callable before running.
    #[serde(default)]
    pub disassemble: bool,
    /// Tracing filter directive, overridden by `RUST_LOG`.
    pub log: Option<String>,
}

impl Config {
    /// Load `mtr.toml` from the directory containing `source_path`.
    /// A missing file is the default config; a malformed one is an error.
    pub fn load_for(source_path: &Path) -> Result<Config, String> {
        let dir = source_path.parent().unwrap_or_else(|| Path::new("."));
        let config_path = dir.join("mtr.toml");
        if !config_path.exists() {
            return Ok(Config::default());
        }
        let text = std::fs::read_to_string(&config_path)
            .map_err(|e| format!("Failed to read {}: {}", config_path.display(), e))?;
        toml::from_str(&text)
            .map_err(|e| format!("Failed to parse {}: {}", config_path.display(), e))
    }
}
