//! TreeFS interactive shell library

pub mod search;
pub mod shell;
pub mod store;
pub mod users;

use std::path::PathBuf;

use anyhow::{Context, Result};
use treefs_core::FsConfig;

// Re-export CLI types for testing
pub use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(name = "treefs")]
#[command(about = "Interactive shell over an in-memory filesystem")]
#[command(version, author, long_about = None)]
pub struct Cli {
    /// JSON file with filesystem limits, security policy and root attributes
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Directory where `save` and `load` keep their snapshot files
    #[arg(long, value_name = "DIR", default_value = ".")]
    pub state_dir: PathBuf,

    /// Log filter (e.g. `info`, `treefs_core=debug`); overrides RUST_LOG
    #[arg(long, value_name = "FILTER")]
    pub log_level: Option<String>,
}

impl Cli {
    /// Load the filesystem configuration, falling back to defaults when no
    /// file was given.
    pub fn load_config(&self) -> Result<FsConfig> {
        let Some(path) = &self.config else {
            return Ok(FsConfig::default());
        };
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("invalid config file {}", path.display()))
    }
}
