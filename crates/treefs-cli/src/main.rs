use std::io;

use anyhow::Result;
use tracing_subscriber::EnvFilter;
use treefs_cli::shell::Shell;
use treefs_cli::store::SessionStore;
use treefs_cli::{Cli, Parser};

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Logs go to stderr so they never interleave with command output.
    let filter = match &cli.log_level {
        Some(level) => EnvFilter::try_new(level)?,
        None => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    let config = cli.load_config()?;
    tracing::info!(state_dir = %cli.state_dir.display(), "starting treefs shell");

    let mut shell = Shell::new(config, SessionStore::new(&cli.state_dir));
    shell.run(io::stdin().lock(), io::stdout().lock())
}
