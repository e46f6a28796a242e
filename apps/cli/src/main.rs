//! contentsync CLI: keeps a remote content store and its static snapshot
//! consistent.
//!
//! Every command is a point-in-time batch job. Commands that write default
//! to a dry run and need `--apply`.

mod commands;

use clap::Parser;
use color_eyre::eyre::Result;

use commands::Cli;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    let cli = Cli::parse();
    commands::init_tracing(&cli);
    commands::run(cli).await
}
