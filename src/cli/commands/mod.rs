//! Command implementations for the hydro-qc CLI
//!
//! Each command lives in its own module:
//! - `run`: QC a single series and write its outputs and report
//! - `batch`: QC many stations in parallel
//! - `init`: write sample data and a matching configuration

pub mod batch;
pub mod init;
pub mod run;
pub mod shared;

use crate::cli::args::Commands;
use anyhow::Result;

/// Dispatch to the subcommand handler after setting up logging
pub async fn run(command: Commands) -> Result<()> {
    shared::setup_logging(command.logging())?;

    match command {
        Commands::Run(args) => run::run_single(args).await,
        Commands::Batch(args) => batch::run_batch(args).await,
        Commands::Init(args) => init::run_init(args),
    }
}
