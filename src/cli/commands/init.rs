//! Sample data initialisation command

use crate::cli::args::InitArgs;
use crate::sample_data::{self, SampleOptions};
use anyhow::{Context, Result};
use colored::*;

pub fn run_init(args: InitArgs) -> Result<()> {
    args.validate()?;

    let options = SampleOptions {
        points: args.points,
        interval_minutes: args.interval_minutes,
        seed: args.seed,
        ..Default::default()
    };

    println!(
        "{} {}",
        "Initialising sample data in".bright_green().bold(),
        args.dir.display().to_string().bright_white().bold()
    );
    println!(
        "  points={}, interval={} minutes, seed={}",
        options.points, options.interval_minutes, options.seed
    );

    let files = sample_data::init_sample_files(&args.dir, &options, args.overwrite)
        .with_context(|| format!("Failed to initialise {}", args.dir.display()))?;

    println!("  {} {} ({} rows)", "Data:".bright_cyan(), files.data_path.display(), files.rows);
    println!("  {} {}", "Config:".bright_cyan(), files.config_path.display());
    println!("\n{}", "Next steps".bright_yellow().bold());
    println!("  hydro-qc run -c {}", files.config_path.display());
    Ok(())
}
