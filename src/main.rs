use clap::Parser;
use hydro_qc::cli::{args::Args, commands};
use std::process;

fn main() {
    let args = Args::parse();

    // Without a subcommand, show help and available commands
    let Some(command) = args.command else {
        show_help_and_commands();
        process::exit(0);
    };

    let runtime = tokio::runtime::Runtime::new().unwrap_or_else(|e| {
        eprintln!("Failed to create async runtime: {}", e);
        process::exit(1);
    });

    let result = runtime.block_on(async {
        tokio::select! {
            result = commands::run(command) => result,
            signal = tokio::signal::ctrl_c() => match signal {
                Ok(()) => {
                    eprintln!("\nReceived CTRL+C, shutting down...");
                    Err(hydro_qc::QcError::ProcessingInterrupted {
                        reason: "interrupted by user".to_string(),
                    }
                    .into())
                }
                Err(e) => Err(anyhow::anyhow!("Failed to listen for CTRL+C: {}", e)),
            },
        }
    });

    if let Err(error) = result {
        eprintln!("Error: {:#}", error);
        process::exit(1);
    }
}

/// Show help information and available commands when no subcommand is provided
fn show_help_and_commands() {
    println!("hydro-qc - Hydrological time series quality control");
    println!("===================================================");
    println!();
    println!("Flags suspect water level and rainfall readings with range, stuck-sensor,");
    println!("MAD spike and step-rate checks, and writes a Markdown summary per station.");
    println!();
    println!("USAGE:");
    println!("    hydro-qc <COMMAND> [OPTIONS]");
    println!();
    println!("COMMANDS:");
    println!("    run      QC a single series described by a config file");
    println!("    batch    QC every CSV matching a glob, one station per file");
    println!("    init     Write sample data and a matching config");
    println!("    help     Show this help message or help for specific commands");
    println!();
    println!("EXAMPLES:");
    println!("    # Create sample data and run QC on it:");
    println!("    hydro-qc init --dir demo");
    println!("    hydro-qc run -c demo/config.toml");
    println!();
    println!("    # QC a directory of stations with four workers:");
    println!("    hydro-qc batch -c config.toml --inputs 'data/*.csv' -o out -j 4");
    println!();
    println!("For detailed help on any command, use:");
    println!("    hydro-qc <COMMAND> --help");
}
