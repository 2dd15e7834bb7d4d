//! `slipscan`: pull merchant, purchase time and total out of scanned receipts.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "slipscan")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to a TOML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check that a PDF opens and has pages
    Validate {
        pdf: PathBuf,
    },
    /// Extract fields from OCR text in a file, or stdin with `-`
    Extract {
        input: PathBuf,
    },
    /// Run the full pipeline on one PDF
    Process {
        pdf: PathBuf,
        /// Fail unless merchant and total were both found
        #[arg(long)]
        require_complete: bool,
    },
    /// Process every PDF dropped into a folder until Ctrl-C
    Watch {
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();

    // RUST_LOG wins over -v. Logs go to stderr; stdout carries JSON.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(commands::default_log_level(cli.verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Validate { pdf } => commands::validate(&pdf),
        Commands::Extract { input } => commands::extract(&input, &config),
        Commands::Process { pdf, require_complete } => {
            commands::process(&pdf, require_complete, &config).await
        }
        Commands::Watch { dir } => commands::watch(&dir, &config).await,
    }
}
