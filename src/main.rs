use anyhow::Result;
use backtester::commands::{batch, export_snapshot, run, validate};
use backtester::context::AppContext;
use clap::{Parser, Subcommand};
use log::info;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "backtester")]
#[command(about = "Replays generated trade signals against historical candles")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Backtest a single job and print its result
    Run {
        /// JSON job file holding one signal with its candles
        job_file: PathBuf,
        /// Write the result here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Backtest every job in a JSON file or binary snapshot in parallel
    Batch {
        /// JSON job file or `.bin` snapshot
        job_file: PathBuf,
        /// Write the results here instead of stdout
        #[arg(short, long, value_name = "PATH")]
        output: Option<PathBuf>,
    },
    /// Check trade signals without running a backtest
    Validate {
        /// JSON job file or `.bin` snapshot
        job_file: PathBuf,
    },
    /// Convert a JSON job file into a binary snapshot
    ExportSnapshot {
        /// JSON job file to convert
        job_file: PathBuf,
        /// Destination file for the snapshot
        #[arg(short, long = "output", value_name = "PATH")]
        output: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let Cli { command } = Cli::parse();

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let app_context = AppContext::initialize()?;

    info!("Starting backtester. Historical results do not predict future returns.");

    match command {
        Commands::Run { job_file, output } => {
            run::run(&app_context, &job_file, output.as_deref()).await?;
        }
        Commands::Batch { job_file, output } => {
            batch::run(&app_context, &job_file, output.as_deref()).await?;
        }
        Commands::Validate { job_file } => {
            validate::run(&app_context, &job_file).await?;
        }
        Commands::ExportSnapshot { job_file, output } => {
            export_snapshot::run(&job_file, &output).await?;
        }
    }

    Ok(())
}
