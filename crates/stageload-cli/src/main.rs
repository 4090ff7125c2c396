mod commands;
mod logging;

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "stageload",
    version,
    about = "Staged loads of fetched data into warehouse tables"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate a tables file
    Check {
        /// Path to tables YAML file
        tables: PathBuf,
    },
    /// Show the warehouse calls a load would issue, without running it
    Plan {
        /// Path to tables YAML file
        tables: PathBuf,
        /// Table to plan
        #[arg(long)]
        table: String,
        /// Assume the target table already exists
        #[arg(long)]
        exists: bool,
        /// Rows the source would stage
        #[arg(long, default_value_t = 1)]
        rows: u64,
        /// Client key to scope the load to (overrides the file)
        #[arg(long)]
        identity: Option<String>,
        /// First day to fetch (YYYY-MM-DD, default tomorrow)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day to fetch (YYYY-MM-DD, default tomorrow)
        #[arg(long)]
        end: Option<NaiveDate>,
    },
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    logging::init(&cli.log_level);

    match cli.command {
        Commands::Check { tables } => commands::check::execute(&tables),
        Commands::Plan {
            tables,
            table,
            exists,
            rows,
            identity,
            start,
            end,
        } => commands::plan::execute(&commands::plan::PlanArgs {
            tables_path: tables,
            table,
            target_exists: exists,
            rows,
            identity,
            start,
            end,
        }),
    }
}
