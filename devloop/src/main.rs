mod commands;
mod formatting;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;
use tracing_subscriber::EnvFilter;

use commands::SelectionArgs;

#[derive(Parser)]
#[command(name = "devloop")]
#[command(about = "Continuous-development loop for multi-module projects")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    #[arg(long, default_value = devloop_core::CONFIG_FILE_NAME)]
    config: PathBuf,

    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, action)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Build, test and deploy, then keep watching for changes.
    Dev {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long)]
        debounce_ms: Option<u64>,
        /// Remote session to join, overriding `[remote] session_id`.
        #[arg(long)]
        session_id: Option<String>,
    },
    /// Print the initial task plan without running anything.
    Plan {
        #[command(flatten)]
        selection: SelectionArgs,
        #[arg(long, action)]
        json: bool,
    },
    Graph {
        #[arg(long, action)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let subscriber = tracing_subscriber::fmt().with_writer(std::io::stderr);
    if std::env::var_os("RUST_LOG").is_some() {
        subscriber.with_env_filter(EnvFilter::from_default_env()).init();
    } else {
        subscriber.with_max_level(log_level).init();
    }

    match cli.command {
        Commands::Dev {
            selection,
            debounce_ms,
            session_id,
        } => commands::cmd_dev(cli.config, selection, debounce_ms, session_id).await?,
        Commands::Plan { selection, json } => {
            commands::cmd_plan(cli.config, selection, json).await?
        }
        Commands::Graph { json } => commands::cmd_graph(cli.config, json)?,
    }

    Ok(())
}
