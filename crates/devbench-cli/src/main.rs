use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use devbench_cli::cli::config::resolve_config;
use devbench_cli::cli::{execute, print_json, CliCommand};
use devbench_core::constants::DEFAULT_RECENT_LIMIT;
use devbench_core::tracing_setup::init_tracing;
use devbench_core::DocumentStore;

#[derive(Parser)]
#[command(name = "devbench-cli")]
#[command(about = "Inspect and maintain the devbench document store")]
struct Cli {
    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    /// Path to JSON config file (dataDir, namespace, backend)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Storage directory, overriding config and environment
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List apps known to the store, with their document counts
    Apps,

    /// List an app's documents, most recent first
    List {
        /// App ID (markdown, svg, mermaid, playground, json, tasks, ...)
        app_id: String,
    },

    /// Print one document including its content
    Show {
        /// Document ID
        id: String,
    },

    /// Most recently updated documents across all apps
    Recent {
        #[arg(long, short = 'n', default_value_t = DEFAULT_RECENT_LIMIT)]
        limit: usize,
    },

    /// Document counts and store size
    Stats,

    /// Import legacy per-tool storage (runs at most once)
    Migrate,

    /// Rename a document
    Rename {
        /// Document ID
        id: String,
        /// New title
        title: String,
    },

    /// Delete a document
    Delete {
        /// Document ID
        id: String,
    },
}

impl From<Commands> for CliCommand {
    fn from(command: Commands) -> Self {
        match command {
            Commands::Apps => CliCommand::ListApps,
            Commands::List { app_id } => CliCommand::ListDocs { app_id },
            Commands::Show { id } => CliCommand::ShowDoc { id },
            Commands::Recent { limit } => CliCommand::Recent { limit },
            Commands::Stats => CliCommand::Stats,
            Commands::Migrate => CliCommand::Migrate,
            Commands::Rename { id, title } => CliCommand::Rename { id, title },
            Commands::Delete { id } => CliCommand::Delete { id },
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let config = resolve_config(cli.config.as_deref(), cli.data_dir.as_deref())?;
    tracing::debug!(data_dir = %config.data_dir.display(), backend = %config.backend, "opening store");

    let store = DocumentStore::open(&config)
        .with_context(|| format!("Failed to open store in {}", config.data_dir.display()))?;

    let command = CliCommand::from(cli.command);
    let result = execute(&store, &command)?;
    print_json(&result, cli.pretty)
}

fn main() {
    init_tracing();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
