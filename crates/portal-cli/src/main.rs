use std::path::PathBuf;

use clap::{Parser, Subcommand};
use portal_cli::cli::{resolve, run_list, run_mark_read, run_watch, Overrides};
use portal_core::tracing_setup::init_tracing;

#[derive(Parser)]
#[command(name = "portal-notify")]
#[command(about = "Watch and manage employee portal notifications")]
struct Cli {
    /// Path to JSON config file (service and feed settings)
    #[arg(long, short = 'c')]
    config: Option<PathBuf>,

    /// Notification service base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Bearer token for the notification service
    #[arg(long, env = "PORTAL_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Poll interval in milliseconds
    #[arg(long)]
    poll_interval_ms: Option<u64>,

    /// Pretty-print JSON output
    #[arg(long, short)]
    pretty: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Keep the feed live and print every change
    Watch {
        /// Print full JSON snapshots instead of one-line summaries
        #[arg(long)]
        json: bool,
    },

    /// Print the feed once
    List {
        /// Number of pages to load
        #[arg(long, default_value_t = 1)]
        pages: usize,
    },

    /// Mark a notification as read
    MarkRead {
        /// Notification ID
        id: String,
    },
}

fn main() {
    let cli = Cli::parse();
    init_tracing();

    let overrides = Overrides {
        base_url: cli.base_url.clone(),
        token: cli.token.clone(),
        poll_interval_ms: cli.poll_interval_ms,
    };
    let config = match resolve(cli.config.as_deref(), &overrides) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            std::process::exit(1);
        }
    };

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Failed to start runtime: {}", e);
            std::process::exit(1);
        }
    };

    let result = runtime.block_on(async {
        match cli.command {
            Commands::Watch { json } => run_watch(&config, json).await,
            Commands::List { pages } => run_list(&config, pages.max(1), cli.pretty).await,
            Commands::MarkRead { id } => run_mark_read(&config, &id).await,
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
