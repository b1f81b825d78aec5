//! gpugrid CLI
//!
//! Command-line interface for interacting with the gpugrid daemon.

mod commands;

use clap::{Parser, Subcommand};
use gpugrid_core::TaskPriority;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// gpugrid - client for the simulated GPU cluster
#[derive(Parser, Debug)]
#[command(name = "gpugrid")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Daemon API address
    #[arg(long, default_value = "http://localhost:8000", global = true)]
    api: String,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Submit a task
    Submit {
        /// Simulated run time in seconds
        #[arg(long)]
        duration: u32,

        /// Memory requirement in GB
        #[arg(long)]
        memory: f64,

        /// Task priority (low, medium, high, critical)
        #[arg(long, default_value = "medium")]
        priority: TaskPriority,

        /// Task ID (defaults to a random UUID)
        #[arg(long)]
        id: Option<String>,
    },

    /// List pending and running tasks
    Tasks {
        /// Show finished tasks instead
        #[arg(long)]
        finished: bool,
    },

    /// Show a single task
    Task {
        /// Task ID
        id: String,
    },

    /// Cancel a pending task
    Cancel {
        /// Task ID
        id: String,
    },

    /// Show cluster status
    Status,

    /// List all nodes
    Nodes,

    /// Show a single node
    Node {
        /// Node ID
        id: u32,
    },

    /// Take a node offline
    Offline {
        /// Node ID
        id: u32,
    },

    /// Bring a node back online
    Online {
        /// Node ID
        id: u32,
    },

    /// Run a scheduling pass now
    Schedule,

    /// Show a live cluster overview
    Top {
        /// Refresh every N seconds
        #[arg(long)]
        watch: Option<u64>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::WARN
    };

    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .with_target(false)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);

    let client = commands::ApiClient::new(&cli.api);

    match cli.command {
        Commands::Submit {
            duration,
            memory,
            priority,
            id,
        } => {
            commands::submit(&client, id, duration, memory, priority).await?;
        }
        Commands::Tasks { finished } => {
            commands::tasks(&client, finished).await?;
        }
        Commands::Task { id } => {
            commands::task(&client, &id).await?;
        }
        Commands::Cancel { id } => {
            commands::cancel(&client, &id).await?;
        }
        Commands::Status => {
            commands::status(&client).await?;
        }
        Commands::Nodes => {
            commands::nodes(&client).await?;
        }
        Commands::Node { id } => {
            commands::node(&client, id).await?;
        }
        Commands::Offline { id } => {
            commands::set_offline(&client, id, true).await?;
        }
        Commands::Online { id } => {
            commands::set_offline(&client, id, false).await?;
        }
        Commands::Schedule => {
            commands::schedule(&client).await?;
        }
        Commands::Top { watch } => {
            commands::top(&client, watch).await?;
        }
    }

    Ok(())
}
