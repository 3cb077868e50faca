//! turnwise CLI, the main entry point.
//!
//! Commands:
//! - `chat`: Interactive chat or single-message mode
//! - `docs`: Manage document stores for file search
//! - `onboard`: Write the default config
//! - `doctor`: Diagnose configuration and connectivity

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "turnwise",
    about = "turnwise — streaming tool orchestration for hosted assistants",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Chat with an assistant
    Chat {
        /// Send a single message instead of entering interactive mode
        #[arg(short, long, conflicts_with_all = ["portfolio", "compare", "outlook"])]
        message: Option<String>,

        /// Assistant preset: personal, documents, or advisor
        #[arg(short, long)]
        preset: Option<String>,

        /// Wait for whole responses instead of streaming
        #[arg(long)]
        no_stream: bool,

        /// Vector store to search (repeatable)
        #[arg(long = "vector-store", value_name = "ID")]
        vector_stores: Vec<String>,

        /// Ask the advisor to analyze the portfolio in this JSON file
        #[arg(long, value_name = "FILE", conflicts_with_all = ["compare", "outlook"])]
        portfolio: Option<std::path::PathBuf>,

        /// Ask the advisor to compare investments (repeatable)
        #[arg(long, value_name = "OPTION", conflicts_with = "outlook")]
        compare: Vec<String>,

        /// What to compare the investments on
        #[arg(long, requires = "compare")]
        criteria: Option<String>,

        /// Ask the advisor for a market outlook on a sector
        #[arg(long, value_name = "SECTOR")]
        outlook: Option<String>,
    },

    /// Manage document stores for file search
    Docs {
        #[command(subcommand)]
        action: DocsAction,
    },

    /// Initialize configuration
    Onboard,

    /// Diagnose system health
    Doctor,
}

#[derive(Subcommand)]
enum DocsAction {
    /// Create a vector store
    Create {
        name: String,

        /// Expire the store after this many idle days
        #[arg(long)]
        expire_days: Option<u32>,
    },

    /// Upload documents and attach them to a store
    Upload {
        store: String,

        #[arg(required = true)]
        paths: Vec<std::path::PathBuf>,
    },

    /// Delete a vector store
    Delete { store: String },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr so streamed answers stay clean on stdout
    let filter = if cli.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Chat {
            message,
            preset,
            no_stream,
            vector_stores,
            portfolio,
            compare,
            criteria,
            outlook,
        } => {
            commands::chat::run(commands::chat::ChatOptions {
                message,
                preset,
                stream: !no_stream,
                vector_stores,
                advisor: commands::chat::AdvisorAsk {
                    portfolio,
                    compare,
                    criteria,
                    outlook,
                },
            })
            .await?
        }
        Commands::Docs { action } => match action {
            DocsAction::Create { name, expire_days } => {
                commands::docs::create(&name, expire_days).await?
            }
            DocsAction::Upload { store, paths } => commands::docs::upload(&store, &paths).await?,
            DocsAction::Delete { store } => commands::docs::delete(&store).await?,
        },
        Commands::Onboard => commands::onboard::run().await?,
        Commands::Doctor => commands::doctor::run().await?,
    }

    Ok(())
}
