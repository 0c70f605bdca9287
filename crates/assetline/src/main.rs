//! Assetline - asset management agent for the terminal

use clap::{Parser, Subcommand};
use tracing::debug;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::{ask_command, card_command, chat_command, init_command, status_command, AskArgs};

/// Assetline - ask questions about your managed assets
#[derive(Parser)]
#[command(name = "assetline")]
#[command(about = "◆ Ask questions about your managed assets")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    /// Verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize config
    Init,
    /// Show configuration status
    Status,
    /// Ask a single question
    Ask {
        /// Message to send
        #[arg(short, long)]
        message: String,
        /// Print progress events as they happen
        #[arg(long)]
        stream: bool,
        /// Continue a task that is waiting for input
        #[arg(long)]
        task_id: Option<String>,
        /// Conversation the task belongs to
        #[arg(long)]
        context_id: Option<String>,
        /// Override the configured model
        #[arg(long)]
        model: Option<String>,
    },
    /// Chat with the agent
    Chat {
        /// Print progress events as they happen
        #[arg(long)]
        stream: bool,
        /// Override the configured model
        #[arg(long)]
        model: Option<String>,
    },
    /// Print the agent card as JSON
    Card,
}

fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"))
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Init => init_command().await,
        Commands::Status => status_command().await,
        Commands::Ask {
            message,
            stream,
            task_id,
            context_id,
            model,
        } => {
            ask_command(AskArgs {
                message,
                stream,
                task_id,
                context_id,
                model,
            })
            .await
        }
        Commands::Chat { stream, model } => chat_command(stream, model).await,
        Commands::Card => card_command(),
    };

    if let Err(e) = result {
        debug!("command failed: {:?}", e);
        eprintln!("✗ {:#}", e);
        std::process::exit(1);
    }
}
