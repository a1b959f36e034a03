//! Roadwatch CLI: the main entry point.
//!
//! Commands:
//! - `ask`     Ask one question and print the answer
//! - `serve`   Start the HTTP gateway
//! - `models`  List the model aliases that can be selected

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "roadwatch",
    about = "Roadwatch: ask an LLM agent about the roads of Neuquén",
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
    /// Ask the agent a single question
    Ask {
        /// The question to ask
        #[arg(short, long)]
        question: String,

        /// Model alias to use instead of the configured one
        #[arg(short, long)]
        model: Option<String>,

        /// Print every message of the conversation, not just the answer
        #[arg(long)]
        transcript: bool,
    },

    /// Start the HTTP gateway server
    Serve {
        /// Override the port
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// List available model aliases
    Models {
        /// Ask every usable provider whether it is reachable
        #[arg(long)]
        check: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Ask {
            question,
            model,
            transcript,
        } => commands::ask::run(question, model, transcript).await?,
        Commands::Serve { port } => commands::serve::run(port).await?,
        Commands::Models { check } => commands::models::run(check).await?,
    }

    Ok(())
}
