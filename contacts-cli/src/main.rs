//! Contacts CLI - publish contact commands and run the consumer.
//!
//! # Commands
//!
//! - `contacts topology` - Declare the exchange, queue and dead-letter queue
//! - `contacts publish --method <verb> --route <route>` - Publish one command
//! - `contacts consume` - Consume commands until Ctrl-C

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use colored::Colorize;
use contacts_config::RelayConfig;

mod commands;
mod error;
mod logging;

use commands::{consume, publish, topology};
use error::CliResult;

/// Contacts command relay
#[derive(Parser)]
#[command(name = "contacts")]
#[command(author = "Pegasus Heavy Industries LLC")]
#[command(version)]
#[command(about = "Publish and consume contact commands over RabbitMQ")]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file (JSON, TOML or .env)
    #[arg(short, long, global = true, env = "CONTACTS_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Declare the broker topology and exit
    #[command(alias = "t")]
    Topology,

    /// Publish a single command
    #[command(alias = "p")]
    Publish(PublishArgs),

    /// Consume commands until interrupted
    #[command(alias = "c")]
    Consume,
}

#[derive(Args)]
struct PublishArgs {
    /// Command verb (POST, PUT, DELETE, GET)
    #[arg(short, long)]
    method: String,

    /// Resource route, e.g. contacts/42
    #[arg(short, long)]
    route: String,

    /// Contact as inline JSON
    #[arg(long, conflicts_with = "message_file")]
    message: Option<String>,

    /// Contact read from a JSON file
    #[arg(long)]
    message_file: Option<PathBuf>,
}

async fn execute(cli: Cli) -> CliResult<()> {
    let config = RelayConfig::load(cli.config.as_deref())?;
    logging::init(&config.log);

    match cli.command {
        Commands::Topology => {
            let declared = topology::run(&config).await?;
            success(&format!(
                "Topology ready: {} -> {} (dead letters: {})",
                declared.exchange.name, declared.queue.name, declared.dead_letter_queue.name
            ));
        }
        Commands::Publish(args) => {
            let envelope = publish::envelope(
                &args.method,
                &args.route,
                args.message.as_deref(),
                args.message_file.as_deref(),
            )?;
            publish::run(&config, &envelope).await?;
            success(&format!("Published {} {}", envelope.method, envelope.route));
        }
        Commands::Consume => {
            let stats = consume::run(&config).await?;
            success(&format!(
                "Consumer stopped after {} deliveries ({} applied, {} dead-lettered)",
                stats.received, stats.applied, stats.rejected
            ));
        }
    }
    Ok(())
}

fn success(message: &str) {
    eprintln!("  {} {}", "✓".green().bold(), message);
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = execute(cli).await {
        eprintln!("\n  {} {}\n", "Error:".red().bold(), e);
        std::process::exit(e.exit_code());
    }
}
