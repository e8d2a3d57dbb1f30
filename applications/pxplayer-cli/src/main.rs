/// pxplayer - drive a playback session from the terminal
use anyhow::Context;
use clap::{Parser, Subcommand};
use pxplayer_cli::{script, AppConfig, Player};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "pxplayer")]
#[command(about = "Playback session driver with a simulated engine", long_about = None)]
struct Cli {
    /// Configuration file path (defaults to ./pxplayer.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. "debug" or "pxplayer_session=trace"
    #[arg(long, global = true, env = "PXPLAYER_LOG")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session script
    Run {
        /// Comma-separated steps, e.g. "enqueue,play,wait:2000,pause"
        #[arg(short, long, default_value = script::DEFAULT_SCRIPT)]
        script: String,

        /// Client name to connect as (defaults to the trusted client)
        #[arg(long)]
        client: Option<String>,
    },
    /// Enqueue the configured media and list the catalog seen by a client
    Catalog {
        /// Client name to browse as
        #[arg(long)]
        client: Option<String>,
    },
    /// Print the effective configuration
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = match &cli.log_level {
        Some(directives) => EnvFilter::new(directives),
        None => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| "pxplayer=info,pxplayer_cli=info,pxplayer_session=info".into()),
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = AppConfig::load(cli.config.as_deref())?;
    config.validate()?;

    match cli.command {
        Commands::Run { script, client } => {
            let steps = script::parse(&script)?;
            let client = client.unwrap_or_else(|| config.session.trusted_client.clone());
            run(config, &client, &steps).await?;
        }
        Commands::Catalog { client } => {
            let client = client.unwrap_or_else(|| config.session.trusted_client.clone());
            catalog(config, &client).await?;
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
        }
    }

    Ok(())
}

async fn run(config: AppConfig, client: &str, steps: &[script::Step]) -> anyhow::Result<()> {
    tracing::info!(client, steps = steps.len(), "Starting pxplayer session");
    let player = Player::start(config, client).await?;

    let outcome = player.run(steps).await;
    player.shutdown().await?;
    outcome.context("Script aborted")
}

async fn catalog(config: AppConfig, client: &str) -> anyhow::Result<()> {
    let player = Player::start(config, client).await?;
    player.step(&script::Step::EnqueueConfigured).await?;

    let root = player.client().root_id().unwrap_or_default();
    println!("{} (root {})", client, root);
    for item in player.catalog() {
        let media = item.description;
        println!(
            "  {:<16} {:>8}  {} - {}",
            media.id,
            format_duration(media.duration),
            media.artist,
            media.title
        );
    }

    player.shutdown().await?;
    Ok(())
}

fn format_duration(duration: std::time::Duration) -> String {
    let seconds = duration.as_secs();
    format!("{}:{:02}", seconds / 60, seconds % 60)
}
