//! chatrelay - Conversational proxy for LLM inference APIs
//!
//! A small server that keeps a rolling chat history per session and
//! forwards each turn to one configured inference API.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chatrelay::config::Config;
use chatrelay::persona;
use chatrelay::proxy::run_server;

#[derive(Parser)]
#[command(name = "chatrelay")]
#[command(about = "Conversational proxy for LLM inference APIs")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the chat server
    Serve {
        /// Path to configuration file (defaults and environment only when omitted)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration and show the resolved upstream
    Check {
        /// Path to configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "chatrelay=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { config, listen } => {
            if let Some(path) = &config {
                tracing::info!(config = %path.display(), "Loading configuration");
            }
            let (mut config, key_source) = Config::load(config.as_deref())?;
            tracing::info!(key_source = %key_source, "Resolved upstream API key");

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config).await
        }

        Commands::Check { config } => {
            let (config, key_source) = Config::load(config.as_deref())?;
            let seed = persona::seed_prompt(&config.persona)?;
            let upstream = &config.upstream;

            println!("Configuration OK");
            println!("  listen:    {}", config.server.listen);
            println!("  upstream:  {} ({})", upstream.name, upstream.url);
            println!("  model:     {}", upstream.model_label());
            println!("  strategy:  {}", upstream.strategy.as_str());
            println!("  api key:   {}", key_source);
            println!("  timeout:   {}s", upstream.timeout_secs);
            println!("  history:   {:?}", config.history.trim_policy());
            println!("  sessions:  {:?}", config.history.session_limits());
            println!(
                "  persona:   {}",
                seed.map(|s| format!("{} chars", s.chars().count()))
                    .unwrap_or_else(|| "none".to_string())
            );
            Ok(())
        }
    }
}
