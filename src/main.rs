//! serginho - tiered LLM request orchestration
//!
//! Serves chat prompts by routing each one to the right model tier, falling
//! back through cheaper tiers on failure or racing tiers in parallel.

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use serginho::config::{Config, RuntimeEnv};
use serginho::proxy::run_server;
use serginho::Orchestrator;

#[derive(Parser)]
#[command(name = "serginho")]
#[command(about = "Tiered LLM request orchestration with fallback and parallel racing")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,

        /// Override listen address
        #[arg(short, long)]
        listen: Option<String>,
    },

    /// Validate configuration file and credentials
    Check {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },

    /// Show configured providers, fallback chains and the hybrid race set
    Providers {
        /// Path to configuration file
        #[arg(short, long, default_value = "config.toml")]
        config: String,
    },
}

impl Commands {
    fn config_path(&self) -> &str {
        match self {
            Commands::Serve { config, .. }
            | Commands::Check { config }
            | Commands::Providers { config } => config,
        }
    }
}

fn init_tracing(level: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("serginho={},tower_http=info", level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_file(cli.command.config_path())?;
    init_tracing(&config.logging.level);

    let env = RuntimeEnv::detect();

    match cli.command {
        Commands::Serve { config: path, listen } => {
            tracing::info!(config = %path, env = ?env, "Starting serginho");

            if let Some(addr) = listen {
                tracing::info!(listen = %addr, "Override listen address");
                config.server.listen = addr;
            }

            run_server(config, env).await
        }

        Commands::Check { config: path } => {
            tracing::info!(config = %path, "Checking configuration");

            let (_, key_source) = config.upstream.resolve_credential(env)?;
            let orchestrator = Orchestrator::from_config(&config, env)?;

            println!("Configuration OK: {}", path);
            println!("  upstream key: {}", key_source);
            println!("  providers:    {}", orchestrator.providers().len());
            println!("  hybrid set:   {}", orchestrator.race_set().join(", "));
            println!("  specialists:  {}", config.specialists.len());
            Ok(())
        }

        Commands::Providers { config: path } => {
            tracing::debug!(config = %path, "Listing providers");

            let orchestrator = Orchestrator::from_config(&config, RuntimeEnv::Test)?;
            for provider in orchestrator.providers().iter() {
                let fallback = orchestrator.fallback().chain(provider.id());
                println!(
                    "{:<16} {:<9} {:<32} -> {}",
                    provider.id(),
                    provider.tier(),
                    provider.model(),
                    if fallback.is_empty() {
                        "(none)".to_string()
                    } else {
                        fallback.join(" -> ")
                    }
                );
            }
            println!("hybrid: {}", orchestrator.race_set().join(", "));
            Ok(())
        }
    }
}
