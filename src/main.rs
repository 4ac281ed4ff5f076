// ABOUTME: Main entry point for the teamsim environment server
// ABOUTME: Parses the CLI, loads config, initializes logging and metrics, then serves HTTP and WebSocket

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use teamsim::{
    config::Config,
    metrics, paths,
    server::{self, ServerState},
    Environment,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Simulated team chat workspace exposed as a reinforcement-learning environment
#[derive(Parser, Debug)]
#[command(name = "teamsim", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the environment API and live relay (default)
    Start,
    /// Print the action catalog of a freshly reset environment as JSON
    Actions,
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    dotenvy::dotenv().ok();
    let config_path = Config::find_config_file();
    let config = Config::load_from(config_path.as_deref())?;

    match cli.command.unwrap_or(Command::Start) {
        Command::Start => run_server(config, config_path).await,
        Command::Actions => {
            let env = Environment::new(config.environment.clone());
            let json = serde_json::to_string_pretty(&env.list_actions())
                .context("Failed to serialize action catalog")?;
            println!("{}", json);
            Ok(())
        }
        Command::Config => {
            let toml = toml::to_string_pretty(&config).context("Failed to serialize config")?;
            print!("{}", toml);
            Ok(())
        }
    }
}

async fn run_server(config: Config, config_path: Option<PathBuf>) -> Result<()> {
    // Guard must outlive the server so buffered file logs get flushed
    let (file_layer, _log_guard) = if config.logging.file {
        let log_dir = paths::log_dir();
        std::fs::create_dir_all(&log_dir)
            .with_context(|| format!("Failed to create log directory {}", log_dir.display()))?;
        let appender = tracing_appender::rolling::daily(&log_dir, "teamsim.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = tracing_subscriber::fmt::layer()
            .with_writer(writer)
            .with_ansi(false);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,teamsim=debug,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .with(file_layer)
        .init();

    // Config is read before the subscriber exists; report where it came from now
    if let Ok(env_path) = std::env::var("TEAMSIM_CONFIG_PATH") {
        if !Path::new(&env_path).exists() {
            tracing::warn!(path = %env_path, "TEAMSIM_CONFIG_PATH points to a missing file");
        }
    }
    match &config_path {
        Some(path) => tracing::info!(path = %path.display(), "Loaded configuration from file"),
        None => tracing::info!("No config file found, using environment variables and defaults"),
    }

    tracing::info!(
        host = %config.server.host,
        port = config.server.port,
        max_steps = config.environment.max_steps,
        log_to_file = config.logging.file,
        "Starting teamsim environment server"
    );

    let metrics_handle = metrics::init_metrics()?;
    let env = Environment::new(config.environment.clone());
    let state = ServerState::new(env, metrics_handle);

    server::serve(&config.server, state).await
}
