mod bootstrap;
mod health;
mod routes;

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use promptrelay_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use tokio::net::TcpListener;

#[derive(Debug, Parser)]
#[command(
    name = "promptrelay-server",
    version,
    about = "Relay Slack commands and mentions to hosted LLM deployments"
)]
struct Args {
    /// Path to a TOML config file (defaults to ./promptrelay.toml when present)
    #[arg(long, short)]
    config: Option<PathBuf>,
    /// Listen port, overriding config and environment
    #[arg(long)]
    port: Option<u16>,
    /// Log level: trace, debug, info, warn or error
    #[arg(long)]
    log_level: Option<String>,
}

impl Args {
    fn load_options(self) -> LoadOptions {
        let require_file = self.config.is_some();
        LoadOptions {
            config_path: self.config,
            require_file,
            overrides: ConfigOverrides {
                port: self.port,
                log_level: self.log_level,
                ..ConfigOverrides::default()
            },
        }
    }
}

fn init_logging(config: &AppConfig) {
    use promptrelay_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run(Args::parse()).await
}

async fn run(args: Args) -> Result<()> {
    let config = AppConfig::load(args.load_options())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    let address = format!("{}:{}", app.config.server.bind_address, app.config.server.port);
    let listener = TcpListener::bind(&address).await?;
    tracing::info!(
        event_name = "system.server.started",
        bind_address = %address,
        bot_user_id = %app.bot.user_id,
        "promptrelay-server listening"
    );

    axum::serve(listener, routes::app_router(app.dispatcher))
        .with_graceful_shutdown(wait_for_shutdown())
        .await?;

    tracing::info!(event_name = "system.server.stopping", "promptrelay-server stopping");
    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(error) = tokio::signal::ctrl_c().await {
        tracing::warn!(
            event_name = "system.server.signal_error",
            error = %error,
            "could not listen for shutdown signal"
        );
    }
}
