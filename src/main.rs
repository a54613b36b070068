mod bot;
mod cache;
mod commands;
mod config;
mod downloader;
mod gemini;
mod links;
mod media;
mod message_log;
mod scheduler;
mod server;
mod settings;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use teloxide::Bot;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::bot::AppState;
use crate::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,linkfixer=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    info!("Configuration loaded successfully");
    info!("  Gemini model: {}", config.gemini.model);
    info!("  Download directory: {}", config.downloads.directory.display());
    info!("  Video server enabled: {}", config.server.enabled);

    let state = Arc::new(AppState::new(config)?);

    if !state.downloader.check_installation().await {
        warn!("yt-dlp is not available; video downloads will fail");
    }

    let bot = Bot::new(&state.config.telegram.bot_token);

    let sched = scheduler::Scheduler::new().await?;
    scheduler::register_jobs(&sched, bot.clone(), state.clone()).await?;
    sched.start().await?;

    if state.config.server.enabled {
        let server_config = state.config.server.clone();
        let downloads_config = state.config.downloads.clone();
        tokio::spawn(async move {
            if let Err(e) = server::run(&server_config, &downloads_config).await {
                error!("Video server failed: {:#}", e);
            }
        });
    }

    info!("Bot is starting...");
    bot::run(bot, state).await?;

    Ok(())
}
