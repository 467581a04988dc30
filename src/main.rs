mod config;
mod links;
mod pipeline;
mod platform;
mod server;
mod songlink;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::links::LinkExtractor;
use crate::pipeline::UpdatePipeline;
use crate::platform::telegram::TelegramChat;
use crate::songlink::SonglinkClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,dikkeplaten=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load configuration: a TOML file when given, the environment otherwise
    let config = match std::env::args().nth(1).map(PathBuf::from) {
        Some(config_path) => {
            info!("Loading configuration from: {}", config_path.display());
            Config::load(&config_path).with_context(|| {
                format!("Failed to load config from {}", config_path.display())
            })?
        }
        None => {
            info!("Loading configuration from environment");
            Config::from_env().context("Failed to load config from environment")?
        }
    };

    info!("Configuration loaded successfully");
    info!("  Listen address: {}", config.listen_addr);
    info!("  Webhook: {}", config.webhook.url);
    info!("  Target chat: {}", config.telegram.group_id);
    info!("  song.link: {} ({})", config.songlink.base_url, config.songlink.user_country);

    let extractor = LinkExtractor::new(&config.links.allowed_hosts);
    info!("  Music hosts: {}", extractor.host_count());

    let telegram = Arc::new(TelegramChat::new(
        &config.telegram.api_token,
        config.telegram_api_url()?,
    ));
    telegram
        .register_webhook(config.webhook_url()?, &config.webhook.secret)
        .await?;

    let pipeline = Arc::new(UpdatePipeline::new(
        config.webhook.secret.clone(),
        config.telegram.group_id,
        extractor,
        Arc::new(SonglinkClient::new(config.songlink.clone())),
        telegram,
    ));

    info!("Bridge is starting...");
    server::serve(config.socket_addr()?, server::router(pipeline)).await?;

    Ok(())
}
