use anyhow::{Context, Result};
use serde::Deserialize;
use std::net::SocketAddr;
use std::path::Path;
use url::Url;

use crate::links::DEFAULT_ALLOWED_HOSTS;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_listen_addr")]
    pub listen_addr: String,
    pub webhook: WebhookConfig,
    pub telegram: TelegramConfig,
    #[serde(default)]
    pub songlink: SonglinkConfig,
    #[serde(default)]
    pub links: LinksConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct WebhookConfig {
    /// Public URL Telegram should deliver channel posts to.
    pub url: String,
    /// Shared secret echoed back in `X-Telegram-Bot-Api-Secret-Token`.
    pub secret: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    pub api_token: String,
    #[serde(default = "default_telegram_api_url")]
    pub api_url: String,
    /// The only chat whose posts get rewritten.
    pub group_id: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SonglinkConfig {
    #[serde(default = "default_songlink_base_url")]
    pub base_url: String,
    #[serde(default = "default_user_country")]
    pub user_country: String,
}

impl Default for SonglinkConfig {
    fn default() -> Self {
        Self {
            base_url: default_songlink_base_url(),
            user_country: default_user_country(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LinksConfig {
    #[serde(default = "default_allowed_hosts")]
    pub allowed_hosts: Vec<String>,
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            allowed_hosts: default_allowed_hosts(),
        }
    }
}

fn default_listen_addr() -> String {
    "0.0.0.0:8888".to_string()
}

fn default_telegram_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_songlink_base_url() -> String {
    "https://api.song.link/v1-alpha.1/links".to_string()
}

fn default_user_country() -> String {
    "BE".to_string()
}

fn default_allowed_hosts() -> Vec<String> {
    DEFAULT_ALLOWED_HOSTS.iter().map(|h| h.to_string()).collect()
}

impl Config {
    /// Load from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_toml_str(&content)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config")?;
        config.validate()?;
        Ok(config)
    }

    /// Load from process environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key/value source using the environment variable names.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |key: &str| -> Result<String> {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .with_context(|| format!("Missing required environment variable {key}"))
        };
        let optional = |key: &str, default: fn() -> String| -> String {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(default)
        };

        let raw_group_id = required("TELEGRAM_GROUP_ID")?;
        let group_id = raw_group_id
            .trim()
            .parse::<i64>()
            .with_context(|| format!("TELEGRAM_GROUP_ID is not a valid chat id: {raw_group_id}"))?;

        let config = Config {
            listen_addr: optional("LISTEN_ADDR", default_listen_addr),
            webhook: WebhookConfig {
                url: required("WEBHOOK_URL")?,
                secret: required("WEBHOOK_SECRET")?,
            },
            telegram: TelegramConfig {
                api_token: required("TELEGRAM_API_TOKEN")?,
                api_url: optional("TELEGRAM_API_URL", default_telegram_api_url),
                group_id,
            },
            songlink: SonglinkConfig {
                base_url: optional("SONGLINK_BASE_URL", default_songlink_base_url),
                user_country: optional("SONGLINK_USER_COUNTRY", default_user_country),
            },
            links: LinksConfig::default(),
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks everything that would otherwise only fail on first use.
    pub fn validate(&self) -> Result<()> {
        self.socket_addr()?;
        self.webhook_url()?;
        self.telegram_api_url()?;
        Url::parse(&self.songlink.base_url)
            .with_context(|| format!("Invalid song.link base URL: {}", self.songlink.base_url))?;

        // Telegram only accepts 1-256 characters from A-Z, a-z, 0-9, _ and -.
        let secret = &self.webhook.secret;
        if secret.is_empty()
            || secret.len() > 256
            || !secret
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        {
            anyhow::bail!(
                "Webhook secret must be 1-256 characters of A-Z, a-z, 0-9, '_' or '-'"
            );
        }
        if self.telegram.api_token.trim().is_empty() {
            anyhow::bail!("Telegram API token must not be empty");
        }
        if self.songlink.user_country.trim().is_empty() {
            anyhow::bail!("song.link user country must not be empty");
        }
        if self.links.allowed_hosts.iter().all(|h| h.trim().is_empty()) {
            anyhow::bail!("At least one allowed music host is required");
        }
        Ok(())
    }

    pub fn socket_addr(&self) -> Result<SocketAddr> {
        self.listen_addr
            .parse()
            .with_context(|| format!("Invalid listen address: {}", self.listen_addr))
    }

    pub fn webhook_url(&self) -> Result<Url> {
        Url::parse(&self.webhook.url)
            .with_context(|| format!("Invalid webhook URL: {}", self.webhook.url))
    }

    pub fn telegram_api_url(&self) -> Result<Url> {
        Url::parse(&self.telegram.api_url)
            .with_context(|| format!("Invalid Telegram API URL: {}", self.telegram.api_url))
    }
}
