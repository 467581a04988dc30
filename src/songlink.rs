use std::collections::{BTreeMap, HashMap};

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::debug;

use crate::config::SonglinkConfig;

/// Streaming services reported back to the chat, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Platform {
    Spotify,
    Youtube,
    YoutubeMusic,
    AppleMusic,
    SoundCloud,
}

impl Platform {
    pub const ALL: [Platform; 5] = [
        Platform::Spotify,
        Platform::Youtube,
        Platform::YoutubeMusic,
        Platform::AppleMusic,
        Platform::SoundCloud,
    ];

    /// Key used in song.link's `linksByPlatform` object.
    pub fn api_key(self) -> &'static str {
        match self {
            Platform::Spotify => "spotify",
            Platform::Youtube => "youtube",
            Platform::YoutubeMusic => "youtubeMusic",
            Platform::AppleMusic => "appleMusic",
            Platform::SoundCloud => "soundcloud",
        }
    }

    /// Human-facing label used in the rewritten chat message.
    pub fn label(self) -> &'static str {
        match self {
            Platform::Spotify => "Spotify",
            Platform::Youtube => "Youtube",
            Platform::YoutubeMusic => "Youtube Music",
            Platform::AppleMusic => "Apple Music",
            Platform::SoundCloud => "SoundCloud",
        }
    }
}

impl std::fmt::Display for Platform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Per-platform canonical URLs for a single song. Built fresh per request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UnifiedLinks {
    links: BTreeMap<Platform, String>,
}

impl UnifiedLinks {
    /// Stores `url` for `platform`; empty URLs count as absent.
    pub fn insert(&mut self, platform: Platform, url: impl Into<String>) {
        let url = url.into();
        if url.trim().is_empty() {
            self.links.remove(&platform);
        } else {
            self.links.insert(platform, url);
        }
    }

    #[cfg(test)]
    pub fn get(&self, platform: Platform) -> Option<&str> {
        self.links.get(&platform).map(String::as_str)
    }

    /// Resolved links in display order.
    pub fn iter(&self) -> impl Iterator<Item = (Platform, &str)> {
        self.links.iter().map(|(p, u)| (*p, u.as_str()))
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[derive(Debug, Deserialize)]
struct PlatformLink {
    #[serde(default)]
    url: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SonglinkResponse {
    #[serde(default)]
    links_by_platform: HashMap<String, PlatformLink>,
}

impl From<SonglinkResponse> for UnifiedLinks {
    fn from(mut response: SonglinkResponse) -> Self {
        let mut links = UnifiedLinks::default();
        for platform in Platform::ALL {
            if let Some(entry) = response.links_by_platform.remove(platform.api_key()) {
                links.insert(platform, entry.url);
            }
        }
        links
    }
}

/// Turns one streaming URL into its equivalents on other services.
#[async_trait]
pub trait LinkResolver: Send + Sync {
    async fn resolve(&self, music_url: &str) -> Result<UnifiedLinks>;
}

pub struct SonglinkClient {
    client: reqwest::Client,
    config: SonglinkConfig,
}

impl SonglinkClient {
    pub fn new(config: SonglinkConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl LinkResolver for SonglinkClient {
    async fn resolve(&self, music_url: &str) -> Result<UnifiedLinks> {
        debug!("Resolving {} via song.link", music_url);

        let response = self
            .client
            .get(&self.config.base_url)
            .query(&[
                ("url", music_url),
                ("userCountry", self.config.user_country.as_str()),
                ("songIfSingle", "true"),
            ])
            .send()
            .await
            .context("Failed to send request to song.link")?;

        let status = response.status();
        if status != StatusCode::OK {
            let error_body = response.text().await.unwrap_or_default();
            anyhow::bail!("song.link API error ({}): {}", status, error_body);
        }

        let body: SonglinkResponse = response
            .json()
            .await
            .context("Failed to parse song.link response")?;

        let links = UnifiedLinks::from(body);
        debug!("song.link returned {} usable platform link(s)", links.len());
        Ok(links)
    }
}
