use std::sync::Arc;

use subtle::ConstantTimeEq;
use tracing::info;

use crate::links::LinkExtractor;
use crate::platform::{BotUpdate, ChatPlatform};
use crate::songlink::{LinkResolver, UnifiedLinks};

/// Why an update was not turned into a rewritten post.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("invalid secret token")]
    Unauthorized,

    #[error("malformed update body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("update from unexpected chat {0}")]
    ForeignChat(i64),

    #[error("no recognised music link in message {0}")]
    NoMusicLink(i32),

    #[error("link resolution failed: {0:#}")]
    Resolve(anyhow::Error),

    #[error("song.link returned no platform links for {0}")]
    NothingResolved(String),

    #[error("deleting original message failed: {0:#}")]
    Delete(anyhow::Error),

    #[error("posting unified links failed (original already deleted): {0:#}")]
    Send(anyhow::Error),
}

impl PipelineError {
    /// Updates that simply weren't meant for us; not worth a warning.
    pub fn is_ignorable(&self) -> bool {
        matches!(self, Self::ForeignChat(_) | Self::NoMusicLink(_))
    }
}

/// Outcome of a successful rewrite.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delivered {
    pub chat_id: i64,
    pub replaced_message_id: i32,
    pub platforms: usize,
}

/// Render one `"<Label>: <url>"` line per resolved platform, blank line between.
pub fn format_links(links: &UnifiedLinks) -> String {
    links
        .iter()
        .map(|(platform, url)| format!("{platform}: {url}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Single-pass handling of one webhook delivery: authenticate, decode,
/// route, extract, resolve, then delete the original post and repost.
pub struct UpdatePipeline {
    secret: String,
    group_id: i64,
    extractor: LinkExtractor,
    resolver: Arc<dyn LinkResolver>,
    chat: Arc<dyn ChatPlatform>,
}

impl UpdatePipeline {
    pub fn new(
        secret: impl Into<String>,
        group_id: i64,
        extractor: LinkExtractor,
        resolver: Arc<dyn LinkResolver>,
        chat: Arc<dyn ChatPlatform>,
    ) -> Self {
        Self {
            secret: secret.into(),
            group_id,
            extractor,
            resolver,
            chat,
        }
    }

    fn secret_matches(&self, provided: Option<&str>) -> bool {
        match provided {
            Some(token) => bool::from(token.as_bytes().ct_eq(self.secret.as_bytes())),
            None => false,
        }
    }

    pub async fn handle(
        &self,
        secret_token: Option<&str>,
        body: &[u8],
    ) -> Result<Delivered, PipelineError> {
        if !self.secret_matches(secret_token) {
            return Err(PipelineError::Unauthorized);
        }

        let update: BotUpdate = serde_json::from_slice(body)?;
        let post = update.channel_post;

        if post.chat.id != self.group_id {
            return Err(PipelineError::ForeignChat(post.chat.id));
        }

        let music_url = self
            .extractor
            .extract(post.text())
            .ok_or(PipelineError::NoMusicLink(post.message_id))?;

        info!(
            "Resolving {} from message {} in chat {}",
            music_url, post.message_id, post.chat.id
        );

        let links = self
            .resolver
            .resolve(&music_url)
            .await
            .map_err(PipelineError::Resolve)?;

        if links.is_empty() {
            return Err(PipelineError::NothingResolved(music_url));
        }

        // Delete strictly before posting. A failed post leaves the chat
        // without the original message.
        self.chat
            .delete_message(post.chat.id, post.message_id)
            .await
            .map_err(PipelineError::Delete)?;

        self.chat
            .send_message(post.chat.id, &format_links(&links))
            .await
            .map_err(PipelineError::Send)?;

        Ok(Delivered {
            chat_id: post.chat.id,
            replaced_message_id: post.message_id,
            platforms: links.len(),
        })
    }
}
