pub mod telegram;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

/// Telegram update as delivered to the webhook. Only channel posts are
/// requested when the webhook is registered, so nothing else is modelled.
#[derive(Debug, Clone, Deserialize)]
pub struct BotUpdate {
    pub channel_post: ChannelPost,
}

/// A message received from the watched channel
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelPost {
    pub message_id: i32,
    pub chat: Chat,
    /// Missing for media posts without a caption
    #[serde(default)]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl ChannelPost {
    pub fn text(&self) -> &str {
        self.text.as_deref().unwrap_or_default()
    }
}

/// Outbound operations the update pipeline needs from the chat platform.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()>;

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()>;
}
