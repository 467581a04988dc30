use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{AllowedUpdate, MessageId};
use tracing::{debug, info};
use url::Url;

use super::ChatPlatform;

/// Telegram Bot API access through teloxide.
#[derive(Clone)]
pub struct TelegramChat {
    bot: Bot,
}

impl TelegramChat {
    pub fn new(api_token: &str, api_url: Url) -> Self {
        Self {
            bot: Bot::new(api_token).set_api_url(api_url),
        }
    }

    /// Point Telegram at our webhook. Only channel posts are requested and
    /// every delivery must carry `secret` in its secret-token header.
    pub async fn register_webhook(&self, webhook_url: Url, secret: &str) -> Result<()> {
        info!("Registering Telegram webhook at {}", webhook_url);
        self.bot
            .set_webhook(webhook_url)
            .secret_token(secret.to_string())
            .allowed_updates(vec![AllowedUpdate::ChannelPost])
            .await
            .context("Failed to register Telegram webhook")?;
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for TelegramChat {
    async fn delete_message(&self, chat_id: i64, message_id: i32) -> Result<()> {
        debug!("Deleting message {} in chat {}", message_id, chat_id);
        self.bot
            .delete_message(ChatId(chat_id), MessageId(message_id))
            .await
            .with_context(|| format!("Failed to delete message {message_id} in chat {chat_id}"))?;
        Ok(())
    }

    async fn send_message(&self, chat_id: i64, text: &str) -> Result<()> {
        debug!("Sending {} byte message to chat {}", text.len(), chat_id);
        self.bot
            .send_message(ChatId(chat_id), text)
            .await
            .with_context(|| format!("Failed to send message to chat {chat_id}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{method, path_regex};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn chat_for(server: &MockServer) -> TelegramChat {
        TelegramChat::new("123:abc", Url::parse(&server.uri()).unwrap())
    }

    #[tokio::test]
    async fn test_delete_message_hits_bot_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)^/bot123:abc/deletemessage$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"ok":true,"result":true}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        chat_for(&server).delete_message(-100, 42).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_message_api_error_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)^/bot123:abc/deletemessage$"))
            .respond_with(ResponseTemplate::new(400).set_body_string(
                r#"{"ok":false,"error_code":400,"description":"Bad Request: message to delete not found"}"#,
            ))
            .mount(&server)
            .await;

        let err = chat_for(&server).delete_message(-100, 42).await.unwrap_err();
        assert!(format!("{err:#}").contains("Failed to delete message 42"));
    }

    #[tokio::test]
    async fn test_register_webhook_sends_secret_and_channel_posts_only() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)^/bot123:abc/setwebhook$"))
            .respond_with(
                ResponseTemplate::new(200).set_body_string(r#"{"ok":true,"result":true}"#),
            )
            .expect(1)
            .mount(&server)
            .await;

        chat_for(&server)
            .register_webhook(
                Url::parse("https://bot.example.org/dikkeplaten").unwrap(),
                "hook-secret_1",
            )
            .await
            .unwrap();

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body = String::from_utf8_lossy(&requests[0].body);
        assert!(body.contains("https://bot.example.org/dikkeplaten"), "{body}");
        assert!(body.contains("hook-secret_1"), "{body}");
        assert!(body.contains("channel_post"), "{body}");
    }

    #[tokio::test]
    async fn test_register_webhook_rejection_is_reported() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)^/bot123:abc/setwebhook$"))
            .respond_with(ResponseTemplate::new(401).set_body_string(
                r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#,
            ))
            .mount(&server)
            .await;

        let err = chat_for(&server)
            .register_webhook(
                Url::parse("https://bot.example.org/dikkeplaten").unwrap(),
                "hook-secret_1",
            )
            .await
            .unwrap_err();
        assert!(format!("{err:#}").contains("Failed to register Telegram webhook"));
    }

    #[tokio::test]
    async fn test_send_message_posts_chat_id_and_exact_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"(?i)^/bot123:abc/sendmessage$"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"ok":true,"result":{"message_id":43,"date":1700000000,"chat":{"id":-100,"type":"channel","title":"Dikke Platen"},"sender_chat":{"id":-100,"type":"channel","title":"Dikke Platen"},"text":"Spotify: https://a\n\nYoutube: https://b"}}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let text = "Spotify: https://a\n\nYoutube: https://b";
        // Only the outgoing request is checked here; decoding of the
        // returned message belongs to teloxide.
        let _ = chat_for(&server).send_message(-100, text).await;

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(body["chat_id"], serde_json::json!(-100));
        assert_eq!(body["text"], serde_json::json!(text));
    }
}
