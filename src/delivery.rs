use std::time::Duration;

use reqwest::Url;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::requests::Request;
use teloxide::types::{LinkPreviewOptions, ParseMode};
use tracing::{debug, info};

use crate::error::{PushError, Result};

/// Parse a chat identifier. Unlike a lenient parse this never falls back to chat 0.
pub fn parse_chat_id(raw: &str) -> Result<ChatId> {
    let trimmed = raw.trim();
    trimmed
        .parse::<i64>()
        .map(ChatId)
        .map_err(|e| {
            PushError::Configuration(format!("chat id '{}' is not numeric: {}", trimmed, e))
        })
}

/// Ask Telegram to build a preview card for the first link in the message.
const LINK_PREVIEW_ON: LinkPreviewOptions = LinkPreviewOptions {
    is_disabled: false,
    url: None,
    prefer_small_media: false,
    prefer_large_media: false,
    show_above_text: false,
};

/// Bot tokens look like `123456789:AAE...`.
fn check_token_shape(token: &str) -> Result<()> {
    let Some((id, secret)) = token.split_once(':') else {
        return Err(PushError::client_creation("bot token is malformed"));
    };
    if id.is_empty() || !id.bytes().all(|b| b.is_ascii_digit()) || secret.is_empty() {
        return Err(PushError::client_creation("bot token is malformed"));
    }
    if token.chars().any(char::is_whitespace) {
        return Err(PushError::client_creation("bot token contains whitespace"));
    }
    Ok(())
}

/// Sends one message to one chat with one bot credential.
pub struct DeliveryClient {
    bot: Bot,
    chat_id: ChatId,
    timeout: Duration,
    disable_notification: bool,
}

impl DeliveryClient {
    /// Bind a bot to `token` over `client`. No request is made here.
    pub fn new(
        token: &str,
        client: reqwest::Client,
        chat_id: ChatId,
        timeout: Duration,
    ) -> Result<Self> {
        check_token_shape(token)?;
        Ok(Self {
            bot: Bot::with_client(token, client),
            chat_id,
            timeout,
            disable_notification: false,
        })
    }

    /// Point the bot at another Bot API server.
    pub fn with_api_url(mut self, api_url: Url) -> Self {
        self.bot = self.bot.set_api_url(api_url);
        self
    }

    pub fn with_disable_notification(mut self, disable: bool) -> Self {
        self.disable_notification = disable;
        self
    }

    /// Ask the API who the token belongs to. Rejection means the client cannot be used.
    pub async fn verify(&self) -> Result<()> {
        let me = match tokio::time::timeout(self.timeout, self.bot.get_me().send()).await {
            Ok(Ok(me)) => me,
            Ok(Err(e)) => {
                return Err(PushError::ClientCreation {
                    reason: e.to_string(),
                    source: Some(e),
                })
            }
            Err(_) => {
                return Err(PushError::client_creation(format!(
                    "getMe timed out after {:?}",
                    self.timeout
                )))
            }
        };
        debug!("Authenticated as bot {}", me.user.id.0);
        Ok(())
    }

    /// Send an HTML message with link previews enabled.
    pub async fn send(&self, html: &str) -> Result<()> {
        let request = self
            .bot
            .send_message(self.chat_id, html)
            .parse_mode(ParseMode::Html)
            .link_preview_options(LINK_PREVIEW_ON)
            .disable_notification(self.disable_notification);

        match tokio::time::timeout(self.timeout, request.send()).await {
            Ok(Ok(message)) => {
                info!(
                    "Telegram message {} delivered to chat {}",
                    message.id.0, self.chat_id.0
                );
                Ok(())
            }
            Ok(Err(e)) => Err(PushError::delivery(e)),
            Err(_) => Err(PushError::Delivery {
                reason: format!("no response within {:?}", self.timeout),
                source: None,
            }),
        }
    }
}
