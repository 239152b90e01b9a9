use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Url;
use serde::Deserialize;
use teloxide::types::ChatId;

use crate::delivery::parse_chat_id;
use crate::error::PushError;
use crate::format::MessageTemplate;
use crate::transport::{TransportConfig, DEFAULT_TIMEOUT};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
}

/// The `[telegram]` table as written by the user.
#[derive(Debug, Deserialize, Clone)]
pub struct TelegramConfig {
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    pub bot_token: String,
    pub chat_id: String,
    #[serde(default)]
    pub proxy_url: String,
    /// Skip TLS certificate validation. Independent of `proxy_url`.
    #[serde(default)]
    pub accept_invalid_certs: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_verify_token")]
    pub verify_token: bool,
    #[serde(default)]
    pub disable_notification: bool,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub message_template: Option<String>,
}

/// Validated delivery settings, ready for [`crate::push_entry`].
#[derive(Debug, Clone)]
pub struct Settings {
    pub bot_token: String,
    pub chat_id: ChatId,
    pub transport: TransportConfig,
    pub verify_token: bool,
    pub disable_notification: bool,
    pub api_url: Option<Url>,
    pub template: MessageTemplate,
}

fn default_enabled() -> bool {
    true
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT.as_secs()
}

fn default_verify_token() -> bool {
    true
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::parse(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        // Surface bad proxy/chat/template values at load time.
        config.telegram.settings()?;
        Ok(config)
    }
}

impl TelegramConfig {
    pub fn settings(&self) -> std::result::Result<Settings, PushError> {
        if self.timeout_secs == 0 {
            return Err(PushError::Configuration(
                "timeout_secs must be greater than zero".to_string(),
            ));
        }
        let timeout = Duration::from_secs(self.timeout_secs);

        let transport =
            TransportConfig::from_proxy_url(&self.proxy_url, self.accept_invalid_certs, timeout)?;
        let chat_id = parse_chat_id(&self.chat_id)?;

        let api_url = match self.api_url.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(raw) => Some(Url::parse(raw).map_err(|e| {
                PushError::Configuration(format!("api_url '{}' is invalid: {}", raw, e))
            })?),
        };

        let template = match &self.message_template {
            Some(source) => MessageTemplate::parse(source)?,
            None => MessageTemplate::default(),
        };

        Ok(Settings {
            bot_token: self.bot_token.clone(),
            chat_id,
            transport,
            verify_token: self.verify_token,
            disable_notification: self.disable_notification,
            api_url,
            template,
        })
    }
}

impl Settings {
    /// Direct transport, default template, token verification on.
    pub fn new(bot_token: impl Into<String>, chat_id: ChatId) -> Self {
        Self {
            bot_token: bot_token.into(),
            chat_id,
            transport: TransportConfig::direct(DEFAULT_TIMEOUT),
            verify_token: default_verify_token(),
            disable_notification: false,
            api_url: None,
            template: MessageTemplate::default(),
        }
    }
}
