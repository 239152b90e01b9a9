use std::time::Duration;

use reqwest::{Proxy, Url};
use tracing::{debug, warn};

use crate::error::{PushError, Result};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound HTTP settings for one delivery.
#[derive(Debug, Clone, PartialEq)]
pub struct TransportConfig {
    pub proxy: Option<Url>,
    pub accept_invalid_certs: bool,
    pub timeout: Duration,
}

impl TransportConfig {
    /// Direct connection with certificate validation enabled.
    pub fn direct(timeout: Duration) -> Self {
        Self {
            proxy: None,
            accept_invalid_certs: false,
            timeout,
        }
    }

    /// Resolve the user supplied proxy string. Blank means no proxy.
    pub fn from_proxy_url(
        proxy_url: &str,
        accept_invalid_certs: bool,
        timeout: Duration,
    ) -> Result<Self> {
        let proxy = parse_proxy_url(proxy_url)?;
        Ok(Self {
            proxy,
            accept_invalid_certs,
            timeout,
        })
    }

    /// Build the client. Opens no connection.
    pub fn build_client(&self) -> Result<reqwest::Client> {
        let mut builder = teloxide::net::default_reqwest_settings().timeout(self.timeout);

        if let Some(proxy) = &self.proxy {
            debug!("Routing Telegram traffic through proxy {}", redact(proxy));
            let proxy = Proxy::all(proxy.clone())
                .map_err(|e| PushError::Configuration(format!("proxy url invalid: {}", e)))?;
            builder = builder.proxy(proxy);
        }

        if self.accept_invalid_certs {
            warn!("TLS certificate validation is disabled for Telegram traffic");
            builder = builder.danger_accept_invalid_certs(true);
        }

        builder.build().map_err(client_setup_error)
    }
}

fn client_setup_error(err: reqwest::Error) -> PushError {
    PushError::client_creation(format!("http client setup failed: {}", err))
}

fn parse_proxy_url(raw: &str) -> Result<Option<Url>> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    let url = Url::parse(trimmed)
        .map_err(|e| PushError::Configuration(format!("proxy url invalid: {}", e)))?;

    match url.scheme() {
        "http" | "https" | "socks5" | "socks5h" => {}
        other => {
            return Err(PushError::Configuration(format!(
                "proxy url invalid: unsupported scheme '{}'",
                other
            )))
        }
    }

    if url.host_str().is_none() {
        return Err(PushError::Configuration(
            "proxy url invalid: missing host".to_string(),
        ));
    }

    Ok(Some(url))
}

/// Proxy URL without credentials, for logs.
fn redact(url: &Url) -> String {
    let mut shown = url.clone();
    if shown.password().is_some() {
        let _ = shown.set_password(Some("***"));
    }
    shown.to_string()
}
