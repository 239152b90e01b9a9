use tracing::{debug, warn};

use crate::config::Settings;
use crate::delivery::{parse_chat_id, DeliveryClient};
use crate::entry::Entry;
use crate::error::Result;
use crate::transport::{TransportConfig, DEFAULT_TIMEOUT};

/// Push one entry to the configured chat.
///
/// Stages run in order: transport, client construction, formatting, send.
/// The first failing stage is returned and nothing is retried.
pub async fn push_entry(entry: &Entry, settings: &Settings) -> Result<()> {
    let result = deliver(entry, settings).await;
    if let Err(e) = &result {
        warn!(stage = %e.kind(), "Telegram push failed: {}", e);
    }
    result
}

/// Same as [`push_entry`] with settings given as raw strings.
///
/// A blank `proxy_url` means a direct connection. Certificate validation stays on.
pub async fn push_entry_with(
    entry: &Entry,
    bot_token: &str,
    chat_id: &str,
    proxy_url: &str,
) -> Result<()> {
    let transport = TransportConfig::from_proxy_url(proxy_url, false, DEFAULT_TIMEOUT)?;
    let settings = Settings {
        transport,
        ..Settings::new(bot_token, parse_chat_id(chat_id)?)
    };
    push_entry(entry, &settings).await
}

async fn deliver(entry: &Entry, settings: &Settings) -> Result<()> {
    let http = settings.transport.build_client()?;

    let mut client = DeliveryClient::new(
        &settings.bot_token,
        http,
        settings.chat_id,
        settings.transport.timeout,
    )?
    .with_disable_notification(settings.disable_notification);
    if let Some(api_url) = &settings.api_url {
        client = client.with_api_url(api_url.clone());
    }
    if settings.verify_token {
        client.verify().await?;
    }

    let body = settings.template.render(entry)?;
    debug!("Rendered {} character message for '{}'", body.chars().count(), entry.url);

    client.send(&body).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PushError;
    use crate::format::MessageTemplate;
    use mockito::{Matcher, Server};
    use serde_json::json;
    use std::time::Duration;
    use teloxide::types::ChatId;

    const TOKEN: &str = "123456:TEST-token";

    fn settings_for(server: &Server, chat_id: i64) -> Settings {
        Settings {
            api_url: Some(server.url().parse().unwrap()),
            verify_token: false,
            transport: TransportConfig::direct(Duration::from_secs(5)),
            ..Settings::new(TOKEN, ChatId(chat_id))
        }
    }

    fn send_path() -> Matcher {
        Matcher::Regex(r"(?i)^/bot123456:TEST-token/sendmessage$".to_string())
    }

    fn message_reply(chat_id: i64, text: &str) -> String {
        json!({
            "ok": true,
            "result": {
                "message_id": 7,
                "date": 1700000000,
                "chat": {"id": chat_id, "type": "private", "first_name": "Reader"},
                "text": text
            }
        })
        .to_string()
    }

    #[tokio::test]
    async fn test_push_sends_html_message() {
        let mut server = Server::new_async().await;
        let body = "Example\n<a href=\"https://example.org/a\">https://example.org/a</a>";
        let mock = server
            .mock("POST", send_path())
            .match_body(Matcher::PartialJson(json!({
                "chat_id": 42,
                "text": body,
                "parse_mode": "HTML",
                "link_preview_options": {"is_disabled": false}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(message_reply(42, body))
            .expect(1)
            .create_async()
            .await;

        let entry = Entry::new("Example", "https://example.org/a");
        push_entry(&entry, &settings_for(&server, 42)).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_silent_push_sets_disable_notification() {
        let mut server = Server::new_async().await;
        let body = "Quiet\n<a href=\"https://x.io\">https://x.io</a>";
        let mock = server
            .mock("POST", send_path())
            .match_body(Matcher::PartialJson(json!({
                "chat_id": 42,
                "disable_notification": true
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(message_reply(42, body))
            .expect(1)
            .create_async()
            .await;

        let settings = Settings {
            disable_notification: true,
            ..settings_for(&server, 42)
        };
        push_entry(&Entry::new("Quiet", "https://x.io"), &settings)
            .await
            .unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_invalid_proxy_makes_no_request() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", Matcher::Any)
            .expect(0)
            .create_async()
            .await;

        let entry = Entry::new("Example", "https://example.org/a");
        for proxy in ["not a url", "http://exa mple.com", "ftp://proxy.local"] {
            let err = push_entry_with(&entry, TOKEN, "42", proxy).await.unwrap_err();
            assert!(matches!(err, PushError::Configuration(_)), "{proxy}");
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_non_numeric_chat_id_makes_no_request() {
        let entry = Entry::new("Example", "https://example.org/a");
        let err = push_entry_with(&entry, TOKEN, "not-a-chat", "").await.unwrap_err();
        assert!(matches!(err, PushError::Configuration(_)));
    }

    #[tokio::test]
    async fn test_malformed_token_is_client_creation_error() {
        let server = Server::new_async().await;
        let settings = Settings {
            bot_token: "garbage".to_string(),
            ..settings_for(&server, 42)
        };
        let err = push_entry(&Entry::new("t", "https://x.io"), &settings)
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::ClientCreation { .. }));
    }

    #[tokio::test]
    async fn test_rejected_token_is_client_creation_error() {
        let mut server = Server::new_async().await;
        let get_me = server
            .mock("POST", Matcher::Regex(r"(?i)/getme$".to_string()))
            .with_status(401)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#)
            .create_async()
            .await;
        let send = server
            .mock("POST", send_path())
            .expect(0)
            .create_async()
            .await;

        let settings = Settings {
            verify_token: true,
            ..settings_for(&server, 42)
        };
        let err = push_entry(&Entry::new("t", "https://x.io"), &settings)
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::ClientCreation { source: Some(_), .. }));
        get_me.assert_async().await;
        send.assert_async().await;
    }

    #[tokio::test]
    async fn test_formatting_error_makes_no_send() {
        let mut server = Server::new_async().await;
        let send = server
            .mock("POST", send_path())
            .expect(0)
            .create_async()
            .await;

        let settings = Settings {
            template: MessageTemplate::parse("{{ title }}").unwrap(),
            ..settings_for(&server, 42)
        };
        let err = push_entry(&Entry::new("", "https://x.io"), &settings)
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::Formatting(_)));
        send.assert_async().await;
    }

    #[tokio::test]
    async fn test_api_rejection_is_delivery_error() {
        let mut server = Server::new_async().await;
        let _rejection = server
            .mock("POST", send_path())
            .with_status(400)
            .with_header("content-type", "application/json")
            .with_body(r#"{"ok":false,"error_code":400,"description":"Bad Request: chat not found"}"#)
            .create_async()
            .await;

        let err = push_entry(&Entry::new("t", "https://x.io"), &settings_for(&server, 42))
            .await
            .unwrap_err();
        assert!(matches!(err, PushError::Delivery { source: Some(_), .. }));
    }

    #[tokio::test]
    async fn test_network_failure_is_delivery_error() {
        // Nothing listens on the discard port.
        let settings = Settings {
            api_url: Some("http://127.0.0.1:9".parse().unwrap()),
            verify_token: false,
            transport: TransportConfig::direct(Duration::from_secs(5)),
            ..Settings::new(TOKEN, ChatId(42))
        };
        let err = push_entry(&Entry::new("t", "https://x.io"), &settings)
            .await
            .unwrap_err();
        assert!(
            matches!(
                err,
                PushError::Delivery {
                    source: Some(teloxide::RequestError::Network(_)),
                    ..
                }
            ),
            "{err:?}"
        );
        assert!(std::error::Error::source(&err).is_some());
    }

    #[tokio::test]
    async fn test_concurrent_pushes_are_independent() {
        let mut server = Server::new_async().await;
        let first = "First\n<a href=\"https://x.io/1\">https://x.io/1</a>";
        let second = "Second\n<a href=\"https://x.io/2\">https://x.io/2</a>";
        let mut mocks = Vec::new();
        for text in [first, second] {
            mocks.push(
                server
                    .mock("POST", send_path())
                    .match_body(Matcher::PartialJson(json!({"chat_id": 42, "text": text})))
                    .with_status(200)
                    .with_header("content-type", "application/json")
                    .with_body(message_reply(42, text))
                    .expect(1)
                    .create_async()
                    .await,
            );
        }

        let settings = settings_for(&server, 42);
        let a = Entry::new("First", "https://x.io/1");
        let b = Entry::new("Second", "https://x.io/2");
        let (ra, rb) = tokio::join!(push_entry(&a, &settings), push_entry(&b, &settings));
        ra.unwrap();
        rb.unwrap();
        for mock in mocks {
            mock.assert_async().await;
        }
    }
}
