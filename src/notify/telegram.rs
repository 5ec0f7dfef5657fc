//! Telegram Bot API transport.

use std::time::Duration;

use async_trait::async_trait;
use serde::Serialize;
use tracing::{debug, instrument};
use url::Url;

use crate::error::NotifyError;
use crate::metrics;

use super::Notifier;

/// Default Bot API base URL.
pub const TELEGRAM_API_URL: &str = "https://api.telegram.org/";

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    parse_mode: &'static str,
    disable_web_page_preview: bool,
}

/// Sends HTML messages through `sendMessage`.
#[derive(Debug, Clone)]
pub struct TelegramNotifier {
    http: reqwest::Client,
    api_url: Url,
    token: String,
}

impl TelegramNotifier {
    /// Create a notifier for the given bot token.
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self, NotifyError> {
        let api_url = Url::parse(TELEGRAM_API_URL)
            .map_err(|e| NotifyError::Unavailable(format!("bad api url: {}", e)))?;
        Self::with_api_url(api_url, token, timeout)
    }

    /// Create a notifier against a custom Bot API endpoint.
    pub fn with_api_url(
        api_url: Url,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(5))
            .build()?;

        Ok(Self {
            http,
            api_url,
            token: token.into(),
        })
    }

    fn send_message_url(&self) -> Result<Url, NotifyError> {
        let mut url = self.api_url.clone();
        url.path_segments_mut()
            .map_err(|_| NotifyError::Unavailable("api url cannot be a base".into()))?
            .pop_if_empty()
            .push(&format!("bot{}", self.token))
            .push("sendMessage");
        Ok(url)
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    #[instrument(skip(self, text), fields(chars = text.chars().count()))]
    async fn send(&self, channel: &str, text: &str) -> Result<(), NotifyError> {
        let url = self.send_message_url()?;
        let body = SendMessage {
            chat_id: channel,
            text,
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let timer = metrics::timer_notify();
        let response = self.http.post(url).json(&body).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(NotifyError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        debug!(elapsed_ms = timer.elapsed_ms(), "Telegram message sent");

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn send_message_url_embeds_token() {
        let notifier = TelegramNotifier::new("123:abc", Duration::from_secs(5)).unwrap();

        assert_eq!(
            notifier.send_message_url().unwrap().as_str(),
            "https://api.telegram.org/bot123:abc/sendMessage"
        );
    }

    #[test]
    fn payload_uses_html_parse_mode() {
        let body = SendMessage {
            chat_id: "-100",
            text: "<b>hi</b>",
            parse_mode: "HTML",
            disable_web_page_preview: true,
        };

        let json = serde_json::to_value(&body).unwrap();

        assert_eq!(json["parse_mode"], "HTML");
        assert_eq!(json["disable_web_page_preview"], true);
        assert_eq!(json["chat_id"], "-100");
    }
}
