//! Minimal Telegram bot client.
//!
//! Sends text messages with optional inline action buttons. A bot with
//! no token skips the send and logs instead, as does dry-run mode.

use reqwest::Client;
use serde_json::json;
use tracing::{info, warn};

/// One inline keyboard button.
#[derive(Debug, Clone)]
pub struct ActionButton {
    pub label: String,
    pub callback_data: String,
}

impl ActionButton {
    pub fn new(label: impl Into<String>, callback_data: impl Into<String>) -> Self {
        Self { label: label.into(), callback_data: callback_data.into() }
    }
}

/// A Telegram bot bound to one chat.
#[derive(Debug, Clone)]
pub struct TelegramBot {
    name: &'static str,
    token: Option<String>,
    chat_id: String,
    dry_run: bool,
    client: Client,
}

impl TelegramBot {
    pub fn new(
        name: &'static str,
        token: Option<String>,
        chat_id: impl Into<String>,
        dry_run: bool,
    ) -> Self {
        Self {
            name,
            token,
            chat_id: chat_id.into(),
            dry_run,
            client: Client::new(),
        }
    }

    /// Whether this bot can actually send.
    pub fn is_configured(&self) -> bool {
        self.token.is_some() && !self.chat_id.is_empty()
    }

    /// Send a message. `Ok(true)` = delivered, `Ok(false)` = skipped
    /// (unconfigured or dry-run), `Err` = transient failure worth
    /// queueing for retry.
    pub async fn send(&self, text: &str, buttons: &[ActionButton]) -> Result<bool, String> {
        let Some(token) = &self.token else {
            info!(bot = self.name, "no token configured, skipping send: {}", preview(text));
            return Ok(false);
        };
        if self.chat_id.is_empty() {
            info!(bot = self.name, "no chat id configured, skipping send");
            return Ok(false);
        }
        if self.dry_run {
            info!(bot = self.name, "dry run, not sending: {}", preview(text));
            return Ok(false);
        }

        let mut body = json!({
            "chat_id": self.chat_id,
            "text": text,
            "parse_mode": "HTML",
            "disable_web_page_preview": true,
        });
        if !buttons.is_empty() {
            let keyboard: Vec<Vec<serde_json::Value>> = vec![buttons
                .iter()
                .map(|b| json!({"text": b.label, "callback_data": b.callback_data}))
                .collect()];
            body["reply_markup"] = json!({ "inline_keyboard": keyboard });
        }

        let url = format!("https://api.telegram.org/bot{token}/sendMessage");
        let response = self
            .client
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("telegram request failed: {e}"))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            warn!(bot = self.name, status = %status, body = %error_body, "telegram send failed");
            return Err(format!("telegram HTTP {status}"));
        }

        Ok(true)
    }
}

fn preview(text: &str) -> &str {
    let end = text.len().min(120);
    let mut boundary = end;
    while !text.is_char_boundary(boundary) && boundary > 0 {
        boundary -= 1;
    }
    &text[..boundary]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unconfigured_bot_skips() {
        let bot = TelegramBot::new("jobs", None, "123", false);
        assert!(!bot.is_configured());
        assert_eq!(bot.send("hello", &[]).await, Ok(false));
    }

    #[tokio::test]
    async fn test_dry_run_skips() {
        let bot = TelegramBot::new("jobs", Some("token".into()), "123", true);
        assert!(bot.is_configured());
        assert_eq!(bot.send("hello", &[]).await, Ok(false));
    }

    #[tokio::test]
    async fn test_missing_chat_id_skips() {
        let bot = TelegramBot::new("jobs", Some("token".into()), "", false);
        assert_eq!(bot.send("hello", &[]).await, Ok(false));
    }
}
