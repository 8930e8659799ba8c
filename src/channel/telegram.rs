//! Telegram channel — long-polls the Bot API for updates.
//!
//! Prompts become reply keyboards (one option per row, nav row last),
//! deep links become a single inline URL button, and the phone step
//! gets a `request_contact` button. A shared contact arriving at any
//! other state is treated as plain input and re-prompts.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::api::types::BotUser;
use crate::error::ChannelError;
use crate::flow::{Dispatcher, Incoming};
use crate::i18n::Lang;
use crate::render::{Render, Reply};
use crate::session::SessionId;

/// Maximum message length for Telegram's sendMessage API.
const TELEGRAM_MAX_MESSAGE_LENGTH: usize = 4096;

#[derive(Clone)]
pub struct TelegramChannel {
    bot_token: String,
    client: reqwest::Client,
}

impl TelegramChannel {
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            client: reqwest::Client::new(),
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("https://api.telegram.org/bot{}/{method}", self.bot_token)
    }

    /// Verify the token against getMe before entering the poll loop.
    pub async fn health_check(&self) -> Result<(), ChannelError> {
        let resp = self
            .client
            .get(self.api_url("getMe"))
            .send()
            .await
            .map_err(|e| ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;
        if resp.status().is_success() {
            Ok(())
        } else {
            Err(ChannelError::StartupFailed {
                name: "telegram".into(),
                reason: format!("getMe returned {}", resp.status()),
            })
        }
    }

    /// Poll for updates forever, handing each message to the dispatcher
    /// on its own task.
    pub async fn run(self: Arc<Self>, dispatcher: Arc<Dispatcher>) {
        let mut offset: i64 = 0;
        tracing::info!("Telegram channel listening for messages...");

        loop {
            let body = json!({
                "offset": offset,
                "timeout": 30,
                "allowed_updates": ["message"]
            });
            let resp = match self
                .client
                .post(self.api_url("getUpdates"))
                .json(&body)
                .send()
                .await
            {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!("Telegram poll error: {e}");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };
            let data: Value = match resp.json().await {
                Ok(d) => d,
                Err(e) => {
                    tracing::warn!("Telegram parse error: {e}");
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    continue;
                }
            };

            let Some(results) = data.get("result").and_then(Value::as_array) else {
                continue;
            };
            for update in results {
                if let Some(uid) = update.get("update_id").and_then(Value::as_i64) {
                    offset = uid + 1;
                }
                let Some(incoming) = parse_update(update) else {
                    continue;
                };
                let channel = Arc::clone(&self);
                let dispatcher = Arc::clone(&dispatcher);
                tokio::spawn(async move {
                    let session_id = incoming.session_id;
                    let replies = dispatcher.handle(incoming).await;
                    if let Err(e) = channel.deliver(session_id, &replies).await {
                        tracing::warn!(chat_id = session_id, error = %e, "failed to deliver replies");
                    }
                });
            }
        }
    }

    async fn send_body(&self, body: Value) -> Result<(), ChannelError> {
        let resp = self
            .client
            .post(self.api_url("sendMessage"))
            .json(&body)
            .send()
            .await
            .map_err(|e| ChannelError::SendFailed {
                name: "telegram".into(),
                reason: e.to_string(),
            })?;
        if !resp.status().is_success() {
            let status = resp.status();
            let err = resp.text().await.unwrap_or_default();
            return Err(ChannelError::SendFailed {
                name: "telegram".into(),
                reason: format!("sendMessage failed ({status}): {err}"),
            });
        }
        Ok(())
    }

    async fn send_reply(&self, chat_id: SessionId, reply: &Reply) -> Result<(), ChannelError> {
        match reply {
            Reply::Prompt { text, options } => {
                let chunks = split_message(text, TELEGRAM_MAX_MESSAGE_LENGTH);
                let last = chunks.len().saturating_sub(1);
                for (i, chunk) in chunks.iter().enumerate() {
                    let mut body = json!({"chat_id": chat_id, "text": chunk});
                    // The keyboard rides on the final chunk only.
                    if i == last && !options.is_empty() {
                        body["reply_markup"] = option_keyboard(options, None);
                    }
                    self.send_body(body).await?;
                }
                Ok(())
            }
            Reply::RequestContact {
                text,
                share_label,
                options,
            } => {
                let mut body = json!({"chat_id": chat_id, "text": text});
                body["reply_markup"] = option_keyboard(options, Some(share_label));
                self.send_body(body).await
            }
            Reply::Link { text, label, url } => {
                let body = json!({
                    "chat_id": chat_id,
                    "text": text,
                    "reply_markup": {
                        "inline_keyboard": [[{"text": label, "url": url}]]
                    }
                });
                self.send_body(body).await
            }
        }
    }
}

#[async_trait]
impl Render for TelegramChannel {
    async fn deliver(&self, session_id: SessionId, replies: &[Reply]) -> Result<(), ChannelError> {
        for reply in replies {
            self.send_reply(session_id, reply).await?;
        }
        Ok(())
    }
}

// ── Update parsing ──────────────────────────────────────────────────

fn parse_update(update: &Value) -> Option<Incoming> {
    let message = update.get("message")?;
    let chat_id = message.get("chat")?.get("id")?.as_i64()?;
    let from = message.get("from")?;
    let external_user_id = from.get("id")?.as_i64()?;

    let contact_phone = message
        .get("contact")
        .and_then(|c| c.get("phone_number"))
        .and_then(Value::as_str)
        .map(String::from);
    let text = message
        .get("text")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    if text.is_empty() && contact_phone.is_none() {
        return None;
    }

    let lang_hint = from
        .get("language_code")
        .and_then(Value::as_str)
        .and_then(|code| match code {
            "kk" => Some(Lang::Kz),
            "ru" => Some(Lang::Ru),
            _ => None,
        });

    let user = BotUser {
        external_user_id,
        username: from
            .get("username")
            .and_then(Value::as_str)
            .map(String::from),
        first_name: from
            .get("first_name")
            .and_then(Value::as_str)
            .map(String::from),
        last_name: from
            .get("last_name")
            .and_then(Value::as_str)
            .map(String::from),
        language: lang_hint.unwrap_or_default(),
    };

    Some(Incoming {
        session_id: chat_id,
        user,
        text,
        contact_phone,
        lang_hint,
    })
}

// ── Keyboards ───────────────────────────────────────────────────────

/// Reply keyboard: one option per row, optional contact button first.
fn option_keyboard(options: &[String], share_label: Option<&str>) -> Value {
    let mut rows: Vec<Value> = Vec::new();
    if let Some(label) = share_label {
        rows.push(json!([{"text": label, "request_contact": true}]));
    }
    for option in options {
        rows.push(json!([{"text": option}]));
    }
    json!({"keyboard": rows, "resize_keyboard": true})
}

/// Split a message into chunks that fit Telegram's character limit.
/// Tries to split on newlines, then spaces, then hard-cuts.
fn split_message(text: &str, max_len: usize) -> Vec<String> {
    if text.len() <= max_len {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text;

    while !remaining.is_empty() {
        if remaining.len() <= max_len {
            chunks.push(remaining.to_string());
            break;
        }
        let boundary = (1..=max_len)
            .rev()
            .find(|&i| remaining.is_char_boundary(i))
            .unwrap_or(max_len);
        let chunk = &remaining[..boundary];
        let split_at = chunk
            .rfind('\n')
            .or_else(|| chunk.rfind(' '))
            .filter(|&i| i > 0)
            .unwrap_or(boundary);
        chunks.push(remaining[..split_at].to_string());
        remaining = remaining[split_at..].trim_start();
    }

    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn api_url_embeds_token() {
        let ch = TelegramChannel::new("123:ABC".into());
        assert_eq!(
            ch.api_url("getMe"),
            "https://api.telegram.org/bot123:ABC/getMe"
        );
    }

    #[test]
    fn parse_update_extracts_text_message() {
        let update = json!({
            "update_id": 10,
            "message": {
                "chat": {"id": 555},
                "from": {"id": 42, "username": "aigerim", "first_name": "Aigerim", "language_code": "kk"},
                "text": "Алматы"
            }
        });
        let incoming = parse_update(&update).unwrap();
        assert_eq!(incoming.session_id, 555);
        assert_eq!(incoming.user.external_user_id, 42);
        assert_eq!(incoming.text, "Алматы");
        assert_eq!(incoming.lang_hint, Some(Lang::Kz));
        assert!(incoming.contact_phone.is_none());
    }

    #[test]
    fn parse_update_extracts_shared_contact() {
        let update = json!({
            "update_id": 11,
            "message": {
                "chat": {"id": 555},
                "from": {"id": 42},
                "contact": {"phone_number": "87011234567"}
            }
        });
        let incoming = parse_update(&update).unwrap();
        assert_eq!(incoming.contact_phone.as_deref(), Some("87011234567"));
        assert!(incoming.text.is_empty());
    }

    #[test]
    fn parse_update_skips_non_message_payloads() {
        assert!(parse_update(&json!({"update_id": 12})).is_none());
        let no_content = json!({
            "update_id": 13,
            "message": {"chat": {"id": 1}, "from": {"id": 2}, "sticker": {}}
        });
        assert!(parse_update(&no_content).is_none());
    }

    #[test]
    fn keyboard_puts_contact_button_first() {
        let keyboard = option_keyboard(
            &["Назад".to_string(), "Главное меню".to_string()],
            Some("📱 Поделиться контактом"),
        );
        let rows = keyboard["keyboard"].as_array().unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0]["request_contact"], true);
        assert_eq!(rows[1][0]["text"], "Назад");
    }

    #[test]
    fn split_message_short_and_long() {
        assert_eq!(split_message("Hello", 4096), vec!["Hello"]);
        let msg = format!("{}\n{}", "a".repeat(2000), "b".repeat(3000));
        let chunks = split_message(&msg, 4096);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0], "a".repeat(2000));
        assert_eq!(chunks[1], "b".repeat(3000));
    }

    #[test]
    fn split_message_respects_char_boundaries() {
        let msg = "я".repeat(3000); // 2 bytes each
        let chunks = split_message(&msg, 4096);
        assert!(chunks.len() >= 2);
        for chunk in &chunks {
            assert!(chunk.len() <= 4096);
        }
    }
}
