//! Telegram Bot API transport: long-polls for updates and relays replies.

use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::json;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::bot::commands::Command;
use crate::bot::{CommandRouter, Inbound};

/// Telegram rejects messages longer than this many characters.
pub const MAX_MESSAGE_LEN: usize = 4096;

const RETRY_DELAY: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum TelegramError {
    #[error("Network Error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Telegram API Error: {0}")]
    Api(String),
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Update {
    update_id: i64,
    message: Option<Message>,
}

#[derive(Debug, Deserialize)]
struct Message {
    chat: Chat,
    from: Option<Author>,
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Chat {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct Author {
    id: i64,
    username: Option<String>,
}

pub struct TelegramBot {
    client: Client,
    api_base: String,
    bot_token: String,
    poll_timeout_secs: u64,
    router: Arc<CommandRouter>,
}

impl TelegramBot {
    pub fn new(
        api_base: String,
        bot_token: String,
        poll_timeout_secs: u64,
        router: Arc<CommandRouter>,
    ) -> Self {
        Self {
            client: Client::new(),
            api_base: api_base.trim_end_matches('/').to_string(),
            bot_token,
            poll_timeout_secs,
            router,
        }
    }

    fn api_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.api_base, self.bot_token)
    }

    async fn call<T: DeserializeOwned>(
        &self,
        method: &str,
        body: serde_json::Value,
    ) -> Result<T, TelegramError> {
        let response: ApiResponse<T> = self
            .client
            .post(self.api_url(method))
            .json(&body)
            .send()
            .await?
            .json()
            .await?;

        match (response.ok, response.result) {
            (true, Some(result)) => Ok(result),
            _ => Err(TelegramError::Api(
                response
                    .description
                    .unwrap_or_else(|| format!("{method} failed")),
            )),
        }
    }

    async fn get_updates(&self, offset: i64) -> Result<Vec<Update>, TelegramError> {
        self.call(
            "getUpdates",
            json!({
                "offset": offset,
                "timeout": self.poll_timeout_secs,
                "allowed_updates": ["message"],
            }),
        )
        .await
    }

    pub async fn send_message(&self, chat_id: i64, text: &str) -> Result<(), TelegramError> {
        for chunk in split_message(text, MAX_MESSAGE_LEN) {
            let _: serde_json::Value = self
                .call("sendMessage", json!({ "chat_id": chat_id, "text": chunk }))
                .await?;
        }
        Ok(())
    }

    async fn send_typing(&self, chat_id: i64) -> Result<(), TelegramError> {
        let _: bool = self
            .call("sendChatAction", json!({ "chat_id": chat_id, "action": "typing" }))
            .await?;
        Ok(())
    }

    /// Polls forever. Each message is handled on its own task so a slow
    /// model call for one user does not hold up the others.
    pub async fn run(self: Arc<Self>) {
        let mut offset: i64 = 0;

        info!("Telegram bot listening for messages...");

        loop {
            match self.poll_once(offset).await {
                Ok((next, _)) => offset = next,
                Err(e) => {
                    warn!("Telegram poll error: {e}");
                    tokio::time::sleep(RETRY_DELAY).await;
                }
            }
        }
    }

    /// Fetches one batch of updates and spawns a handler per text message.
    /// Returns the offset for the next poll and the spawned handlers.
    pub async fn poll_once(
        self: &Arc<Self>,
        offset: i64,
    ) -> Result<(i64, Vec<JoinHandle<()>>), TelegramError> {
        let updates = self.get_updates(offset).await?;
        let mut next = offset;
        let mut handlers = Vec::new();

        for update in updates {
            next = next.max(update.update_id + 1);

            let Some(message) = update.message else {
                continue;
            };
            let chat_id = message.chat.id;
            let (Some(from), Some(text)) = (message.from, message.text) else {
                continue;
            };

            let inbound = Inbound {
                user_id: from.id,
                username: from.username,
                text,
            };
            let bot = Arc::clone(self);
            handlers.push(tokio::spawn(async move {
                bot.handle(chat_id, inbound).await;
            }));
        }

        Ok((next, handlers))
    }

    async fn handle(&self, chat_id: i64, inbound: Inbound) {
        if Command::parse(&inbound.text).is_none() {
            if let Err(e) = self.send_typing(chat_id).await {
                warn!(chat_id, "Failed to send typing action: {e}");
            }
        }

        let reply = self.router.handle(&inbound).await;

        if let Err(e) = self.send_message(chat_id, &reply).await {
            error!(chat_id, user_id = inbound.user_id, "Failed to send reply: {e}");
        }
    }
}

/// Splits `text` into chunks of at most `max_chars` characters, preferring
/// to break after a newline.
pub fn split_message(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut chunks = Vec::new();
    let mut rest = text;

    while rest.chars().count() > max_chars {
        let boundary = rest
            .char_indices()
            .nth(max_chars)
            .map(|(i, _)| i)
            .unwrap_or(rest.len());
        let cut = match rest[..boundary].rfind('\n') {
            Some(i) if i > 0 => i + 1,
            _ => boundary,
        };

        let chunk = rest[..cut].trim_end_matches('\n');
        if !chunk.is_empty() {
            chunks.push(chunk.to_string());
        }
        rest = &rest[cut..];
    }

    if !rest.is_empty() || chunks.is_empty() {
        chunks.push(rest.to_string());
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_messages_are_sent_whole() {
        assert_eq!(split_message("hello", MAX_MESSAGE_LEN), vec!["hello"]);
        assert_eq!(split_message("", MAX_MESSAGE_LEN), vec![""]);
    }

    #[test]
    fn long_messages_are_split_at_the_limit() {
        let text = "a".repeat(10_000);
        let chunks = split_message(&text, MAX_MESSAGE_LEN);
        assert_eq!(
            chunks.iter().map(|c| c.len()).collect::<Vec<_>>(),
            vec![4096, 4096, 1808]
        );
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn prefers_newline_boundaries() {
        assert_eq!(split_message("aaa\nbbb", 5), vec!["aaa", "bbb"]);
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(6);
        let chunks = split_message(&text, 4);
        assert_eq!(chunks, vec!["éééé".to_string(), "éé".to_string()]);
    }

    #[test]
    fn parses_update_payload() {
        let payload = serde_json::json!({
            "ok": true,
            "result": [{
                "update_id": 7,
                "message": {
                    "message_id": 1,
                    "chat": {"id": 42, "type": "private"},
                    "from": {"id": 42, "is_bot": false, "first_name": "A", "username": "alice"},
                    "text": "/start"
                }
            }]
        });
        let response: ApiResponse<Vec<Update>> = serde_json::from_value(payload).unwrap();
        let updates = response.result.unwrap();
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(updates[0].update_id, 7);
        assert_eq!(message.chat.id, 42);
        assert_eq!(message.from.as_ref().unwrap().username.as_deref(), Some("alice"));
        assert_eq!(message.text.as_deref(), Some("/start"));
    }
}
