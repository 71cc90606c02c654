//! Text command surface shared by every front-end (Telegram, HTTP, terminal).

pub mod commands;
pub mod telegram;

use std::sync::Arc;

use tracing::{error, info};

use crate::chat::{ChatService, GENERIC_FAILURE_MESSAGE};
use crate::db::StoreError;
use crate::settings::{SettingKey, SettingUpdate};
use commands::Command;

pub const START_TEXT: &str = "Hi! I relay your messages to Claude. \
Just send me a message and I'll pass it along.";

pub const HELP_TEXT: &str = "Available commands:
/start - Start the bot
/help - Show this help
/clear - Clear the current conversation history
/settings - Show your settings
/set_model <model_name> - Change the model
/set_temp <value> - Change the temperature (0.0 - 1.0)
/set_max_tokens <value> - Change the maximum response length";

/// One inbound message from any front-end.
#[derive(Debug, Clone)]
pub struct Inbound {
    pub user_id: i64,
    pub username: Option<String>,
    pub text: String,
}

pub struct CommandRouter {
    chat: Arc<ChatService>,
}

impl CommandRouter {
    pub fn new(chat: Arc<ChatService>) -> Self {
        Self { chat }
    }

    pub fn chat(&self) -> &Arc<ChatService> {
        &self.chat
    }

    /// Produces the reply for `inbound`. Never fails: storage and model errors
    /// are logged and answered with a generic apology.
    pub async fn handle(&self, inbound: &Inbound) -> String {
        if let Err(e) = self.ensure_user(inbound) {
            error!(user_id = inbound.user_id, error = %e, "Failed to register user");
            return GENERIC_FAILURE_MESSAGE.to_string();
        }

        match Command::parse(&inbound.text) {
            Some(command) => self.execute(inbound.user_id, command).await.unwrap_or_else(|e| {
                error!(user_id = inbound.user_id, error = %e, "Command failed");
                GENERIC_FAILURE_MESSAGE.to_string()
            }),
            None if inbound.text.trim().is_empty() => "Please send a non-empty message.".to_string(),
            None => self.chat.respond(inbound.user_id, &inbound.text).await,
        }
    }

    fn ensure_user(&self, inbound: &Inbound) -> Result<(), StoreError> {
        let store = self.chat.store();
        if !store.user_exists(inbound.user_id)? {
            store.register_user(inbound.user_id, inbound.username.as_deref())?;
            info!(user_id = inbound.user_id, "Registered new user");
        }
        Ok(())
    }

    async fn execute(&self, user_id: i64, command: Command) -> Result<String, StoreError> {
        match command {
            Command::Start => Ok(START_TEXT.to_string()),
            Command::Help => Ok(HELP_TEXT.to_string()),
            Command::Clear => {
                self.chat.clear_history(user_id).await?;
                Ok("Conversation history cleared!".to_string())
            }
            Command::Settings => {
                let settings = self.chat.resolve_settings(user_id)?;
                Ok(format!(
                    "Current settings:\n\
                     - Model: {}\n\
                     - Temperature: {}\n\
                     - Max tokens: {}\n\n\
                     To change settings, use:\n\
                     /set_model <model_name>\n\
                     /set_temp <value>\n\
                     /set_max_tokens <value>",
                    settings.model, settings.temperature, settings.max_tokens
                ))
            }
            Command::SetModel(arg) => self.update(user_id, SettingKey::Model, arg),
            Command::SetTemp(arg) => self.update(user_id, SettingKey::Temperature, arg),
            Command::SetMaxTokens(arg) => self.update(user_id, SettingKey::MaxTokens, arg),
            Command::Unknown(name) => Ok(format!(
                "Unknown command /{name}. Send /help for the list of commands."
            )),
        }
    }

    fn update(&self, user_id: i64, key: SettingKey, arg: Option<String>) -> Result<String, StoreError> {
        let update = match SettingUpdate::parse(key, arg.as_deref()) {
            Ok(update) => update,
            Err(e) => return Ok(e.to_string()),
        };

        self.chat.store().update_setting(user_id, &update)?;
        info!(user_id, setting = %update.key(), "Setting updated");

        Ok(match update {
            SettingUpdate::Model(model) => format!("Model changed to {model}."),
            SettingUpdate::Temperature(temp) => format!("Temperature set to {temp}."),
            SettingUpdate::MaxTokens(n) => format!("Max tokens set to {n}."),
        })
    }
}
