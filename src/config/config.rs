use serde::Deserialize;

use crate::settings::SettingsDefaults;

pub use ::config::ConfigError;

/// Environment variable holding the Telegram bot token when the file leaves it empty.
pub const TELEGRAM_TOKEN_ENV: &str = "TELEGRAM_TOKEN";
/// Environment variable holding the model API key when the file leaves it empty.
pub const CLAUDE_API_KEY_ENV: &str = "CLAUDE_API_KEY";

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: "chatrelay.duckdb".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AuthConfig {
    pub api_keys: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct LlmConfig {
    pub api_base: String,
    pub api_key: String,
    /// Value sent in the `anthropic-version` header.
    pub api_version: String,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.anthropic.com".to_string(),
            api_key: String::new(),
            api_version: "2023-06-01".to_string(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct TelegramConfig {
    pub api_base: String,
    pub bot_token: String,
    pub poll_timeout_secs: u64,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.telegram.org".to_string(),
            bot_token: String::new(),
            poll_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct ChatConfig {
    /// Number of user/assistant pairs kept in the working history.
    pub max_history_pairs: usize,
    pub system_prompt: Option<String>,
    pub default_model: String,
    pub default_temperature: f32,
    pub default_max_tokens: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            max_history_pairs: 10,
            system_prompt: None,
            default_model: "claude-3-7-sonnet-20250219".to_string(),
            default_temperature: 0.7,
            default_max_tokens: 4000,
        }
    }
}

impl ChatConfig {
    pub fn settings_defaults(&self) -> SettingsDefaults {
        SettingsDefaults {
            model: self.default_model.clone(),
            temperature: self.default_temperature,
            max_tokens: self.default_max_tokens,
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub llm: LlmConfig,
    pub telegram: TelegramConfig,
    pub chat: ChatConfig,
}

impl AppConfig {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        dotenv::dotenv().ok();

        let settings = ::config::Config::builder()
            .add_source(::config::File::with_name(path).required(false))
            .add_source(
                ::config::Environment::with_prefix("CHATRELAY")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut app_config: AppConfig = settings.try_deserialize()?;

        // Expand environment variables if present like ${CLAUDE_API_KEY}
        app_config.server.host = expand_env(&app_config.server.host);
        app_config.database.path = expand_env(&app_config.database.path);
        app_config.llm.api_key = expand_env(&app_config.llm.api_key);
        app_config.telegram.bot_token = expand_env(&app_config.telegram.bot_token);
        app_config.auth.api_keys = app_config
            .auth
            .api_keys
            .iter()
            .map(|key| expand_env(key))
            .filter(|key| !key.is_empty())
            .collect();

        if app_config.llm.api_key.is_empty() {
            app_config.llm.api_key = std::env::var(CLAUDE_API_KEY_ENV).unwrap_or_default();
        }
        if app_config.telegram.bot_token.is_empty() {
            app_config.telegram.bot_token = std::env::var(TELEGRAM_TOKEN_ENV).unwrap_or_default();
        }

        Ok(app_config)
    }

    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        if self.llm.api_key.is_empty() {
            return Err(ConfigError::Message(format!(
                "model API key missing: set {} or llm.api_key",
                CLAUDE_API_KEY_ENV
            )));
        }
        Ok(&self.llm.api_key)
    }

    pub fn require_bot_token(&self) -> Result<&str, ConfigError> {
        if self.telegram.bot_token.is_empty() {
            return Err(ConfigError::Message(format!(
                "bot token missing: set {} or telegram.bot_token",
                TELEGRAM_TOKEN_ENV
            )));
        }
        Ok(&self.telegram.bot_token)
    }
}

fn expand_env(val: &str) -> String {
    match val.strip_prefix("${").and_then(|rest| rest.strip_suffix('}')) {
        Some(var_name) => std::env::var(var_name).unwrap_or_default(),
        None => val.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expands_placeholder_from_environment() {
        std::env::set_var("CHATRELAY_TEST_EXPAND_VALUE", "secret");
        assert_eq!(expand_env("${CHATRELAY_TEST_EXPAND_VALUE}"), "secret");
        assert_eq!(expand_env("${CHATRELAY_TEST_EXPAND_MISSING}"), "");
        assert_eq!(expand_env("plain"), "plain");
    }

    #[test]
    fn missing_secrets_are_reported() {
        let config = AppConfig::default();
        assert!(config.require_api_key().is_err());
        assert!(config.require_bot_token().is_err());

        let mut config = AppConfig::default();
        config.llm.api_key = "key".to_string();
        assert_eq!(config.require_api_key().unwrap(), "key");
    }

    #[test]
    fn chat_defaults_match_bot_defaults() {
        let defaults = ChatConfig::default().settings_defaults();
        assert_eq!(defaults.model, "claude-3-7-sonnet-20250219");
        assert_eq!(defaults.temperature, 0.7);
        assert_eq!(defaults.max_tokens, 4000);
    }
}
