//! Per-message orchestration: settings, history, model call, persistence.

use std::sync::Arc;

use dashmap::DashMap;
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::{error, info};

use crate::config::ChatConfig;
use crate::db::{ChatStore, StoreError};
use crate::history::SessionHistoryManager;
use crate::llm::models::{ChatOptions, Turn, Usage};
use crate::llm::{LlmError, LlmProvider};
use crate::settings::{ResolvedSettings, SettingsDefaults};

/// Shown to the user whenever an exchange fails for a reason they cannot fix.
pub const GENERIC_FAILURE_MESSAGE: &str =
    "Sorry, something went wrong while processing your request. Please try again later.";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Llm(#[from] LlmError),
}

#[derive(Debug, Clone)]
pub struct Reply {
    pub text: String,
    pub model: String,
    pub usage: Option<Usage>,
}

pub struct ChatService {
    store: Arc<dyn ChatStore>,
    history: SessionHistoryManager,
    llm: Arc<dyn LlmProvider>,
    config: ChatConfig,
    user_locks: DashMap<i64, Arc<Mutex<()>>>,
}

impl ChatService {
    pub fn new(
        store: Arc<dyn ChatStore>,
        history: SessionHistoryManager,
        llm: Arc<dyn LlmProvider>,
        config: ChatConfig,
    ) -> Self {
        Self {
            store,
            history,
            llm,
            config,
            user_locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<dyn ChatStore> {
        &self.store
    }

    pub fn history(&self) -> &SessionHistoryManager {
        &self.history
    }

    pub fn defaults(&self) -> SettingsDefaults {
        self.config.settings_defaults()
    }

    pub fn resolve_settings(&self, user_id: i64) -> Result<ResolvedSettings, StoreError> {
        Ok(self.store.get_settings(user_id)?.resolve(&self.defaults()))
    }

    // One lock per user: a user's exchanges run one at a time, different users never wait on each other.
    fn user_lock(&self, user_id: i64) -> Arc<Mutex<()>> {
        self.user_locks
            .entry(user_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .value()
            .clone()
    }

    /// Runs one exchange. The working history and audit log are only written
    /// after the model has replied; a failed call leaves both untouched.
    pub async fn handle_message(&self, user_id: i64, text: &str) -> Result<Reply, ChatError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;

        let settings = self.resolve_settings(user_id)?;
        let mut turns = self.history.load(user_id)?;
        turns.push(Turn::user(text));

        let options = ChatOptions::from_settings(&settings, self.config.system_prompt.clone());
        let response = self.llm.chat(&turns, &options).await?;
        let reply = response.text().ok_or(LlmError::EmptyReply)?.to_string();

        turns.push(Turn::assistant(reply.clone()));
        self.history.save(user_id, &turns)?;
        self.store.append_conversation_log(user_id, text, &reply)?;

        let usage = response.usage.clone().unwrap_or_default();
        info!(
            user_id,
            model = %settings.model,
            provider = self.llm.name(),
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            "Exchange completed"
        );

        Ok(Reply {
            text: reply,
            model: settings.model,
            usage: response.usage,
        })
    }

    /// Clears the working history once any in-flight exchange for the user has
    /// been saved, so the reset is not overwritten by it.
    pub async fn clear_history(&self, user_id: i64) -> Result<(), StoreError> {
        let lock = self.user_lock(user_id);
        let _guard = lock.lock().await;
        self.history.clear(user_id)
    }

    /// Like [`handle_message`](Self::handle_message), but never fails: errors
    /// are logged and replaced with [`GENERIC_FAILURE_MESSAGE`].
    pub async fn respond(&self, user_id: i64, text: &str) -> String {
        match self.handle_message(user_id, text).await {
            Ok(reply) => reply.text,
            Err(e) => {
                error!(user_id, error = %e, "Failed to process message");
                GENERIC_FAILURE_MESSAGE.to_string()
            }
        }
    }
}
