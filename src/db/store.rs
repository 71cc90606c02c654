use crate::db::models::{ConversationTurn, User};
use crate::db::service::DbService;
use crate::db::{DbPool, StoreError};
use crate::llm::models::Turn;
use crate::settings::{SettingUpdate, StoredSettings};

/// Durable storage for users, settings, the audit log and working histories.
///
/// Implementations must be safe to share between concurrently handled
/// messages. Writes are last-writer-wins.
pub trait ChatStore: Send + Sync {
    fn user_exists(&self, user_id: i64) -> Result<bool, StoreError>;

    /// Idempotent: registering an existing user is a no-op.
    fn register_user(&self, user_id: i64, username: Option<&str>) -> Result<(), StoreError>;

    fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError>;

    fn list_users(&self, limit: usize, offset: usize) -> Result<Vec<User>, StoreError>;

    /// Stored settings for the user; all fields unset when the user is unknown.
    fn get_settings(&self, user_id: i64) -> Result<StoredSettings, StoreError>;

    /// Read-modify-write of a single setting. Returns the settings as stored afterwards.
    fn update_setting(&self, user_id: i64, update: &SettingUpdate) -> Result<StoredSettings, StoreError>;

    fn append_conversation_log(&self, user_id: i64, user_text: &str, bot_text: &str) -> Result<(), StoreError>;

    /// Audit log entries for the user, oldest first.
    fn get_conversation_log(
        &self,
        user_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError>;

    fn get_session_history(&self, user_id: i64) -> Result<Vec<Turn>, StoreError>;

    /// Replaces the stored working history.
    fn set_session_history(&self, user_id: i64, turns: &[Turn]) -> Result<(), StoreError>;

    fn clear_session_history(&self, user_id: i64) -> Result<(), StoreError> {
        self.set_session_history(user_id, &[])
    }
}

#[derive(Clone)]
pub struct DuckDbStore {
    pool: DbPool,
}

impl DuckDbStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

impl ChatStore for DuckDbStore {
    fn user_exists(&self, user_id: i64) -> Result<bool, StoreError> {
        let conn = self.pool.acquire()?;
        DbService::user_exists(&conn, user_id)
    }

    fn register_user(&self, user_id: i64, username: Option<&str>) -> Result<(), StoreError> {
        let conn = self.pool.acquire_writer()?;
        DbService::insert_user(&conn, user_id, username)
    }

    fn get_user(&self, user_id: i64) -> Result<Option<User>, StoreError> {
        let conn = self.pool.acquire()?;
        DbService::get_user(&conn, user_id)
    }

    fn list_users(&self, limit: usize, offset: usize) -> Result<Vec<User>, StoreError> {
        let conn = self.pool.acquire()?;
        DbService::list_users(&conn, limit, offset)
    }

    fn get_settings(&self, user_id: i64) -> Result<StoredSettings, StoreError> {
        let conn = self.pool.acquire()?;
        Ok(DbService::get_settings(&conn, user_id)?.unwrap_or_default())
    }

    fn update_setting(&self, user_id: i64, update: &SettingUpdate) -> Result<StoredSettings, StoreError> {
        let mut conn = self.pool.acquire_writer()?;
        let tx = conn.transaction()?;

        let mut settings =
            DbService::get_settings(&tx, user_id)?.ok_or(StoreError::UnknownUser(user_id))?;
        update.apply(&mut settings);
        DbService::set_settings(&tx, user_id, &settings)?;

        tx.commit()?;
        Ok(settings)
    }

    fn append_conversation_log(&self, user_id: i64, user_text: &str, bot_text: &str) -> Result<(), StoreError> {
        let conn = self.pool.acquire_writer()?;
        DbService::insert_conversation(&conn, user_id, user_text, bot_text)
    }

    fn get_conversation_log(
        &self,
        user_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let conn = self.pool.acquire()?;
        DbService::get_conversations(&conn, user_id, limit, offset)
    }

    fn get_session_history(&self, user_id: i64) -> Result<Vec<Turn>, StoreError> {
        let conn = self.pool.acquire()?;
        Ok(DbService::get_history(&conn, user_id)?.unwrap_or_default())
    }

    fn set_session_history(&self, user_id: i64, turns: &[Turn]) -> Result<(), StoreError> {
        let conn = self.pool.acquire_writer()?;
        DbService::upsert_history(&conn, user_id, turns)
    }
}
