use crate::db::models::{ConversationTurn, User};
use crate::db::StoreError;
use crate::llm::models::Turn;
use crate::settings::StoredSettings;
use chrono::{DateTime, Utc};
use duckdb::{params, Connection, Row};

pub struct DbService;

type UserRow = (i64, Option<String>, String, String);
type ConversationRow = (i64, i64, String, String, String);

impl DbService {
    fn now() -> String {
        Utc::now().to_rfc3339()
    }

    fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>, StoreError> {
        DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|_| StoreError::Timestamp(raw.to_string()))
    }

    fn read_user_row(row: &Row) -> duckdb::Result<UserRow> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
    }

    fn read_conversation_row(row: &Row) -> duckdb::Result<ConversationRow> {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
    }

    fn row_to_user((user_id, username, created_at, settings): UserRow) -> Result<User, StoreError> {
        Ok(User {
            user_id,
            username,
            created_at: Self::parse_timestamp(&created_at)?,
            settings: serde_json::from_str(&settings)?,
        })
    }

    fn row_to_conversation(
        (id, user_id, user_message, bot_response, created_at): ConversationRow,
    ) -> Result<ConversationTurn, StoreError> {
        Ok(ConversationTurn {
            id,
            user_id,
            user_message,
            bot_response,
            created_at: Self::parse_timestamp(&created_at)?,
        })
    }

    // --- Users ---

    pub fn user_exists(conn: &Connection, user_id: i64) -> Result<bool, StoreError> {
        let mut stmt = conn.prepare("SELECT 1 FROM users WHERE user_id = ?")?;
        let mut rows = stmt.query_map(params![user_id], |row| row.get::<_, i32>(0))?;
        Ok(rows.next().transpose()?.is_some())
    }

    pub fn insert_user(conn: &Connection, user_id: i64, username: Option<&str>) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO users (user_id, username, created_at, settings) VALUES (?, ?, ?, '{}')
             ON CONFLICT (user_id) DO NOTHING",
            params![user_id, username, Self::now()],
        )?;
        Ok(())
    }

    pub fn get_user(conn: &Connection, user_id: i64) -> Result<Option<User>, StoreError> {
        let mut stmt =
            conn.prepare("SELECT user_id, username, created_at, settings FROM users WHERE user_id = ?")?;
        let mut rows = stmt.query_map(params![user_id], Self::read_user_row)?;

        match rows.next() {
            Some(row) => Ok(Some(Self::row_to_user(row?)?)),
            None => Ok(None),
        }
    }

    pub fn list_users(conn: &Connection, limit: usize, offset: usize) -> Result<Vec<User>, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT user_id, username, created_at, settings FROM users ORDER BY created_at ASC LIMIT ? OFFSET ?",
        )?;
        let rows = stmt.query_map(params![limit as i64, offset as i64], Self::read_user_row)?;

        let mut users = Vec::new();
        for row in rows {
            users.push(Self::row_to_user(row?)?);
        }
        Ok(users)
    }

    // --- Settings ---

    pub fn get_settings(conn: &Connection, user_id: i64) -> Result<Option<StoredSettings>, StoreError> {
        let mut stmt = conn.prepare("SELECT settings FROM users WHERE user_id = ?")?;
        let mut rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;

        match rows.next() {
            Some(raw) => Ok(Some(serde_json::from_str(&raw?)?)),
            None => Ok(None),
        }
    }

    pub fn set_settings(conn: &Connection, user_id: i64, settings: &StoredSettings) -> Result<usize, StoreError> {
        let raw = serde_json::to_string(settings)?;
        Ok(conn.execute(
            "UPDATE users SET settings = ? WHERE user_id = ?",
            params![raw, user_id],
        )?)
    }

    // --- Audit log ---

    pub fn insert_conversation(
        conn: &Connection,
        user_id: i64,
        user_message: &str,
        bot_response: &str,
    ) -> Result<(), StoreError> {
        conn.execute(
            "INSERT INTO conversations (user_id, user_message, bot_response, created_at) VALUES (?, ?, ?, ?)",
            params![user_id, user_message, bot_response, Self::now()],
        )?;
        Ok(())
    }

    pub fn get_conversations(
        conn: &Connection,
        user_id: i64,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<ConversationTurn>, StoreError> {
        let mut stmt = conn.prepare(
            "SELECT id, user_id, user_message, bot_response, created_at
             FROM conversations
             WHERE user_id = ?
             ORDER BY id ASC
             LIMIT ? OFFSET ?",
        )?;
        let rows = stmt.query_map(params![user_id, limit as i64, offset as i64], Self::read_conversation_row)?;

        let mut turns = Vec::new();
        for row in rows {
            turns.push(Self::row_to_conversation(row?)?);
        }
        Ok(turns)
    }

    // --- Working history ---

    pub fn get_history(conn: &Connection, user_id: i64) -> Result<Option<Vec<Turn>>, StoreError> {
        let mut stmt = conn.prepare("SELECT history FROM sessions WHERE user_id = ?")?;
        let mut rows = stmt.query_map(params![user_id], |row| row.get::<_, String>(0))?;

        match rows.next() {
            Some(raw) => Ok(Some(serde_json::from_str(&raw?)?)),
            None => Ok(None),
        }
    }

    pub fn upsert_history(conn: &Connection, user_id: i64, turns: &[Turn]) -> Result<(), StoreError> {
        let raw = serde_json::to_string(turns)?;
        conn.execute(
            "INSERT INTO sessions (user_id, history, updated_at) VALUES (?, ?, ?)
             ON CONFLICT (user_id) DO UPDATE SET history = excluded.history, updated_at = excluded.updated_at",
            params![user_id, raw, Self::now()],
        )?;
        Ok(())
    }
}
