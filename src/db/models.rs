use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::settings::StoredSettings;

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub user_id: i64,
    pub username: Option<String>,
    pub created_at: DateTime<Utc>,
    pub settings: StoredSettings,
}

/// One row of the append-only audit log.
#[derive(Debug, Clone, Serialize)]
pub struct ConversationTurn {
    pub id: i64,
    pub user_id: i64,
    pub user_message: String,
    pub bot_response: String,
    pub created_at: DateTime<Utc>,
}
