pub mod connection;
pub mod models;
pub mod service;
pub mod store;

pub use connection::{get_connection, DbPool, WriteConnection};
pub use models::*;
pub use store::{ChatStore, DuckDbStore};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Db(#[from] duckdb::Error),
    #[error("invalid stored JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid stored timestamp '{0}'")]
    Timestamp(String),
    #[error("unknown user {0}")]
    UnknownUser(i64),
    #[error("database handle poisoned")]
    PoolPoisoned,
}
