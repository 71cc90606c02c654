use crate::config::DatabaseConfig;
use crate::db::StoreError;
use duckdb::{Connection, Result as DbResult};
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::info;

const SCHEMA: &str = r#"
CREATE SEQUENCE IF NOT EXISTS seq_conversations_id;

CREATE TABLE IF NOT EXISTS users (
    user_id BIGINT PRIMARY KEY,
    username VARCHAR,
    created_at VARCHAR NOT NULL,
    settings VARCHAR NOT NULL DEFAULT '{}'
);

CREATE TABLE IF NOT EXISTS conversations (
    id BIGINT PRIMARY KEY DEFAULT nextval('seq_conversations_id'),
    user_id BIGINT NOT NULL,
    user_message TEXT NOT NULL,
    bot_response TEXT NOT NULL,
    created_at VARCHAR NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_conversations_user ON conversations(user_id, id);

CREATE TABLE IF NOT EXISTS sessions (
    user_id BIGINT PRIMARY KEY,
    history TEXT NOT NULL DEFAULT '[]',
    updated_at VARCHAR NOT NULL
);
"#;

/// Owns the database; hands out one short-lived connection per operation.
///
/// DuckDB aborts the second of two overlapping transactions that touch the
/// same row, so writers go through [`DbPool::acquire_writer`] and run one at a
/// time. Readers never wait on the write lock.
#[derive(Clone)]
pub struct DbPool {
    root: Arc<Mutex<Connection>>,
    write_lock: Arc<Mutex<()>>,
}

/// A connection that holds the pool's write lock until dropped.
pub struct WriteConnection<'a> {
    conn: Connection,
    _guard: MutexGuard<'a, ()>,
}

impl Deref for WriteConnection<'_> {
    type Target = Connection;

    fn deref(&self) -> &Connection {
        &self.conn
    }
}

impl DerefMut for WriteConnection<'_> {
    fn deref_mut(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl DbPool {
    pub fn open(config: &DatabaseConfig) -> DbResult<Self> {
        Self::from_connection(Connection::open(&config.path)?)
    }

    pub fn open_in_memory() -> DbResult<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> DbResult<Self> {
        init_schema(&conn)?;
        Ok(Self {
            root: Arc::new(Mutex::new(conn)),
            write_lock: Arc::new(Mutex::new(())),
        })
    }

    /// A fresh connection to the same database. It is closed when dropped,
    /// so callers hold it only for the duration of one store operation.
    pub fn acquire(&self) -> Result<Connection, StoreError> {
        let root = self.root.lock().map_err(|_| StoreError::PoolPoisoned)?;
        Ok(root.try_clone()?)
    }

    /// Like [`acquire`](Self::acquire), for operations that write. Concurrent
    /// writers queue here, so the last one to run wins.
    pub fn acquire_writer(&self) -> Result<WriteConnection<'_>, StoreError> {
        let guard = self.write_lock.lock().map_err(|_| StoreError::PoolPoisoned)?;
        Ok(WriteConnection {
            conn: self.acquire()?,
            _guard: guard,
        })
    }
}

pub fn get_connection(config: &DatabaseConfig) -> DbResult<DbPool> {
    info!("Opening DuckDB database at {}", config.path);
    DbPool::open(config)
}

fn init_schema(conn: &Connection) -> DbResult<()> {
    info!("Initializing database schema");
    conn.execute_batch(SCHEMA)?;
    Ok(())
}
