//! Thread-keyed conversation store on SQLite
//!
//! The store is opaque to the rest of the core: the assistant appends turns
//! and reads back a recent window for one thread id. The connection is
//! serialized behind a mutex so concurrent background units can share one
//! handle.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{Connection, params};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Mutex;
use tracing::{debug, info};
use uuid::Uuid;

/// One stored conversation turn
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    pub id: String,
    pub thread_id: String,
    pub role: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

/// Persistent conversation memory, keyed by thread id
pub struct ConversationStore {
    conn: Mutex<Connection>,
}

impl ConversationStore {
    /// Open (or create) the store at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database at {}", path.display()))?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS conversations (
                id TEXT PRIMARY KEY,
                thread_id TEXT NOT NULL,
                role TEXT NOT NULL,
                content TEXT NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )
        .context("Failed to initialize conversations table")?;
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_conversations_thread
             ON conversations(thread_id)",
            [],
        )?;
        info!("Conversation store opened at {}", path.display());
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Append one turn to a thread
    pub fn append(&self, thread_id: &str, role: &str, content: &str) -> Result<()> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        conn.execute(
            "INSERT INTO conversations (id, thread_id, role, content, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                Uuid::new_v4().to_string(),
                thread_id,
                role,
                content,
                Utc::now().to_rfc3339(),
            ],
        )
        .context("Failed to store conversation turn")?;
        debug!("Stored {} turn on thread {}", role, thread_id);
        Ok(())
    }

    /// The most recent `limit` turns of a thread, oldest first
    pub fn recent(&self, thread_id: &str, limit: usize) -> Result<Vec<StoredMessage>> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let mut stmt = conn.prepare(
            "SELECT id, thread_id, role, content, created_at
             FROM conversations
             WHERE thread_id = ?1
             ORDER BY rowid DESC
             LIMIT ?2",
        )?;
        let mut messages: Vec<StoredMessage> = stmt
            .query_map(params![thread_id, limit as i64], |row| {
                Ok(StoredMessage {
                    id: row.get(0)?,
                    thread_id: row.get(1)?,
                    role: row.get(2)?,
                    content: row.get(3)?,
                    created_at: row
                        .get::<_, String>(4)?
                        .parse()
                        .unwrap_or_else(|_| Utc::now()),
                })
            })?
            .collect::<std::result::Result<_, _>>()?;
        messages.reverse();
        Ok(messages)
    }

    /// Number of turns stored for a thread
    pub fn count(&self, thread_id: &str) -> Result<usize> {
        let conn = self.conn.lock().expect("store mutex poisoned");
        let count: i64 = conn.query_row(
            "SELECT COUNT(*) FROM conversations WHERE thread_id = ?1",
            params![thread_id],
            |row| row.get(0),
        )?;
        Ok(count as usize)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn open_store() -> (ConversationStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = ConversationStore::open(&dir.path().join("test.db")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_append_and_recent() {
        let (store, _dir) = open_store();
        store.append("1", "user", "hello").unwrap();
        store.append("1", "assistant", "hi there").unwrap();

        let messages = store.recent("1", 10).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "user");
        assert_eq!(messages[0].content, "hello");
        assert_eq!(messages[1].role, "assistant");
    }

    #[test]
    fn test_recent_window_is_most_recent() {
        let (store, _dir) = open_store();
        for i in 0..5 {
            store.append("1", "user", &format!("message {i}")).unwrap();
        }
        let messages = store.recent("1", 2).unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].content, "message 3");
        assert_eq!(messages[1].content, "message 4");
    }

    #[test]
    fn test_threads_are_isolated() {
        let (store, _dir) = open_store();
        store.append("1", "user", "thread one").unwrap();
        store.append("2", "user", "thread two").unwrap();

        let messages = store.recent("1", 10).unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].content, "thread one");
        assert_eq!(store.count("2").unwrap(), 1);
    }

    #[test]
    fn test_empty_thread() {
        let (store, _dir) = open_store();
        assert!(store.recent("missing", 10).unwrap().is_empty());
        assert_eq!(store.count("missing").unwrap(), 0);
    }
}
