//! SQLite 检查点
//!
//! 每个会话一行：消息序列序列化为 JSON 整体存储，单条 UPSERT 完成替换，
//! 因此同一会话不会出现只写了一部分的消息列表。
//! rusqlite 为同步 API，调用放在 spawn_blocking 中，避免阻塞 async 运行时。

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::memory::{CheckpointError, CheckpointStore, Message};

/// SQLite 检查点存储
#[derive(Clone)]
pub struct SqliteCheckpointStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCheckpointStore {
    /// 打开（必要时创建）数据库文件；父目录不存在时自动创建
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CheckpointError> {
        if let Some(parent) = path.as_ref().parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .map_err(|e| CheckpointError::Join(format!("create dir: {e}")))?;
            }
        }
        Self::from_connection(Connection::open(path)?)
    }

    /// 内存数据库（测试用）
    pub fn open_in_memory() -> Result<Self, CheckpointError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CheckpointError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS checkpoints (
                conversation_id TEXT PRIMARY KEY,
                messages TEXT NOT NULL,
                message_count INTEGER NOT NULL,
                updated_at TEXT NOT NULL
            )",
        )?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    async fn with_conn<T, F>(&self, f: F) -> Result<T, CheckpointError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, CheckpointError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let guard = conn
                .lock()
                .map_err(|_| CheckpointError::Join("connection lock poisoned".to_string()))?;
            f(&guard)
        })
        .await
        .map_err(|e| CheckpointError::Join(e.to_string()))?
    }
}

#[async_trait]
impl CheckpointStore for SqliteCheckpointStore {
    async fn load(&self, conversation_id: &str) -> Result<Vec<Message>, CheckpointError> {
        let id = conversation_id.to_string();
        self.with_conn(move |conn| {
            let raw: Option<String> = conn
                .query_row(
                    "SELECT messages FROM checkpoints WHERE conversation_id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            match raw {
                Some(json) => Ok(serde_json::from_str(&json)?),
                None => Ok(Vec::new()),
            }
        })
        .await
    }

    async fn save(&self, conversation_id: &str, messages: &[Message]) -> Result<(), CheckpointError> {
        let id = conversation_id.to_string();
        let json = serde_json::to_string(messages)?;
        let count = messages.len() as i64;
        let now = chrono::Utc::now().to_rfc3339();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO checkpoints (conversation_id, messages, message_count, updated_at)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(conversation_id) DO UPDATE SET
                    messages = excluded.messages,
                    message_count = excluded.message_count,
                    updated_at = excluded.updated_at",
                params![id, json, count, now],
            )?;
            Ok(())
        })
        .await?;
        tracing::debug!(conversation_id, message_count = count, "checkpoint saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ToolCallRequest;

    #[tokio::test]
    async fn test_roundtrip_preserves_tool_calls() {
        let store = SqliteCheckpointStore::open_in_memory().unwrap();
        let messages = vec![
            Message::user("What is X?"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest::new(
                    "c1",
                    "retrieve_documents",
                    serde_json::json!({"query": "X"}),
                )],
            ),
            Message::tool("c1", "retrieve_documents", "X is..."),
        ];
        store.save("c1", &messages).await.unwrap();
        assert_eq!(store.load("c1").await.unwrap(), messages);
    }

    #[tokio::test]
    async fn test_reopen_file_keeps_state() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("checkpoints.db");
        {
            let store = SqliteCheckpointStore::open(&path).unwrap();
            store.save("t", &[Message::user("persist me")]).await.unwrap();
        }
        let store = SqliteCheckpointStore::open(&path).unwrap();
        assert_eq!(store.load("t").await.unwrap(), vec![Message::user("persist me")]);
        assert!(store.load("other").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_overwrites() {
        let store = SqliteCheckpointStore::open_in_memory().unwrap();
        store.save("t", &[Message::user("a"), Message::user("b")]).await.unwrap();
        store.save("t", &[Message::user("c")]).await.unwrap();
        assert_eq!(store.load("t").await.unwrap(), vec![Message::user("c")]);
    }
}
