//! 会话检查点
//!
//! 按会话 ID 保存完整消息序列：load 读取、save 整体替换。
//! 实现必须保证单个会话的写入是原子的（读者看不到只写了一半的消息列表）。

use std::collections::HashMap;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::RwLock;

use crate::memory::Message;

/// 检查点存储错误
#[derive(Error, Debug)]
pub enum CheckpointError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("Storage task failed: {0}")]
    Join(String),
}

/// 检查点存储接口
#[async_trait]
pub trait CheckpointStore: Send + Sync {
    /// 读取会话消息；会话不存在时返回空序列
    async fn load(&self, conversation_id: &str) -> Result<Vec<Message>, CheckpointError>;

    /// 用给定序列整体替换会话消息
    async fn save(&self, conversation_id: &str, messages: &[Message]) -> Result<(), CheckpointError>;
}

/// 进程内检查点：整表替换在写锁内完成
#[derive(Default)]
pub struct InMemoryCheckpointStore {
    threads: RwLock<HashMap<String, Vec<Message>>>,
}

impl InMemoryCheckpointStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn conversation_count(&self) -> usize {
        self.threads.read().await.len()
    }
}

#[async_trait]
impl CheckpointStore for InMemoryCheckpointStore {
    async fn load(&self, conversation_id: &str) -> Result<Vec<Message>, CheckpointError> {
        Ok(self
            .threads
            .read()
            .await
            .get(conversation_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn save(&self, conversation_id: &str, messages: &[Message]) -> Result<(), CheckpointError> {
        self.threads
            .write()
            .await
            .insert(conversation_id.to_string(), messages.to_vec());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_conversation_loads_empty() {
        let store = InMemoryCheckpointStore::new();
        assert!(store.load("missing").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_replaces_whole_sequence() {
        let store = InMemoryCheckpointStore::new();
        store
            .save("c1", &[Message::user("a"), Message::assistant("b")])
            .await
            .unwrap();
        store.save("c1", &[Message::user("only")]).await.unwrap();

        let loaded = store.load("c1").await.unwrap();
        assert_eq!(loaded, vec![Message::user("only")]);
        assert_eq!(store.conversation_count().await, 1);
    }
}
