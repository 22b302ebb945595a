//! 检索层：外部索引适配器抽象、进程内关键词索引、HTTP 索引、JSONL 检索日志
//!
//! 主体过滤交给索引实现，但每次调用都必须带上主体 ID。

pub mod http;
pub mod index;
pub mod log;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::core::Principal;

pub use http::HttpRetriever;
pub use index::InMemoryIndex;
pub use log::RetrievalLog;

/// 检索返回的单个段落
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Passage {
    pub text: String,
    #[serde(default)]
    pub metadata: Map<String, Value>,
}

impl Passage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            metadata: Map::new(),
        }
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// 检索错误
#[derive(Error, Debug)]
pub enum RetrievalError {
    #[error("Index request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Index returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Index unavailable: {0}")]
    Unavailable(String),
}

/// 检索适配器：按查询返回主体可见的最多 k 条段落
#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(
        &self,
        query: &str,
        principal: &Principal,
        k: usize,
    ) -> Result<Vec<Passage>, RetrievalError>;
}
