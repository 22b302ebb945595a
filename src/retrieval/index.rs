//! 进程内索引：按关键词重叠排序（无真实向量，适合本地运行与测试）
//!
//! 每个段落记录所属主体；检索只在请求主体的段落里进行。

use std::collections::HashSet;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::core::Principal;
use crate::retrieval::{Passage, RetrievalError, Retriever};

struct Entry {
    owner: Principal,
    passage: Passage,
    tokens: HashSet<String>,
}

/// 将文本切分为小写词集合（去掉首尾标点），用于词重叠打分
fn tokenize_lower(s: &str) -> HashSet<String> {
    s.split_whitespace()
        .map(|w| {
            w.trim_matches(|c: char| !c.is_alphanumeric())
                .to_lowercase()
        })
        .filter(|w| !w.is_empty())
        .collect()
}

#[derive(Default)]
pub struct InMemoryIndex {
    entries: RwLock<Vec<Entry>>,
}

impl InMemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// 为某个主体写入一段文本
    pub fn add(&self, owner: &Principal, passage: Passage) {
        let text = passage.text.trim();
        if text.is_empty() {
            return;
        }
        let tokens = tokenize_lower(text);
        let mut entries = self.entries.write().unwrap_or_else(|e| e.into_inner());
        entries.push(Entry {
            owner: owner.clone(),
            passage,
            tokens,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl Retriever for InMemoryIndex {
    async fn search(
        &self,
        query: &str,
        principal: &Principal,
        k: usize,
    ) -> Result<Vec<Passage>, RetrievalError> {
        let query_tokens = tokenize_lower(query);
        if query_tokens.is_empty() || k == 0 {
            return Ok(Vec::new());
        }
        let entries = self.entries.read().unwrap_or_else(|e| e.into_inner());
        let mut scored: Vec<(usize, &Passage)> = entries
            .iter()
            .filter(|e| &e.owner == principal)
            .map(|e| (query_tokens.intersection(&e.tokens).count(), &e.passage))
            .filter(|(s, _)| *s > 0)
            .collect();
        // 稳定排序：同分时保持写入顺序
        scored.sort_by(|a, b| b.0.cmp(&a.0));
        Ok(scored.into_iter().take(k).map(|(_, p)| p.clone()).collect())
    }
}
