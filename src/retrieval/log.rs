//! 检索日志：每次检索追加一行 JSON（JSONL），便于离线分析查询与命中段落
//!
//! 写入失败只记 warn，不影响检索结果。

use std::path::{Path, PathBuf};

use serde_json::{json, Value};
use tokio::io::AsyncWriteExt;

use crate::core::TurnContext;
use crate::retrieval::Passage;

const MAX_LOGGED_CHARS: usize = 500;

#[derive(Clone, Debug)]
pub struct RetrievalLog {
    path: PathBuf,
}

impl RetrievalLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 构造一条日志记录（纯函数）
    pub fn entry(query: &str, passages: &[Passage], ctx: &TurnContext, k: usize) -> Value {
        let documents: Vec<Value> = passages
            .iter()
            .enumerate()
            .map(|(index, p)| {
                let char_count = p.text.chars().count();
                let content = if char_count > MAX_LOGGED_CHARS {
                    let head: String = p.text.chars().take(MAX_LOGGED_CHARS).collect();
                    format!("{head}...")
                } else {
                    p.text.clone()
                };
                json!({
                    "index": index,
                    "content": content,
                    "content_length": char_count,
                    "metadata": p.metadata,
                })
            })
            .collect();

        json!({
            "timestamp": chrono::Utc::now().to_rfc3339(),
            "query": query,
            "original_question": ctx.original_question,
            "principal": ctx.principal.as_str(),
            "conversation_id": ctx.conversation_id,
            "turn_id": ctx.turn_id,
            "num_documents_retrieved": passages.len(),
            "documents": documents,
            "k": k,
        })
    }

    /// 追加一条记录
    pub async fn record(&self, query: &str, passages: &[Passage], ctx: &TurnContext, k: usize) {
        let line = Self::entry(query, passages, ctx, k).to_string();
        if let Err(e) = self.append_line(&line).await {
            tracing::warn!(path = %self.path.display(), error = %e, "Failed to write retrieval log");
        }
    }

    async fn append_line(&self, line: &str) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        file.write_all(line.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Principal;

    fn ctx() -> TurnContext {
        TurnContext::new("c1", Principal::new("u1"), "What is X?")
    }

    #[test]
    fn test_entry_truncates_long_content() {
        let long = "a".repeat(600);
        let entry = RetrievalLog::entry("X", &[Passage::new(long)], &ctx(), 5);
        let doc = &entry["documents"][0];
        assert_eq!(doc["content_length"], 600);
        assert_eq!(doc["content"].as_str().unwrap().len(), MAX_LOGGED_CHARS + 3);
        assert_eq!(entry["original_question"], "What is X?");
        assert_eq!(entry["num_documents_retrieved"], 1);
    }

    #[tokio::test]
    async fn test_record_appends_jsonl() {
        let dir = tempfile::tempdir().unwrap();
        let log = RetrievalLog::new(dir.path().join("logs").join("retrieval.jsonl"));
        log.record("X", &[Passage::new("X is...")], &ctx(), 5).await;
        log.record("Y", &[], &ctx(), 5).await;

        let text = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 2);
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["query"], "Y");
        assert_eq!(second["num_documents_retrieved"], 0);
    }
}
