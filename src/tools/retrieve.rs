//! 检索工具：在外部索引中按主体检索，返回带来源元数据的段落
//!
//! 输出格式：每个段落为 `Source: <metadata json>\n<text>`，段落之间空一行；无命中时为空串。

use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use crate::core::TurnContext;
use crate::retrieval::{Passage, RetrievalLog, Retriever};
use crate::tools::schema::{args_schema, parse_args};
use crate::tools::{Tool, ToolError};

#[derive(Deserialize, JsonSchema)]
struct RetrieveArgs {
    /// Search query for the user's documents
    query: String,
}

pub struct RetrievalTool {
    retriever: Arc<dyn Retriever>,
    name: String,
    description: String,
    k: usize,
    log: Option<RetrievalLog>,
}

impl RetrievalTool {
    pub fn new(retriever: Arc<dyn Retriever>, name: impl Into<String>, description: impl Into<String>, k: usize) -> Self {
        Self {
            retriever,
            name: name.into(),
            description: description.into(),
            k,
            log: None,
        }
    }

    pub fn with_log(mut self, log: RetrievalLog) -> Self {
        self.log = Some(log);
        self
    }
}

/// 将段落拼成工具输出文本
pub fn format_passages(passages: &[Passage]) -> String {
    passages
        .iter()
        .map(|p| format!("Source: {}\n{}", Value::Object(p.metadata.clone()), p.text))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[async_trait]
impl Tool for RetrievalTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        args_schema::<RetrieveArgs>()
    }

    async fn execute(&self, args: Value, ctx: &TurnContext) -> Result<String, ToolError> {
        let args: RetrieveArgs = parse_args(args)?;
        let passages = self
            .retriever
            .search(&args.query, &ctx.principal, self.k)
            .await
            .map_err(|e| ToolError::Failed(e.to_string()))?;

        tracing::info!(
            turn_id = %ctx.turn_id,
            query = %args.query,
            hits = passages.len(),
            "retrieval"
        );
        if let Some(log) = &self.log {
            log.record(&args.query, &passages, ctx, self.k).await;
        }
        Ok(format_passages(&passages))
    }
}
