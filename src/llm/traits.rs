//! 模型适配器抽象
//!
//! 所有后端（OpenAI 兼容 / 脚本化 Mock）实现 LlmClient：
//! complete（非流式，返回完整回复与工具调用）、complete_stream（流式，逐段返回文本与工具调用）。
//! 超时由各适配器自行处理，状态机把超时与其它模型错误同等对待。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::Stream;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::memory::{Message, ToolCallRequest};

/// 模型调用错误
#[derive(Error, Debug, Clone)]
pub enum LlmError {
    #[error("API error: {0}")]
    Api(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Stream interrupted: {0}")]
    Stream(String),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

/// 提供给模型的工具描述（名称、说明、参数 JSON Schema）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// 一次非流式调用的完整回复
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModelReply {
    pub content: String,
    pub tool_calls: Vec<ToolCallRequest>,
}

impl ModelReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            tool_calls: Vec::new(),
        }
    }

    pub fn with_tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self {
            content: String::new(),
            tool_calls,
        }
    }
}

/// 流式调用的单个片段
#[derive(Debug, Clone, PartialEq)]
pub enum CompletionChunk {
    /// 文本增量
    Text(String),
    /// 组装完成的工具调用请求
    ToolCall(ToolCallRequest),
}

pub type CompletionStream = Pin<Box<dyn Stream<Item = Result<CompletionChunk, LlmError>> + Send>>;

/// 模型客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成；tools 为空时模型不会请求工具
    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<ModelReply, LlmError>;

    /// 流式完成，返回文本 / 工具调用片段流
    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<CompletionStream, LlmError>;

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
