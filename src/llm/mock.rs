//! 脚本化 Mock 客户端（用于测试与无 API Key 的本地运行）
//!
//! 按顺序弹出预先写好的回复；脚本耗尽后回显最后一条 user 消息。
//! 记录调用次数与每次收到的消息，便于断言「某节点没有调用模型」。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use futures_util::stream;
use serde_json::Value;

use crate::llm::{CompletionChunk, CompletionStream, LlmClient, LlmError, ModelReply, ToolSpec};
use crate::memory::{Message, ToolCallRequest};

/// 一条脚本化回复
#[derive(Debug, Clone)]
pub enum ScriptedReply {
    /// 文本分片（流式时逐片返回）+ 工具调用
    Reply {
        fragments: Vec<String>,
        tool_calls: Vec<ToolCallRequest>,
    },
    /// 模拟上游失败
    Fail(String),
}

impl ScriptedReply {
    pub fn text(content: impl Into<String>) -> Self {
        Self::fragments([content.into()])
    }

    pub fn fragments<I, S>(fragments: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Reply {
            fragments: fragments.into_iter().map(Into::into).collect(),
            tool_calls: Vec::new(),
        }
    }

    /// 单个工具调用；id 为空时在派发时自动编号
    pub fn tool_call(name: impl Into<String>, arguments: Value) -> Self {
        Self::Reply {
            fragments: Vec::new(),
            tool_calls: vec![ToolCallRequest::new("", name, arguments)],
        }
    }

    /// 先输出文本分片，再请求工具
    pub fn fragments_then_tool_call<I, S>(fragments: I, name: impl Into<String>, arguments: Value) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Reply {
            fragments: fragments.into_iter().map(Into::into).collect(),
            tool_calls: vec![ToolCallRequest::new("", name, arguments)],
        }
    }

    pub fn tool_calls(tool_calls: Vec<ToolCallRequest>) -> Self {
        Self::Reply {
            fragments: Vec::new(),
            tool_calls,
        }
    }

    pub fn fail(message: impl Into<String>) -> Self {
        Self::Fail(message.into())
    }
}

/// 脚本化模型客户端
#[derive(Debug, Default)]
pub struct ScriptedLlm {
    script: Mutex<VecDeque<ScriptedReply>>,
    calls: AtomicUsize,
    seen: Mutex<Vec<Vec<Message>>>,
}

impl ScriptedLlm {
    pub fn new(script: impl IntoIterator<Item = ScriptedReply>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Self::default()
        }
    }

    /// 追加回复到脚本末尾
    pub fn push(&self, reply: ScriptedReply) {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(reply);
    }

    /// 累计调用次数（complete + complete_stream）
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// 尚未消费的脚本条数
    pub fn remaining(&self) -> usize {
        self.script.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// 每次调用收到的消息列表（按调用顺序）
    pub fn seen_messages(&self) -> Vec<Vec<Message>> {
        self.seen.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn next_reply(&self, messages: &[Message]) -> Result<(Vec<String>, Vec<ToolCallRequest>), LlmError> {
        let call_index = self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(messages.to_vec());

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();

        match scripted {
            Some(ScriptedReply::Fail(message)) => Err(LlmError::Api(message)),
            Some(ScriptedReply::Reply {
                fragments,
                tool_calls,
            }) => {
                let tool_calls = tool_calls
                    .into_iter()
                    .enumerate()
                    .map(|(i, mut call)| {
                        if call.id.is_empty() {
                            call.id = format!("call_{call_index}_{i}");
                        }
                        call
                    })
                    .collect();
                Ok((fragments, tool_calls))
            }
            None => {
                let last_user = messages
                    .iter()
                    .rev()
                    .find(|m| m.is_user())
                    .map(|m| m.content.as_str())
                    .unwrap_or("(no input)");
                Ok((vec![format!("Echo from Mock: {last_user}")], Vec::new()))
            }
        }
    }
}

#[async_trait]
impl LlmClient for ScriptedLlm {
    async fn complete(&self, messages: &[Message], _tools: &[ToolSpec]) -> Result<ModelReply, LlmError> {
        let (fragments, tool_calls) = self.next_reply(messages)?;
        Ok(ModelReply {
            content: fragments.concat(),
            tool_calls,
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        _tools: &[ToolSpec],
    ) -> Result<CompletionStream, LlmError> {
        let (fragments, tool_calls) = self.next_reply(messages)?;
        let chunks: Vec<Result<CompletionChunk, LlmError>> = fragments
            .into_iter()
            .map(CompletionChunk::Text)
            .chain(tool_calls.into_iter().map(CompletionChunk::ToolCall))
            .map(Ok)
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}
