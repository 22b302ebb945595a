//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）；支持 DeepSeek、OpenAI、自建代理等。
//! 负责 Message <-> API 类型转换、工具描述下发、流式工具调用分片的拼装以及请求超时。

use std::collections::{BTreeMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::{
    ChatCompletionMessageToolCall, ChatCompletionMessageToolCalls,
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestSystemMessageArgs, ChatCompletionRequestToolMessageArgs,
    ChatCompletionRequestUserMessageArgs, ChatCompletionTool, ChatCompletionTools,
    CreateChatCompletionRequest, CreateChatCompletionRequestArgs, FunctionCall, FunctionObject,
};
use async_openai::Client;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;

use crate::llm::{CompletionChunk, CompletionStream, LlmClient, LlmError, ModelReply, ToolSpec};
use crate::memory::{Message, Role, ToolCallRequest};

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        let prompt = self.prompt_tokens.load(Ordering::Relaxed);
        let completion = self.completion_tokens.load(Ordering::Relaxed);
        (prompt, completion, prompt + completion)
    }
}

/// OpenAI 兼容客户端
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model: String,
    temperature: f32,
    request_timeout: Duration,
    stream_timeout: Duration,
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, model: &str, api_key: &str) -> Self {
        let mut config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(url) = base_url {
            config = config.with_api_base(url);
        }
        Self {
            client: Client::with_config(config),
            model: model.to_string(),
            temperature: 0.0,
            request_timeout: Duration::from_secs(60),
            stream_timeout: Duration::from_secs(120),
            usage: TokenUsage::default(),
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// request：非流式整体超时；stream：流式两个片段之间的最长等待
    pub fn with_timeouts(mut self, request_secs: u64, stream_secs: u64) -> Self {
        self.request_timeout = Duration::from_secs(request_secs);
        self.stream_timeout = Duration::from_secs(stream_secs);
        self
    }

    fn build_request(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
        stream: bool,
    ) -> Result<CreateChatCompletionRequest, LlmError> {
        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model)
            .messages(to_openai_messages(messages)?)
            .temperature(self.temperature)
            .stream(stream);
        if !tools.is_empty() {
            args.tools(tools.iter().map(to_openai_tool).collect::<Vec<_>>());
        }
        args.build().map_err(invalid)
    }
}

fn invalid(e: impl std::fmt::Display) -> LlmError {
    LlmError::InvalidRequest(e.to_string())
}

fn to_openai_tool(spec: &ToolSpec) -> ChatCompletionTools {
    ChatCompletionTools::Function(ChatCompletionTool {
        function: FunctionObject {
            name: spec.name.clone(),
            description: Some(spec.description.clone()),
            parameters: Some(spec.parameters.clone()),
            strict: None,
        },
    })
}

/// 转为 API 消息。没有对应 assistant 调用请求的 tool 消息（历史修复后遗留的惰性消息）不下发。
fn to_openai_messages(messages: &[Message]) -> Result<Vec<ChatCompletionRequestMessage>, LlmError> {
    let mut requested: HashSet<&str> = HashSet::new();
    let mut out = Vec::with_capacity(messages.len());

    for m in messages {
        let converted = match m.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(invalid)?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(m.content.clone())
                .build()
                .map_err(invalid)?
                .into(),
            Role::Assistant => {
                let mut args = ChatCompletionRequestAssistantMessageArgs::default();
                if !m.content.is_empty() || m.tool_calls.is_empty() {
                    args.content(m.content.clone());
                }
                if !m.tool_calls.is_empty() {
                    requested.extend(m.tool_calls.iter().map(|c| c.id.as_str()));
                    args.tool_calls(
                        m.tool_calls
                            .iter()
                            .map(|c| {
                                ChatCompletionMessageToolCalls::Function(ChatCompletionMessageToolCall {
                                    id: c.id.clone(),
                                    function: FunctionCall {
                                        name: c.name.clone(),
                                        arguments: c.arguments.to_string(),
                                    },
                                })
                            })
                            .collect::<Vec<_>>(),
                    );
                }
                args.build().map_err(invalid)?.into()
            }
            Role::Tool => {
                let Some(call_id) = m.tool_call_id.as_deref() else {
                    continue;
                };
                if !requested.contains(call_id) {
                    tracing::debug!(call_id, "skipping inert tool message");
                    continue;
                }
                ChatCompletionRequestToolMessageArgs::default()
                    .content(m.content.clone())
                    .tool_call_id(call_id.to_string())
                    .build()
                    .map_err(invalid)?
                    .into()
            }
        };
        out.push(converted);
    }
    Ok(out)
}

fn parse_arguments(raw: &str) -> Value {
    if raw.trim().is_empty() {
        return Value::Object(Default::default());
    }
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// 流式工具调用分片（按 index 累积）
#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

#[async_trait]
impl LlmClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, messages: &[Message], tools: &[ToolSpec]) -> Result<ModelReply, LlmError> {
        let request = self.build_request(messages, tools, false)?;
        let response = tokio::time::timeout(self.request_timeout, self.client.chat().create(request))
            .await
            .map_err(|_| LlmError::Timeout(self.request_timeout.as_secs()))?
            .map_err(|e| LlmError::Api(e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let Some(choice) = response.choices.into_iter().next() else {
            return Err(LlmError::Api("response contained no choices".to_string()));
        };
        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .filter_map(|call| match call {
                ChatCompletionMessageToolCalls::Function(f) => Some(ToolCallRequest::new(
                    f.id,
                    f.function.name,
                    parse_arguments(&f.function.arguments),
                )),
                _ => None,
            })
            .collect();

        Ok(ModelReply {
            content: choice.message.content.unwrap_or_default(),
            tool_calls,
        })
    }

    async fn complete_stream(
        &self,
        messages: &[Message],
        tools: &[ToolSpec],
    ) -> Result<CompletionStream, LlmError> {
        let request = self.build_request(messages, tools, true)?;
        let mut upstream = tokio::time::timeout(
            self.request_timeout,
            self.client.chat().create_stream(request),
        )
        .await
        .map_err(|_| LlmError::Timeout(self.request_timeout.as_secs()))?
        .map_err(|e| LlmError::Api(e.to_string()))?;

        let (tx, rx) = mpsc::channel::<Result<CompletionChunk, LlmError>>(32);
        let idle = self.stream_timeout;
        let usage = self.usage.clone();

        tokio::spawn(async move {
            let mut partial: BTreeMap<u32, PartialToolCall> = BTreeMap::new();
            loop {
                let next = match tokio::time::timeout(idle, upstream.next()).await {
                    Ok(next) => next,
                    Err(_) => {
                        let _ = tx.send(Err(LlmError::Timeout(idle.as_secs()))).await;
                        return;
                    }
                };
                let response = match next {
                    Some(Ok(r)) => r,
                    Some(Err(e)) => {
                        let _ = tx.send(Err(LlmError::Stream(e.to_string()))).await;
                        return;
                    }
                    None => break,
                };
                if let Some(u) = &response.usage {
                    usage.add(u.prompt_tokens as u64, u.completion_tokens as u64);
                }
                for choice in response.choices {
                    if let Some(text) = choice.delta.content {
                        if !text.is_empty() && tx.send(Ok(CompletionChunk::Text(text))).await.is_err() {
                            return;
                        }
                    }
                    for chunk in choice.delta.tool_calls.unwrap_or_default() {
                        let entry = partial.entry(chunk.index).or_default();
                        if let Some(id) = chunk.id {
                            entry.id = id;
                        }
                        if let Some(function) = chunk.function {
                            if let Some(name) = function.name {
                                entry.name.push_str(&name);
                            }
                            if let Some(arguments) = function.arguments {
                                entry.arguments.push_str(&arguments);
                            }
                        }
                    }
                }
            }
            for call in partial.into_values() {
                let request = ToolCallRequest::new(call.id, call.name, parse_arguments(&call.arguments));
                if tx.send(Ok(CompletionChunk::ToolCall(request))).await.is_err() {
                    return;
                }
            }
        });

        Ok(Box::pin(futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        })))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inert_tool_messages_are_not_sent() {
        let messages = vec![
            Message::user("q"),
            Message::tool("orphan", "retrieve_documents", "stale"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest::new("c1", "calculate", serde_json::json!({"expression": "1"}))],
            ),
            Message::tool("c1", "calculate", "1"),
        ];
        let converted = to_openai_messages(&messages).unwrap();
        assert_eq!(converted.len(), 3);
    }

    #[test]
    fn test_parse_arguments_falls_back_to_string() {
        assert_eq!(parse_arguments(""), serde_json::json!({}));
        assert_eq!(parse_arguments("{\"query\":\"x\"}"), serde_json::json!({"query": "x"}));
        assert_eq!(parse_arguments("not json"), Value::String("not json".to_string()));
    }
}
