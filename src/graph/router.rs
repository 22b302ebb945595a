//! route 节点：模型看到修复后的历史与全部工具，决定直接回答或请求工具
//!
//! 文本片段以 Node::Route 标签流出；此时还不知道是否会进入工具调用，缓冲与否由多路复用器决定。

use std::sync::Arc;

use futures_util::StreamExt;

use crate::graph::context::latest_question;
use crate::graph::{EventSink, Node, NodeEvent, PromptSet};
use crate::llm::{CompletionChunk, LlmClient, LlmError, ToolSpec};
use crate::memory::{sanitize, Message};

/// 流式调用模型：文本片段按 node 标签逐个发出，返回拼装好的完整回复
pub(crate) async fn stream_reply(
    llm: &dyn LlmClient,
    messages: &[Message],
    tools: &[ToolSpec],
    node: Node,
    sink: &mut dyn EventSink,
) -> Result<Message, LlmError> {
    let mut stream = llm.complete_stream(messages, tools).await?;
    let mut content = String::new();
    let mut tool_calls = Vec::new();
    while let Some(chunk) = stream.next().await {
        match chunk? {
            CompletionChunk::Text(text) => {
                content.push_str(&text);
                sink.emit(NodeEvent::Token { node, text }).await;
            }
            CompletionChunk::ToolCall(call) => tool_calls.push(call),
        }
    }
    Ok(if tool_calls.is_empty() {
        Message::assistant(content)
    } else {
        Message::assistant_with_tool_calls(content, tool_calls)
    })
}

pub struct Router {
    llm: Arc<dyn LlmClient>,
    tools: Vec<ToolSpec>,
}

impl Router {
    pub fn new(llm: Arc<dyn LlmClient>, tools: Vec<ToolSpec>) -> Self {
        Self { llm, tools }
    }

    /// 返回 assistant 消息（可能携带工具调用请求）
    pub async fn route(
        &self,
        messages: &[Message],
        prompts: &PromptSet,
        sink: &mut dyn EventSink,
    ) -> Result<Message, LlmError> {
        let cleaned = sanitize(messages);
        let question = latest_question(&cleaned, false);

        let mut request = Vec::with_capacity(cleaned.len() + 1);
        request.push(Message::system(prompts.render_route_system(&question)));
        request.extend(cleaned);

        stream_reply(self.llm.as_ref(), &request, &self.tools, Node::Route, sink).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptedLlm, ScriptedReply};
    use crate::memory::ToolCallRequest;
    use serde_json::json;

    #[tokio::test]
    async fn test_route_sends_sanitized_history_with_system_prompt() {
        let llm = Arc::new(ScriptedLlm::new([ScriptedReply::fragments(["Hi", " there"])]));
        let router = Router::new(llm.clone(), Vec::new());
        let history = vec![
            Message::user("old"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCallRequest::new("dangling", "retrieve_documents", json!({}))],
            ),
            Message::user("hello"),
        ];
        let mut events: Vec<NodeEvent> = Vec::new();
        let reply = router.route(&history, &PromptSet::default(), &mut events).await.unwrap();

        assert_eq!(reply, Message::assistant("Hi there"));
        assert_eq!(events.len(), 2);
        let seen = llm.seen_messages();
        let seen = &seen[0];
        assert_eq!(seen.len(), 3);
        assert!(seen[0].content.contains("hello"));
        assert!(seen.iter().all(|m| !m.requests_tools()));
    }

    #[tokio::test]
    async fn test_route_collects_tool_calls() {
        let llm = Arc::new(ScriptedLlm::new([ScriptedReply::fragments_then_tool_call(
            ["Let me look"],
            "retrieve_documents",
            json!({"query": "X"}),
        )]));
        let router = Router::new(llm, Vec::new());
        let mut events: Vec<NodeEvent> = Vec::new();
        let reply = router
            .route(&[Message::user("What is X?")], &PromptSet::default(), &mut events)
            .await
            .unwrap();
        assert!(reply.requests_tools());
        assert_eq!(reply.tool_calls[0].arguments, json!({"query": "X"}));
        assert_eq!(
            events,
            vec![NodeEvent::Token {
                node: Node::Route,
                text: "Let me look".to_string()
            }]
        );
    }
}
