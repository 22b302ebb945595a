//! 回答生成：根据最新问题与检索上下文流式生成最终回答
//!
//! 上下文为空或全是空白时直接给出固定回答，不调用模型；该回答也作为 generate_answer 片段发出。

use std::sync::Arc;

use crate::graph::router::stream_reply;
use crate::graph::{EventSink, Node, NodeEvent, PromptSet};
use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

pub struct AnswerGenerator {
    llm: Arc<dyn LlmClient>,
}

impl AnswerGenerator {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn generate(
        &self,
        question: &str,
        context: &str,
        prompts: &PromptSet,
        sink: &mut dyn EventSink,
    ) -> Result<Message, LlmError> {
        if context.trim().is_empty() {
            tracing::info!("empty retrieval context, answering with fallback");
            let text = prompts.empty_context_fallback.clone();
            sink.emit(NodeEvent::Token {
                node: Node::GenerateAnswer,
                text: text.clone(),
            })
            .await;
            return Ok(Message::assistant(text));
        }

        let prompt = prompts.render_answer(question, context);
        let reply = stream_reply(
            self.llm.as_ref(),
            &[Message::user(prompt)],
            &[],
            Node::GenerateAnswer,
            sink,
        )
        .await?;
        // 未下发工具，忽略模型可能臆造的工具调用
        Ok(Message::assistant(reply.content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::prompts::EMPTY_CONTEXT_FALLBACK;
    use crate::llm::{ScriptedLlm, ScriptedReply};

    #[tokio::test]
    async fn test_blank_context_skips_model() {
        let llm = Arc::new(ScriptedLlm::default());
        let generator = AnswerGenerator::new(llm.clone());
        let mut events: Vec<NodeEvent> = Vec::new();
        let msg = generator
            .generate("What is X?", "  \n ", &PromptSet::default(), &mut events)
            .await
            .unwrap();

        assert_eq!(msg.content, EMPTY_CONTEXT_FALLBACK);
        assert_eq!(llm.calls(), 0);
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn test_streams_answer_tokens() {
        let llm = Arc::new(ScriptedLlm::new([ScriptedReply::fragments(["X ", "is..."])]));
        let generator = AnswerGenerator::new(llm);
        let mut events: Vec<NodeEvent> = Vec::new();
        let msg = generator
            .generate("What is X?", "X is a letter.", &PromptSet::default(), &mut events)
            .await
            .unwrap();

        assert_eq!(msg, Message::assistant("X is..."));
        assert_eq!(
            events,
            vec![
                NodeEvent::Token { node: Node::GenerateAnswer, text: "X ".to_string() },
                NodeEvent::Token { node: Node::GenerateAnswer, text: "is...".to_string() },
            ]
        );
    }
}
