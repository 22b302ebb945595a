//! 问题重写：评分拒绝后把问题改写一次，作为新的 user 消息追加

use std::sync::Arc;

use crate::graph::PromptSet;
use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

pub struct Rewriter {
    llm: Arc<dyn LlmClient>,
}

impl Rewriter {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    /// 返回改写后的问题；模型给出空回复时沿用原问题
    pub async fn rewrite(&self, question: &str, prompts: &PromptSet) -> Result<Message, LlmError> {
        let prompt = prompts.render_rewrite(question);
        let reply = self.llm.complete(&[Message::user(prompt)], &[]).await?;
        let rewritten = reply.content.trim();
        let rewritten = if rewritten.is_empty() { question } else { rewritten };
        tracing::info!(original = %question, rewritten = %rewritten, "question rewritten");
        Ok(Message::user(rewritten))
    }
}
