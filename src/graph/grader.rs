//! 相关性评分：对最新问题与最新检索上下文做二元判定
//!
//! 要求模型按 GradeDocuments 的 JSON Schema 回答；解析宽松：
//! 优先取回复中的 JSON 对象，否则以 "yes" 开头视为相关，其余一律不相关。

use std::sync::Arc;

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;

use crate::graph::PromptSet;
use crate::llm::{LlmClient, LlmError};
use crate::memory::Message;

/// 评分回答格式
#[derive(Debug, Deserialize, JsonSchema)]
pub struct GradeDocuments {
    /// Relevance score: 'yes' if relevant, or 'no' if not relevant
    pub binary_score: String,
}

pub fn grade_schema_json() -> String {
    serde_json::to_string_pretty(&schema_for!(GradeDocuments)).unwrap_or_default()
}

/// 解析模型回复为相关 / 不相关
pub fn parse_grade(reply: &str) -> bool {
    let trimmed = reply.trim();
    if let (Some(start), Some(end)) = (trimmed.find('{'), trimmed.rfind('}')) {
        if start < end {
            if let Ok(parsed) = serde_json::from_str::<GradeDocuments>(&trimmed[start..=end]) {
                return parsed.binary_score.trim().eq_ignore_ascii_case("yes");
            }
        }
    }
    trimmed
        .trim_start_matches(|c: char| !c.is_alphanumeric())
        .to_ascii_lowercase()
        .starts_with("yes")
}

pub struct Grader {
    llm: Arc<dyn LlmClient>,
    schema: String,
}

impl Grader {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self {
            llm,
            schema: grade_schema_json(),
        }
    }

    pub async fn is_relevant(
        &self,
        question: &str,
        context: &str,
        prompts: &PromptSet,
    ) -> Result<bool, LlmError> {
        let prompt = prompts.render_grade(question, context, &self.schema);
        let reply = self.llm.complete(&[Message::user(prompt)], &[]).await?;
        let relevant = parse_grade(&reply.content);
        tracing::debug!(relevant, reply = %reply.content, "grade");
        Ok(relevant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{ScriptedLlm, ScriptedReply};

    #[test]
    fn test_parse_grade_variants() {
        assert!(parse_grade(r#"{"binary_score": "yes"}"#));
        assert!(parse_grade("```json\n{\"binary_score\": \"YES\"}\n```"));
        assert!(!parse_grade(r#"{"binary_score": "no"}"#));
        assert!(parse_grade("Yes, the document is relevant."));
        assert!(!parse_grade("No."));
        assert!(!parse_grade(""));
    }

    #[test]
    fn test_schema_mentions_binary_score() {
        assert!(grade_schema_json().contains("binary_score"));
    }

    #[tokio::test]
    async fn test_grader_prompt_contains_question_and_context() {
        let llm = Arc::new(ScriptedLlm::new([ScriptedReply::text(r#"{"binary_score":"no"}"#)]));
        let grader = Grader::new(llm.clone());
        let relevant = grader
            .is_relevant("What is X?", "Y is a color.", &PromptSet::default())
            .await
            .unwrap();
        assert!(!relevant);
        let seen = llm.seen_messages();
        assert!(seen[0][0].content.contains("What is X?"));
        assert!(seen[0][0].content.contains("Y is a color."));
    }
}
