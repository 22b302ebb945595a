//! 节点提示词模板
//!
//! 每个模板可被 `<prompts_dir>/<name>.md` 覆盖，文件不存在时使用内置默认值。
//! 占位符：`{question}`、`{context}`、`{schema}`。

use std::path::Path;

const ROUTE_SYSTEM: &str = "You are a helpful assistant that answers questions about the user's documents.\n\
The question you must answer now is: {question}\n\
Focus on this latest question, not on earlier turns of the conversation. \
If the answer may be found in the user's documents, call the document retrieval tool with a focused search query. \
Use the other tools when they fit the request. Otherwise, answer directly and concisely.";

const GRADE: &str = "You are a grader assessing relevance of a retrieved document to a user question.\n\
Here is the retrieved document:\n\n{context}\n\n\
Here is the user question: {question}\n\
If the document contains keyword(s) or semantic meaning related to the user question, grade it as relevant.\n\
Reply with only a JSON object matching this schema:\n{schema}\n\
Use \"yes\" if the document is relevant and \"no\" if it is not.";

const REWRITE: &str = "Look at the input and try to reason about the underlying semantic intent / meaning.\n\
Here is the initial question:\n-------\n{question}\n-------\n\
Formulate an improved question. Reply with the question only.";

const ANSWER: &str = "You are an assistant for question-answering tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, just say that you don't know. \
Use three sentences maximum and keep the answer concise.\n\
Question: {question}\n\
Context: {context}";

/// 上下文为空时的固定回答
pub const EMPTY_CONTEXT_FALLBACK: &str = "I don't have enough information in the provided documents to answer this question. Please ensure relevant documents have been ingested.";

/// 全部节点的提示词
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub route_system: String,
    pub grade: String,
    pub rewrite: String,
    pub answer: String,
    pub empty_context_fallback: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            route_system: ROUTE_SYSTEM.to_string(),
            grade: GRADE.to_string(),
            rewrite: REWRITE.to_string(),
            answer: ANSWER.to_string(),
            empty_context_fallback: EMPTY_CONTEXT_FALLBACK.to_string(),
        }
    }
}

impl PromptSet {
    /// 从目录加载覆盖文件（route_system.md / grade.md / rewrite.md / answer.md / empty_context.md）
    pub fn load(dir: &Path) -> Self {
        let mut set = Self::default();
        let overrides: [(&str, &mut String); 5] = [
            ("route_system", &mut set.route_system),
            ("grade", &mut set.grade),
            ("rewrite", &mut set.rewrite),
            ("answer", &mut set.answer),
            ("empty_context", &mut set.empty_context_fallback),
        ];
        for (name, slot) in overrides {
            let path = dir.join(format!("{name}.md"));
            if let Ok(text) = std::fs::read_to_string(&path) {
                let text = text.trim();
                if !text.is_empty() {
                    tracing::debug!(prompt = name, path = %path.display(), "prompt override loaded");
                    *slot = text.to_string();
                }
            }
        }
        set
    }

    pub fn render_route_system(&self, question: &str) -> String {
        self.route_system.replace("{question}", question)
    }

    pub fn render_grade(&self, question: &str, context: &str, schema: &str) -> String {
        // context 可能含有花括号，最后替换
        self.grade
            .replace("{question}", question)
            .replace("{schema}", schema)
            .replace("{context}", context)
    }

    pub fn render_rewrite(&self, question: &str) -> String {
        self.rewrite.replace("{question}", question)
    }

    pub fn render_answer(&self, question: &str, context: &str) -> String {
        self.answer
            .replace("{question}", question)
            .replace("{context}", context)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_fills_placeholders() {
        let prompts = PromptSet::default();
        let text = prompts.render_answer("What is X?", "X is a letter.");
        assert!(text.contains("Question: What is X?"));
        assert!(text.contains("Context: X is a letter."));
        assert!(!text.contains("{question}"));
    }

    #[test]
    fn test_file_overrides_only_named_prompt() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("rewrite.md"), "Better: {question}\n").unwrap();
        let prompts = PromptSet::load(dir.path());
        assert_eq!(prompts.render_rewrite("q"), "Better: q");
        assert_eq!(prompts.answer, ANSWER);
    }

    #[test]
    fn test_missing_dir_uses_defaults() {
        let prompts = PromptSet::load(Path::new("/nonexistent/prompts"));
        assert_eq!(prompts.empty_context_fallback, EMPTY_CONTEXT_FALLBACK);
    }
}
