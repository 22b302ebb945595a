//! LLM 层：模型适配器抽象与实现（OpenAI 兼容 / DeepSeek / 脚本化 Mock）

pub mod mock;
pub mod openai;
pub mod traits;

use std::sync::Arc;

pub use mock::{ScriptedLlm, ScriptedReply};
pub use openai::{OpenAiClient, TokenUsage};
pub use traits::{CompletionChunk, CompletionStream, LlmClient, LlmError, ModelReply, ToolSpec};

use crate::config::AppConfig;

pub const DEEPSEEK_BASE_URL: &str = "https://api.deepseek.com";
pub const DEEPSEEK_CHAT: &str = "deepseek-chat";

/// 根据配置与环境变量选择模型后端（DeepSeek / OpenAI 兼容 / Mock）
///
/// - provider = deepseek：读取 `DEEPSEEK_API_KEY`（缺失时退回 `OPENAI_API_KEY`），默认 base_url 为 DeepSeek
/// - provider = openai：读取 `OPENAI_API_KEY`，base_url 可配置
/// - provider = mock 或没有任何 Key：脚本为空的 ScriptedLlm（回显用户输入）
pub fn create_llm_from_config(cfg: &AppConfig) -> Arc<dyn LlmClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let timeouts = &cfg.llm.timeouts;

    let key = match provider.as_str() {
        "deepseek" => std::env::var("DEEPSEEK_API_KEY")
            .or_else(|_| std::env::var("OPENAI_API_KEY"))
            .ok(),
        "openai" => std::env::var("OPENAI_API_KEY").ok(),
        _ => None,
    };

    let Some(api_key) = key else {
        tracing::warn!(provider = %provider, "No API key set or provider is mock, using scripted mock LLM");
        return Arc::new(ScriptedLlm::default());
    };

    let (base_url, model) = if provider == "deepseek" {
        let base = cfg.llm.base_url.as_deref().unwrap_or(DEEPSEEK_BASE_URL);
        let model = cfg.llm.model.clone().unwrap_or_else(|| DEEPSEEK_CHAT.to_string());
        (Some(base), model)
    } else {
        let model = cfg.llm.model.clone().unwrap_or_else(|| "gpt-4o-mini".to_string());
        (cfg.llm.base_url.as_deref(), model)
    };

    tracing::info!(provider = %provider, model = %model, "Using OpenAI-compatible LLM");
    Arc::new(
        OpenAiClient::new(base_url, &model, &api_key)
            .with_temperature(cfg.llm.temperature)
            .with_timeouts(timeouts.request, timeouts.stream),
    )
}
