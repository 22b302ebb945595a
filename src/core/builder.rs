//! 引擎构建器：进程启动时一次性组装模型、检索、工具注册表、检查点与状态机
//!
//! 工具注册是显式的：检索工具最先注册，其后是配置启用的辅助工具，额外工具按 with_tool 的顺序追加。

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context};

use crate::config::{AppConfig, CheckpointBackend, GraphSection};
use crate::engine::ChatEngine;
use crate::graph::{LoopGuard, PromptSet, RagGraph};
use crate::llm::{create_llm_from_config, LlmClient};
use crate::memory::{CheckpointStore, InMemoryCheckpointStore, SqliteCheckpointStore};
use crate::retrieval::{HttpRetriever, InMemoryIndex, RetrievalLog, Retriever};
use crate::tools::{CalculatorTool, DateTimeTool, RetrievalTool, Tool, ToolExecutor, ToolRegistry};

pub struct EngineBuilder {
    config: AppConfig,
    llm: Option<Arc<dyn LlmClient>>,
    retriever: Option<Arc<dyn Retriever>>,
    store: Option<Arc<dyn CheckpointStore>>,
    prompts: Option<PromptSet>,
    extra_tools: Vec<Arc<dyn Tool>>,
}

impl EngineBuilder {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            llm: None,
            retriever: None,
            store: None,
            prompts: None,
            extra_tools: Vec::new(),
        }
    }

    /// 覆盖配置选出的模型后端
    pub fn with_llm(mut self, llm: Arc<dyn LlmClient>) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn with_retriever(mut self, retriever: Arc<dyn Retriever>) -> Self {
        self.retriever = Some(retriever);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn CheckpointStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn with_tool(mut self, tool: impl Tool + 'static) -> Self {
        self.extra_tools.push(Arc::new(tool));
        self
    }

    fn build_retriever(&self) -> anyhow::Result<Arc<dyn Retriever>> {
        if let Some(r) = &self.retriever {
            return Ok(Arc::clone(r));
        }
        let cfg = &self.config.retrieval;
        match &cfg.endpoint {
            Some(endpoint) => {
                tracing::info!(endpoint = %endpoint, "Using HTTP document index");
                let http = HttpRetriever::new(endpoint.clone(), cfg.timeout_secs)
                    .context("Failed to build HTTP retriever")?;
                Ok(Arc::new(http))
            }
            None => {
                tracing::info!("No retrieval endpoint configured, using in-process index");
                Ok(Arc::new(InMemoryIndex::new()))
            }
        }
    }

    /// 构建工具注册表：检索工具 → 日期时间 → 计算器 → 额外工具
    pub fn build_tool_registry(&self, retriever: Arc<dyn Retriever>) -> ToolRegistry {
        let cfg = &self.config;
        let mut tools = ToolRegistry::new();

        let mut retrieval = RetrievalTool::new(
            retriever,
            cfg.retrieval.tool_name.clone(),
            cfg.retrieval.tool_description.clone(),
            cfg.retrieval.k,
        );
        if let Some(path) = &cfg.retrieval.log_path {
            retrieval = retrieval.with_log(RetrievalLog::new(path.clone()));
        }
        tools.register(retrieval);

        if cfg.tools.enable_datetime {
            tools.register(DateTimeTool);
        }
        if cfg.tools.enable_calculator {
            tools.register(CalculatorTool);
        }
        for tool in &self.extra_tools {
            tools.register_arc(Arc::clone(tool));
        }
        tools
    }

    fn build_store(&self) -> anyhow::Result<Arc<dyn CheckpointStore>> {
        if let Some(s) = &self.store {
            return Ok(Arc::clone(s));
        }
        match self.config.checkpoint.backend {
            CheckpointBackend::Memory => Ok(Arc::new(InMemoryCheckpointStore::new())),
            CheckpointBackend::Sqlite => {
                let path = self.checkpoint_path();
                tracing::info!(path = %path.display(), "Opening SQLite checkpoint store");
                let store = SqliteCheckpointStore::open(&path)
                    .with_context(|| format!("Failed to open checkpoint store at {}", path.display()))?;
                Ok(Arc::new(store))
            }
        }
    }

    fn checkpoint_path(&self) -> PathBuf {
        self.config
            .checkpoint
            .path
            .clone()
            .unwrap_or_else(|| self.config.app.data_dir().join("checkpoints.db"))
    }

    pub fn build(self) -> anyhow::Result<ChatEngine> {
        let llm = self
            .llm
            .clone()
            .unwrap_or_else(|| create_llm_from_config(&self.config));
        let retriever = self.build_retriever()?;
        let registry = self.build_tool_registry(retriever);
        let store = self.build_store()?;
        let prompts = self
            .prompts
            .clone()
            .unwrap_or_else(|| PromptSet::load(&self.config.graph.prompts_dir));

        let graph_cfg = &self.config.graph;
        let guard = loop_guard(graph_cfg).context("Invalid [graph] section")?;

        tracing::info!(tools = ?registry.tool_names(), "Tool registry built");
        let executor = Arc::new(ToolExecutor::new(registry, self.config.tools.tool_timeout_secs));
        let graph = RagGraph::new(
            llm,
            executor,
            prompts,
            self.config.retrieval.tool_name.clone(),
            guard,
        );
        Ok(ChatEngine::new(Arc::new(graph), store, graph_cfg.stream_buffer))
    }
}

/// 校验循环保护参数：每轮最多改写一次问题
fn loop_guard(cfg: &GraphSection) -> anyhow::Result<LoopGuard> {
    if cfg.recent_window == 0 {
        bail!("recent_window must be at least 1");
    }
    if cfg.tool_response_threshold == 0 {
        bail!("tool_response_threshold must be at least 1");
    }
    if cfg.max_rewrites == 0 {
        bail!("max_rewrites = 0 would skip grading entirely; use 1");
    }
    if cfg.max_rewrites > 1 {
        tracing::warn!(
            configured = cfg.max_rewrites,
            "max_rewrites above 1 is not supported, clamping to 1"
        );
    }
    Ok(LoopGuard {
        recent_window: cfg.recent_window,
        tool_response_threshold: cfg.tool_response_threshold,
        max_rewrites: 1,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::ScriptedLlm;

    fn memory_config() -> AppConfig {
        let mut cfg = AppConfig::default();
        cfg.checkpoint.backend = CheckpointBackend::Memory;
        cfg
    }

    #[test]
    fn test_retrieval_tool_registered_first() {
        let builder = EngineBuilder::new(memory_config());
        let registry = builder.build_tool_registry(Arc::new(InMemoryIndex::new()));
        assert_eq!(
            registry.tool_names(),
            vec!["retrieve_documents", "get_current_datetime", "calculate"]
        );
    }

    #[test]
    fn test_disabled_auxiliary_tools_are_skipped() {
        let mut cfg = memory_config();
        cfg.tools.enable_datetime = false;
        cfg.tools.enable_calculator = false;
        let registry = EngineBuilder::new(cfg).build_tool_registry(Arc::new(InMemoryIndex::new()));
        assert_eq!(registry.tool_names(), vec!["retrieve_documents"]);
    }

    #[test]
    fn test_loop_guard_is_validated() {
        let defaults = GraphSection::default();
        assert_eq!(loop_guard(&defaults).unwrap(), LoopGuard::default());

        let mut cfg = GraphSection::default();
        cfg.max_rewrites = 5;
        cfg.tool_response_threshold = 10;
        assert_eq!(loop_guard(&cfg).unwrap().max_rewrites, 1);

        let mut cfg = GraphSection::default();
        cfg.max_rewrites = 0;
        assert!(loop_guard(&cfg).is_err());

        let mut cfg = GraphSection::default();
        cfg.tool_response_threshold = 0;
        assert!(loop_guard(&cfg).is_err());

        let mut cfg = GraphSection::default();
        cfg.recent_window = 0;
        assert!(loop_guard(&cfg).is_err());
    }

    #[test]
    fn test_build_rejects_invalid_graph_section() {
        let mut cfg = memory_config();
        cfg.graph.tool_response_threshold = 0;
        let err = EngineBuilder::new(cfg)
            .with_llm(Arc::new(ScriptedLlm::default()))
            .build()
            .err()
            .unwrap();
        assert!(format!("{err:#}").contains("tool_response_threshold"));
    }

    #[test]
    fn test_sqlite_store_under_data_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut cfg = AppConfig::default();
        cfg.app.data_dir = Some(dir.path().to_path_buf());
        let builder = EngineBuilder::new(cfg).with_llm(Arc::new(ScriptedLlm::default()));
        assert_eq!(builder.checkpoint_path(), dir.path().join("checkpoints.db"));
        builder.build().unwrap();
        assert!(dir.path().join("checkpoints.db").exists());
    }
}
