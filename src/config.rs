//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `RAGLOOP__*` 覆盖（双下划线表示嵌套，如 `RAGLOOP__LLM__PROVIDER=openai`）。
//! 所有字段都有默认值，空配置也可运行（Mock 模型 + 内存索引 + SQLite 检查点）。

use std::path::PathBuf;

use serde::Deserialize;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    pub retrieval: RetrievalSection,
    pub graph: GraphSection,
    pub tools: ToolsSection,
    pub checkpoint: CheckpointSection,
}

/// [app] 段：应用名、数据目录
#[derive(Debug, Clone, Deserialize, Default)]
pub struct AppSection {
    pub name: Option<String>,
    /// 数据目录（检查点、检索日志），未设置时用 ./data
    pub data_dir: Option<PathBuf>,
}

impl AppSection {
    pub fn data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(|| PathBuf::from("data"))
    }
}

/// [llm] 段：后端选择、温度与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：deepseek / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    pub model: Option<String>,
    pub base_url: Option<String>,
    #[serde(default)]
    pub temperature: f32,
    #[serde(default)]
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: None,
            base_url: None,
            temperature: 0.0,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

fn default_provider() -> String {
    "deepseek".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmTimeoutsSection {
    #[serde(default = "default_request_timeout")]
    pub request: u64,
    #[serde(default = "default_stream_timeout")]
    pub stream: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: default_request_timeout(),
            stream: default_stream_timeout(),
        }
    }
}

fn default_request_timeout() -> u64 {
    60
}

fn default_stream_timeout() -> u64 {
    120
}

/// [retrieval] 段：检索工具与外部索引
#[derive(Debug, Clone, Deserialize)]
pub struct RetrievalSection {
    /// 每次检索返回的段落上限
    #[serde(default = "default_k")]
    pub k: usize,
    #[serde(default = "default_retrieval_tool_name")]
    pub tool_name: String,
    #[serde(default = "default_retrieval_tool_description")]
    pub tool_description: String,
    /// HTTP 索引地址；未设置时使用进程内索引
    pub endpoint: Option<String>,
    #[serde(default = "default_retrieval_timeout_secs")]
    pub timeout_secs: u64,
    /// JSONL 检索日志路径；未设置时不记录
    pub log_path: Option<PathBuf>,
}

impl Default for RetrievalSection {
    fn default() -> Self {
        Self {
            k: default_k(),
            tool_name: default_retrieval_tool_name(),
            tool_description: default_retrieval_tool_description(),
            endpoint: None,
            timeout_secs: default_retrieval_timeout_secs(),
            log_path: None,
        }
    }
}

fn default_k() -> usize {
    5
}

fn default_retrieval_tool_name() -> String {
    "retrieve_documents".to_string()
}

fn default_retrieval_tool_description() -> String {
    "Search and return information from the user's uploaded documents.".to_string()
}

fn default_retrieval_timeout_secs() -> u64 {
    15
}

/// [graph] 段：状态机参数
#[derive(Debug, Clone, Deserialize)]
pub struct GraphSection {
    /// 循环保护扫描的最近消息数
    #[serde(default = "default_recent_window")]
    pub recent_window: usize,
    /// 窗口内 tool 消息达到该数量即视为已重写过
    #[serde(default = "default_tool_response_threshold")]
    pub tool_response_threshold: usize,
    #[serde(default = "default_max_rewrites")]
    pub max_rewrites: usize,
    /// 事件通道容量（背压）
    #[serde(default = "default_stream_buffer")]
    pub stream_buffer: usize,
    #[serde(default = "default_prompts_dir")]
    pub prompts_dir: PathBuf,
}

impl Default for GraphSection {
    fn default() -> Self {
        Self {
            recent_window: default_recent_window(),
            tool_response_threshold: default_tool_response_threshold(),
            max_rewrites: default_max_rewrites(),
            stream_buffer: default_stream_buffer(),
            prompts_dir: default_prompts_dir(),
        }
    }
}

fn default_recent_window() -> usize {
    6
}

fn default_tool_response_threshold() -> usize {
    2
}

fn default_max_rewrites() -> usize {
    1
}

fn default_stream_buffer() -> usize {
    32
}

fn default_prompts_dir() -> PathBuf {
    PathBuf::from("config/prompts")
}

/// [tools] 段：工具超时与辅助工具开关
#[derive(Debug, Clone, Deserialize)]
pub struct ToolsSection {
    /// 单次工具调用超时（秒）
    #[serde(default = "default_tool_timeout_secs")]
    pub tool_timeout_secs: u64,
    #[serde(default = "default_true")]
    pub enable_datetime: bool,
    #[serde(default = "default_true")]
    pub enable_calculator: bool,
}

impl Default for ToolsSection {
    fn default() -> Self {
        Self {
            tool_timeout_secs: default_tool_timeout_secs(),
            enable_datetime: true,
            enable_calculator: true,
        }
    }
}

fn default_tool_timeout_secs() -> u64 {
    30
}

fn default_true() -> bool {
    true
}

/// [checkpoint] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct CheckpointSection {
    #[serde(default)]
    pub backend: CheckpointBackend,
    /// SQLite 文件路径；未设置时为 <data_dir>/checkpoints.db
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum CheckpointBackend {
    #[default]
    Sqlite,
    Memory,
}

/// 从 config 目录加载配置，环境变量 RAGLOOP__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 RAGLOOP__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignored");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("RAGLOOP")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.retrieval.k, 5);
        assert_eq!(cfg.retrieval.tool_name, "retrieve_documents");
        assert_eq!(cfg.graph.recent_window, 6);
        assert_eq!(cfg.graph.tool_response_threshold, 2);
        assert_eq!(cfg.graph.max_rewrites, 1);
        assert_eq!(cfg.tools.tool_timeout_secs, 30);
        assert_eq!(cfg.checkpoint.backend, CheckpointBackend::Sqlite);
    }

    #[test]
    fn test_explicit_file_overrides_sections() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(
            &path,
            "[llm]\nprovider = \"mock\"\n\n[retrieval]\nk = 3\n\n[checkpoint]\nbackend = \"memory\"\n",
        )
        .unwrap();
        let cfg = load_config(Some(path)).unwrap();
        assert_eq!(cfg.llm.provider, "mock");
        assert_eq!(cfg.retrieval.k, 3);
        assert_eq!(cfg.checkpoint.backend, CheckpointBackend::Memory);
        // 未出现的段落保持默认
        assert_eq!(cfg.graph.max_rewrites, 1);
    }
}
