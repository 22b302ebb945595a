//! 工具注册表
//!
//! 所有工具实现 Tool trait（name / description / parameters_schema / execute），
//! 由 ToolRegistry 按名注册与查找，ToolExecutor 在调用时加超时并输出审计日志。
//! 注册表由启动流程显式构建一次，之后以只读引用传入状态机。

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::core::TurnContext;
use crate::llm::ToolSpec;

/// 单次工具调用错误（不致命：会被写成 tool 消息内容）
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ToolError {
    #[error("Unknown tool: {0}")]
    Unknown(String),

    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    #[error("Execution failed: {0}")]
    Failed(String),

    #[error("Tool {0} timed out after {1}s")]
    Timeout(String, u64),
}

/// 工具 trait：名称、描述（供 LLM 理解）、参数 schema、异步执行
///
/// 每个工具的签名固定为 `(args, 本轮上下文) -> 文本 | 错误`，主体从上下文中取。
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema（供 LLM 生成正确的参数格式）
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    async fn execute(&self, args: Value, ctx: &TurnContext) -> Result<String, ToolError>;
}

/// 工具注册表：保持注册顺序（下发给模型的工具顺序稳定），按名称索引
#[derive(Default)]
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    by_name: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// 注册工具；同名工具被替换，位置不变
    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        let name = tool.name().to_string();
        match self.by_name.get(&name) {
            Some(&index) => {
                tracing::warn!(tool = %name, "tool registered twice, replacing");
                self.tools[index] = tool;
            }
            None => {
                self.by_name.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.by_name.get(name).map(|&i| Arc::clone(&self.tools[i]))
    }

    pub async fn execute(&self, name: &str, args: Value, ctx: &TurnContext) -> Result<String, ToolError> {
        let tool = self
            .get(name)
            .ok_or_else(|| ToolError::Unknown(name.to_string()))?;
        tool.execute(args, ctx).await
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.tools.iter().map(|t| t.name().to_string()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 下发给模型的工具描述（按注册顺序）
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.tools
            .iter()
            .map(|tool| ToolSpec {
                name: tool.name().to_string(),
                description: tool.description().to_string(),
                parameters: tool.parameters_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Principal;

    struct Fixed(&'static str, &'static str);

    #[async_trait]
    impl Tool for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "fixed output"
        }

        async fn execute(&self, _args: Value, _ctx: &TurnContext) -> Result<String, ToolError> {
            Ok(self.1.to_string())
        }
    }

    #[tokio::test]
    async fn test_registration_order_and_replacement() {
        let mut registry = ToolRegistry::new();
        registry.register(Fixed("b", "1"));
        registry.register(Fixed("a", "2"));
        registry.register(Fixed("b", "3"));

        assert_eq!(registry.tool_names(), vec!["b", "a"]);
        let ctx = TurnContext::new("c", Principal::new("u"), "q");
        assert_eq!(registry.execute("b", Value::Null, &ctx).await.unwrap(), "3");
        assert_eq!(
            registry.execute("zzz", Value::Null, &ctx).await,
            Err(ToolError::Unknown("zzz".to_string()))
        );
        assert_eq!(registry.specs()[1].name, "a");
    }
}
