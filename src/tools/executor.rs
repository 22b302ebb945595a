//! 工具执行器
//!
//! 持有 ToolRegistry 与全局超时，execute 在超时内调用 registry.execute，超时转为 ToolError::Timeout；
//! 每次调用输出结构化审计日志（JSON）。dispatch 按请求顺序执行一批调用，
//! 每个调用（无论成败）都产生一条回答其调用 ID 的 tool 消息。

use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::TurnContext;
use crate::llm::ToolSpec;
use crate::memory::{Message, ToolCallRequest};
use crate::tools::{ToolError, ToolRegistry};

/// 一批工具调用的结果
#[derive(Debug, Default)]
pub struct DispatchOutcome {
    /// 与请求一一对应的 tool 消息
    pub messages: Vec<Message>,
    /// 失败调用的错误文本
    pub failures: Vec<String>,
}

impl DispatchOutcome {
    /// 是否全部失败（空批次不算）
    pub fn all_failed(&self) -> bool {
        !self.messages.is_empty() && self.failures.len() == self.messages.len()
    }
}

/// 工具执行器：对每次调用施加超时，并输出审计日志
pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Duration,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// 执行指定工具；超时返回 ToolError::Timeout；输出 JSON 审计日志
    pub async fn execute(&self, tool_name: &str, args: Value, ctx: &TurnContext) -> Result<String, ToolError> {
        let start = Instant::now();
        let args_preview = args_preview(&args);
        let result = timeout(self.timeout, self.registry.execute(tool_name, args, ctx)).await;

        let (ok, outcome): (bool, &str) = match &result {
            Ok(Ok(_)) => (true, "ok"),
            Ok(Err(_)) => (false, "error"),
            Err(_) => (false, "timeout"),
        };
        let duration_ms = start.elapsed().as_millis() as u64;
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": ok,
            "outcome": outcome,
            "duration_ms": duration_ms,
            "args_preview": args_preview,
            "turn_id": ctx.turn_id,
            "conversation_id": ctx.conversation_id,
        });
        tracing::info!(audit = %audit.to_string(), "tool");

        match result {
            Ok(inner) => inner,
            Err(_) => Err(ToolError::Timeout(tool_name.to_string(), self.timeout.as_secs())),
        }
    }

    /// 按请求顺序执行一批调用；失败的调用写成错误文本，不中断其余调用
    pub async fn dispatch(&self, calls: &[ToolCallRequest], ctx: &TurnContext) -> DispatchOutcome {
        let mut outcome = DispatchOutcome::default();
        for call in calls {
            let content = match self.execute(&call.name, call.arguments.clone(), ctx).await {
                Ok(content) => content,
                Err(e) => {
                    tracing::warn!(tool = %call.name, call_id = %call.id, error = %e, "tool call failed");
                    let text = format!("Error: {e}. Please fix your mistakes.");
                    outcome.failures.push(format!("{}: {e}", call.name));
                    text
                }
            };
            outcome
                .messages
                .push(Message::tool(call.id.clone(), call.name.clone(), content));
        }
        outcome
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn registry(&self) -> &ToolRegistry {
        &self.registry
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Principal;
    use crate::tools::Tool;
    use async_trait::async_trait;
    use serde_json::json;

    struct Slow;

    #[async_trait]
    impl Tool for Slow {
        fn name(&self) -> &str {
            "slow"
        }

        fn description(&self) -> &str {
            "sleeps"
        }

        async fn execute(&self, _args: Value, _ctx: &TurnContext) -> Result<String, ToolError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("late".to_string())
        }
    }

    struct Upper;

    #[async_trait]
    impl Tool for Upper {
        fn name(&self) -> &str {
            "upper"
        }

        fn description(&self) -> &str {
            "uppercases text"
        }

        async fn execute(&self, args: Value, _ctx: &TurnContext) -> Result<String, ToolError> {
            args.get("text")
                .and_then(|v| v.as_str())
                .map(str::to_uppercase)
                .ok_or_else(|| ToolError::InvalidArguments("missing text".to_string()))
        }
    }

    fn ctx() -> TurnContext {
        TurnContext::new("c1", Principal::new("u1"), "q")
    }

    fn executor(timeout_secs: u64) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Slow);
        registry.register(Upper);
        ToolExecutor::new(registry, timeout_secs)
    }

    #[tokio::test]
    async fn test_timeout_is_reported() {
        let err = executor(1).execute("slow", json!({}), &ctx()).await.unwrap_err();
        assert_eq!(err, ToolError::Timeout("slow".to_string(), 1));
    }

    #[tokio::test]
    async fn test_dispatch_answers_every_call_id() {
        let calls = vec![
            ToolCallRequest::new("a", "upper", json!({"text": "hi"})),
            ToolCallRequest::new("b", "upper", json!({})),
            ToolCallRequest::new("c", "missing", json!({})),
        ];
        let outcome = executor(5).dispatch(&calls, &ctx()).await;
        let ids: Vec<_> = outcome
            .messages
            .iter()
            .map(|m| m.tool_call_id.clone().unwrap())
            .collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(outcome.messages[0].content, "HI");
        assert!(outcome.messages[1].content.starts_with("Error:"));
        assert_eq!(outcome.failures.len(), 2);
        assert!(!outcome.all_failed());
    }

    #[tokio::test]
    async fn test_all_failed() {
        let calls = vec![ToolCallRequest::new("x", "missing", json!({}))];
        assert!(executor(5).dispatch(&calls, &ctx()).await.all_failed());
        assert!(!DispatchOutcome::default().all_failed());
    }
}
