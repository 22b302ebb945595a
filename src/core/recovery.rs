//! 错误恢复：把轮次错误映射为恢复动作与面向调用方的错误说明
//!
//! 「未闭合的工具调用」是已知的运维恢复路径：上游 API 拒绝历史时，错误文本同时提到
//! tool_calls 与 tool_call_id。这类错误的说明必须明确告诉调用方换新的会话 ID 或请求历史修复。

use crate::core::{EngineError, RecoveryAction};

/// 错误文本是否为「未闭合工具调用」模式
pub fn is_incomplete_tool_call(text: &str) -> bool {
    text.contains("tool_calls") && text.contains("tool_call_id")
}

#[derive(Debug, Default)]
pub struct RecoveryEngine;

impl RecoveryEngine {
    pub fn new() -> Self {
        Self
    }

    /// 根据错误类型返回建议的恢复动作
    pub fn handle(&self, err: &EngineError) -> RecoveryAction {
        match err {
            EngineError::CorruptHistory(_) => RecoveryAction::RepairHistory,
            EngineError::Model(e) if is_incomplete_tool_call(&e.to_string()) => {
                RecoveryAction::RepairHistory
            }
            EngineError::Model(_) | EngineError::ToolsFailed { .. } | EngineError::Checkpoint(_) => {
                RecoveryAction::Retry
            }
            EngineError::StreamConsumerGone => RecoveryAction::None,
        }
    }

    /// 面向调用方的错误说明（error 事件的 detail）
    pub fn error_detail(&self, err: &EngineError, conversation_id: &str) -> String {
        match self.handle(err) {
            RecoveryAction::RepairHistory => format!(
                "Conversation history for '{conversation_id}' contains an incomplete tool call sequence \
                 (an assistant tool call without a matching tool response). \
                 Start a new conversation with a different conversation id, \
                 or request a history repair for '{conversation_id}' and retry. ({err})"
            ),
            _ => format!("An error occurred while processing the request: {err}"),
        }
    }
}
