//! 轮次级错误类型
//!
//! 单个工具调用失败不在这里：它被写成 tool 消息内容，轮次继续。
//! 评分循环保护触发也不是错误，而是一次有意的短路（GradeVerdict::LoopGuard）。

use thiserror::Error;

use crate::llm::LlmError;
use crate::memory::CheckpointError;

/// 终止一轮对话的错误
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Model error: {0}")]
    Model(#[from] LlmError),

    /// 一次派发中的全部工具调用都失败
    #[error("All {count} tool calls failed: {detail}")]
    ToolsFailed { count: usize, detail: String },

    /// 修复后没有任何可用消息
    #[error("Corrupt history: {0}")]
    CorruptHistory(String),

    /// 调用方在轮次结束前断开
    #[error("Stream consumer disconnected")]
    StreamConsumerGone,

    #[error("Checkpoint error: {0}")]
    Checkpoint(#[from] CheckpointError),
}

/// 根据错误给出的恢复动作
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryAction {
    /// 历史中存在未闭合的工具调用：换新的会话 ID 或执行历史修复
    RepairHistory,
    /// 重新发起本轮即可
    Retry,
    /// 无需动作
    None,
}
