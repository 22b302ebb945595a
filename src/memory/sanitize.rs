//! 历史修复：剔除不完整的工具调用序列
//!
//! 进程在「工具已派发、结果未写回」之间崩溃时，检查点里会留下没有 tool 回复的
//! assistant 工具调用消息；支持工具调用的模型 API 会拒绝这样的历史。
//!
//! 规则：从左到右扫描，对每条带工具调用的 assistant 消息向后查找，直到遇到下一条
//! user 消息或序列结束；若期间 tool 消息没有覆盖全部调用 ID，则丢弃该 assistant 消息。
//! 引用了被丢弃调用的 tool 消息保留（惰性，不参与匹配）。其余消息原样通过。
//!
//! 丢弃 assistant 消息不会改变任何 user / tool 消息，因此其它 assistant 消息的判定不受影响，
//! `sanitize` 是幂等的。

use std::collections::HashSet;

use crate::memory::{Message, Role};

/// 返回修复后的消息序列（纯函数，不修改输入）
pub fn sanitize(messages: &[Message]) -> Vec<Message> {
    messages
        .iter()
        .enumerate()
        .filter(|(i, msg)| !msg.requests_tools() || tool_calls_answered(messages, *i))
        .map(|(_, msg)| msg.clone())
        .collect()
}

/// 返回会被 `sanitize` 丢弃的 assistant 消息下标
pub fn incomplete_tool_call_positions(messages: &[Message]) -> Vec<usize> {
    messages
        .iter()
        .enumerate()
        .filter(|(i, msg)| msg.requests_tools() && !tool_calls_answered(messages, *i))
        .map(|(i, _)| i)
        .collect()
}

/// 第 `index` 条 assistant 消息请求的全部调用 ID 是否在下一条 user 消息之前得到回复
fn tool_calls_answered(messages: &[Message], index: usize) -> bool {
    let Some(msg) = messages.get(index) else {
        return false;
    };
    // 缺少调用 ID 时无法校验，按不完整处理
    if msg.tool_calls.iter().any(|c| c.id.is_empty()) {
        return false;
    }
    let mut pending: HashSet<&str> = msg.tool_calls.iter().map(|c| c.id.as_str()).collect();

    for next in messages.iter().skip(index + 1) {
        match next.role {
            Role::Tool => {
                if let Some(id) = next.tool_call_id.as_deref() {
                    pending.remove(id);
                }
                if pending.is_empty() {
                    return true;
                }
            }
            Role::User => break,
            _ => {}
        }
    }
    pending.is_empty()
}
