//! 问题与上下文解析
//!
//! 带检查点的会话可能跨越多轮，第一条消息未必是当前问题：始终从末尾向前找。

use crate::memory::Message;

/// 最近一条 user 消息的内容；`exclude_last` 为真时不看最后一条（如它是 tool 回复）。
/// 找不到 user 消息时退回第一条消息的内容。
pub fn latest_question(messages: &[Message], exclude_last: bool) -> String {
    let search = if exclude_last && !messages.is_empty() {
        &messages[..messages.len() - 1]
    } else {
        messages
    };
    search
        .iter()
        .rev()
        .find(|m| m.is_user())
        .or_else(|| messages.first())
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

/// 最近一条 tool 消息的内容；没有非空 tool 消息时退回最后一条消息的内容
pub fn latest_context(messages: &[Message]) -> String {
    let from_tool = messages
        .iter()
        .rev()
        .find(|m| m.is_tool())
        .map(|m| m.content.as_str())
        .unwrap_or_default();
    if !from_tool.is_empty() {
        return from_tool.to_string();
    }
    messages
        .last()
        .map(|m| m.content.clone())
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_latest_question_is_most_recent_user() {
        let msgs = vec![
            Message::user("A"),
            Message::assistant("..."),
            Message::user("B"),
        ];
        assert_eq!(latest_question(&msgs, false), "B");
    }

    #[test]
    fn test_exclude_last_skips_trailing_message() {
        let msgs = vec![
            Message::user("A"),
            Message::assistant("..."),
            Message::user("B"),
        ];
        assert_eq!(latest_question(&msgs, true), "A");
    }

    #[test]
    fn test_falls_back_to_first_message() {
        let msgs = vec![Message::assistant("hello"), Message::tool("c", "t", "x")];
        assert_eq!(latest_question(&msgs, false), "hello");
        assert_eq!(latest_question(&[], false), "");
    }

    #[test]
    fn test_context_prefers_latest_tool_message() {
        let msgs = vec![
            Message::user("q"),
            Message::tool("a", "retrieve_documents", "old"),
            Message::tool("b", "retrieve_documents", "new"),
            Message::assistant("trailing"),
        ];
        assert_eq!(latest_context(&msgs), "new");
    }

    #[test]
    fn test_context_falls_back_to_last_message() {
        let msgs = vec![Message::user("q"), Message::assistant("last words")];
        assert_eq!(latest_context(&msgs), "last words");
        assert_eq!(latest_context(&[]), "");
    }
}
