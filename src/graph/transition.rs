//! 显式转移函数
//!
//! route → (invoke_tools | respond_directly)
//! invoke_tools → (grade，若最近的 tool 消息来自检索工具 | generate_answer)
//! grade → (generate_answer，相关或循环保护触发 | rewrite)
//! rewrite → route
//!
//! 循环保护：最近 `recent_window` 条消息中已有不少于 `tool_response_threshold` 条 tool 消息，
//! 或本轮重写次数已达 `max_rewrites`，则跳过评分直接生成回答。
//! 因此任何拒绝序列下，最多经过一次 rewrite 就会到达 generate_answer。

use crate::graph::Node;
use crate::memory::Message;

/// 路由决策（只在转移时产生，不持久化）
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    InvokeTools,
    AnswerDirectly,
    Grade,
    Rewrite,
    GenerateAnswer,
}

impl RouteDecision {
    /// 决策对应的下一个节点
    pub fn target(self) -> Node {
        match self {
            RouteDecision::InvokeTools => Node::InvokeTools,
            RouteDecision::AnswerDirectly => Node::RespondDirectly,
            RouteDecision::Grade => Node::Grade,
            RouteDecision::Rewrite => Node::Rewrite,
            RouteDecision::GenerateAnswer => Node::GenerateAnswer,
        }
    }
}

/// 评分结果
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GradeVerdict {
    Relevant,
    NotRelevant,
    /// 循环保护触发，未评分
    LoopGuard,
}

/// 循环保护参数
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LoopGuard {
    pub recent_window: usize,
    pub tool_response_threshold: usize,
    pub max_rewrites: usize,
}

impl Default for LoopGuard {
    fn default() -> Self {
        Self {
            recent_window: 6,
            tool_response_threshold: 2,
            max_rewrites: 1,
        }
    }
}

impl LoopGuard {
    /// 最近窗口内的 tool 消息数
    pub fn recent_tool_responses(&self, messages: &[Message]) -> usize {
        let start = messages.len().saturating_sub(self.recent_window);
        messages[start..].iter().filter(|m| m.is_tool()).count()
    }

    pub fn tripped(&self, messages: &[Message], rewrites: usize) -> bool {
        self.recent_tool_responses(messages) >= self.tool_response_threshold
            || rewrites >= self.max_rewrites
    }
}

pub fn after_route(requested_tools: bool) -> RouteDecision {
    if requested_tools {
        RouteDecision::InvokeTools
    } else {
        RouteDecision::AnswerDirectly
    }
}

/// 最近一条 tool 消息的工具名
pub fn last_tool_name(messages: &[Message]) -> Option<&str> {
    messages
        .iter()
        .rev()
        .find(|m| m.is_tool())
        .and_then(|m| m.name.as_deref())
}

pub fn after_tools(messages: &[Message], retrieval_tool: &str) -> RouteDecision {
    if last_tool_name(messages) == Some(retrieval_tool) {
        RouteDecision::Grade
    } else {
        RouteDecision::GenerateAnswer
    }
}

pub fn after_grade(verdict: GradeVerdict) -> RouteDecision {
    match verdict {
        GradeVerdict::Relevant | GradeVerdict::LoopGuard => RouteDecision::GenerateAnswer,
        GradeVerdict::NotRelevant => RouteDecision::Rewrite,
    }
}
