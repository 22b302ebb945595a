//! 状态机的节点与单轮状态

use serde::Serialize;

use crate::memory::Message;

/// 状态机节点
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    /// 初始节点：模型直接回答或请求工具
    Route,
    InvokeTools,
    Grade,
    Rewrite,
    /// 终止节点：根据问题与检索上下文生成最终回答
    GenerateAnswer,
    /// 终止节点：route 的直接回答即最终输出
    RespondDirectly,
}

impl Node {
    pub fn as_str(&self) -> &'static str {
        match self {
            Node::Route => "route",
            Node::InvokeTools => "invoke_tools",
            Node::Grade => "grade",
            Node::Rewrite => "rewrite",
            Node::GenerateAnswer => "generate_answer",
            Node::RespondDirectly => "respond_directly",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Node::GenerateAnswer | Node::RespondDirectly)
    }
}

impl std::fmt::Display for Node {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 一轮执行中的可变状态：消息序列（含历史与本轮新增）、本轮重写次数、经过的节点
#[derive(Debug, Clone, Default)]
pub struct TurnState {
    pub messages: Vec<Message>,
    pub rewrites: usize,
    pub visited: Vec<Node>,
}

impl TurnState {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    /// 本轮经过某节点的次数
    pub fn visits(&self, node: Node) -> usize {
        self.visited.iter().filter(|n| **n == node).count()
    }
}
