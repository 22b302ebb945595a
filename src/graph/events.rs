//! 状态机内部事件：带节点标签的 token 片段与轮次结束信号，由流多路复用器消费

use async_trait::async_trait;

use crate::graph::Node;

#[derive(Debug, Clone, PartialEq)]
pub enum NodeEvent {
    /// 某节点产生的文本片段
    Token { node: Node, text: String },
    /// route 结束；tool_calls 表示是否请求了工具
    RouteConcluded { tool_calls: bool },
    /// 轮次成功结束（状态已持久化）
    Completed,
    /// 轮次失败，detail 为面向调用方的说明
    Failed { detail: String },
}

/// 事件接收端；emit 在消费端接受事件之前挂起（背压）
#[async_trait]
pub trait EventSink: Send {
    async fn emit(&mut self, event: NodeEvent);
}

/// 收集全部事件（测试与离线执行用）
#[async_trait]
impl EventSink for Vec<NodeEvent> {
    async fn emit(&mut self, event: NodeEvent) {
        self.push(event);
    }
}
