//! 流多路复用器：把带节点标签的内部事件转换为调用方可见的流事件
//!
//! - route 的片段先缓冲：此时还不知道本轮是否会调用工具
//! - route 结束且未请求工具：按原顺序逐个发出缓冲片段；请求了工具：丢弃缓冲
//! - generate_answer 的片段立即发出
//! - 其它节点的片段不对外可见
//! - 恰好一个终止事件（done 或 error），之后的事件全部忽略

use crate::graph::{Node, NodeEvent};
use crate::stream::StreamEvent;

#[derive(Debug, Default)]
pub struct Multiplexer {
    route_buffer: Vec<String>,
    emitted: String,
    finished: bool,
}

impl Multiplexer {
    pub fn new() -> Self {
        Self::default()
    }

    /// 已到达终止事件
    pub fn is_finished(&self) -> bool {
        self.finished
    }

    /// 处理一个内部事件，返回应发出的流事件（按顺序）
    pub fn push(&mut self, event: NodeEvent) -> Vec<StreamEvent> {
        if self.finished {
            return Vec::new();
        }
        match event {
            NodeEvent::Token {
                node: Node::Route,
                text,
            } => {
                self.route_buffer.push(text);
                Vec::new()
            }
            NodeEvent::Token {
                node: Node::GenerateAnswer,
                text,
            } => {
                self.emitted.push_str(&text);
                vec![StreamEvent::Token { content: text }]
            }
            NodeEvent::Token { node, .. } => {
                tracing::trace!(node = %node, "token from non-streaming node dropped");
                Vec::new()
            }
            NodeEvent::RouteConcluded { tool_calls: true } => {
                self.route_buffer.clear();
                Vec::new()
            }
            NodeEvent::RouteConcluded { tool_calls: false } => self
                .route_buffer
                .drain(..)
                .map(|text| {
                    self.emitted.push_str(&text);
                    StreamEvent::Token { content: text }
                })
                .collect(),
            NodeEvent::Completed => {
                self.finished = true;
                vec![StreamEvent::Done {
                    content: self.emitted.clone(),
                }]
            }
            NodeEvent::Failed { detail } => {
                self.finished = true;
                self.route_buffer.clear();
                vec![StreamEvent::Error { detail }]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn route(text: &str) -> NodeEvent {
        NodeEvent::Token {
            node: Node::Route,
            text: text.to_string(),
        }
    }

    fn answer(text: &str) -> NodeEvent {
        NodeEvent::Token {
            node: Node::GenerateAnswer,
            text: text.to_string(),
        }
    }

    fn feed(events: Vec<NodeEvent>) -> Vec<StreamEvent> {
        let mut mux = Multiplexer::new();
        events.into_iter().flat_map(|e| mux.push(e)).collect()
    }

    fn token(text: &str) -> StreamEvent {
        StreamEvent::Token {
            content: text.to_string(),
        }
    }

    #[test]
    fn test_direct_answer_flushes_buffer_in_order() {
        let out = feed(vec![
            route("Hel"),
            route("lo"),
            NodeEvent::RouteConcluded { tool_calls: false },
            NodeEvent::Completed,
        ]);
        assert_eq!(
            out,
            vec![
                token("Hel"),
                token("lo"),
                StreamEvent::Done {
                    content: "Hello".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_tool_call_discards_route_tokens() {
        let out = feed(vec![
            route("Let me search"),
            NodeEvent::RouteConcluded { tool_calls: true },
            answer("X "),
            answer("is..."),
            NodeEvent::Completed,
        ]);
        assert_eq!(
            out,
            vec![
                token("X "),
                token("is..."),
                StreamEvent::Done {
                    content: "X is...".to_string()
                }
            ]
        );
    }

    #[test]
    fn test_nothing_is_buffered_before_route_concludes() {
        let mut mux = Multiplexer::new();
        assert!(mux.push(route("partial")).is_empty());
        assert!(mux.push(NodeEvent::Token { node: Node::Grade, text: "yes".into() }).is_empty());
    }

    #[test]
    fn test_single_terminal_event() {
        let out = feed(vec![
            answer("partial"),
            NodeEvent::Failed {
                detail: "boom".to_string(),
            },
            answer("late"),
            NodeEvent::Completed,
        ]);
        assert_eq!(
            out,
            vec![
                token("partial"),
                StreamEvent::Error {
                    detail: "boom".to_string()
                }
            ]
        );
        assert_eq!(out.iter().filter(|e| e.is_terminal()).count(), 1);
    }

    #[test]
    fn test_second_route_after_rewrite_buffers_again() {
        let out = feed(vec![
            route("searching"),
            NodeEvent::RouteConcluded { tool_calls: true },
            route("Direct "),
            route("answer"),
            NodeEvent::RouteConcluded { tool_calls: false },
            NodeEvent::Completed,
        ]);
        assert_eq!(
            out.last(),
            Some(&StreamEvent::Done {
                content: "Direct answer".to_string()
            })
        );
        assert!(!out.contains(&token("searching")));
    }
}
