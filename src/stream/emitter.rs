//! 轮次输出通道：状态机事件经多路复用后写入有界 channel，调用方以 Stream 形式消费
//!
//! channel 满时 emit 挂起（背压）。调用方丢弃 TurnStream 后，后续事件直接丢弃，
//! 轮次本身照常执行并持久化。

use std::pin::Pin;
use std::task::{Context, Poll};

use async_trait::async_trait;
use futures_util::Stream;
use tokio::sync::mpsc;

use crate::core::EngineError;
use crate::graph::{EventSink, NodeEvent};
use crate::stream::{Multiplexer, StreamEvent};

/// 创建一对发送端 / 接收端
pub fn turn_channel(buffer: usize) -> (TurnEmitter, TurnStream) {
    let (tx, rx) = mpsc::channel(buffer.max(1));
    (
        TurnEmitter {
            tx,
            mux: Multiplexer::new(),
            consumer_gone: false,
        },
        TurnStream { rx },
    )
}

pub struct TurnEmitter {
    tx: mpsc::Sender<StreamEvent>,
    mux: Multiplexer,
    consumer_gone: bool,
}

impl TurnEmitter {
    /// 调用方是否已断开
    pub fn consumer_gone(&self) -> bool {
        self.consumer_gone
    }

    pub fn is_finished(&self) -> bool {
        self.mux.is_finished()
    }
}

#[async_trait]
impl EventSink for TurnEmitter {
    async fn emit(&mut self, event: NodeEvent) {
        for out in self.mux.push(event) {
            if self.consumer_gone {
                continue;
            }
            if self.tx.send(out).await.is_err() {
                self.consumer_gone = true;
                tracing::warn!(error = %EngineError::StreamConsumerGone, "dropping remaining stream events");
            }
        }
    }
}

/// 调用方持有的事件流，以 done 或 error 结尾
pub struct TurnStream {
    rx: mpsc::Receiver<StreamEvent>,
}

impl TurnStream {
    pub async fn next_event(&mut self) -> Option<StreamEvent> {
        self.rx.recv().await
    }

    /// 读取到流结束为止
    pub async fn collect_all(mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        while let Some(event) = self.rx.recv().await {
            events.push(event);
        }
        events
    }
}

impl Stream for TurnStream {
    type Item = StreamEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Node;
    use futures_util::StreamExt;

    #[tokio::test]
    async fn test_events_reach_stream() {
        let (mut emitter, stream) = turn_channel(8);
        emitter
            .emit(NodeEvent::Token { node: Node::GenerateAnswer, text: "hi".into() })
            .await;
        emitter.emit(NodeEvent::Completed).await;
        drop(emitter);

        let events: Vec<StreamEvent> = stream.collect().await;
        assert_eq!(
            events,
            vec![
                StreamEvent::Token { content: "hi".into() },
                StreamEvent::Done { content: "hi".into() },
            ]
        );
    }

    #[tokio::test]
    async fn test_dropped_consumer_does_not_block() {
        let (mut emitter, stream) = turn_channel(1);
        drop(stream);
        emitter
            .emit(NodeEvent::Token { node: Node::GenerateAnswer, text: "a".into() })
            .await;
        emitter.emit(NodeEvent::Completed).await;
        assert!(emitter.consumer_gone());
        assert!(emitter.is_finished());
    }
}
