//! 对话引擎：一轮对话的完整生命周期
//!
//! run_turn 在后台任务中执行：读取检查点 → 修复历史 → 追加用户消息并保存 → 运行状态机 →
//! 保存完整消息列表 → 发出 done。失败时发出单个 error 事件，不持久化任何 assistant 消息。
//! 调用方中途断开不会中止轮次，检查点照常写入。

use std::sync::Arc;

use crate::core::{EngineError, Principal, RecoveryEngine, TurnContext};
use crate::graph::{EventSink, NodeEvent, RagGraph, TurnState};
use crate::memory::{
    incomplete_tool_call_positions, sanitize, CheckpointError, CheckpointStore, Message,
};
use crate::stream::{turn_channel, TurnEmitter, TurnStream};

/// 历史修复结果
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairReport {
    pub before: usize,
    pub after: usize,
}

impl RepairReport {
    pub fn dropped(&self) -> usize {
        self.before - self.after
    }
}

#[derive(Clone)]
pub struct ChatEngine {
    graph: Arc<RagGraph>,
    store: Arc<dyn CheckpointStore>,
    stream_buffer: usize,
}

impl ChatEngine {
    pub fn new(graph: Arc<RagGraph>, store: Arc<dyn CheckpointStore>, stream_buffer: usize) -> Self {
        Self {
            graph,
            store,
            stream_buffer,
        }
    }

    /// 发起一轮对话，返回事件流；流以 done 或 error 结尾
    pub fn run_turn(
        &self,
        conversation_id: impl Into<String>,
        user_text: impl Into<String>,
        principal: impl Into<Principal>,
    ) -> TurnStream {
        let user_text = user_text.into();
        let ctx = TurnContext::new(conversation_id, principal.into(), user_text.clone());
        let (mut emitter, stream) = turn_channel(self.stream_buffer);
        let engine = self.clone();

        tokio::spawn(async move {
            tracing::info!(
                conversation_id = %ctx.conversation_id,
                turn_id = %ctx.turn_id,
                principal = %ctx.principal,
                "turn started"
            );
            match engine.execute(&ctx, user_text, &mut emitter).await {
                Ok(answer) => {
                    let (_, _, total_tokens) = engine.graph.token_usage();
                    tracing::info!(
                        conversation_id = %ctx.conversation_id,
                        turn_id = %ctx.turn_id,
                        answer_chars = answer.chars().count(),
                        total_tokens,
                        "turn completed"
                    );
                    emitter.emit(NodeEvent::Completed).await;
                }
                Err(e) => {
                    let recovery = RecoveryEngine::new();
                    tracing::error!(
                        conversation_id = %ctx.conversation_id,
                        turn_id = %ctx.turn_id,
                        error = %e,
                        action = ?recovery.handle(&e),
                        "turn failed"
                    );
                    let detail = recovery.error_detail(&e, &ctx.conversation_id);
                    emitter.emit(NodeEvent::Failed { detail }).await;
                }
            }
            if emitter.consumer_gone() {
                tracing::info!(turn_id = %ctx.turn_id, "consumer disconnected before end of turn");
            }
        });

        stream
    }

    async fn execute(
        &self,
        ctx: &TurnContext,
        user_text: String,
        emitter: &mut TurnEmitter,
    ) -> Result<String, EngineError> {
        let stored = self.store.load(&ctx.conversation_id).await?;
        let incomplete = incomplete_tool_call_positions(&stored);
        let mut messages = sanitize(&stored);
        if !stored.is_empty() && messages.is_empty() {
            return Err(EngineError::CorruptHistory(format!(
                "no usable messages remain out of {} stored",
                stored.len()
            )));
        }
        if !incomplete.is_empty() {
            tracing::warn!(
                conversation_id = %ctx.conversation_id,
                positions = ?incomplete,
                "incomplete tool call messages dropped from history"
            );
        }

        messages.push(Message::user(user_text));
        self.store.save(&ctx.conversation_id, &messages).await?;

        let mut state = TurnState::new(messages);
        let answer = self.graph.run(&mut state, ctx, emitter).await?;
        self.store.save(&ctx.conversation_id, &state.messages).await?;
        Ok(answer)
    }

    /// 修复已保存的历史：去掉未闭合的工具调用消息并写回
    pub async fn repair_history(&self, conversation_id: &str) -> Result<RepairReport, CheckpointError> {
        let stored = self.store.load(conversation_id).await?;
        let repaired = sanitize(&stored);
        if repaired.len() != stored.len() {
            self.store.save(conversation_id, &repaired).await?;
        }
        let report = RepairReport {
            before: stored.len(),
            after: repaired.len(),
        };
        tracing::info!(
            conversation_id,
            dropped = report.dropped(),
            "history repaired"
        );
        Ok(report)
    }

    pub async fn history(&self, conversation_id: &str) -> Result<Vec<Message>, CheckpointError> {
        self.store.load(conversation_id).await
    }
}
