//! 状态机驱动：从 route 出发执行节点，直到到达终止节点
//!
//! 模型调用失败立即中止本轮（不重试）；单个工具失败写入 tool 消息后继续，
//! 一次派发全部失败则中止。返回最终回答文本，最终 assistant 消息已追加到 state.messages。

use std::sync::Arc;

use crate::core::{EngineError, TurnContext};
use crate::graph::answer::AnswerGenerator;
use crate::graph::context::{latest_context, latest_question};
use crate::graph::grader::Grader;
use crate::graph::rewriter::Rewriter;
use crate::graph::router::Router;
use crate::graph::transition::{self, GradeVerdict, LoopGuard};
use crate::graph::{EventSink, Node, NodeEvent, PromptSet, TurnState};
use crate::llm::LlmClient;
use crate::tools::ToolExecutor;

pub struct RagGraph {
    llm: Arc<dyn LlmClient>,
    router: Router,
    grader: Grader,
    rewriter: Rewriter,
    answerer: AnswerGenerator,
    tools: Arc<ToolExecutor>,
    prompts: PromptSet,
    retrieval_tool: String,
    guard: LoopGuard,
}

impl RagGraph {
    pub fn new(
        llm: Arc<dyn LlmClient>,
        tools: Arc<ToolExecutor>,
        prompts: PromptSet,
        retrieval_tool: impl Into<String>,
        guard: LoopGuard,
    ) -> Self {
        Self {
            router: Router::new(Arc::clone(&llm), tools.specs()),
            grader: Grader::new(Arc::clone(&llm)),
            rewriter: Rewriter::new(Arc::clone(&llm)),
            answerer: AnswerGenerator::new(Arc::clone(&llm)),
            llm,
            tools,
            prompts,
            retrieval_tool: retrieval_tool.into(),
            guard,
        }
    }

    /// 模型累计 token 用量：(prompt, completion, total)
    pub fn token_usage(&self) -> (u64, u64, u64) {
        self.llm.token_usage()
    }

    pub async fn run(
        &self,
        state: &mut TurnState,
        ctx: &TurnContext,
        sink: &mut dyn EventSink,
    ) -> Result<String, EngineError> {
        let mut node = Node::Route;
        loop {
            state.visited.push(node);
            tracing::debug!(turn_id = %ctx.turn_id, node = %node, "enter node");

            let decision = match node {
                Node::Route => {
                    let reply = self.router.route(&state.messages, &self.prompts, sink).await?;
                    let requested = reply.requests_tools();
                    sink.emit(NodeEvent::RouteConcluded { tool_calls: requested }).await;
                    state.messages.push(reply);
                    transition::after_route(requested)
                }
                Node::InvokeTools => {
                    let calls = state
                        .messages
                        .last()
                        .map(|m| m.tool_calls.clone())
                        .unwrap_or_default();
                    let outcome = self.tools.dispatch(&calls, ctx).await;
                    if outcome.all_failed() {
                        return Err(EngineError::ToolsFailed {
                            count: outcome.failures.len(),
                            detail: outcome.failures.join("; "),
                        });
                    }
                    state.messages.extend(outcome.messages);
                    transition::after_tools(&state.messages, &self.retrieval_tool)
                }
                Node::Grade => {
                    let verdict = self.grade(state).await?;
                    tracing::info!(turn_id = %ctx.turn_id, verdict = ?verdict, "grade");
                    transition::after_grade(verdict)
                }
                Node::Rewrite => {
                    let question = latest_question(&state.messages, false);
                    let rewritten = self.rewriter.rewrite(&question, &self.prompts).await?;
                    state.messages.push(rewritten);
                    state.rewrites += 1;
                    node = Node::Route;
                    continue;
                }
                Node::GenerateAnswer => {
                    let question = latest_question(&state.messages, true);
                    let context = latest_context(&state.messages);
                    let answer = self
                        .answerer
                        .generate(&question, &context, &self.prompts, sink)
                        .await?;
                    let text = answer.content.clone();
                    state.messages.push(answer);
                    return Ok(text);
                }
                Node::RespondDirectly => {
                    return Ok(state
                        .messages
                        .last()
                        .map(|m| m.content.clone())
                        .unwrap_or_default());
                }
            };
            node = decision.target();
        }
    }

    async fn grade(&self, state: &TurnState) -> Result<GradeVerdict, EngineError> {
        if self.guard.tripped(&state.messages, state.rewrites) {
            tracing::info!(
                recent_tool_responses = self.guard.recent_tool_responses(&state.messages),
                rewrites = state.rewrites,
                "loop guard tripped, skipping grading"
            );
            return Ok(GradeVerdict::LoopGuard);
        }
        let question = latest_question(&state.messages, true);
        let context = latest_context(&state.messages);
        let relevant = self
            .grader
            .is_relevant(&question, &context, &self.prompts)
            .await?;
        Ok(if relevant {
            GradeVerdict::Relevant
        } else {
            GradeVerdict::NotRelevant
        })
    }
}
