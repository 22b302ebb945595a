//! 编排状态机：节点、转移函数、问题 / 上下文解析、提示词、各节点组件与驱动

pub mod answer;
pub mod context;
pub mod events;
pub mod grader;
pub mod machine;
pub mod prompts;
pub mod rewriter;
pub mod router;
pub mod state;
pub mod transition;

pub use answer::AnswerGenerator;
pub use context::{latest_context, latest_question};
pub use events::{EventSink, NodeEvent};
pub use grader::{parse_grade, GradeDocuments, Grader};
pub use machine::RagGraph;
pub use prompts::{PromptSet, EMPTY_CONTEXT_FALLBACK};
pub use rewriter::Rewriter;
pub use router::Router;
pub use state::{Node, TurnState};
pub use transition::{GradeVerdict, LoopGuard, RouteDecision};
