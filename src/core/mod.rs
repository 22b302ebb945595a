//! 核心层：轮次上下文、错误与恢复、引擎构建

pub mod builder;
pub mod context;
pub mod error;
pub mod recovery;

pub use builder::EngineBuilder;
pub use context::{Principal, TurnContext};
pub use error::{EngineError, RecoveryAction};
pub use recovery::{is_incomplete_tool_call, RecoveryEngine};
