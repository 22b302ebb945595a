//! 工具层：Tool trait、注册表、执行器（超时 + 审计）、检索 / 日期时间 / 计算器工具

pub mod calculator;
pub mod datetime;
pub mod executor;
pub mod registry;
pub mod retrieve;
pub mod schema;

pub use calculator::CalculatorTool;
pub use datetime::DateTimeTool;
pub use executor::{DispatchOutcome, ToolExecutor};
pub use registry::{Tool, ToolError, ToolRegistry};
pub use retrieve::{format_passages, RetrievalTool};
pub use schema::{args_schema, parse_args};
