//! 记忆层：消息模型、历史修复、会话检查点（内存 / SQLite）

pub mod checkpoint;
pub mod conversation;
pub mod sanitize;
pub mod sqlite_checkpoint;

pub use checkpoint::{CheckpointError, CheckpointStore, InMemoryCheckpointStore};
pub use conversation::{Message, Role, ToolCallRequest};
pub use sanitize::{incomplete_tool_call_positions, sanitize};
pub use sqlite_checkpoint::SqliteCheckpointStore;
