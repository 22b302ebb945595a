//! 面向调用方的流事件：token / done / error，以 done 或 error 之一结尾

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    Token { content: String },
    /// 完整回答（全部已发出 token 的拼接）
    Done { content: String },
    Error {
        #[serde(rename = "content")]
        detail: String,
    },
}

impl StreamEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done { .. } | StreamEvent::Error { .. })
    }
}
