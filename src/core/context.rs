//! 单轮上下文：显式沿调用链传递（轮次 ID、会话 ID、主体、原始问题），不依赖任何隐式全局状态

use std::fmt;

use serde::{Deserialize, Serialize};

/// 检索与工具访问所代表的用户身份
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(String);

impl Principal {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Principal {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for Principal {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// 一轮对话的上下文
#[derive(Clone, Debug)]
pub struct TurnContext {
    pub turn_id: String,
    pub conversation_id: String,
    pub principal: Principal,
    /// 本轮用户输入（重写之前）
    pub original_question: String,
}

impl TurnContext {
    pub fn new(
        conversation_id: impl Into<String>,
        principal: Principal,
        original_question: impl Into<String>,
    ) -> Self {
        Self {
            turn_id: uuid::Uuid::new_v4().to_string(),
            conversation_id: conversation_id.into(),
            principal,
            original_question: original_question.into(),
        }
    }
}
