//! Ragloop - 检索增强对话引擎
//!
//! 模块划分：
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 轮次上下文、错误与恢复建议、引擎构建器
//! - **engine**: 一轮对话的生命周期与持久化策略
//! - **graph**: 编排状态机（路由 / 评分 / 改写 / 回答）
//! - **llm**: 模型适配器抽象与实现（OpenAI 兼容 / DeepSeek / 脚本化 Mock）
//! - **memory**: 消息模型、历史修复、会话检查点
//! - **observability**: 日志初始化
//! - **retrieval**: 文档检索适配器与检索日志
//! - **stream**: 流式事件与多路复用
//! - **tools**: 工具、注册表与执行器

pub mod config;
pub mod core;
pub mod engine;
pub mod graph;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod retrieval;
pub mod stream;
pub mod tools;

pub use crate::core::EngineBuilder;
pub use engine::{ChatEngine, RepairReport};
pub use stream::{StreamEvent, TurnStream};
