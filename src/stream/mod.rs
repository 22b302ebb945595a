//! 流式输出：面向调用方的事件、多路复用规则、轮次输出通道

pub mod emitter;
pub mod events;
pub mod multiplexer;

pub use emitter::{turn_channel, TurnEmitter, TurnStream};
pub use events::StreamEvent;
pub use multiplexer::Multiplexer;
