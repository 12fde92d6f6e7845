//! WebSocket transport for trace sessions.

pub mod drive;
pub mod ws;

pub use drive::run_to_completion;
pub use ws::{WsChannel, CLOSE_ACK_TIMEOUT};
