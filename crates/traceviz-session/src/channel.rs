use serde::Serialize;
use std::fmt;
use thiserror::Error;

/// Close code for a normal, clean shutdown.
pub const NORMAL_CLOSURE: u16 = 1000;

/// Identifies one opened channel. Ids are never reused by an adapter, so
/// events from an abandoned channel can be told apart from the live one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ChannelId(pub u64);

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "channel#{}", self.0)
    }
}

/// How a channel ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseInfo {
    /// Close code sent by the peer, if a close frame was received at all.
    pub code: Option<u16>,
    pub reason: String,
}

impl CloseInfo {
    pub fn normal() -> Self {
        Self {
            code: Some(NORMAL_CLOSURE),
            reason: String::new(),
        }
    }

    pub fn with_code(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// Transport failure or a stream that ended without a close frame.
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.code == Some(NORMAL_CLOSURE)
    }
}

/// Readiness of a channel, reported by the adapter as it changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReadyState {
    Connecting,
    Open,
    Closing,
    Closed(CloseInfo),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelEvent {
    State { channel: ChannelId, state: ReadyState },
    Message { channel: ChannelId, text: String },
}

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to open channel to {url}: {reason}")]
    Open { url: String, reason: String },
    #[error("{channel} is no longer accepting messages")]
    Gone { channel: ChannelId },
}

/// Bidirectional message channel used by the controller.
///
/// Contract for implementors:
/// - `open` returns immediately; the outcome arrives later as
///   `ReadyState::Open` or `ReadyState::Closed`.
/// - every channel that `open` returned an id for gets exactly one
///   `ReadyState::Closed` event, which doubles as the close acknowledgment.
/// - events for a channel are delivered in the order they happened.
/// - `close` is idempotent and may be called for a channel that already closed.
pub trait ChannelAdapter {
    fn open(&mut self, url: &str) -> Result<ChannelId, ChannelError>;
    fn send(&mut self, channel: ChannelId, text: String) -> Result<(), ChannelError>;
    fn close(&mut self, channel: ChannelId);
}

impl<A: ChannelAdapter + ?Sized> ChannelAdapter for Box<A> {
    fn open(&mut self, url: &str) -> Result<ChannelId, ChannelError> {
        (**self).open(url)
    }

    fn send(&mut self, channel: ChannelId, text: String) -> Result<(), ChannelError> {
        (**self).send(channel, text)
    }

    fn close(&mut self, channel: ChannelId) {
        (**self).close(channel)
    }
}
