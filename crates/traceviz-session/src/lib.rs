//! Trace session controller: one request, a stream of hops, one outcome.

pub mod channel;
pub mod controller;
pub mod endpoints;
pub mod validate;

pub use channel::{ChannelAdapter, ChannelError, ChannelEvent, ChannelId, CloseInfo, ReadyState};
pub use controller::{
    Phase, Session, SessionController, CONNECT_FAILED, INTERRUPTED, MALFORMED_MESSAGE,
};
pub use endpoints::{derive_targets, EndpointError, Endpoints};
pub use validate::{hostname_hint, validate_submission, SubmitError, INVALID_HOSTNAME_HINT};
