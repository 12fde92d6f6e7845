//! Session state machine.
//!
//! The controller reacts to two signal sources, readiness changes and inbound
//! messages, through [`SessionController::handle_event`]. Readiness decides when
//! the request goes out (`Open`) and when the session is finalized (`Closed`).
//! Message content only accumulates hops or records the error.

use serde::Serialize;
use tracing::{debug, info, trace, warn};
use traceviz_model::{
    Hop, InboundMessage, TerminalError, TraceRequest, VisualizationPreference,
    VisualizationTargets,
};

use crate::channel::{ChannelAdapter, ChannelEvent, ChannelId, CloseInfo, ReadyState};
use crate::endpoints::{derive_targets, Endpoints};
use crate::validate::SubmitError;

pub const MALFORMED_MESSAGE: &str = "malformed message from trace backend";
pub const CONNECT_FAILED: &str = "could not connect to trace backend";
pub const INTERRUPTED: &str = "trace interrupted";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Connecting,
    Streaming,
    FinishedSuccess,
    FinishedError,
}

impl Phase {
    pub fn is_finished(&self) -> bool {
        matches!(self, Phase::FinishedSuccess | Phase::FinishedError)
    }

    /// User-facing status line.
    pub fn status_text(&self) -> &'static str {
        match self {
            Phase::Idle => "",
            Phase::Connecting => "Connecting...",
            Phase::Streaming => "Running Traceroute...",
            Phase::FinishedSuccess | Phase::FinishedError => "Traceroute Finished",
        }
    }
}

/// One trace request and everything received for it.
#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    id: u64,
    target: String,
    preference: VisualizationPreference,
    phase: Phase,
    records: Vec<Hop>,
    error: Option<TerminalError>,
    targets: Option<VisualizationTargets>,
    close: Option<CloseInfo>,
}

impl Session {
    fn new(id: u64, target: String, preference: VisualizationPreference) -> Self {
        Self {
            id,
            target,
            preference,
            phase: Phase::Idle,
            records: Vec::new(),
            error: None,
            targets: None,
            close: None,
        }
    }

    /// Sequence number of the submission that created this session; 0 before
    /// the first submission.
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn preference(&self) -> VisualizationPreference {
        self.preference
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Hops in arrival order.
    pub fn records(&self) -> &[Hop] {
        &self.records
    }

    pub fn error(&self) -> Option<&TerminalError> {
        self.error.as_ref()
    }

    /// Set only once the session finished without an error.
    pub fn visualization_targets(&self) -> Option<&VisualizationTargets> {
        self.targets.as_ref()
    }

    pub fn close_info(&self) -> Option<&CloseInfo> {
        self.close.as_ref()
    }

    pub fn status_text(&self) -> &'static str {
        self.phase.status_text()
    }

    fn record_error(&mut self, error: TerminalError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ChannelSlot {
    Vacant,
    Live(ChannelId),
    /// A previous session's channel is being torn down. When `reopen` is set
    /// the current session opens its own channel once this one acknowledges
    /// the close.
    Draining { channel: ChannelId, reopen: bool },
}

pub struct SessionController<A> {
    adapter: A,
    endpoints: Endpoints,
    session: Session,
    channel: ChannelSlot,
    submissions: u64,
}

impl<A: ChannelAdapter> SessionController<A> {
    pub fn new(adapter: A, endpoints: Endpoints) -> Self {
        Self {
            adapter,
            endpoints,
            session: Session::new(0, String::new(), VisualizationPreference::None),
            channel: ChannelSlot::Vacant,
            submissions: 0,
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn adapter(&self) -> &A {
        &self.adapter
    }

    /// No channel is open or waiting for its close acknowledgment.
    pub fn is_settled(&self) -> bool {
        self.channel == ChannelSlot::Vacant
    }

    /// Start a fresh session, discarding the current one.
    ///
    /// If a channel is still live it is closed first and the new channel is
    /// only opened after the adapter reports the old one closed.
    pub fn submit(
        &mut self,
        target: impl Into<String>,
        preference: VisualizationPreference,
    ) -> Result<(), SubmitError> {
        let target = target.into();
        if target.trim().is_empty() {
            return Err(SubmitError::EmptyTarget);
        }

        self.submissions += 1;
        self.session = Session::new(self.submissions, target, preference);
        info!(
            session = self.session.id,
            target = %self.session.target,
            %preference,
            "trace submitted"
        );

        match self.channel {
            ChannelSlot::Vacant => self.open_channel(),
            ChannelSlot::Live(old) => {
                debug!(%old, "closing previous session channel before reopening");
                self.adapter.close(old);
                self.channel = ChannelSlot::Draining {
                    channel: old,
                    reopen: true,
                };
            }
            ChannelSlot::Draining { channel: old, .. } => {
                debug!(%old, "still waiting for previous channel to close");
                self.channel = ChannelSlot::Draining {
                    channel: old,
                    reopen: true,
                };
            }
        }
        Ok(())
    }

    /// Close whatever channel is live. The session finalizes when the close
    /// is acknowledged. A submission still waiting for the previous channel
    /// to drain is never opened and stays `Idle`.
    pub fn shutdown(&mut self) {
        match self.channel {
            ChannelSlot::Live(channel) => self.adapter.close(channel),
            ChannelSlot::Draining { channel, .. } => {
                debug!(%channel, "shutdown cancels pending reopen");
                self.channel = ChannelSlot::Draining {
                    channel,
                    reopen: false,
                };
                self.adapter.close(channel);
            }
            ChannelSlot::Vacant => {}
        }
    }

    /// Stop the running session on behalf of the user. The session finishes
    /// with an [`INTERRUPTED`] error instead of looking like a completed
    /// trace.
    pub fn interrupt(&mut self) {
        if matches!(self.channel, ChannelSlot::Live(_)) && !self.session.phase.is_finished() {
            info!(session = self.session.id, "trace interrupted");
            self.session.record_error(TerminalError::new(INTERRUPTED));
        }
        self.shutdown();
    }

    pub fn handle_event(&mut self, event: ChannelEvent) {
        match event {
            ChannelEvent::State { channel, state } => self.on_ready_state(channel, state),
            ChannelEvent::Message { channel, text } => self.on_message(channel, &text),
        }
    }

    fn open_channel(&mut self) {
        match self.adapter.open(&self.endpoints.session_url) {
            Ok(channel) => {
                debug!(session = self.session.id, %channel, "channel requested");
                self.channel = ChannelSlot::Live(channel);
                self.session.phase = Phase::Connecting;
            }
            Err(err) => {
                warn!(session = self.session.id, "{err}");
                self.session
                    .record_error(TerminalError::new(format!("{CONNECT_FAILED}: {err}")));
                self.session.phase = Phase::FinishedError;
            }
        }
    }

    fn on_ready_state(&mut self, channel: ChannelId, state: ReadyState) {
        match state {
            ReadyState::Connecting | ReadyState::Closing => {
                trace!(%channel, ?state, "readiness changed");
            }
            ReadyState::Open => self.on_open(channel),
            ReadyState::Closed(info) => self.on_closed(channel, info),
        }
    }

    fn on_open(&mut self, channel: ChannelId) {
        if self.channel != ChannelSlot::Live(channel) || self.session.phase != Phase::Connecting {
            debug!(%channel, "ignoring open from a channel that is not awaiting readiness");
            return;
        }

        let request = TraceRequest {
            target: self.session.target.clone(),
            preference: self.session.preference,
        };
        self.session.phase = Phase::Streaming;

        let sent = request
            .to_json()
            .map_err(|err| err.to_string())
            .and_then(|text| {
                self.adapter
                    .send(channel, text)
                    .map_err(|err| err.to_string())
            });
        match sent {
            Ok(()) => debug!(session = self.session.id, %channel, "trace request sent"),
            Err(reason) => {
                warn!(session = self.session.id, %channel, "failed to send trace request: {reason}");
                self.session.record_error(TerminalError::new(format!(
                    "failed to send trace request: {reason}"
                )));
                self.adapter.close(channel);
            }
        }
    }

    fn on_message(&mut self, channel: ChannelId, text: &str) {
        if self.channel != ChannelSlot::Live(channel) || self.session.phase != Phase::Streaming {
            debug!(%channel, "dropping message for a channel that is not streaming");
            return;
        }
        if self.session.error.is_some() {
            debug!(%channel, "dropping message received after terminal error");
            return;
        }

        match InboundMessage::parse(text) {
            Ok(InboundMessage::Hop(hop)) => {
                trace!(session = self.session.id, ip = ?hop.ip, "hop received");
                self.session.records.push(hop);
            }
            Ok(InboundMessage::Error(error)) => {
                info!(session = self.session.id, message = %error.message, "backend reported error");
                self.session.record_error(error);
                self.adapter.close(channel);
            }
            Ok(InboundMessage::Finished) => {
                debug!(session = self.session.id, "backend signalled completion");
            }
            Err(err) => {
                warn!(session = self.session.id, "{err}");
                self.session
                    .record_error(TerminalError::new(MALFORMED_MESSAGE));
                self.adapter.close(channel);
            }
        }
    }

    fn on_closed(&mut self, channel: ChannelId, info: CloseInfo) {
        match self.channel {
            ChannelSlot::Draining { channel: old, reopen } if old == channel => {
                self.channel = ChannelSlot::Vacant;
                if reopen {
                    debug!(%channel, "previous channel closed, opening replacement");
                    self.open_channel();
                } else {
                    debug!(%channel, "previous channel closed after shutdown");
                }
            }
            ChannelSlot::Live(live) if live == channel => {
                self.channel = ChannelSlot::Vacant;
                self.finish(info);
            }
            _ => debug!(%channel, "ignoring close of a stale channel"),
        }
    }

    fn finish(&mut self, info: CloseInfo) {
        let session = &mut self.session;
        match session.phase {
            Phase::Connecting => {
                let reason = if info.reason.is_empty() {
                    CONNECT_FAILED.to_string()
                } else {
                    format!("{CONNECT_FAILED}: {}", info.reason)
                };
                session.record_error(TerminalError::new(reason));
            }
            Phase::Streaming => {
                if !info.is_clean() && session.error.is_none() {
                    warn!(
                        session = session.id,
                        code = ?info.code,
                        reason = %info.reason,
                        "channel closed abnormally; finalizing with received hops"
                    );
                }
            }
            Phase::Idle | Phase::FinishedSuccess | Phase::FinishedError => return,
        }

        session.phase = if session.error.is_some() {
            Phase::FinishedError
        } else {
            session.targets = Some(derive_targets(session.preference, &self.endpoints));
            Phase::FinishedSuccess
        };
        session.close = Some(info);
        info!(
            session = session.id,
            phase = ?session.phase,
            hops = session.records.len(),
            "trace finished"
        );
    }
}
