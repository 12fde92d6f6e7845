//! [`ChannelAdapter`] over tokio-tungstenite.
//!
//! Each opened channel is owned by one background task. The task reports
//! readiness changes and text frames on a single unbounded queue shared by all
//! channels, so the consumer sees events one at a time and in order. Every
//! task ends by emitting exactly one `Closed` event.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::{CloseFrame, Message as WsMessage};
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};
use url::Url;

use traceviz_session::{
    ChannelAdapter, ChannelError, ChannelEvent, ChannelId, CloseInfo, ReadyState,
};

/// How long to wait for the peer to answer our close frame.
pub const CLOSE_ACK_TIMEOUT: Duration = Duration::from_secs(2);

/// Code reported when the peer's close frame carried no status.
const NO_STATUS_RECEIVED: u16 = 1005;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

enum Outbound {
    Text(String),
    Close,
}

/// WebSocket channel adapter. Must be used from within a Tokio runtime.
pub struct WsChannel {
    next_id: u64,
    events: mpsc::UnboundedSender<ChannelEvent>,
    live: HashMap<ChannelId, mpsc::UnboundedSender<Outbound>>,
}

impl WsChannel {
    /// Create the adapter and the receiver its events are delivered on.
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ChannelEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let channel = Self {
            next_id: 0,
            events,
            live: HashMap::new(),
        };
        (channel, rx)
    }
}

impl ChannelAdapter for WsChannel {
    fn open(&mut self, url: &str) -> Result<ChannelId, ChannelError> {
        let parsed = Url::parse(url).map_err(|err| ChannelError::Open {
            url: url.to_string(),
            reason: err.to_string(),
        })?;
        if !matches!(parsed.scheme(), "ws" | "wss") {
            return Err(ChannelError::Open {
                url: url.to_string(),
                reason: format!("unsupported scheme {:?}", parsed.scheme()),
            });
        }

        self.live.retain(|_, outbound| !outbound.is_closed());

        self.next_id += 1;
        let channel = ChannelId(self.next_id);
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel();
        self.live.insert(channel, outbound_tx);

        debug!(%channel, url, "opening websocket");
        tokio::spawn(run_channel_task(
            channel,
            parsed.to_string(),
            outbound_rx,
            self.events.clone(),
        ));
        Ok(channel)
    }

    fn send(&mut self, channel: ChannelId, text: String) -> Result<(), ChannelError> {
        self.live
            .get(&channel)
            .ok_or(ChannelError::Gone { channel })?
            .send(Outbound::Text(text))
            .map_err(|_| ChannelError::Gone { channel })
    }

    fn close(&mut self, channel: ChannelId) {
        if let Some(outbound) = self.live.remove(&channel) {
            // The task may already be gone; its Closed event is then in flight.
            let _ = outbound.send(Outbound::Close);
        }
    }
}

struct Reporter {
    channel: ChannelId,
    events: mpsc::UnboundedSender<ChannelEvent>,
}

impl Reporter {
    fn state(&self, state: ReadyState) {
        let _ = self.events.send(ChannelEvent::State {
            channel: self.channel,
            state,
        });
    }

    fn message(&self, text: String) {
        let _ = self.events.send(ChannelEvent::Message {
            channel: self.channel,
            text,
        });
    }
}

async fn run_channel_task(
    channel: ChannelId,
    url: String,
    mut outbound: mpsc::UnboundedReceiver<Outbound>,
    events: mpsc::UnboundedSender<ChannelEvent>,
) {
    let reporter = Reporter { channel, events };
    reporter.state(ReadyState::Connecting);

    let info = match connect(&url, &mut outbound).await {
        Ok(ws) => {
            reporter.state(ReadyState::Open);
            run_io_loop(ws, &mut outbound, &reporter).await
        }
        Err(info) => info,
    };

    debug!(%channel, code = ?info.code, reason = %info.reason, "websocket closed");
    reporter.state(ReadyState::Closed(info));
}

/// Connect, giving up early if the channel is closed before it opens.
async fn connect(
    url: &str,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
) -> Result<WsStream, CloseInfo> {
    let connecting = connect_async(url);
    tokio::pin!(connecting);

    loop {
        tokio::select! {
            result = &mut connecting => {
                return match result {
                    Ok((ws, _response)) => Ok(ws),
                    Err(err) => {
                        warn!(url, "websocket connect failed: {err}");
                        Err(CloseInfo::abnormal(err.to_string()))
                    }
                };
            }
            cmd = outbound.recv() => {
                match cmd {
                    Some(Outbound::Text(_)) => debug!("dropping message queued before open"),
                    Some(Outbound::Close) | None => {
                        return Err(CloseInfo::abnormal("closed before connecting"));
                    }
                }
            }
        }
    }
}

async fn run_io_loop(
    ws: WsStream,
    outbound: &mut mpsc::UnboundedReceiver<Outbound>,
    reporter: &Reporter,
) -> CloseInfo {
    let (mut sink, mut stream) = ws.split();

    loop {
        tokio::select! {
            frame = stream.next() => {
                match frame {
                    Some(Ok(WsMessage::Text(text))) => reporter.message(text.as_str().to_string()),
                    Some(Ok(WsMessage::Close(frame))) => {
                        let info = match frame {
                            Some(frame) => {
                                CloseInfo::with_code(u16::from(frame.code), frame.reason.as_str())
                            }
                            None => CloseInfo::with_code(NO_STATUS_RECEIVED, ""),
                        };
                        // Flushes the close reply tungstenite queued for us.
                        let _ = sink.close().await;
                        return info;
                    }
                    Some(Ok(WsMessage::Binary(bytes))) => {
                        debug!(len = bytes.len(), "ignoring binary frame");
                    }
                    Some(Ok(_)) => {}
                    Some(Err(err)) => {
                        warn!("websocket read error: {err}");
                        return CloseInfo::abnormal(err.to_string());
                    }
                    None => return CloseInfo::abnormal("stream ended without close frame"),
                }
            }

            cmd = outbound.recv() => {
                match cmd {
                    Some(Outbound::Text(text)) => {
                        if let Err(err) = sink.send(WsMessage::text(text)).await {
                            warn!("websocket write error: {err}");
                            return CloseInfo::abnormal(err.to_string());
                        }
                    }
                    Some(Outbound::Close) | None => {
                        reporter.state(ReadyState::Closing);
                        return close_handshake(sink, stream).await;
                    }
                }
            }
        }
    }
}

/// Send our close frame and wait for the peer to answer it. Frames that
/// arrive in between belong to a session that is being torn down and are
/// dropped.
async fn close_handshake(
    mut sink: SplitSink<WsStream, WsMessage>,
    mut stream: SplitStream<WsStream>,
) -> CloseInfo {
    let frame = CloseFrame {
        code: CloseCode::Normal,
        reason: "".into(),
    };
    if let Err(err) = sink.send(WsMessage::Close(Some(frame))).await {
        return CloseInfo::abnormal(err.to_string());
    }

    let answered = tokio::time::timeout(CLOSE_ACK_TIMEOUT, async {
        while let Some(frame) = stream.next().await {
            match frame {
                Ok(WsMessage::Close(_)) => return true,
                Ok(_) => continue,
                Err(_) => return false,
            }
        }
        false
    })
    .await;

    match answered {
        Ok(true) => CloseInfo::normal(),
        Ok(false) => CloseInfo::abnormal("connection dropped during close handshake"),
        Err(_) => CloseInfo::abnormal("close handshake timed out"),
    }
}
