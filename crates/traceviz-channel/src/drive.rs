use tokio::sync::mpsc;
use tracing::debug;

use traceviz_session::{ChannelAdapter, ChannelEvent, Session, SessionController};

/// Feed channel events into `controller` until no channel is live or
/// draining, calling `on_update` after every event.
///
/// Returns early if the event queue closes, which only happens when every
/// adapter holding its sender has been dropped.
pub async fn run_to_completion<A, F>(
    controller: &mut SessionController<A>,
    events: &mut mpsc::UnboundedReceiver<ChannelEvent>,
    mut on_update: F,
) where
    A: ChannelAdapter,
    F: FnMut(&Session),
{
    while !controller.is_settled() {
        let Some(event) = events.recv().await else {
            debug!("channel event queue closed");
            break;
        };
        controller.handle_event(event);
        on_update(controller.session());
    }
}
