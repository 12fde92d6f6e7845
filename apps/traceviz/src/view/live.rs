use traceviz_session::{Phase, Session};

use super::draw::{render_banner, render_header, render_outcome, render_row, render_status, UiOpts};
use super::model::HopRow;

/// Turns successive snapshots of the session into appended output lines.
/// Only what changed since the last snapshot is emitted.
pub struct LivePrinter {
    opts: UiOpts,
    width: u16,
    session_id: u64,
    phase: Phase,
    rows: usize,
    done: bool,
}

impl LivePrinter {
    pub fn new(opts: UiOpts, width: u16) -> Self {
        Self {
            opts,
            width,
            session_id: 0,
            phase: Phase::Idle,
            rows: 0,
            done: false,
        }
    }

    pub fn update(&mut self, session: &Session) -> Vec<String> {
        let mut lines = Vec::new();

        if session.id() != self.session_id {
            self.session_id = session.id();
            self.phase = Phase::Idle;
            self.rows = 0;
            self.done = false;
            lines.push(render_banner(session.target(), self.width));
        } else if self.done {
            return lines;
        }

        if session.phase() != self.phase {
            self.phase = session.phase();
            if !self.phase.status_text().is_empty() {
                lines.push(render_status(self.phase, &self.opts));
            }
        }

        let records = session.records();
        if records.len() > self.rows && session.error().is_none() {
            if self.rows == 0 {
                lines.push(render_header(&self.opts));
            }
            for (index, hop) in records.iter().enumerate().skip(self.rows) {
                lines.push(render_row(&HopRow::new(index + 1, hop), &self.opts));
            }
            self.rows = records.len();
        }

        if self.phase.is_finished() {
            lines.extend(render_outcome(session, &self.opts));
            self.done = true;
        }

        lines
    }

    /// Print whatever changed.
    pub fn print(&mut self, session: &Session) {
        for line in self.update(session) {
            println!("{line}");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use traceviz_model::VisualizationPreference;
    use traceviz_session::{
        ChannelAdapter, ChannelError, ChannelEvent, ChannelId, CloseInfo, Endpoints, ReadyState,
        SessionController,
    };

    #[derive(Default)]
    struct NullChannel {
        opened: u64,
    }

    impl ChannelAdapter for NullChannel {
        fn open(&mut self, _url: &str) -> Result<ChannelId, ChannelError> {
            self.opened += 1;
            Ok(ChannelId(self.opened))
        }

        fn send(&mut self, _channel: ChannelId, _text: String) -> Result<(), ChannelError> {
            Ok(())
        }

        fn close(&mut self, _channel: ChannelId) {}
    }

    fn state(channel: u64, state: ReadyState) -> ChannelEvent {
        ChannelEvent::State {
            channel: ChannelId(channel),
            state,
        }
    }

    fn hop(channel: u64, ip: &str) -> ChannelEvent {
        ChannelEvent::Message {
            channel: ChannelId(channel),
            text: format!(r#"{{"ip": "{ip}"}}"#),
        }
    }

    #[test]
    fn prints_only_what_changed() {
        let mut controller = SessionController::new(NullChannel::default(), Endpoints::default());
        let mut printer = LivePrinter::new(UiOpts { plain: true }, 60);

        controller
            .submit("example.com", VisualizationPreference::Map)
            .unwrap();
        let first = printer.update(controller.session());
        assert!(first[0].contains("target: example.com"));
        assert_eq!(first[1], "Connecting...");

        controller.handle_event(state(1, ReadyState::Open));
        assert_eq!(printer.update(controller.session()), vec!["Running Traceroute..."]);

        controller.handle_event(hop(1, "10.0.0.1"));
        let lines = printer.update(controller.session());
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with('#'));
        assert!(lines[1].starts_with("1 ") && lines[1].contains("10.0.0.1"));

        controller.handle_event(hop(1, "10.0.0.2"));
        let lines = printer.update(controller.session());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with("2 "));

        controller.handle_event(state(1, ReadyState::Closed(CloseInfo::normal())));
        let lines = printer.update(controller.session());
        assert_eq!(lines[0], "Traceroute Finished");
        assert_eq!(lines[1], "Map Visualization: http://127.0.0.1:8000/getmap/");
        assert_eq!(lines.len(), 2);

        assert!(printer.update(controller.session()).is_empty());
    }

    #[test]
    fn error_outcome_replaces_targets() {
        let mut controller = SessionController::new(NullChannel::default(), Endpoints::default());
        let mut printer = LivePrinter::new(UiOpts { plain: true }, 60);

        controller
            .submit("nope.invalid", VisualizationPreference::Both)
            .unwrap();
        controller.handle_event(state(1, ReadyState::Open));
        controller.handle_event(ChannelEvent::Message {
            channel: ChannelId(1),
            text: r#"{"status": "error", "message": "unreachable"}"#.to_string(),
        });
        controller.handle_event(state(1, ReadyState::Closed(CloseInfo::normal())));

        let lines = printer.update(controller.session());
        assert_eq!(lines.last().map(String::as_str), Some("error: unreachable"));
        assert!(!lines.iter().any(|line| line.contains("Visualization:")));
    }

    #[test]
    fn new_session_starts_a_new_block() {
        let mut controller = SessionController::new(NullChannel::default(), Endpoints::default());
        let mut printer = LivePrinter::new(UiOpts { plain: true }, 60);

        controller
            .submit("a.example.com", VisualizationPreference::Both)
            .unwrap();
        controller.handle_event(state(1, ReadyState::Open));
        controller.handle_event(hop(1, "10.0.0.1"));
        printer.update(controller.session());

        controller
            .submit("b.example.com", VisualizationPreference::Both)
            .unwrap();
        let lines = printer.update(controller.session());
        assert_eq!(lines.len(), 1);
        assert!(lines[0].contains("target: b.example.com"));
    }
}
