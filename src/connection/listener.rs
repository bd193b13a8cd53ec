//! Listener contract for link notifications

use link_shared::{ConnectionState, LinkError};
use tokio::sync::mpsc;

/// Receives every notification the link produces
///
/// State-change, success, failure and loss callbacks run while the link's
/// state lock is held. Implementations must return quickly and must not call
/// back into the link from inside a callback.
pub trait LinkListener: Send + Sync + 'static {
    /// Connection state changed (also reported when the state is unchanged)
    fn on_state_change(&self, state: ConnectionState);

    /// A transport was opened and a session started
    fn on_connection_success(&self, message: &str);

    /// Both open strategies failed
    fn on_connection_failed(&self, message: &str);

    /// An established session ended
    ///
    /// Also reported for a session that was replaced by `connect`, while
    /// the new attempt is still connecting. Only the current session's loss
    /// is followed by a state change to NONE.
    fn on_connection_lost(&self, message: &str);

    /// Text received from the remote device, in read order
    fn on_data(&self, data: &str);

    /// Any error raised by a worker
    fn on_error(&self, error: LinkError);
}

/// Events emitted by a [`ChannelListener`]
#[derive(Debug)]
pub enum ConnectionEvent {
    /// Connection state changed
    StateChanged(ConnectionState),
    /// Session started
    Connected { message: String },
    /// Connection attempt failed
    ConnectionFailed { message: String },
    /// Session ended (possibly one already replaced by a newer attempt)
    ConnectionLost { message: String },
    /// Received text
    Data(String),
    /// Worker error
    Error(LinkError),
}

/// Listener that forwards notifications into an ordered channel
pub struct ChannelListener {
    event_tx: mpsc::UnboundedSender<ConnectionEvent>,
}

impl ChannelListener {
    /// Create a listener and the receiver for its events
    pub fn new() -> (Self, mpsc::UnboundedReceiver<ConnectionEvent>) {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        (Self { event_tx }, event_rx)
    }

    fn emit(&self, event: ConnectionEvent) {
        // Receiver gone means nobody is interested any more
        let _ = self.event_tx.send(event);
    }
}

impl LinkListener for ChannelListener {
    fn on_state_change(&self, state: ConnectionState) {
        self.emit(ConnectionEvent::StateChanged(state));
    }

    fn on_connection_success(&self, message: &str) {
        self.emit(ConnectionEvent::Connected {
            message: message.to_string(),
        });
    }

    fn on_connection_failed(&self, message: &str) {
        self.emit(ConnectionEvent::ConnectionFailed {
            message: message.to_string(),
        });
    }

    fn on_connection_lost(&self, message: &str) {
        self.emit(ConnectionEvent::ConnectionLost {
            message: message.to_string(),
        });
    }

    fn on_data(&self, data: &str) {
        self.emit(ConnectionEvent::Data(data.to_string()));
    }

    fn on_error(&self, error: LinkError) {
        self.emit(ConnectionEvent::Error(error));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_events_preserve_order() {
        let (listener, mut rx) = ChannelListener::new();

        listener.on_state_change(ConnectionState::Connecting);
        listener.on_connection_success("Connected to HC-05");
        listener.on_state_change(ConnectionState::Connected);
        listener.on_data("ping");

        assert!(matches!(
            rx.try_recv(),
            Ok(ConnectionEvent::StateChanged(ConnectionState::Connecting))
        ));
        assert!(matches!(rx.try_recv(), Ok(ConnectionEvent::Connected { message }) if message == "Connected to HC-05"));
        assert!(matches!(
            rx.try_recv(),
            Ok(ConnectionEvent::StateChanged(ConnectionState::Connected))
        ));
        assert!(matches!(rx.try_recv(), Ok(ConnectionEvent::Data(d)) if d == "ping"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (listener, rx) = ChannelListener::new();
        drop(rx);
        listener.on_error(LinkError::Close {
            source: io::ErrorKind::NotConnected.into(),
        });
    }
}
