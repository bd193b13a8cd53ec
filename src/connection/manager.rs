//! Connection manager for a single RFCOMM serial link
//!
//! One lock guards the connection state and both worker slots. Every state
//! transition happens under that lock and is reported to the listener before
//! it is released, so listeners observe transitions in a total order.

use super::connector::ConnectorHandle;
use super::listener::LinkListener;
use super::session::SessionHandle;
use crate::config::LinkConfig;
use crate::transport::{BoxedStream, RfcommPlatform};
use link_shared::{
    defaults,
    state_machine::{is_valid_transition, next_state, LinkEvent, TransitionResult},
    ConnectionState, RemoteEndpoint,
};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Worker parameters taken from the link configuration
#[derive(Debug, Clone, Copy)]
struct WorkerSettings {
    read_buffer_size: usize,
    connect_timeout: Option<Duration>,
}

/// State and worker slots, only touched under the lock
struct Slots {
    state: ConnectionState,
    connector: Option<ConnectorHandle>,
    session: Option<Arc<SessionHandle>>,
    next_worker_id: u64,
}

impl Slots {
    fn next_id(&mut self) -> u64 {
        self.next_worker_id += 1;
        self.next_worker_id
    }

    fn cancel_connector(&mut self) {
        if let Some(connector) = self.connector.take() {
            connector.cancel();
        }
    }

    fn cancel_session(&mut self) {
        if let Some(session) = self.session.take() {
            session.cancel();
        }
    }
}

/// State shared between the manager handle and its workers
pub(crate) struct Shared {
    platform: Arc<dyn RfcommPlatform>,
    listener: Arc<dyn LinkListener>,
    settings: WorkerSettings,
    slots: Mutex<Slots>,
}

impl Shared {
    pub fn platform(&self) -> &dyn RfcommPlatform {
        self.platform.as_ref()
    }

    pub fn listener(&self) -> &dyn LinkListener {
        self.listener.as_ref()
    }

    pub fn connect_timeout(&self) -> Option<Duration> {
        self.settings.connect_timeout
    }

    fn start(&self) {
        let mut slots = self.slots.lock();
        slots.cancel_connector();
        slots.cancel_session();
        self.transition(&mut slots, LinkEvent::Start);
    }

    fn connect(self: &Arc<Self>, endpoint: RemoteEndpoint) {
        self.platform.cancel_discovery();
        info!("[LINK] connect to: {}", endpoint);

        let mut slots = self.slots.lock();

        // Cancel any worker attempting to make a connection
        if slots.state == ConnectionState::Connecting {
            slots.cancel_connector();
        }
        // Cancel any worker currently running a connection
        slots.cancel_session();

        let id = slots.next_id();
        slots.connector = Some(ConnectorHandle::spawn(self.clone(), id, endpoint));
        self.transition(&mut slots, LinkEvent::Connect);
    }

    fn stop(&self) {
        info!("[LINK] stop");
        let mut slots = self.slots.lock();
        self.stop_locked(&mut slots);
    }

    fn stop_locked(&self, slots: &mut Slots) {
        slots.cancel_connector();
        slots.cancel_session();
        self.transition(slots, LinkEvent::Stop);
    }

    fn state(&self) -> ConnectionState {
        self.slots.lock().state
    }

    /// Snapshot the session if connected, without holding the lock afterwards
    fn connected_session(&self) -> Option<Arc<SessionHandle>> {
        let slots = self.slots.lock();
        if slots.state != ConnectionState::Connected {
            return None;
        }
        slots.session.clone()
    }

    /// Cancel both workers without reporting a state change
    fn shutdown(&self) {
        let mut slots = self.slots.lock();
        slots.cancel_connector();
        slots.cancel_session();
    }

    /// Promote an opened transport to a session
    ///
    /// Returns the stream back if the connector was superseded meanwhile.
    pub fn connection_success(
        self: &Arc<Self>,
        connector_id: u64,
        endpoint: &RemoteEndpoint,
        stream: BoxedStream,
    ) -> Option<BoxedStream> {
        let mut slots = self.slots.lock();

        if slots.connector.as_ref().map(|c| c.id()) != Some(connector_id) {
            return Some(stream);
        }
        debug!("[LINK] connected");

        // The connector is done; its slot is cleared before the session exists
        slots.connector = None;
        slots.cancel_session();

        let session_id = slots.next_id();
        let (session, reader) =
            SessionHandle::new(session_id, endpoint.clone(), stream, self.listener.clone());
        slots.session = Some(session.clone());

        self.listener
            .on_connection_success(&format!("{}{}", defaults::CONNECTED_PREFIX, endpoint.name));
        self.transition(&mut slots, LinkEvent::Opened);

        // Reads start only after the listener has seen the transition
        session.spawn_reader(self.clone(), reader, self.settings.read_buffer_size);
        None
    }

    /// Both open strategies failed for the given connector
    pub fn connection_failed(&self, connector_id: u64) {
        let mut slots = self.slots.lock();

        if slots.connector.as_ref().map(|c| c.id()) != Some(connector_id) {
            debug!("[LINK] Ignoring failure of superseded attempt {}", connector_id);
            return;
        }

        self.listener
            .on_connection_failed(defaults::CONNECTION_FAILED_MESSAGE);
        self.stop_locked(&mut slots);
    }

    /// The given session's read loop has ended
    pub fn connection_lost(&self, session_id: u64) {
        let mut slots = self.slots.lock();

        self.listener
            .on_connection_lost(defaults::CONNECTION_LOST_MESSAGE);

        if slots.session.as_ref().map(|s| s.id()) == Some(session_id) {
            self.stop_locked(&mut slots);
        } else {
            debug!("[LINK] Session {} ended after being replaced", session_id);
        }
    }

    fn transition(&self, slots: &mut Slots, event: LinkEvent) {
        let from = slots.state;
        let to = match next_state(from, event) {
            TransitionResult::Success(to) => to,
            TransitionResult::Invalid { from, event } => {
                warn!("[LINK] Unexpected {:?} in state {}", event, from);
                return;
            }
        };

        debug_assert!(is_valid_transition(from, to), "{} -> {}", from, to);
        debug!("[LINK] setState() {} -> {}", from, to);
        slots.state = to;
        self.listener.on_state_change(to);
    }
}

/// Manages the single serial link to a remote device
///
/// Must be used from within a Tokio runtime: `connect` spawns the worker
/// tasks.
pub struct SerialLink {
    shared: Arc<Shared>,
}

impl SerialLink {
    /// Create a link and move it into the listening state
    pub fn new(
        platform: Arc<dyn RfcommPlatform>,
        listener: Arc<dyn LinkListener>,
        config: &LinkConfig,
    ) -> Self {
        let shared = Arc::new(Shared {
            platform,
            listener,
            settings: WorkerSettings {
                read_buffer_size: config.read_buffer_size,
                connect_timeout: config.connect_timeout(),
            },
            slots: Mutex::new(Slots {
                state: ConnectionState::None,
                connector: None,
                session: None,
                next_worker_id: 0,
            }),
        });

        info!("[LINK] init using {} platform", shared.platform.name());
        let link = Self { shared };
        link.start();
        link
    }

    /// Cancel all workers and return to the listening state
    pub fn start(&self) {
        self.shared.start();
    }

    /// Start connecting to `endpoint`, superseding any attempt or session
    pub fn connect(&self, endpoint: RemoteEndpoint) {
        self.shared.connect(endpoint);
    }

    /// Write to the current session; dropped unless connected
    pub async fn write(&self, bytes: &[u8]) {
        match self.shared.connected_session() {
            Some(session) => session.write(bytes).await,
            None => debug!("[LINK] Not connected, dropping {} bytes", bytes.len()),
        }
    }

    /// Cancel all workers and move to the idle state
    pub fn stop(&self) {
        self.shared.stop();
    }

    /// Whether a session is established
    pub fn is_connected(&self) -> bool {
        self.state() == ConnectionState::Connected
    }

    /// Current connection state
    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    #[cfg(test)]
    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }
}

impl Drop for SerialLink {
    fn drop(&mut self) {
        self.shared.shutdown();
    }
}
