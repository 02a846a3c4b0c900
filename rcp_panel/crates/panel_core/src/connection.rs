//! Connection lifecycle for a single remote session.

use std::fmt;
use std::rc::Rc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::{PanelConfig, SessionConfig};
use crate::edit::Flush;
use crate::error::PanelError;
use crate::mirror::{ParameterMirror, Snapshot};
use crate::param::ParameterRef;

const SOCKET_ERROR: &str = "error on socket!";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Idle,
    Connecting,
    Connected,
    Disconnecting,
    Errored,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            ConnectionState::Idle => "idle",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
            ConnectionState::Disconnecting => "disconnecting",
            ConnectionState::Errored => "errored",
        }
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How the socket went away.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CloseEvent {
    pub was_clean: bool,
    pub code: u16,
    pub reason: String,
}

impl CloseEvent {
    pub fn clean(code: u16, reason: impl Into<String>) -> Self {
        Self {
            was_clean: true,
            code,
            reason: reason.into(),
        }
    }

    /// Connection dropped without a closing handshake (1006).
    pub fn abnormal() -> Self {
        Self {
            was_clean: false,
            code: 1006,
            reason: String::new(),
        }
    }

    /// Message shown to the operator once the socket is gone. Only an
    /// unclean close carries the code and reason.
    pub fn message(&self) -> String {
        if self.was_clean {
            "socket disconnected".to_string()
        } else {
            format!("socket disconnected(code: {}): {:?}", self.code, self.reason)
        }
    }
}

/// Notifications produced by a live client.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Connected,
    Disconnected(CloseEvent),
    ParameterAdded(ParameterRef),
    ParameterRemoved(ParameterRef),
    /// Transport failure; the string is for logs only.
    Error(String),
}

/// The remote side of a session: transport, framing and the parameter tree.
pub trait RemoteClient {
    /// Starts connecting. Success or failure is reported through events.
    fn connect(&mut self, host: &str, port: u16);

    /// Requests shutdown of the session. Must be safe to call more than once.
    fn dispose(&mut self);

    /// Sends every dirty parameter to the remote side.
    fn update(&mut self);

    /// Drains the notifications gathered since the last call, in order.
    fn poll_events(&mut self) -> Vec<ClientEvent>;
}

pub trait ClientFactory {
    fn create(&mut self, config: &SessionConfig) -> Box<dyn RemoteClient>;
}

impl<F> ClientFactory for F
where
    F: FnMut(&SessionConfig) -> Box<dyn RemoteClient>,
{
    fn create(&mut self, config: &SessionConfig) -> Box<dyn RemoteClient> {
        self(config)
    }
}

struct Session {
    client: Box<dyn RemoteClient>,
    host: String,
    port: u16,
}

/// Owns the one live session, its mirror and its timers.
pub struct ConnectionController {
    factory: Box<dyn ClientFactory>,
    clock: Rc<dyn Clock>,
    session_config: SessionConfig,
    connect_timeout: Option<Duration>,
    session: Option<Session>,
    state: ConnectionState,
    last_error: Option<String>,
    mirror: ParameterMirror,
    ack_deadline: Option<Instant>,
    view_changed: bool,
}

impl ConnectionController {
    pub fn new(config: &PanelConfig, factory: Box<dyn ClientFactory>, clock: Rc<dyn Clock>) -> Self {
        Self {
            factory,
            clock,
            session_config: config.session,
            connect_timeout: config.connect_timeout,
            session: None,
            state: ConnectionState::Idle,
            last_error: None,
            mirror: ParameterMirror::new(config.debounce),
            ack_deadline: None,
            view_changed: false,
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// `host:port` of the live session, if any.
    pub fn endpoint(&self) -> Option<(&str, u16)> {
        self.session.as_ref().map(|s| (s.host.as_str(), s.port))
    }

    /// The parameter list the renderer should show.
    pub fn parameters(&self) -> Snapshot {
        self.mirror.published()
    }

    pub fn mirror(&self) -> &ParameterMirror {
        &self.mirror
    }

    /// Label of the connect/disconnect toggle.
    pub fn toggle_label(&self) -> &'static str {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => "Disconnect",
            ConnectionState::Idle | ConnectionState::Disconnecting | ConnectionState::Errored => {
                "Connect"
            }
        }
    }

    /// Presses the connect/disconnect toggle.
    pub fn toggle(&mut self, host: &str, port: u16) -> Result<(), PanelError> {
        match self.state {
            ConnectionState::Connecting | ConnectionState::Connected => self.disconnect(),
            _ => {
                self.connect(host, port);
                Ok(())
            }
        }
    }

    /// Opens a new session, tearing down any previous one first.
    pub fn connect(&mut self, host: &str, port: u16) {
        if self.session.is_some() {
            info!(state = %self.state, "replacing live session");
            self.teardown(None, ConnectionState::Idle);
        }

        info!(host, port, "connecting");
        let mut client = self.factory.create(&self.session_config);
        client.connect(host, port);
        self.session = Some(Session {
            client,
            host: host.to_string(),
            port,
        });
        self.state = ConnectionState::Connecting;
        self.last_error = None;
        self.arm_ack_deadline();
    }

    /// Asks the client to close. The session is torn down once the client
    /// acknowledges with a disconnect.
    pub fn disconnect(&mut self) -> Result<(), PanelError> {
        match (self.state, self.session.as_mut()) {
            (ConnectionState::Connecting | ConnectionState::Connected, Some(session)) => {
                info!(host = %session.host, port = session.port, "disconnecting");
                session.client.dispose();
                self.state = ConnectionState::Disconnecting;
                self.arm_ack_deadline();
                Ok(())
            }
            (state, _) => Err(PanelError::InvalidTransition {
                op: "disconnect",
                state,
            }),
        }
    }

    /// Applies one client notification.
    pub fn handle_event(&mut self, event: ClientEvent) {
        if self.session.is_none() {
            debug!(?event, "dropping event without a live session");
            return;
        }
        let now = self.clock.now();

        match event {
            ClientEvent::Connected => match self.state {
                ConnectionState::Connecting => {
                    info!("connected");
                    self.state = ConnectionState::Connected;
                    self.last_error = None;
                    self.ack_deadline = None;
                }
                state => debug!(%state, "ignoring late connect acknowledgment"),
            },
            ClientEvent::Disconnected(close) => {
                if close.was_clean {
                    info!(code = close.code, "socket closed");
                    self.teardown(Some(close.message()), ConnectionState::Idle);
                } else {
                    warn!(code = close.code, reason = %close.reason, "socket closed uncleanly");
                    self.teardown(Some(close.message()), ConnectionState::Errored);
                }
            }
            ClientEvent::ParameterAdded(param) => self.mirror.on_added(param, now),
            ClientEvent::ParameterRemoved(param) => self.mirror.on_removed(&param, now),
            ClientEvent::Error(detail) => {
                warn!(%detail, "socket error");
                self.teardown(Some(SOCKET_ERROR.to_string()), ConnectionState::Errored);
            }
        }
    }

    /// Drains client events, enforces the acknowledgment timeout and fires
    /// due batch timers. Returns true when the visible parameter list changed.
    pub fn poll(&mut self) -> bool {
        let events = match self.session.as_mut() {
            Some(session) => session.client.poll_events(),
            None => Vec::new(),
        };
        for event in events {
            self.handle_event(event);
            if self.session.is_none() {
                // Everything after a teardown belongs to a dead session.
                break;
            }
        }

        self.check_ack_deadline();

        let now = self.clock.now();
        let published = self.mirror.poll(now);
        std::mem::take(&mut self.view_changed) || published
    }

    /// Earliest instant at which [`ConnectionController::poll`] has timer work.
    pub fn next_deadline(&self) -> Option<Instant> {
        match (self.mirror.next_deadline(), self.ack_deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    fn arm_ack_deadline(&mut self) {
        self.ack_deadline = self.connect_timeout.map(|t| self.clock.now() + t);
    }

    fn check_ack_deadline(&mut self) {
        let Some(deadline) = self.ack_deadline else {
            return;
        };
        if self.clock.now() < deadline {
            return;
        }
        let waited = self.connect_timeout.unwrap_or_default();
        match self.state {
            ConnectionState::Connecting => {
                warn!(?waited, "connect was never acknowledged");
                let msg = format!("connect timed out after {}ms", waited.as_millis());
                self.teardown(Some(msg), ConnectionState::Errored);
            }
            ConnectionState::Disconnecting => {
                warn!(?waited, "disconnect was never acknowledged, dropping session");
                self.teardown(None, ConnectionState::Idle);
            }
            _ => self.ack_deadline = None,
        }
    }

    fn teardown(&mut self, error: Option<String>, next: ConnectionState) {
        self.mirror.clear();
        self.ack_deadline = None;
        if let Some(mut session) = self.session.take() {
            session.client.dispose();
        }
        self.state = next;
        self.last_error = error;
        self.view_changed = true;
    }
}

impl Flush for ConnectionController {
    fn flush(&mut self) {
        match self.session.as_mut() {
            Some(session) => session.client.update(),
            None => debug!("flush without a live session"),
        }
    }
}
