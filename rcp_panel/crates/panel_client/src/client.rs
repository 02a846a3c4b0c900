use panel_core::{ClientEvent, RemoteClient, SessionConfig};
use rcp_protocol::ClientCommand;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::ClientError;
use crate::registry::{update_command, ParameterRegistry};
use crate::ws_actor::{self, TransportCommand, TransportEvent};

/// Builds the `ws://host:port` address of a device.
pub fn endpoint_url(host: &str, port: u16) -> Result<Url, ClientError> {
    let url = Url::parse(&format!("ws://{host}:{port}")).map_err(|source| {
        ClientError::InvalidEndpoint {
            host: host.to_string(),
            port,
            source,
        }
    })?;
    if url.host_str().map_or(true, str::is_empty) {
        return Err(ClientError::NotWebSocket(url.to_string()));
    }
    Ok(url)
}

struct Link {
    commands: mpsc::UnboundedSender<TransportCommand>,
    events: mpsc::UnboundedReceiver<TransportEvent>,
}

/// [`RemoteClient`] speaking JSON over a websocket.
///
/// The socket lives in a task on `runtime`; everything else, including the
/// parameter tree, stays on the thread that owns the client.
pub struct WsClient {
    config: SessionConfig,
    runtime: Handle,
    link: Option<Link>,
    registry: ParameterRegistry,
    local: Vec<ClientEvent>,
    disposed: bool,
}

impl WsClient {
    pub fn new(config: SessionConfig, runtime: Handle) -> Self {
        Self {
            config,
            runtime,
            link: None,
            registry: ParameterRegistry::new(),
            local: Vec::new(),
            disposed: false,
        }
    }

    pub fn registry(&self) -> &ParameterRegistry {
        &self.registry
    }

    fn send(&mut self, cmd: ClientCommand) {
        let Some(link) = self.link.as_ref() else {
            debug!(?cmd, "dropping command without a socket");
            return;
        };
        if self.config.verbose_logging {
            info!(?cmd, "outbound");
        } else {
            trace!(?cmd, "outbound");
        }
        if link.commands.send(TransportCommand::Send(cmd)).is_err() {
            debug!("socket task already gone");
        }
    }

    fn translate(&mut self, event: TransportEvent, out: &mut Vec<ClientEvent>) {
        match event {
            TransportEvent::Opened => {
                self.send(ClientCommand::Init);
                out.push(ClientEvent::Connected);
            }
            TransportEvent::Message(msg) => {
                if self.config.verbose_logging {
                    info!(?msg, "inbound");
                }
                out.extend(self.registry.apply(msg));
            }
            TransportEvent::Closed(close) => {
                self.registry.clear();
                out.push(ClientEvent::Disconnected(close));
            }
            TransportEvent::Error(detail) => {
                self.registry.clear();
                out.push(ClientEvent::Error(detail));
            }
        }
    }
}

impl RemoteClient for WsClient {
    fn connect(&mut self, host: &str, port: u16) {
        if self.link.is_some() {
            warn!(host, port, "client is already connected");
            return;
        }
        let url = match endpoint_url(host, port) {
            Ok(url) => url,
            Err(e) => {
                warn!(error = %e, "cannot connect");
                self.local.push(ClientEvent::Error(e.to_string()));
                return;
            }
        };

        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (ev_tx, ev_rx) = mpsc::unbounded_channel();
        self.runtime
            .spawn(ws_actor::run(url.to_string(), cmd_rx, ev_tx));
        self.link = Some(Link {
            commands: cmd_tx,
            events: ev_rx,
        });
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.disposed = true;
        if let Some(link) = self.link.as_ref() {
            let _ = link.commands.send(TransportCommand::Close);
        }
    }

    fn update(&mut self) {
        for param in self.registry.take_dirty() {
            let cmd = update_command(&param, self.config.value_updates);
            self.send(cmd);
        }
    }

    fn poll_events(&mut self) -> Vec<ClientEvent> {
        let mut out = std::mem::take(&mut self.local);
        loop {
            let next = match self.link.as_mut() {
                Some(link) => link.events.try_recv(),
                None => break,
            };
            match next {
                Ok(event) => self.translate(event, &mut out),
                Err(_) => break,
            }
        }
        out
    }
}
