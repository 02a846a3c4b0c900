use futures_util::{SinkExt, StreamExt};
use panel_core::CloseEvent;
use rcp_protocol::{ClientCommand, ServerMessage};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, trace, warn};

type Socket =
    tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>;

/// Close code reported when the peer sent a close frame without a status.
const NO_STATUS: u16 = 1005;

#[derive(Debug)]
pub enum TransportCommand {
    Send(ClientCommand),
    Close,
}

#[derive(Debug)]
pub enum TransportEvent {
    Opened,
    Message(ServerMessage),
    Closed(CloseEvent),
    Error(String),
}

/// Owns one socket for its whole life. Returns after reporting exactly one
/// `Closed` or `Error`, or when the command side goes away.
pub async fn run(
    url: String,
    mut commands: mpsc::UnboundedReceiver<TransportCommand>,
    events: mpsc::UnboundedSender<TransportEvent>,
) {
    let mut socket = match tokio_tungstenite::connect_async(url.as_str()).await {
        Ok((socket, _)) => socket,
        Err(e) => {
            warn!(%url, error = %e, "connect failed");
            let _ = events.send(TransportEvent::Error(e.to_string()));
            return;
        }
    };
    debug!(%url, "socket open");
    let _ = events.send(TransportEvent::Opened);

    let mut closing = false;
    loop {
        tokio::select! {
            cmd = commands.recv(), if !closing => {
                match cmd {
                    Some(TransportCommand::Send(cmd)) => {
                        if let Err(e) = send_json(&mut socket, &cmd).await {
                            warn!(error = %e, "send failed");
                            let _ = events.send(TransportEvent::Closed(CloseEvent::abnormal()));
                            return;
                        }
                    }
                    Some(TransportCommand::Close) => {
                        closing = true;
                        let frame = CloseFrame {
                            code: CloseCode::Normal,
                            reason: "".into(),
                        };
                        if let Err(e) = socket.close(Some(frame)).await {
                            debug!(error = %e, "close handshake failed");
                            let _ = events.send(TransportEvent::Closed(CloseEvent::abnormal()));
                            return;
                        }
                    }
                    None => {
                        let _ = socket.close(None).await;
                        return;
                    }
                }
            }
            incoming = socket.next() => {
                match incoming {
                    Some(Ok(Message::Text(text))) => {
                        match serde_json::from_str::<ServerMessage>(&text) {
                            Ok(msg) => {
                                trace!(?msg, "inbound");
                                let _ = events.send(TransportEvent::Message(msg));
                            }
                            Err(e) => warn!(error = %e, "dropping malformed frame"),
                        }
                    }
                    Some(Ok(Message::Close(frame))) => {
                        let close = match frame {
                            Some(f) => CloseEvent::clean(u16::from(f.code), f.reason.to_string()),
                            None => CloseEvent::clean(NO_STATUS, ""),
                        };
                        // flushes our reply when the peer started the handshake
                        let _ = socket.close(None).await;
                        let _ = events.send(TransportEvent::Closed(close));
                        return;
                    }
                    Some(Ok(_)) => {}
                    Some(Err(e)) => {
                        debug!(error = %e, "socket read failed");
                        let _ = events.send(TransportEvent::Closed(CloseEvent::abnormal()));
                        return;
                    }
                    None => {
                        let _ = events.send(TransportEvent::Closed(CloseEvent::abnormal()));
                        return;
                    }
                }
            }
        }
    }
}

async fn send_json(
    socket: &mut Socket,
    msg: &ClientCommand,
) -> Result<(), tokio_tungstenite::tungstenite::Error> {
    let payload = match serde_json::to_string(msg) {
        Ok(p) => p,
        Err(e) => {
            warn!(error = %e, "failed to encode command");
            return Ok(());
        }
    };
    socket.send(Message::Text(payload.into())).await
}
