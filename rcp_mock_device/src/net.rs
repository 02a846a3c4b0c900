use crate::protocol::{ClientCommand, ErrorCode, InboundMsg, OutboundMsg, ServerMessage};
use crossbeam_channel::{Receiver, Sender, TryRecvError};
use std::io;
use std::net::{SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, warn};
use tungstenite::protocol::frame::coding::CloseCode;
use tungstenite::protocol::{CloseFrame, Message};

pub const DEFAULT_ADDR: &str = "127.0.0.1:10000";

struct ActiveClient {
    ws: tungstenite::WebSocket<TcpStream>,
    socket_addr: SocketAddr,
}

pub struct NetworkThread {
    listen_addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    join_handle: Mutex<Option<JoinHandle<()>>>,
}

impl NetworkThread {
    pub fn spawn(in_tx: Sender<InboundMsg>, out_rx: Receiver<OutboundMsg>) -> io::Result<Self> {
        Self::spawn_with_addr(DEFAULT_ADDR, in_tx, out_rx)
    }

    /// Binds `addr` (port 0 picks a free port) and serves it on a new thread.
    pub fn spawn_with_addr(
        addr: &str,
        in_tx: Sender<InboundMsg>,
        out_rx: Receiver<OutboundMsg>,
    ) -> io::Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        let listen_addr = listener.local_addr()?;

        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_for_thread = Arc::clone(&shutdown);
        let join_handle =
            thread::spawn(move || run_server(listener, in_tx, out_rx, shutdown_for_thread));

        info!(%listen_addr, "device listening");
        Ok(Self {
            listen_addr,
            shutdown,
            join_handle: Mutex::new(Some(join_handle)),
        })
    }

    pub fn listen_addr(&self) -> SocketAddr {
        self.listen_addr
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
        if let Ok(mut h) = self.join_handle.lock() {
            if let Some(h) = h.take() {
                let _ = h.join();
            }
        }
    }
}

impl Drop for NetworkThread {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn run_server(
    listener: TcpListener,
    in_tx: Sender<InboundMsg>,
    out_rx: Receiver<OutboundMsg>,
    shutdown: Arc<AtomicBool>,
) {
    let mut active: Option<ActiveClient> = None;

    while !shutdown.load(Ordering::Relaxed) {
        // Single-client policy: a new panel replaces the previous one.
        loop {
            match listener.accept() {
                Ok((stream, socket_addr)) => {
                    let _ = stream.set_nonblocking(false);
                    let _ = stream.set_nodelay(true);
                    let _ = stream.set_read_timeout(Some(Duration::from_millis(30)));
                    let _ = stream.set_write_timeout(Some(Duration::from_millis(200)));

                    let ws = match tungstenite::accept(stream) {
                        Ok(ws) => ws,
                        Err(e) => {
                            warn!(%socket_addr, error = %e, "ws handshake failed");
                            continue;
                        }
                    };

                    if let Some(mut prev) = active.take() {
                        info!(prev = %prev.socket_addr, "replacing client");
                        let _ = prev.ws.close(None);
                        let _ = in_tx.try_send(InboundMsg::ClientDisconnected);
                    }

                    if in_tx
                        .try_send(InboundMsg::ClientConnected { socket_addr })
                        .is_err()
                    {
                        let mut ws = ws;
                        let _ = send_server_message(
                            &mut ws,
                            &ServerMessage::Error {
                                msg: "device busy".to_string(),
                                code: ErrorCode::InternalError,
                            },
                        );
                        let _ = ws.close(None);
                        continue;
                    }

                    info!(%socket_addr, "client connected");
                    active = Some(ActiveClient { ws, socket_addr });
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => {
                    warn!(error = %e, "ws accept failed");
                    break;
                }
            }
        }

        if let Some(client) = active.as_mut() {
            loop {
                match out_rx.try_recv() {
                    Ok(OutboundMsg::Send { msg }) => {
                        if send_server_message(&mut client.ws, &msg).is_err() {
                            let _ = client.ws.close(None);
                            active = None;
                            let _ = in_tx.try_send(InboundMsg::ClientDisconnected);
                            break;
                        }
                    }
                    Ok(OutboundMsg::Close { code, reason }) => {
                        debug!(code, %reason, "closing client");
                        let frame = CloseFrame {
                            code: CloseCode::from(code),
                            reason: reason.into(),
                        };
                        // the peer's reply ends the session in the read path below
                        let _ = client.ws.close(Some(frame));
                        break;
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => return,
                }
            }
        } else {
            // Nobody to deliver to; queued messages for a gone client are stale.
            while out_rx.try_recv().is_ok() {}
        }

        // At most one inbound frame per pass; read timeouts keep the loop moving.
        if let Some(client) = active.as_mut() {
            match client.ws.read() {
                Ok(msg) => {
                    if handle_inbound(&in_tx, client, msg).is_err() {
                        let _ = client.ws.close(None);
                        info!(addr = %client.socket_addr, "client left");
                        active = None;
                        let _ = in_tx.try_send(InboundMsg::ClientDisconnected);
                    }
                }
                Err(tungstenite::Error::Io(e))
                    if e.kind() == io::ErrorKind::WouldBlock
                        || e.kind() == io::ErrorKind::TimedOut => {}
                Err(tungstenite::Error::ConnectionClosed) => {
                    info!(addr = %client.socket_addr, "client closed");
                    active = None;
                    let _ = in_tx.try_send(InboundMsg::ClientDisconnected);
                }
                Err(e) => {
                    debug!(error = %e, "client dropped");
                    active = None;
                    let _ = in_tx.try_send(InboundMsg::ClientDisconnected);
                }
            }
        } else {
            thread::sleep(Duration::from_millis(25));
        }
    }

    if let Some(mut client) = active {
        let _ = client.ws.close(None);
        let _ = client.ws.flush();
    }
}

fn handle_inbound(
    in_tx: &Sender<InboundMsg>,
    client: &mut ActiveClient,
    msg: Message,
) -> Result<(), ()> {
    let text = match msg {
        Message::Text(s) => s,
        Message::Binary(_) => return Ok(()),
        Message::Ping(payload) => {
            let _ = client.ws.send(Message::Pong(payload));
            return Ok(());
        }
        Message::Pong(_) => return Ok(()),
        Message::Close(_) => return Err(()),
        Message::Frame(_) => return Ok(()),
    };

    let cmd: ClientCommand = match serde_json::from_str(&text) {
        Ok(c) => c,
        Err(e) => {
            debug!(error = %e, "unparseable command");
            let _ = send_server_message(
                &mut client.ws,
                &ServerMessage::Error {
                    msg: "invalid json".to_string(),
                    code: ErrorCode::InvalidCommand,
                },
            );
            return Ok(());
        }
    };

    if in_tx.try_send(InboundMsg::Command { cmd }).is_err() {
        let _ = send_server_message(
            &mut client.ws,
            &ServerMessage::Error {
                msg: "device busy".to_string(),
                code: ErrorCode::InternalError,
            },
        );
    }

    Ok(())
}

fn send_server_message(
    ws: &mut tungstenite::WebSocket<TcpStream>,
    msg: &ServerMessage,
) -> Result<(), ()> {
    let payload = serde_json::to_string(msg).map_err(|_| ())?;
    ws.send(Message::Text(payload.into())).map_err(|_| ())
}
