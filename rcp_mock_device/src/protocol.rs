use std::net::SocketAddr;

pub const INBOUND_CAP: usize = 256;
pub const OUTBOUND_CAP: usize = 256;

pub enum InboundMsg {
    ClientConnected { socket_addr: SocketAddr },
    ClientDisconnected,
    Command { cmd: ClientCommand },
}

pub enum OutboundMsg {
    Send { msg: ServerMessage },
    /// Starts a closing handshake with the current client.
    Close { code: u16, reason: String },
}

pub use rcp_protocol::{
    datatype, ClientCommand, ErrorCode, ParamDescriptor, ParamUpdate, ServerMessage,
};
