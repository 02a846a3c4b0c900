//! A simulated remote-control device: serves a small parameter tree over a
//! websocket and answers the panel protocol.

mod device;
mod main_loop;
mod net;
mod protocol;
mod validator;

pub use crate::device::{demo, ParamStore};
pub use crate::main_loop::MainLoop;
pub use crate::net::{NetworkThread, DEFAULT_ADDR};
pub use crate::protocol::{InboundMsg, OutboundMsg, INBOUND_CAP, OUTBOUND_CAP};
pub use crate::validator::{validate_value, Rejection};
