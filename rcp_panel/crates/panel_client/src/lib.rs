//! Websocket implementation of the panel's remote client.

pub mod client;
pub mod error;
pub mod registry;
pub mod ws_actor;

pub use client::{endpoint_url, WsClient};
pub use error::ClientError;
pub use registry::ParameterRegistry;
