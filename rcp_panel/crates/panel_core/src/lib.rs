//! Client-side mirror of a remote parameter tree.
//!
//! The crate keeps a local shadow of the parameters exposed by a remote
//! device, batches add/remove notifications into UI refreshes, drives the
//! connection lifecycle and turns each parameter into an interactive node.
//! It never touches a socket: the transport is reached through
//! [`connection::RemoteClient`].

pub mod clock;
pub mod config;
pub mod connection;
pub mod edit;
pub mod error;
pub mod mirror;
pub mod param;
pub mod scheduler;
pub mod widget;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{PanelConfig, SessionConfig};
pub use connection::{
    ClientEvent, ClientFactory, CloseEvent, ConnectionController, ConnectionState, RemoteClient,
};
pub use edit::{EditState, Flush, SubmitOutcome, TextEdit};
pub use error::{ConfigError, PanelError};
pub use mirror::{ParameterMirror, Snapshot};
pub use param::{
    NumberDefinition, ParamId, ParamKind, ParamMeta, Parameter, ParameterRef, Subscription, Value,
};
pub use scheduler::{BatchScheduler, Debounce};
pub use widget::{NodeBody, PanelView, UiNode, Widget};
