use thiserror::Error;

use crate::connection::ConnectionState;
use crate::param::ParamId;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PanelError {
    #[error("cannot {op} while {state}")]
    InvalidTransition {
        op: &'static str,
        state: ConnectionState,
    },
    #[error("no widget for parameter {0}")]
    UnknownParameter(ParamId),
    #[error("parameter {0} has no editable value")]
    NotEditable(ParamId),
    #[error("parameter {0} is not a trigger")]
    NotTrigger(ParamId),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("{key}: expected a number, got {value:?}")]
    InvalidNumber { key: &'static str, value: String },
    #[error("{key}: expected a boolean, got {value:?}")]
    InvalidBool { key: &'static str, value: String },
}
