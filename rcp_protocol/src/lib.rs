use serde::{Deserialize, Serialize};

/// Datatype names carried in [`ParamDescriptor::datatype`].
pub mod datatype {
    pub const GROUP: &str = "group";
    pub const BANG: &str = "bang";
    pub const FLOAT: &str = "float";
    pub const INT: &str = "int";
    pub const STRING: &str = "string";
    pub const BOOLEAN: &str = "boolean";
    pub const INVALID: &str = "invalid";
}

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    UnknownParam,
    InvalidValue,
    Readonly,
    InvalidCommand,
    InternalError,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct ParamDescriptor {
    pub id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<i32>,
    pub datatype: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub readonly: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
}

impl ParamDescriptor {
    pub fn new(id: i32, datatype: &str) -> Self {
        Self {
            id,
            parent: None,
            datatype: datatype.to_string(),
            label: None,
            description: None,
            readonly: false,
            value: None,
            minimum: None,
            maximum: None,
        }
    }
}

/// Partial change to a parameter. Absent fields are left untouched.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
pub struct ParamUpdate {
    pub id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub readonly: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<serde_json::Value>,
}

impl ParamUpdate {
    pub fn value(id: i32, value: serde_json::Value) -> Self {
        Self {
            id,
            value: Some(value),
            ..Self::default()
        }
    }
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ServerMessage {
    ParamAdded { param: ParamDescriptor },
    ParamUpdated { update: ParamUpdate },
    ParamRemoved { id: i32 },
    Error { msg: String, code: ErrorCode },
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ClientCommand {
    /// Ask the device for its whole parameter tree.
    Init,
    Update { param: ParamUpdate },
    /// Compact value-only update; `value` is `null` for triggers.
    UpdateValue { id: i32, value: serde_json::Value },
}

impl ClientCommand {
    pub fn target_id(&self) -> Option<i32> {
        match self {
            ClientCommand::Init => None,
            ClientCommand::Update { param } => Some(param.id),
            ClientCommand::UpdateValue { id, .. } => Some(*id),
        }
    }
}
