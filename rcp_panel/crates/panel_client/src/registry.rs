//! Local parameter tree built from wire messages.

use std::collections::HashMap;
use std::rc::Rc;

use panel_core::{
    ClientEvent, NumberDefinition, ParamKind, ParamMeta, Parameter, ParameterRef, Value,
};
use rcp_protocol::{datatype, ClientCommand, ParamDescriptor, ParamUpdate, ServerMessage};
use tracing::{debug, warn};

/// Every known parameter of one session, by id.
///
/// Children that arrive before their group are parked until it shows up,
/// so `ParameterAdded` is only ever reported for parameters that are
/// attached where they belong.
#[derive(Default)]
pub struct ParameterRegistry {
    params: HashMap<i32, ParameterRef>,
    orphans: HashMap<i32, Vec<ParameterRef>>,
}

impl ParameterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: i32) -> Option<&ParameterRef> {
        self.params.get(&id)
    }

    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Applies one server message, returning the notifications it causes.
    pub fn apply(&mut self, msg: ServerMessage) -> Vec<ClientEvent> {
        match msg {
            ServerMessage::ParamAdded { param } => self.add(param),
            ServerMessage::ParamUpdated { update } => {
                self.update(update);
                Vec::new()
            }
            ServerMessage::ParamRemoved { id } => self.remove(id),
            ServerMessage::Error { msg, code } => {
                warn!(?code, %msg, "device refused a command");
                Vec::new()
            }
        }
    }

    pub fn add(&mut self, desc: ParamDescriptor) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        if self.params.contains_key(&desc.id) {
            debug!(id = desc.id, "replacing parameter");
            events.extend(self.remove(desc.id));
        }

        let param = build_parameter(&desc);
        self.params.insert(desc.id, Rc::clone(&param));

        if let Some(parent_id) = desc.parent {
            match self.params.get(&parent_id) {
                Some(parent) => parent.add_child(Rc::clone(&param)),
                None => {
                    debug!(id = desc.id, parent = parent_id, "parking child until its group arrives");
                    self.orphans.entry(parent_id).or_default().push(param);
                    return events;
                }
            }
        }

        events.push(ClientEvent::ParameterAdded(Rc::clone(&param)));
        self.adopt(&param, &mut events);
        events
    }

    fn adopt(&mut self, parent: &ParameterRef, events: &mut Vec<ClientEvent>) {
        let Some(waiting) = self.orphans.remove(&parent.id().0) else {
            return;
        };
        for child in waiting {
            parent.add_child(Rc::clone(&child));
            events.push(ClientEvent::ParameterAdded(Rc::clone(&child)));
            self.adopt(&child, events);
        }
    }

    pub fn update(&mut self, update: ParamUpdate) {
        let Some(param) = self.params.get(&update.id) else {
            warn!(id = update.id, "update for unknown parameter");
            return;
        };

        if update.label.is_some() || update.description.is_some() || update.readonly.is_some() {
            param.update_meta(|meta| {
                if let Some(label) = update.label {
                    meta.label = Some(label);
                }
                if let Some(description) = update.description {
                    meta.description = Some(description);
                }
                if let Some(readonly) = update.readonly {
                    meta.readonly = readonly;
                }
            });
        }

        if let Some(raw) = update.value {
            match value_from_json(param.kind(), &raw) {
                Some(value) => param.set_value(value),
                None => debug!(id = update.id, %raw, "ignoring value of the wrong shape"),
            }
        }
    }

    /// Removes a parameter and its whole subtree.
    pub fn remove(&mut self, id: i32) -> Vec<ClientEvent> {
        let Some(param) = self.params.remove(&id) else {
            self.unpark(id);
            debug!(id, "removal of unknown parameter");
            return Vec::new();
        };
        if let Some(parent) = param.parent() {
            parent.remove_child(param.id());
        }
        self.unpark(id);
        self.forget_descendants(&param);
        vec![ClientEvent::ParameterRemoved(param)]
    }

    fn forget_descendants(&mut self, param: &ParameterRef) {
        let children: Vec<ParameterRef> = param.children().to_vec();
        for child in children {
            self.params.remove(&child.id().0);
            self.orphans.remove(&child.id().0);
            self.forget_descendants(&child);
        }
    }

    fn unpark(&mut self, id: i32) {
        for waiting in self.orphans.values_mut() {
            waiting.retain(|p| p.id().0 != id);
        }
        self.orphans.retain(|_, waiting| !waiting.is_empty());
    }

    /// Takes the dirty flag off every parameter, lowest id first.
    pub fn take_dirty(&self) -> Vec<ParameterRef> {
        let mut dirty: Vec<ParameterRef> = self
            .params
            .values()
            .filter(|p| p.take_dirty())
            .cloned()
            .collect();
        dirty.sort_by_key(|p| p.id());
        dirty
    }

    pub fn clear(&mut self) {
        self.params.clear();
        self.orphans.clear();
    }
}

pub fn kind_for(desc: &ParamDescriptor) -> ParamKind {
    let range = |def: NumberDefinition| NumberDefinition {
        minimum: desc.minimum,
        maximum: desc.maximum,
        ..def
    };
    match desc.datatype.as_str() {
        datatype::GROUP => ParamKind::Group,
        datatype::BANG => ParamKind::Trigger,
        datatype::FLOAT => ParamKind::Number(range(NumberDefinition::float())),
        datatype::INT => ParamKind::Number(range(NumberDefinition::int())),
        datatype::STRING => ParamKind::Text,
        datatype::BOOLEAN => ParamKind::Boolean,
        datatype::INVALID => ParamKind::Invalid,
        other => ParamKind::Unknown {
            datatype: other.to_string(),
        },
    }
}

fn build_parameter(desc: &ParamDescriptor) -> ParameterRef {
    let kind = kind_for(desc);
    let initial = desc.value.as_ref().and_then(|v| value_from_json(&kind, v));
    let param = Parameter::new(
        desc.id,
        kind,
        ParamMeta {
            label: desc.label.clone(),
            description: desc.description.clone(),
            readonly: desc.readonly,
        },
    );
    if let Some(value) = initial {
        param.set_value(value);
    }
    param
}

pub fn value_from_json(kind: &ParamKind, raw: &serde_json::Value) -> Option<Value> {
    match (kind, raw) {
        (_, serde_json::Value::Null) => None,
        (ParamKind::Number(_), v) => v.as_f64().map(Value::Number),
        (ParamKind::Text, serde_json::Value::String(s)) => Some(Value::Text(s.clone())),
        (ParamKind::Text, v) => Some(Value::Text(v.to_string())),
        (ParamKind::Boolean, serde_json::Value::Bool(b)) => Some(Value::Boolean(*b)),
        (ParamKind::Boolean, v) => v.as_f64().map(|n| Value::Boolean(n != 0.0)),
        _ => None,
    }
}

pub fn value_to_json(kind: &ParamKind, value: &Value) -> serde_json::Value {
    match value {
        Value::Number(n) => match kind {
            ParamKind::Number(def) if def.integer => serde_json::Value::from(*n as i64),
            _ => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
        },
        Value::Text(s) => serde_json::Value::String(s.clone()),
        Value::Boolean(b) => serde_json::Value::Bool(*b),
    }
}

/// Wire command for one dirty parameter.
pub fn update_command(param: &Parameter, value_updates: bool) -> ClientCommand {
    let value = param.value().map(|v| value_to_json(param.kind(), &v));
    let id = param.id().0;
    if value_updates {
        ClientCommand::UpdateValue {
            id,
            value: value.unwrap_or(serde_json::Value::Null),
        }
    } else {
        ClientCommand::Update {
            param: ParamUpdate {
                id,
                value,
                ..ParamUpdate::default()
            },
        }
    }
}
