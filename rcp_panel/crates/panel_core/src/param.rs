//! Parameter tree nodes as seen by the panel.
//!
//! A [`Parameter`] is shared as an [`Rc`]: a group owns its children, while
//! each child only keeps a [`Weak`] link back to its group. Listeners are
//! registered per stream and live as long as the returned [`Subscription`].

use std::cell::{Cell, Ref, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde::Serialize;

pub type ParameterRef = Rc<Parameter>;

/// Stable identifier of a parameter, unique within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ParamId(pub i32);

impl fmt::Display for ParamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<i32> for ParamId {
    fn from(v: i32) -> Self {
        Self(v)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumberDefinition {
    pub integer: bool,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

impl NumberDefinition {
    pub fn float() -> Self {
        Self::default()
    }

    pub fn int() -> Self {
        Self {
            integer: true,
            ..Self::default()
        }
    }

    pub fn with_range(mut self, minimum: f64, maximum: f64) -> Self {
        self.minimum = Some(minimum);
        self.maximum = Some(maximum);
        self
    }

    fn contains(&self, v: f64) -> bool {
        self.minimum.map_or(true, |min| v >= min) && self.maximum.map_or(true, |max| v <= max)
    }
}

/// Runtime kind of a parameter. Rendering dispatches on this exhaustively.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamKind {
    Group,
    Number(NumberDefinition),
    Text,
    Boolean,
    Trigger,
    Invalid,
    Unknown { datatype: String },
}

impl ParamKind {
    pub fn is_value_bearing(&self) -> bool {
        matches!(self, ParamKind::Number(_) | ParamKind::Text | ParamKind::Boolean)
    }

    pub fn datatype(&self) -> &str {
        match self {
            ParamKind::Group => "group",
            ParamKind::Number(def) if def.integer => "int",
            ParamKind::Number(_) => "float",
            ParamKind::Text => "string",
            ParamKind::Boolean => "boolean",
            ParamKind::Trigger => "bang",
            ParamKind::Invalid => "invalid",
            ParamKind::Unknown { datatype } => datatype,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Number(f64),
    Text(String),
    Boolean(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => write!(f, "{n}"),
            Value::Text(s) => f.write_str(s),
            Value::Boolean(b) => write!(f, "{b}"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParamMeta {
    pub label: Option<String>,
    pub description: Option<String>,
    pub readonly: bool,
}

type Callback = Rc<dyn Fn(&Parameter)>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Stream {
    Change,
    Value,
}

#[derive(Default)]
struct Listeners {
    next_id: Cell<u64>,
    entries: RefCell<Vec<(u64, Callback)>>,
}

impl Listeners {
    fn add(&self, cb: Callback) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        self.entries.borrow_mut().push((id, cb));
        id
    }

    fn remove(&self, id: u64) {
        self.entries.borrow_mut().retain(|(entry, _)| *entry != id);
    }

    fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    fn notify(&self, param: &Parameter) {
        // Snapshot first: a callback may subscribe or unsubscribe.
        let callbacks: Vec<Callback> = self
            .entries
            .borrow()
            .iter()
            .map(|(_, cb)| Rc::clone(cb))
            .collect();
        for cb in callbacks {
            cb(param);
        }
    }
}

/// Keeps a listener registered. Dropping it unregisters the listener.
#[must_use = "the listener is removed as soon as the subscription is dropped"]
pub struct Subscription {
    param: Weak<Parameter>,
    stream: Stream,
    id: u64,
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("stream", &self.stream)
            .field("id", &self.id)
            .finish()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        if let Some(param) = self.param.upgrade() {
            param.listeners(self.stream).remove(self.id);
        }
    }
}

pub struct Parameter {
    id: ParamId,
    kind: ParamKind,
    meta: RefCell<ParamMeta>,
    value: RefCell<Option<Value>>,
    dirty: Cell<bool>,
    parent: RefCell<Weak<Parameter>>,
    children: RefCell<Vec<ParameterRef>>,
    change_listeners: Listeners,
    value_listeners: Listeners,
}

impl fmt::Debug for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Parameter")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("meta", &*self.meta.borrow())
            .field("value", &*self.value.borrow())
            .field("children", &self.children.borrow().len())
            .finish()
    }
}

impl Parameter {
    pub fn new(id: impl Into<ParamId>, kind: ParamKind, meta: ParamMeta) -> ParameterRef {
        Rc::new(Self {
            id: id.into(),
            kind,
            meta: RefCell::new(meta),
            value: RefCell::new(None),
            dirty: Cell::new(false),
            parent: RefCell::new(Weak::new()),
            children: RefCell::new(Vec::new()),
            change_listeners: Listeners::default(),
            value_listeners: Listeners::default(),
        })
    }

    /// Convenience constructor with just a label.
    pub fn labeled(id: impl Into<ParamId>, kind: ParamKind, label: &str) -> ParameterRef {
        Self::new(
            id,
            kind,
            ParamMeta {
                label: Some(label.to_string()),
                ..ParamMeta::default()
            },
        )
    }

    pub fn id(&self) -> ParamId {
        self.id
    }

    pub fn kind(&self) -> &ParamKind {
        &self.kind
    }

    pub fn meta(&self) -> ParamMeta {
        self.meta.borrow().clone()
    }

    pub fn label(&self) -> Option<String> {
        self.meta.borrow().label.clone()
    }

    pub fn description(&self) -> Option<String> {
        self.meta.borrow().description.clone()
    }

    pub fn readonly(&self) -> bool {
        self.meta.borrow().readonly
    }

    pub fn value(&self) -> Option<Value> {
        self.value.borrow().clone()
    }

    /// Current value as shown in a text field; empty when unset.
    pub fn value_text(&self) -> String {
        self.value
            .borrow()
            .as_ref()
            .map(ToString::to_string)
            .unwrap_or_default()
    }

    pub fn parent(&self) -> Option<ParameterRef> {
        self.parent.borrow().upgrade()
    }

    /// True when the parameter sits at the top of the tree.
    pub fn is_root(&self) -> bool {
        self.parent().is_none()
    }

    pub fn children(&self) -> Ref<'_, [ParameterRef]> {
        Ref::map(self.children.borrow(), |c| c.as_slice())
    }

    pub fn add_child(self: &Rc<Self>, child: ParameterRef) {
        *child.parent.borrow_mut() = Rc::downgrade(self);
        self.children.borrow_mut().push(child);
        self.change_listeners.notify(self);
    }

    pub fn remove_child(&self, id: ParamId) -> Option<ParameterRef> {
        let removed = {
            let mut children = self.children.borrow_mut();
            let pos = children.iter().position(|c| c.id == id)?;
            children.remove(pos)
        };
        *removed.parent.borrow_mut() = Weak::new();
        self.change_listeners.notify(self);
        Some(removed)
    }

    /// Validates and coerces `text` into the parameter's value.
    ///
    /// On acceptance the value is stored, the parameter is marked dirty and
    /// value listeners fire. Rejection leaves everything untouched.
    pub fn set_string_value(&self, text: &str) -> bool {
        if self.readonly() {
            return false;
        }
        let Some(value) = coerce(&self.kind, text) else {
            return false;
        };
        *self.value.borrow_mut() = Some(value);
        self.dirty.set(true);
        self.value_listeners.notify(self);
        true
    }

    /// Stores a value that came from the remote side.
    pub fn set_value(&self, value: Value) {
        *self.value.borrow_mut() = Some(value);
        self.value_listeners.notify(self);
    }

    pub fn update_meta(&self, f: impl FnOnce(&mut ParamMeta)) {
        f(&mut self.meta.borrow_mut());
        self.change_listeners.notify(self);
    }

    pub fn set_dirty(&self) {
        self.dirty.set(true);
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty.get()
    }

    /// Clears the dirty flag, returning whether it was set.
    pub fn take_dirty(&self) -> bool {
        self.dirty.replace(false)
    }

    pub fn on_change(self: &Rc<Self>, f: impl Fn(&Parameter) + 'static) -> Subscription {
        self.subscribe(Stream::Change, Rc::new(f))
    }

    /// Value listeners are only meaningful for value-bearing kinds.
    pub fn on_value_change(self: &Rc<Self>, f: impl Fn(&Parameter) + 'static) -> Subscription {
        self.subscribe(Stream::Value, Rc::new(f))
    }

    pub fn listener_count(&self) -> usize {
        self.change_listeners.len() + self.value_listeners.len()
    }

    fn subscribe(self: &Rc<Self>, stream: Stream, cb: Callback) -> Subscription {
        let id = self.listeners(stream).add(cb);
        Subscription {
            param: Rc::downgrade(self),
            stream,
            id,
        }
    }

    fn listeners(&self, stream: Stream) -> &Listeners {
        match stream {
            Stream::Change => &self.change_listeners,
            Stream::Value => &self.value_listeners,
        }
    }
}

fn coerce(kind: &ParamKind, text: &str) -> Option<Value> {
    match kind {
        ParamKind::Number(def) => {
            let t = text.trim();
            let n = if def.integer {
                t.parse::<i64>().ok()? as f64
            } else {
                t.parse::<f64>().ok()?
            };
            (n.is_finite() && def.contains(n)).then_some(Value::Number(n))
        }
        ParamKind::Text => Some(Value::Text(text.to_string())),
        ParamKind::Boolean => match text.trim().to_ascii_lowercase().as_str() {
            "true" | "1" | "on" => Some(Value::Boolean(true)),
            "false" | "0" | "off" => Some(Value::Boolean(false)),
            _ => None,
        },
        ParamKind::Group | ParamKind::Trigger | ParamKind::Invalid | ParamKind::Unknown { .. } => {
            None
        }
    }
}
