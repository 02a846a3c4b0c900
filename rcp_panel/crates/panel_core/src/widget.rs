//! Interactive nodes built from parameters.
//!
//! A [`Widget`] is mounted for one parameter and holds its listener
//! subscriptions for as long as it lives. Rendering produces a plain
//! [`UiNode`] tree that a front end can draw or serialize.

use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

use serde::Serialize;
use tracing::debug;

use crate::edit::{EditState, Flush, SubmitOutcome, TextEdit};
use crate::error::PanelError;
use crate::param::{ParamId, ParamKind, ParameterRef, Subscription};

const NO_LABEL: &str = "no label";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UiNode {
    pub id: ParamId,
    pub label: String,
    pub description: Option<String>,
    pub enabled: bool,
    pub body: NodeBody,
    pub children: Vec<UiNode>,
}

impl UiNode {
    /// Depth-first lookup by parameter id.
    pub fn find(&self, id: ParamId) -> Option<&UiNode> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeBody {
    Group,
    TextField {
        value: String,
        editable: bool,
        edit: EditState,
    },
    Button {
        label: String,
    },
    InvalidMarker,
    Diagnostic {
        message: String,
    },
}

struct WidgetState {
    label: Option<String>,
    description: Option<String>,
    enabled: bool,
    edit: Option<TextEdit>,
}

pub struct Widget {
    param: ParameterRef,
    state: Rc<RefCell<WidgetState>>,
    children: Vec<Widget>,
    invalidate: Rc<Cell<bool>>,
    _subscriptions: Vec<Subscription>,
}

impl Widget {
    /// Builds the widget for `param` and, for groups, its whole subtree.
    /// `invalidate` is raised whenever a listener changes what would render.
    pub fn mount(param: &ParameterRef, invalidate: &Rc<Cell<bool>>) -> Self {
        let meta = param.meta();
        let state = Rc::new(RefCell::new(WidgetState {
            label: meta.label,
            description: meta.description,
            enabled: !meta.readonly,
            edit: param
                .kind()
                .is_value_bearing()
                .then(|| TextEdit::new(param.value_text())),
        }));

        let mut subscriptions = Vec::with_capacity(2);
        if param.kind().is_value_bearing() {
            let weak = Rc::downgrade(&state);
            let invalidate = Rc::clone(invalidate);
            subscriptions.push(param.on_value_change(move |p| {
                let Some(state) = weak.upgrade() else { return };
                if let Some(edit) = state.borrow_mut().edit.as_mut() {
                    edit.sync_remote(p.value_text());
                }
                invalidate.set(true);
            }));
        }
        {
            let weak = Rc::downgrade(&state);
            let invalidate = Rc::clone(invalidate);
            subscriptions.push(param.on_change(move |p| {
                let Some(state) = weak.upgrade() else { return };
                let meta = p.meta();
                let mut state = state.borrow_mut();
                state.label = meta.label;
                state.description = meta.description;
                state.enabled = !meta.readonly;
                invalidate.set(true);
            }));
        }

        let children = match param.kind() {
            ParamKind::Group => param
                .children()
                .iter()
                .map(|child| Widget::mount(child, invalidate))
                .collect(),
            _ => Vec::new(),
        };

        Self {
            param: Rc::clone(param),
            state,
            children,
            invalidate: Rc::clone(invalidate),
            _subscriptions: subscriptions,
        }
    }

    pub fn id(&self) -> ParamId {
        self.param.id()
    }

    pub fn parameter(&self) -> &ParameterRef {
        &self.param
    }

    pub fn children(&self) -> &[Widget] {
        &self.children
    }

    pub fn find(&self, id: ParamId) -> Option<&Widget> {
        if self.id() == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }

    pub fn edit_state(&self) -> Option<EditState> {
        self.state.borrow().edit.as_ref().map(TextEdit::state)
    }

    /// Text currently shown in the value field.
    pub fn display_text(&self) -> Option<String> {
        self.state
            .borrow()
            .edit
            .as_ref()
            .map(|e| e.text().to_string())
    }

    /// Records typing into the value field without submitting it.
    pub fn input(&self, text: &str) -> Result<(), PanelError> {
        let mut state = self.state.borrow_mut();
        if !state.enabled {
            return Err(PanelError::NotEditable(self.id()));
        }
        let edit = state
            .edit
            .as_mut()
            .ok_or(PanelError::NotEditable(self.id()))?;
        edit.input(text);
        self.invalidate.set(true);
        Ok(())
    }

    /// Submits the pending text. Accepted edits are flushed right away;
    /// rejected ones revert the field and stay local.
    pub fn submit(&self, flush: &mut dyn Flush) -> Result<SubmitOutcome, PanelError> {
        let pending = match self.state.borrow().edit.as_ref() {
            Some(edit) => edit.text().to_string(),
            None => return Err(PanelError::NotEditable(self.id())),
        };

        // Validation notifies our own value listener, so no borrow may be held.
        let accepted = self.param.set_string_value(&pending);

        let outcome = match self.state.borrow_mut().edit.as_mut() {
            Some(edit) => edit.settle(accepted, self.param.value_text()),
            None => return Err(PanelError::NotEditable(self.id())),
        };
        self.invalidate.set(true);

        match outcome {
            SubmitOutcome::Accepted => flush.flush(),
            SubmitOutcome::Rejected => {
                debug!(id = %self.id(), text = %pending, "value rejected, reverting")
            }
        }
        Ok(outcome)
    }

    /// Fires a trigger: marks it dirty and flushes immediately.
    pub fn activate(&self, flush: &mut dyn Flush) -> Result<(), PanelError> {
        if *self.param.kind() != ParamKind::Trigger {
            return Err(PanelError::NotTrigger(self.id()));
        }
        if !self.state.borrow().enabled {
            return Err(PanelError::NotEditable(self.id()));
        }
        self.param.set_dirty();
        flush.flush();
        Ok(())
    }

    /// Brings mounted children in line with the group's current children.
    pub fn reconcile(&mut self) {
        if *self.param.kind() == ParamKind::Group {
            let current: Vec<ParameterRef> = self.param.children().to_vec();
            reconcile_list(&mut self.children, &current, &self.invalidate);
        }
        for child in &mut self.children {
            child.reconcile();
        }
    }

    pub fn render(&self) -> UiNode {
        let state = self.state.borrow();
        let id = self.id();

        let body = match self.param.kind() {
            ParamKind::Group => NodeBody::Group,
            ParamKind::Number(_) | ParamKind::Text | ParamKind::Boolean => {
                let (value, edit) = match state.edit.as_ref() {
                    Some(e) => (e.text().to_string(), e.state()),
                    None => (self.param.value_text(), EditState::Clean),
                };
                NodeBody::TextField {
                    value,
                    editable: state.enabled,
                    edit,
                }
            }
            ParamKind::Trigger => NodeBody::Button {
                label: state.label.clone().unwrap_or_else(|| id.to_string()),
            },
            ParamKind::Invalid => NodeBody::InvalidMarker,
            ParamKind::Unknown { datatype } => NodeBody::Diagnostic {
                message: format!("not handled parameter: {id} with datatype {datatype}"),
            },
        };

        UiNode {
            id,
            label: state.label.clone().unwrap_or_else(|| NO_LABEL.to_string()),
            description: state.description.clone(),
            enabled: state.enabled,
            body,
            children: self.children.iter().map(Widget::render).collect(),
        }
    }
}

/// Keyed reconciliation: widgets whose parameter is still listed are kept
/// (and reordered), new parameters are mounted, the rest are dropped, which
/// releases their subscriptions.
fn reconcile_list(mounted: &mut Vec<Widget>, params: &[ParameterRef], invalidate: &Rc<Cell<bool>>) {
    let mut previous: HashMap<ParamId, Widget> = mounted.drain(..).map(|w| (w.id(), w)).collect();
    for param in params {
        let widget = match previous.remove(&param.id()) {
            Some(w) if Rc::ptr_eq(&w.param, param) => w,
            _ => Widget::mount(param, invalidate),
        };
        mounted.push(widget);
    }
    if !previous.is_empty() {
        debug!(count = previous.len(), "unmounting widgets");
    }
}

/// The mounted root widgets of the panel.
pub struct PanelView {
    widgets: Vec<Widget>,
    invalidate: Rc<Cell<bool>>,
}

impl PanelView {
    pub fn new() -> Self {
        Self {
            widgets: Vec::new(),
            invalidate: Rc::new(Cell::new(false)),
        }
    }

    /// Mounts/unmounts root widgets to match a published parameter list.
    pub fn sync(&mut self, roots: &[ParameterRef]) {
        reconcile_list(&mut self.widgets, roots, &self.invalidate);
        self.invalidate.set(true);
    }

    pub fn render(&mut self) -> Vec<UiNode> {
        for widget in &mut self.widgets {
            widget.reconcile();
        }
        self.widgets.iter().map(Widget::render).collect()
    }

    pub fn find(&self, id: ParamId) -> Option<&Widget> {
        self.widgets.iter().find_map(|w| w.find(id))
    }

    pub fn widget(&self, id: ParamId) -> Result<&Widget, PanelError> {
        self.find(id).ok_or(PanelError::UnknownParameter(id))
    }

    pub fn widgets(&self) -> &[Widget] {
        &self.widgets
    }

    /// Returns and clears the "something changed" flag.
    pub fn take_invalidated(&self) -> bool {
        self.invalidate.replace(false)
    }

    pub fn clear(&mut self) {
        self.widgets.clear();
        self.invalidate.set(true);
    }

    pub fn len(&self) -> usize {
        self.widgets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.widgets.is_empty()
    }
}

impl Default for PanelView {
    fn default() -> Self {
        Self::new()
    }
}
