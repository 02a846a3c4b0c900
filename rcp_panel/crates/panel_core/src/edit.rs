use serde::Serialize;

use crate::param::Parameter;

/// Something that can push dirty parameter state to the remote side.
pub trait Flush {
    fn flush(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditState {
    /// Displayed text matches the parameter's last known value.
    Clean,
    /// The operator typed something that has not been submitted.
    Dirty,
    /// The last submission was refused and the input was thrown away.
    Reverted,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitOutcome {
    Accepted,
    Rejected,
}

/// Pending text of a value field.
#[derive(Debug, Clone)]
pub struct TextEdit {
    text: String,
    state: EditState,
}

impl TextEdit {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            state: EditState::Clean,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> EditState {
        self.state
    }

    pub fn input(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.state = EditState::Dirty;
    }

    /// A remote value arrived. It replaces whatever is being typed.
    pub fn sync_remote(&mut self, text: impl Into<String>) {
        self.text = text.into();
        self.state = EditState::Clean;
    }

    /// Hands the pending text to the parameter for validation.
    ///
    /// Accepted text is replaced by the parameter's coerced value; rejected
    /// text is replaced by the parameter's unchanged value.
    pub fn submit(&mut self, param: &Parameter) -> SubmitOutcome {
        let accepted = param.set_string_value(&self.text);
        self.settle(accepted, param.value_text())
    }

    /// Second half of [`TextEdit::submit`] for callers that must run the
    /// validation without holding a borrow of the edit.
    pub fn settle(&mut self, accepted: bool, current: String) -> SubmitOutcome {
        self.text = current;
        if accepted {
            self.state = EditState::Clean;
            SubmitOutcome::Accepted
        } else {
            self.state = EditState::Reverted;
            SubmitOutcome::Rejected
        }
    }
}
