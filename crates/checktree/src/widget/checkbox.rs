//! Checkbox widgets for tree nodes.
//!
//! A node's checkbox is anything implementing [`CheckboxWidget`]. The tree
//! uses [`CheckBox`] unless a [`CustomWidget`] is configured, in which case
//! the custom widget is probed once when the tree is built and rejected if
//! it does not hold the states it is given.

use std::fmt;
use std::sync::Arc;

use crate::error::ConfigError;
use crate::model::{CheckMode, CheckedState};

/// The contract a node checkbox must satisfy.
pub trait CheckboxWidget: Send + Sync {
    /// The displayed state.
    fn checked(&self) -> CheckedState;

    /// Displays `state`.
    fn set_checked(&mut self, state: CheckedState);

    /// Returns `true` if user input is rejected.
    fn read_only(&self) -> bool;

    /// Sets whether user input is rejected.
    fn set_read_only(&mut self, read_only: bool);

    /// Returns `true` if [`toggle`](Self::toggle) is implemented.
    fn supports_toggle(&self) -> bool {
        false
    }

    /// Toggles natively and returns the new state. Widgets without a native
    /// toggle return `None` and the tree emulates it.
    fn toggle(&mut self) -> Option<CheckedState> {
        None
    }
}

/// The default node checkbox.
///
/// Toggling follows the tree's rule: `Mixed` and `Unchecked` become
/// `Checked`, `Checked` becomes `Unchecked`.
pub struct CheckBox {
    check_state: CheckedState,
    mode: CheckMode,
    read_only: bool,
}

impl CheckBox {
    /// Creates a checkbox showing `state`.
    pub fn new(state: CheckedState, mode: CheckMode) -> Self {
        let mut checkbox = Self {
            check_state: CheckedState::Unchecked,
            mode,
            read_only: false,
        };
        checkbox.check_state = checkbox.effective(state);
        checkbox
    }

    /// The checkbox's mode.
    pub fn mode(&self) -> CheckMode {
        self.mode
    }

    // Dual-state checkboxes cannot show mixed.
    fn effective(&self, state: CheckedState) -> CheckedState {
        if self.mode.supports(state) {
            state
        } else {
            CheckedState::Unchecked
        }
    }
}

impl fmt::Debug for CheckBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CheckBox")
            .field("check_state", &self.check_state)
            .field("mode", &self.mode)
            .field("read_only", &self.read_only)
            .finish()
    }
}

impl CheckboxWidget for CheckBox {
    fn checked(&self) -> CheckedState {
        self.check_state
    }

    fn set_checked(&mut self, state: CheckedState) {
        self.check_state = self.effective(state);
    }

    fn read_only(&self) -> bool {
        self.read_only
    }

    fn set_read_only(&mut self, read_only: bool) {
        self.read_only = read_only;
    }

    fn supports_toggle(&self) -> bool {
        true
    }

    fn toggle(&mut self) -> Option<CheckedState> {
        let next = self.check_state.toggled();
        self.set_checked(next);
        Some(self.check_state)
    }
}

/// Creates checkbox widgets for new nodes.
pub type CheckboxFactory = Arc<dyn Fn(CheckedState, CheckMode) -> Box<dyn CheckboxWidget> + Send + Sync>;

/// A user-supplied checkbox widget type.
#[derive(Clone)]
pub struct CustomWidget {
    name: String,
    factory: CheckboxFactory,
}

impl fmt::Debug for CustomWidget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CustomWidget").field("name", &self.name).finish_non_exhaustive()
    }
}

impl CustomWidget {
    /// Registers a widget type under `name`.
    pub fn new<F>(name: impl Into<String>, factory: F) -> Self
    where
        F: Fn(CheckedState, CheckMode) -> Box<dyn CheckboxWidget> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            factory: Arc::new(factory),
        }
    }

    /// The registered name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Creates a widget.
    pub fn create(&self, state: CheckedState, mode: CheckMode) -> Box<dyn CheckboxWidget> {
        (self.factory)(state, mode)
    }

    /// Checks that the widget holds every state `mode` supports, holds its
    /// read-only flag, and that a native toggle reports the state it lands
    /// on.
    pub fn verify(&self, mode: CheckMode) -> Result<(), ConfigError> {
        let fail = |what: String| ConfigError::NonConformingWidget(format!("{}: {what}", self.name));

        let mut widget = self.create(CheckedState::Unchecked, mode);
        let states = [CheckedState::Checked, CheckedState::Unchecked, CheckedState::Mixed];
        for state in states.into_iter().filter(|s| mode.supports(*s)) {
            widget.set_checked(state);
            let shown = widget.checked();
            if shown != state {
                return Err(fail(format!("set {state}, read back {shown}")));
            }
        }

        for read_only in [true, false] {
            widget.set_read_only(read_only);
            if widget.read_only() != read_only {
                return Err(fail(format!("read-only flag does not hold {read_only}")));
            }
        }

        if widget.supports_toggle() {
            widget.set_checked(CheckedState::Checked);
            match widget.toggle() {
                Some(state) if state == widget.checked() => {}
                Some(state) => {
                    return Err(fail(format!(
                        "toggle reported {state} but shows {}",
                        widget.checked()
                    )));
                }
                None => return Err(fail("claims a toggle but does not implement one".into())),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_checkbox_toggle() {
        let mut checkbox = CheckBox::new(CheckedState::Unchecked, CheckMode::DualState);
        assert_eq!(checkbox.toggle(), Some(CheckedState::Checked));
        assert_eq!(checkbox.toggle(), Some(CheckedState::Unchecked));
    }

    #[test]
    fn test_checkbox_mixed_toggles_to_checked() {
        let mut checkbox = CheckBox::new(CheckedState::Mixed, CheckMode::MultiState);
        assert_eq!(checkbox.checked(), CheckedState::Mixed);
        assert_eq!(checkbox.toggle(), Some(CheckedState::Checked));
    }

    #[test]
    fn test_dual_state_checkbox_cannot_show_mixed() {
        let mut checkbox = CheckBox::new(CheckedState::Checked, CheckMode::DualState);
        checkbox.set_checked(CheckedState::Mixed);
        assert_eq!(checkbox.checked(), CheckedState::Unchecked);
    }

    #[test]
    fn test_default_checkbox_conforms() {
        let custom = CustomWidget::new("checkbox", |state, mode| {
            Box::new(CheckBox::new(state, mode)) as Box<dyn CheckboxWidget>
        });
        assert!(custom.verify(CheckMode::MultiState).is_ok());
        assert!(custom.verify(CheckMode::DualState).is_ok());
    }

    struct Switch {
        on: bool,
    }

    impl CheckboxWidget for Switch {
        fn checked(&self) -> CheckedState {
            CheckedState::from(self.on)
        }
        fn set_checked(&mut self, state: CheckedState) {
            self.on = state.is_checked();
        }
        fn read_only(&self) -> bool {
            false
        }
        fn set_read_only(&mut self, _read_only: bool) {}
    }

    #[test]
    fn test_two_state_switch_fails_multi_state_probe() {
        let custom = CustomWidget::new("switch", |state: CheckedState, _| {
            Box::new(Switch { on: state.is_checked() }) as Box<dyn CheckboxWidget>
        });
        let err = custom.verify(CheckMode::MultiState).unwrap_err();
        assert!(matches!(err, ConfigError::NonConformingWidget(ref msg) if msg.starts_with("switch")));
    }
}
