//! Checked state for tree items.
//!
//! A model runs in one of two modes, fixed at construction:
//! - [`CheckMode::MultiState`]: `Unchecked`, `Checked` and `Mixed`
//! - [`CheckMode::DualState`]: `Unchecked` and `Checked` only
//!
//! A leaf's state is authoritative. A branch's state is derived from its
//! children by a [`CheckedAggregate`] policy.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Result, TreeError};

/// Check state of an item's checkbox.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckedState {
    /// Item is unchecked.
    #[default]
    Unchecked,
    /// Item is checked.
    Checked,
    /// Some but not all descendants are checked.
    Mixed,
}

impl CheckedState {
    /// Returns `true` for `Checked` only.
    pub fn is_checked(&self) -> bool {
        matches!(self, CheckedState::Checked)
    }

    /// Returns `true` for `Mixed`.
    pub fn is_mixed(&self) -> bool {
        matches!(self, CheckedState::Mixed)
    }

    /// The state a toggle lands on.
    ///
    /// `Mixed` becomes `Checked`, `Checked` becomes `Unchecked`,
    /// `Unchecked` becomes `Checked`.
    pub fn toggled(&self) -> CheckedState {
        match self {
            CheckedState::Mixed | CheckedState::Unchecked => CheckedState::Checked,
            CheckedState::Checked => CheckedState::Unchecked,
        }
    }
}

impl From<bool> for CheckedState {
    fn from(checked: bool) -> Self {
        if checked {
            CheckedState::Checked
        } else {
            CheckedState::Unchecked
        }
    }
}

impl fmt::Display for CheckedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckedState::Unchecked => write!(f, "unchecked"),
            CheckedState::Checked => write!(f, "checked"),
            CheckedState::Mixed => write!(f, "mixed"),
        }
    }
}

/// Which checked states a model supports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CheckMode {
    /// `Unchecked` and `Checked` only.
    DualState,
    /// `Unchecked`, `Checked` and `Mixed`.
    #[default]
    MultiState,
}

impl CheckMode {
    /// Mode for a `multi_state` flag.
    pub fn from_multi_state(multi_state: bool) -> Self {
        if multi_state {
            CheckMode::MultiState
        } else {
            CheckMode::DualState
        }
    }

    /// Returns `true` in multi-state mode.
    pub fn is_multi_state(&self) -> bool {
        matches!(self, CheckMode::MultiState)
    }

    /// Returns `true` if `state` is valid in this mode.
    pub fn supports(&self, state: CheckedState) -> bool {
        self.is_multi_state() || !state.is_mixed()
    }

    /// Validates `state` for this mode.
    pub fn validate(&self, state: CheckedState) -> Result<CheckedState> {
        if self.supports(state) {
            Ok(state)
        } else {
            Err(TreeError::InvalidCheckState { state, mode: *self })
        }
    }
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckMode::DualState => write!(f, "dual-state"),
            CheckMode::MultiState => write!(f, "multi-state"),
        }
    }
}

/// Derives a branch's checked state from the states of its children.
///
/// Returns `None` when the children carry no checkbox at all, in which case
/// the branch keeps its current state.
pub trait CheckedAggregate: Send + Sync {
    /// Aggregate `children` under `mode`.
    fn aggregate(&self, children: &[CheckedState], mode: CheckMode) -> Option<CheckedState>;
}

/// All checked gives checked, all unchecked gives unchecked, anything else
/// is mixed (or unchecked in dual-state mode).
#[derive(Debug, Clone, Copy, Default)]
pub struct UnanimousAggregate;

impl CheckedAggregate for UnanimousAggregate {
    fn aggregate(&self, children: &[CheckedState], mode: CheckMode) -> Option<CheckedState> {
        if children.is_empty() {
            return None;
        }
        if children.iter().all(CheckedState::is_checked) {
            Some(CheckedState::Checked)
        } else if children.iter().all(|s| *s == CheckedState::Unchecked) {
            Some(CheckedState::Unchecked)
        } else if mode.is_multi_state() {
            Some(CheckedState::Mixed)
        } else {
            Some(CheckedState::Unchecked)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_dual_state_alternates() {
        let mut state = CheckedState::Unchecked;
        let mut seen = Vec::new();
        for _ in 0..4 {
            state = state.toggled();
            seen.push(state);
        }
        assert_eq!(
            seen,
            vec![
                CheckedState::Checked,
                CheckedState::Unchecked,
                CheckedState::Checked,
                CheckedState::Unchecked
            ]
        );
    }

    #[test]
    fn test_toggle_from_mixed_lands_on_checked() {
        assert_eq!(CheckedState::Mixed.toggled(), CheckedState::Checked);
    }

    #[test]
    fn test_mode_validation() {
        assert!(CheckMode::MultiState.validate(CheckedState::Mixed).is_ok());
        assert_eq!(
            CheckMode::DualState.validate(CheckedState::Mixed),
            Err(TreeError::InvalidCheckState {
                state: CheckedState::Mixed,
                mode: CheckMode::DualState
            })
        );
        assert_eq!(
            CheckMode::DualState.validate(CheckedState::Checked),
            Ok(CheckedState::Checked)
        );
    }

    #[test]
    fn test_unanimous_aggregate() {
        use CheckedState::*;
        let policy = UnanimousAggregate;
        let multi = CheckMode::MultiState;

        assert_eq!(policy.aggregate(&[], multi), None);
        assert_eq!(policy.aggregate(&[Checked, Checked], multi), Some(Checked));
        assert_eq!(policy.aggregate(&[Unchecked, Unchecked], multi), Some(Unchecked));
        assert_eq!(policy.aggregate(&[Checked, Unchecked], multi), Some(Mixed));
        assert_eq!(policy.aggregate(&[Mixed, Mixed], multi), Some(Mixed));
        assert_eq!(
            policy.aggregate(&[Checked, Unchecked], CheckMode::DualState),
            Some(Unchecked)
        );
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&CheckedState::Mixed).unwrap();
        assert_eq!(json, "\"mixed\"");
    }
}
