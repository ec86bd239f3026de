//! Model configuration.

use std::fmt;
use std::sync::Arc;

use super::checked::{CheckMode, CheckedAggregate, CheckedState, UnanimousAggregate};
use super::store::Query;

/// Configuration shared by [`StoreModel`](super::StoreModel) and
/// [`ForestStoreModel`](super::ForestStoreModel).
///
/// # Example
///
/// ```ignore
/// let config = ModelConfig::new()
///     .with_checked_attr("selected")
///     .with_label_attr("name")
///     .with_multi_state(false);
/// ```
#[derive(Clone)]
pub struct ModelConfig {
    /// Attribute holding an item's checked state.
    pub checked_attr: String,
    /// Attribute holding an item's label. Falls back to the store's label
    /// attribute, then to the item identity.
    pub label_attr: Option<String>,
    /// Attributes listing an item's children.
    pub children_attrs: Vec<String>,
    /// Tri-state (`true`) or dual-state (`false`) checkboxes.
    pub multi_state: bool,
    /// Give every item a checkbox, even those without a checked attribute.
    pub checkbox_all: bool,
    /// State reported for items without a checked attribute, and the
    /// virtual root's initial state.
    pub checked_state: CheckedState,
    /// Root query. For a forest model this selects the top-level items;
    /// for a single-root model it must match exactly one item.
    pub query: Query,
    /// Identity of the virtual root.
    pub root_id: String,
    /// Label of the virtual root.
    pub root_label: String,
    /// Policy deriving a branch's state from its children.
    pub aggregate: Arc<dyn CheckedAggregate>,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            checked_attr: "checked".to_string(),
            label_attr: None,
            children_attrs: vec!["children".to_string()],
            multi_state: true,
            checkbox_all: true,
            checked_state: CheckedState::Unchecked,
            query: Query::top_level(),
            root_id: "$root$".to_string(),
            root_label: "ROOT".to_string(),
            aggregate: Arc::new(UnanimousAggregate),
        }
    }
}

impl fmt::Debug for ModelConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConfig")
            .field("checked_attr", &self.checked_attr)
            .field("label_attr", &self.label_attr)
            .field("children_attrs", &self.children_attrs)
            .field("multi_state", &self.multi_state)
            .field("checkbox_all", &self.checkbox_all)
            .field("checked_state", &self.checked_state)
            .field("query", &self.query)
            .field("root_id", &self.root_id)
            .field("root_label", &self.root_label)
            .finish_non_exhaustive()
    }
}

impl ModelConfig {
    /// Creates the default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the checked attribute.
    pub fn with_checked_attr(mut self, attr: impl Into<String>) -> Self {
        self.checked_attr = attr.into();
        self
    }

    /// Sets the label attribute.
    pub fn with_label_attr(mut self, attr: impl Into<String>) -> Self {
        self.label_attr = Some(attr.into());
        self
    }

    /// Sets the children attributes.
    pub fn with_children_attrs<I, S>(mut self, attrs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.children_attrs = attrs.into_iter().map(Into::into).collect();
        self
    }

    /// Selects tri-state or dual-state checkboxes.
    pub fn with_multi_state(mut self, multi_state: bool) -> Self {
        self.multi_state = multi_state;
        self
    }

    /// Sets whether every item gets a checkbox.
    pub fn with_checkbox_all(mut self, checkbox_all: bool) -> Self {
        self.checkbox_all = checkbox_all;
        self
    }

    /// Sets the default checked state.
    pub fn with_checked_state(mut self, state: CheckedState) -> Self {
        self.checked_state = state;
        self
    }

    /// Sets the root query.
    pub fn with_query(mut self, query: Query) -> Self {
        self.query = query;
        self
    }

    /// Sets the virtual root's identity.
    pub fn with_root_id(mut self, id: impl Into<String>) -> Self {
        self.root_id = id.into();
        self
    }

    /// Sets the virtual root's label.
    pub fn with_root_label(mut self, label: impl Into<String>) -> Self {
        self.root_label = label.into();
        self
    }

    /// Sets the aggregate policy.
    pub fn with_aggregate(mut self, aggregate: impl CheckedAggregate + 'static) -> Self {
        self.aggregate = Arc::new(aggregate);
        self
    }

    /// The check mode selected by `multi_state`.
    pub fn check_mode(&self) -> CheckMode {
        CheckMode::from_multi_state(self.multi_state)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ModelConfig::default();
        assert_eq!(config.checked_attr, "checked");
        assert_eq!(config.children_attrs, vec!["children".to_string()]);
        assert_eq!(config.check_mode(), CheckMode::MultiState);
        assert_eq!(config.root_id, "$root$");
        assert!(config.query.is_top_level_only());
    }

    #[test]
    fn test_builder() {
        let config = ModelConfig::new()
            .with_checked_attr("selected")
            .with_children_attrs(["kids", "more"])
            .with_multi_state(false);
        assert_eq!(config.checked_attr, "selected");
        assert_eq!(config.children_attrs.len(), 2);
        assert_eq!(config.check_mode(), CheckMode::DualState);
    }
}
