//! In-memory item store.
//!
//! [`MemoryStore`] keeps items in insertion order and answers attribute-match
//! queries. It can be loaded from the classic item-file JSON format:
//!
//! ```json
//! {
//!   "identifier": "name",
//!   "label": "name",
//!   "items": [
//!     { "name": "Africa", "type": "continent", "checked": true,
//!       "children": [ { "name": "Egypt", "type": "country" } ] },
//!     { "name": "Europe", "type": "continent",
//!       "children": [ { "_reference": "Egypt" } ] }
//!   ]
//! }
//! ```
//!
//! Items listed at the top of `items` are top-level items. A `_reference`
//! entry makes an already declared item a child of one more parent.
//!
//! With [`FetchMode::Deferred`] query completions are held until released
//! with [`MemoryStore::complete_next`] and friends. Results are computed when
//! the query is issued, so releasing them late or out of order delivers what
//! the store held at issue time.

use std::collections::{HashMap, HashSet, VecDeque};

use parking_lot::{Mutex, RwLock};
use serde::Deserialize;
use serde_json::{Map, Value};

use checktree_core::logging::targets;

use super::item::{Item, ItemAttributes, ItemValue};
use super::store::{
    FetchComplete, FetchFailed, ItemComplete, ItemStore, Query, RootChange, StoreSignals,
};
use crate::error::StoreError;

/// When query completions are delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FetchMode {
    /// Completions run before `fetch` returns.
    #[default]
    Immediate,
    /// Completions are queued until released.
    Deferred,
}

struct PendingFetch {
    outcome: Result<Vec<Item>, StoreError>,
    on_complete: FetchComplete,
    on_error: FetchFailed,
}

impl PendingFetch {
    fn deliver(self) {
        match self.outcome {
            Ok(items) => (self.on_complete)(items),
            Err(err) => (self.on_error)(err),
        }
    }
}

#[derive(Default)]
struct StoreData {
    order: Vec<Item>,
    by_identity: HashMap<String, Item>,
    top_level: HashSet<Item>,
}

impl StoreData {
    fn contains(&self, item: &Item) -> bool {
        self.by_identity
            .get(item.identity())
            .is_some_and(|stored| stored == item)
    }

    fn insert(&mut self, item: Item, top_level: bool) -> Result<(), StoreError> {
        if self.by_identity.contains_key(item.identity()) {
            return Err(StoreError::DuplicateIdentity(item.identity().to_string()));
        }
        self.by_identity.insert(item.identity().to_string(), item.clone());
        if top_level {
            self.top_level.insert(item.clone());
        }
        self.order.push(item);
        Ok(())
    }
}

/// An in-memory [`ItemStore`].
pub struct MemoryStore {
    data: RwLock<StoreData>,
    pending: Mutex<VecDeque<PendingFetch>>,
    fetch_mode: RwLock<FetchMode>,
    label_attr: Option<String>,
    signals: StoreSignals,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self {
            data: RwLock::new(StoreData::default()),
            pending: Mutex::new(VecDeque::new()),
            fetch_mode: RwLock::new(FetchMode::Immediate),
            label_attr: None,
            signals: StoreSignals::new(),
        }
    }

    /// Sets the attribute that holds item labels.
    pub fn with_label_attr(mut self, attr: impl Into<String>) -> Self {
        self.label_attr = Some(attr.into());
        self
    }

    /// Sets the fetch mode.
    pub fn with_fetch_mode(self, mode: FetchMode) -> Self {
        *self.fetch_mode.write() = mode;
        self
    }

    /// Changes the fetch mode. Already queued completions stay queued.
    pub fn set_fetch_mode(&self, mode: FetchMode) {
        *self.fetch_mode.write() = mode;
    }

    /// Loads a store from item-file JSON.
    pub fn from_json(json: &str) -> Result<Self, StoreError> {
        let file: ItemFile =
            serde_json::from_str(json).map_err(|e| StoreError::Parse(e.to_string()))?;
        let identifier = file.identifier.unwrap_or_else(|| "id".to_string());

        let mut loader = Loader {
            identifier: &identifier,
            data: StoreData::default(),
            links: Vec::new(),
        };
        for object in &file.items {
            loader.load(object, true)?;
        }
        let data = loader.finish()?;

        tracing::debug!(target: targets::STORE, items = data.order.len(), "loaded item file");

        let mut store = Self::new();
        store.data = RwLock::new(data);
        store.label_attr = file.label;
        Ok(store)
    }

    /// Looks up an item by identity.
    pub fn item(&self, identity: &str) -> Option<Item> {
        self.data.read().by_identity.get(identity).cloned()
    }

    /// Returns the number of items.
    pub fn len(&self) -> usize {
        self.data.read().order.len()
    }

    /// Returns `true` if the store holds no items.
    pub fn is_empty(&self) -> bool {
        self.data.read().order.is_empty()
    }

    /// Moves `item` to `position` in the store's iteration order.
    pub fn move_item(&self, item: &Item, position: usize) -> Result<(), StoreError> {
        let mut data = self.data.write();
        let from = data
            .order
            .iter()
            .position(|stored| stored == item)
            .ok_or_else(|| StoreError::UnknownItem(item.identity().to_string()))?;
        let moved = data.order.remove(from);
        let position = position.min(data.order.len());
        data.order.insert(position, moved);
        Ok(())
    }

    /// Number of queued query completions.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Releases the oldest queued completion. Returns `false` if none is queued.
    pub fn complete_next(&self) -> bool {
        let next = self.pending.lock().pop_front();
        match next {
            Some(fetch) => {
                fetch.deliver();
                true
            }
            None => false,
        }
    }

    /// Releases the queued completion at `index`, oldest first.
    pub fn complete_at(&self, index: usize) -> bool {
        let fetch = self.pending.lock().remove(index);
        match fetch {
            Some(fetch) => {
                fetch.deliver();
                true
            }
            None => false,
        }
    }

    /// Releases queued completions until none remain, including any queued
    /// by the completions themselves. Returns how many were released.
    pub fn complete_all(&self) -> usize {
        let mut released = 0;
        while self.complete_next() {
            released += 1;
        }
        released
    }

    /// Fails the oldest queued query with `err`.
    pub fn fail_next(&self, err: StoreError) -> bool {
        let next = self.pending.lock().pop_front();
        match next {
            Some(fetch) => {
                (fetch.on_error)(err);
                true
            }
            None => false,
        }
    }

    fn evaluate(&self, query: &Query) -> Vec<Item> {
        let data = self.data.read();
        data.order
            .iter()
            .filter(|item| !query.is_top_level_only() || data.top_level.contains(*item))
            .filter(|item| query.matches_attributes(item))
            .cloned()
            .collect()
    }

    fn dispatch(&self, fetch: PendingFetch) {
        let mode = *self.fetch_mode.read();
        match mode {
            FetchMode::Immediate => fetch.deliver(),
            FetchMode::Deferred => self.pending.lock().push_back(fetch),
        }
    }

    fn ensure_item(&self, item: &Item) -> Result<(), StoreError> {
        if self.data.read().contains(item) {
            Ok(())
        } else {
            Err(StoreError::UnknownItem(item.identity().to_string()))
        }
    }
}

impl ItemStore for MemoryStore {
    fn fetch(&self, query: &Query, on_complete: FetchComplete, on_error: FetchFailed) {
        let items = self.evaluate(query);
        tracing::trace!(target: targets::STORE, matches = items.len(), "fetch");
        self.dispatch(PendingFetch {
            outcome: Ok(items),
            on_complete,
            on_error,
        });
    }

    fn fetch_item_by_identity(&self, identity: &str, on_item: ItemComplete, on_error: FetchFailed) {
        let found: Vec<Item> = self.item(identity).into_iter().collect();
        self.dispatch(PendingFetch {
            outcome: Ok(found),
            on_complete: Box::new(move |items| on_item(items.into_iter().next())),
            on_error,
        });
    }

    fn is_item(&self, item: &Item) -> bool {
        self.data.read().contains(item)
    }

    fn label_attr(&self) -> Option<String> {
        self.label_attr.clone()
    }

    fn set_value(&self, item: &Item, attr: &str, value: ItemValue) -> Result<(), StoreError> {
        self.ensure_item(item)?;
        let old = item.set(attr, value.clone());
        if old.as_ref() == Some(&value) {
            return Ok(());
        }
        self.signals
            .item_set
            .emit((item.clone(), attr.to_string(), old, Some(value)));
        Ok(())
    }

    fn new_item(
        &self,
        identity: &str,
        attributes: ItemAttributes,
        parent: Option<(&Item, &str)>,
    ) -> Result<Item, StoreError> {
        if let Some((parent, _)) = parent {
            self.ensure_item(parent)?;
        }
        let item = Item::new(identity, attributes);
        self.data.write().insert(item.clone(), parent.is_none())?;
        tracing::debug!(target: targets::STORE, identity, top_level = parent.is_none(), "item created");

        self.signals.item_created.emit(item.clone());
        match parent {
            Some((parent, attr)) => {
                let mut children = parent
                    .get(attr)
                    .and_then(|v| v.as_items().map(<[Item]>::to_vec))
                    .unwrap_or_default();
                children.push(item.clone());
                self.set_value(parent, attr, ItemValue::Items(children))?;
            }
            None => {
                self.signals
                    .root_changed
                    .emit((item.clone(), RootChange::Attach));
            }
        }
        Ok(item)
    }

    fn delete_item(&self, item: &Item) -> Result<(), StoreError> {
        let mut references = Vec::new();
        {
            let mut data = self.data.write();
            if !data.contains(item) {
                return Err(StoreError::UnknownItem(item.identity().to_string()));
            }
            data.order.retain(|stored| stored != item);
            data.by_identity.remove(item.identity());
            data.top_level.remove(item);

            for holder in &data.order {
                for attr in holder.attribute_names() {
                    if let Some(ItemValue::Items(children)) = holder.get(&attr) {
                        if children.contains(item) {
                            let remaining: Vec<Item> =
                                children.into_iter().filter(|c| c != item).collect();
                            references.push((holder.clone(), attr, remaining));
                        }
                    }
                }
            }
        }

        tracing::debug!(target: targets::STORE, identity = item.identity(), references = references.len(), "item deleted");
        for (holder, attr, remaining) in references {
            self.set_value(&holder, &attr, ItemValue::Items(remaining))?;
        }
        self.signals.item_deleted.emit(item.clone());
        Ok(())
    }

    fn attach_to_root(&self, item: &Item) -> Result<(), StoreError> {
        let attached = {
            let mut data = self.data.write();
            if !data.contains(item) {
                return Err(StoreError::UnknownItem(item.identity().to_string()));
            }
            data.top_level.insert(item.clone())
        };
        if attached {
            self.signals
                .root_changed
                .emit((item.clone(), RootChange::Attach));
        }
        Ok(())
    }

    fn detach_from_root(&self, item: &Item) -> Result<(), StoreError> {
        let detached = {
            let mut data = self.data.write();
            if !data.contains(item) {
                return Err(StoreError::UnknownItem(item.identity().to_string()));
            }
            data.top_level.remove(item)
        };
        if detached {
            self.signals
                .root_changed
                .emit((item.clone(), RootChange::Detach));
        }
        Ok(())
    }

    fn is_top_level(&self, item: &Item) -> bool {
        self.data.read().top_level.contains(item)
    }

    fn parents_of(&self, item: &Item, children_attrs: &[String]) -> Vec<Item> {
        let data = self.data.read();
        data.order
            .iter()
            .filter(|holder| {
                children_attrs.iter().any(|attr| {
                    holder
                        .get(attr)
                        .and_then(|v| v.as_items().map(|children| children.contains(item)))
                        .unwrap_or(false)
                })
            })
            .cloned()
            .collect()
    }

    fn signals(&self) -> &StoreSignals {
        &self.signals
    }
}

#[derive(Deserialize)]
struct ItemFile {
    #[serde(default)]
    identifier: Option<String>,
    #[serde(default)]
    label: Option<String>,
    items: Vec<Map<String, Value>>,
}

enum ChildRef {
    Item(Item),
    Reference(String),
}

struct Loader<'a> {
    identifier: &'a str,
    data: StoreData,
    links: Vec<(Item, String, Vec<ChildRef>)>,
}

impl Loader<'_> {
    fn load(&mut self, object: &Map<String, Value>, top_level: bool) -> Result<Item, StoreError> {
        let identity = match object.get(self.identifier) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(StoreError::Parse(format!(
                    "item without a '{}' identifier",
                    self.identifier
                )));
            }
        };

        let mut attributes = ItemAttributes::new();
        let mut children = Vec::new();
        for (key, value) in object {
            match value {
                Value::Null => {}
                Value::Bool(b) => {
                    attributes.insert(key.clone(), ItemValue::Bool(*b));
                }
                Value::Number(n) => {
                    let value = match n.as_i64() {
                        Some(i) => ItemValue::Int(i),
                        None => ItemValue::Float(n.as_f64().unwrap_or_default()),
                    };
                    attributes.insert(key.clone(), value);
                }
                Value::String(s) => {
                    attributes.insert(key.clone(), ItemValue::String(s.clone()));
                }
                Value::Array(elements) => {
                    let mut refs = Vec::with_capacity(elements.len());
                    for element in elements {
                        refs.push(self.child_ref(key, element)?);
                    }
                    children.push((key.clone(), refs));
                }
                Value::Object(_) => {
                    let single = self.child_ref(key, value)?;
                    children.push((key.clone(), vec![single]));
                }
            }
        }

        let item = Item::new(identity, attributes);
        self.data.insert(item.clone(), top_level)?;
        for (attr, refs) in children {
            self.links.push((item.clone(), attr, refs));
        }
        Ok(item)
    }

    fn child_ref(&mut self, key: &str, value: &Value) -> Result<ChildRef, StoreError> {
        let Value::Object(object) = value else {
            return Err(StoreError::Parse(format!(
                "attribute '{key}' mixes items and scalar values"
            )));
        };
        match object.get("_reference") {
            Some(Value::String(target)) => Ok(ChildRef::Reference(target.clone())),
            Some(Value::Number(target)) => Ok(ChildRef::Reference(target.to_string())),
            Some(_) => Err(StoreError::Parse(format!(
                "invalid _reference under '{key}'"
            ))),
            None => Ok(ChildRef::Item(self.load(object, false)?)),
        }
    }

    fn finish(self) -> Result<StoreData, StoreError> {
        for (holder, attr, refs) in self.links {
            let mut resolved = Vec::with_capacity(refs.len());
            for child in refs {
                match child {
                    ChildRef::Item(item) => resolved.push(item),
                    ChildRef::Reference(target) => {
                        let item = self.data.by_identity.get(&target).ok_or_else(|| {
                            StoreError::Parse(format!("unresolved reference '{target}'"))
                        })?;
                        resolved.push(item.clone());
                    }
                }
            }
            holder.set(&attr, ItemValue::Items(resolved));
        }
        Ok(self.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    const WORLD: &str = r#"{
        "identifier": "name",
        "label": "name",
        "items": [
            { "name": "Africa", "type": "continent", "checked": true,
              "children": [ { "name": "Egypt", "type": "country" },
                            { "name": "Kenya", "type": "country" } ] },
            { "name": "Europe", "type": "continent",
              "children": [ { "_reference": "Egypt" } ] }
        ]
    }"#;

    fn collect(store: &MemoryStore, query: &Query) -> Arc<Mutex<Option<Vec<String>>>> {
        let result = Arc::new(Mutex::new(None));
        let sink = result.clone();
        store.fetch(
            query,
            Box::new(move |items| {
                *sink.lock() = Some(items.iter().map(|i| i.identity().to_string()).collect());
            }),
            Box::new(|_| {}),
        );
        result
    }

    #[test]
    fn test_load_item_file() {
        let store = MemoryStore::from_json(WORLD).unwrap();
        assert_eq!(store.len(), 4);
        assert_eq!(store.label_attr().as_deref(), Some("name"));

        let africa = store.item("Africa").unwrap();
        let egypt = store.item("Egypt").unwrap();
        assert!(store.is_top_level(&africa));
        assert!(!store.is_top_level(&egypt));

        let children = africa.get("children").unwrap();
        assert_eq!(children.as_items().unwrap().len(), 2);

        let parents = store.parents_of(&egypt, &["children".to_string()]);
        assert_eq!(parents.len(), 2);
    }

    #[test]
    fn test_load_rejects_unresolved_reference() {
        let json = r#"{ "identifier": "id", "items": [
            { "id": "a", "children": [ { "_reference": "missing" } ] } ] }"#;
        assert!(matches!(MemoryStore::from_json(json), Err(StoreError::Parse(_))));
    }

    #[test]
    fn test_fetch_top_level_with_attributes() {
        let store = MemoryStore::from_json(WORLD).unwrap();
        let result = collect(&store, &Query::top_level().with_attr("type", "continent"));
        assert_eq!(
            result.lock().clone(),
            Some(vec!["Africa".to_string(), "Europe".to_string()])
        );

        let result = collect(&store, &Query::all().with_attr("type", "country"));
        assert_eq!(
            result.lock().clone(),
            Some(vec!["Egypt".to_string(), "Kenya".to_string()])
        );
    }

    #[test]
    fn test_deferred_fetch_uses_issue_time_snapshot() {
        let store = MemoryStore::from_json(WORLD)
            .unwrap()
            .with_fetch_mode(FetchMode::Deferred);

        let first = collect(&store, &Query::top_level());
        let europe = store.item("Europe").unwrap();
        store.detach_from_root(&europe).unwrap();
        let second = collect(&store, &Query::top_level());

        assert_eq!(store.pending_count(), 2);
        assert!(store.complete_at(1));
        assert_eq!(second.lock().clone(), Some(vec!["Africa".to_string()]));
        assert!(first.lock().is_none());

        assert_eq!(store.complete_all(), 1);
        assert_eq!(
            first.lock().clone(),
            Some(vec!["Africa".to_string(), "Europe".to_string()])
        );
        assert!(!store.complete_next());
    }

    #[test]
    fn test_fail_next_reports_error() {
        let store = MemoryStore::new().with_fetch_mode(FetchMode::Deferred);
        let failed = Arc::new(Mutex::new(None));
        let sink = failed.clone();
        store.fetch(
            &Query::all(),
            Box::new(|_| panic!("should not complete")),
            Box::new(move |err| *sink.lock() = Some(err)),
        );

        assert!(store.fail_next(StoreError::Fetch("offline".into())));
        assert_eq!(*failed.lock(), Some(StoreError::Fetch("offline".into())));
    }

    #[test]
    fn test_set_value_emits_only_on_change() {
        let store = MemoryStore::from_json(WORLD).unwrap();
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        store.signals().item_set.connect(move |(item, attr, _, new)| {
            sink.lock().push((item.identity().to_string(), attr.clone(), new.clone()));
        });

        let kenya = store.item("Kenya").unwrap();
        store.set_value(&kenya, "checked", true.into()).unwrap();
        store.set_value(&kenya, "checked", true.into()).unwrap();

        let events = events.lock();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].0, "Kenya");
        assert_eq!(events[0].2, Some(ItemValue::Bool(true)));
    }

    #[test]
    fn test_delete_removes_references() {
        let store = MemoryStore::from_json(WORLD).unwrap();
        let deleted = Arc::new(Mutex::new(Vec::new()));
        let sink = deleted.clone();
        store.signals().item_deleted.connect(move |item| {
            sink.lock().push(item.identity().to_string());
        });

        let egypt = store.item("Egypt").unwrap();
        store.delete_item(&egypt).unwrap();

        assert!(!store.is_item(&egypt));
        assert!(store.parents_of(&egypt, &["children".to_string()]).is_empty());
        let europe = store.item("Europe").unwrap();
        assert_eq!(europe.get("children"), Some(ItemValue::Items(vec![])));
        assert_eq!(*deleted.lock(), vec!["Egypt".to_string()]);
        assert_eq!(
            store.delete_item(&egypt),
            Err(StoreError::UnknownItem("Egypt".into()))
        );
    }

    #[test]
    fn test_new_item_under_parent_and_top_level() {
        let store = MemoryStore::from_json(WORLD).unwrap();
        let attached = Arc::new(Mutex::new(Vec::new()));
        let sink = attached.clone();
        store.signals().root_changed.connect(move |(item, change)| {
            sink.lock().push((item.identity().to_string(), *change));
        });

        let africa = store.item("Africa").unwrap();
        let ghana = store
            .new_item("Ghana", ItemAttributes::new(), Some((&africa, "children")))
            .unwrap();
        assert!(!store.is_top_level(&ghana));
        assert_eq!(store.parents_of(&ghana, &["children".to_string()]), vec![africa]);

        let asia = store.new_item("Asia", ItemAttributes::new(), None).unwrap();
        assert!(store.is_top_level(&asia));
        assert_eq!(*attached.lock(), vec![("Asia".to_string(), RootChange::Attach)]);

        assert_eq!(
            store.new_item("Asia", ItemAttributes::new(), None).err(),
            Some(StoreError::DuplicateIdentity("Asia".into()))
        );
    }

    #[test]
    fn test_move_item_reorders_results() {
        let store = MemoryStore::from_json(WORLD).unwrap();
        let europe = store.item("Europe").unwrap();
        store.move_item(&europe, 0).unwrap();

        let result = collect(&store, &Query::top_level());
        assert_eq!(
            result.lock().clone(),
            Some(vec!["Europe".to_string(), "Africa".to_string()])
        );
    }
}
