//! Forest model: a fabricated root over a store without one.
//!
//! [`ForestStoreModel`] wraps a [`StoreModel`] and presents the store's
//! top-level items (whatever the configured query selects) as the children
//! of a virtual root item. The root's children are cached after the first
//! load and kept in sync by re-running the query whenever membership may
//! have changed:
//!
//! - a cached child is deleted,
//! - an attribute the query filters on is written,
//! - an item is attached to (or a cached child detached from) the top level.
//!
//! Each completed requery is diffed, in order, against the cache as it stands
//! at commit time. An identical result is dropped silently; any difference
//! replaces the cache wholesale and emits `children_changed` for the root.
//! Requeries carry a generation number so a slow completion can never
//! overwrite the result of a later one that has already been applied.
//!
//! The virtual root is recognized by handle identity, never by attributes,
//! and every question about it is answered locally.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use checktree_core::logging::targets;
use checktree_core::{ConnectionId, PerfSpan};

use super::checked::{CheckMode, CheckedState};
use super::config::ModelConfig;
use super::item::{Item, ItemAttributes, ItemValue};
use super::store::{FetchComplete, FetchFailed, ItemComplete, ItemStore, RootChange};
use super::store_model::StoreModel;
use super::traits::{CheckboxModel, ModelSignals, RootComplete, TreeModel};
use crate::error::{Result, StoreError};

/// Load state of the virtual root's children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RootState {
    /// Nothing has asked for the root's children yet.
    Uninitialized,
    /// The first query is outstanding.
    Pending,
    /// Children are cached. Requeries may be outstanding.
    Ready,
}

struct RootCache {
    state: RootState,
    children: Option<Arc<Vec<Item>>>,
    issued: u64,
    applied: u64,
    waiters: Vec<(FetchComplete, FetchFailed)>,
    // The first load failed after someone asked for the children.
    load_failed: bool,
}

enum StoreConnection {
    ItemSet(ConnectionId),
    ItemDeleted(ConnectionId),
    RootChanged(ConnectionId),
}

/// A [`TreeModel`] with a virtual root over a forest-shaped store.
pub struct ForestStoreModel {
    this: Weak<ForestStoreModel>,
    base: Arc<StoreModel>,
    root: Item,
    cache: Mutex<RootCache>,
    connections: Mutex<Vec<StoreConnection>>,
    cascading: AtomicBool,
    torn_down: AtomicBool,
}

impl ForestStoreModel {
    /// Creates a forest model over `store`.
    pub fn new(store: Arc<dyn ItemStore>, config: ModelConfig) -> Arc<Self> {
        let mut attributes = ItemAttributes::new();
        attributes.insert(
            config.checked_attr.clone(),
            ItemValue::Checked(config.checked_state),
        );
        if let Some(label_attr) = &config.label_attr {
            attributes.insert(label_attr.clone(), ItemValue::String(config.root_label.clone()));
        }
        let root = Item::new(config.root_id.clone(), attributes);
        let base = StoreModel::new(Arc::clone(&store), config);

        Arc::new_cyclic(|weak: &Weak<Self>| {
            let on_set = weak.clone();
            let item_set = store.signals().item_set.connect(move |(item, attr, _, _)| {
                if let Some(model) = on_set.upgrade() {
                    model.on_store_set(item, attr);
                }
            });
            let on_delete = weak.clone();
            let item_deleted = store.signals().item_deleted.connect(move |item| {
                if let Some(model) = on_delete.upgrade() {
                    model.on_store_delete(item);
                }
            });
            let on_root = weak.clone();
            let root_changed = store.signals().root_changed.connect(move |(item, change)| {
                if let Some(model) = on_root.upgrade() {
                    model.on_root_changed(item, *change);
                }
            });

            tracing::debug!(target: targets::FOREST, root = root.identity(), "forest model created");

            Self {
                this: weak.clone(),
                base,
                root,
                cache: Mutex::new(RootCache {
                    state: RootState::Uninitialized,
                    children: None,
                    issued: 0,
                    applied: 0,
                    waiters: Vec::new(),
                    load_failed: false,
                }),
                connections: Mutex::new(vec![
                    StoreConnection::ItemSet(item_set),
                    StoreConnection::ItemDeleted(item_deleted),
                    StoreConnection::RootChanged(root_changed),
                ]),
                cascading: AtomicBool::new(false),
                torn_down: AtomicBool::new(false),
            }
        })
    }

    /// The wrapped single-root model.
    pub fn base(&self) -> &Arc<StoreModel> {
        &self.base
    }

    /// The virtual root.
    pub fn root(&self) -> &Item {
        &self.root
    }

    /// Returns `true` if `item` is the virtual root.
    pub fn is_root(&self, item: &Item) -> bool {
        item.ptr_eq(&self.root)
    }

    /// Load state of the root's children.
    pub fn root_state(&self) -> RootState {
        self.cache.lock().state
    }

    /// The cached children of the virtual root, `None` before the first load.
    pub fn cached_children(&self) -> Option<Arc<Vec<Item>>> {
        self.cache.lock().children.clone()
    }

    /// Returns `true` once [`destroy`](TreeModel::destroy) has run.
    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }

    /// Re-runs the root query. Ignored until the root's children have been
    /// requested once.
    ///
    /// After a failed first load this retries the load against an empty
    /// cache, and the result is announced with `children_changed`.
    pub fn requery(&self) {
        if self.is_torn_down() {
            return;
        }
        let generation = {
            let mut cache = self.cache.lock();
            if cache.state == RootState::Uninitialized {
                if !cache.load_failed {
                    tracing::trace!(target: targets::FOREST, "requery before first load ignored");
                    return;
                }
                cache.state = RootState::Pending;
            }
            cache.issued += 1;
            cache.issued
        };
        tracing::debug!(target: targets::FOREST, generation, "requery issued");
        self.issue(generation);
    }

    fn issue(&self, generation: u64) {
        let on_complete = self.this.clone();
        let on_error = self.this.clone();
        self.base.store().fetch(
            &self.base.config().query,
            Box::new(move |items| {
                if let Some(model) = on_complete.upgrade() {
                    model.commit(generation, items);
                }
            }),
            Box::new(move |err| {
                if let Some(model) = on_error.upgrade() {
                    model.fail(generation, err);
                }
            }),
        );
    }

    fn load_root_children(&self, on_complete: FetchComplete, on_error: FetchFailed) {
        if self.is_torn_down() {
            on_error(StoreError::TornDown);
            return;
        }
        let mut cache = self.cache.lock();
        let state = cache.state;
        match state {
            RootState::Ready => {
                let children = cache.children.clone();
                drop(cache);
                on_complete(children.map(|c| c.to_vec()).unwrap_or_default());
            }
            RootState::Pending => {
                cache.waiters.push((on_complete, on_error));
            }
            RootState::Uninitialized => {
                cache.state = RootState::Pending;
                cache.issued += 1;
                let generation = cache.issued;
                cache.waiters.push((on_complete, on_error));
                drop(cache);
                tracing::debug!(target: targets::FOREST, generation, "first root query issued");
                self.issue(generation);
            }
        }
    }

    fn commit(&self, generation: u64, items: Vec<Item>) {
        if self.is_torn_down() {
            tracing::warn!(target: targets::FOREST, generation, "query completed after teardown, ignored");
            return;
        }
        let _span = PerfSpan::new("ForestStoreModel::commit");

        let mut cache = self.cache.lock();
        if generation <= cache.applied {
            tracing::debug!(
                target: targets::FOREST,
                generation,
                applied = cache.applied,
                "superseded requery discarded"
            );
            return;
        }
        cache.applied = generation;
        let items = Arc::new(items);

        match cache.children.clone() {
            None => {
                cache.children = Some(Arc::clone(&items));
                cache.state = RootState::Ready;
                let waiters = std::mem::take(&mut cache.waiters);
                let recovered = std::mem::take(&mut cache.load_failed);
                drop(cache);

                tracing::debug!(target: targets::FOREST, generation, count = items.len(), recovered, "root children loaded");
                for (on_complete, _) in waiters {
                    on_complete(items.to_vec());
                }
                // Whoever asked before the failure got an error, not children.
                if recovered {
                    self.base
                        .signals()
                        .children_changed
                        .emit((self.root.clone(), items.to_vec()));
                }
                self.update_root_checked();
            }
            Some(previous) if *previous == *items => {
                drop(cache);
                tracing::debug!(target: targets::FOREST, generation, "requery unchanged");
            }
            Some(_) => {
                cache.children = Some(Arc::clone(&items));
                drop(cache);

                tracing::debug!(target: targets::FOREST, generation, count = items.len(), "root children changed");
                self.base
                    .signals()
                    .children_changed
                    .emit((self.root.clone(), items.to_vec()));
                self.update_root_checked();
            }
        }
    }

    fn fail(&self, generation: u64, err: StoreError) {
        if self.is_torn_down() {
            tracing::warn!(target: targets::FOREST, generation, "query failed after teardown, ignored");
            return;
        }
        // A newer query still in flight answers the waiters instead.
        let waiters = {
            let mut cache = self.cache.lock();
            if cache.children.is_none() && generation > cache.applied && generation == cache.issued {
                cache.state = RootState::Uninitialized;
                cache.load_failed = true;
                std::mem::take(&mut cache.waiters)
            } else {
                Vec::new()
            }
        };

        tracing::warn!(target: targets::FOREST, generation, %err, "root query failed, keeping cached children");
        for (_, on_error) in waiters {
            on_error(err.clone());
        }
        self.base.signals().query_failed.emit(err);
    }

    fn update_root_checked(&self) {
        let Some(children) = self.cached_children() else {
            return;
        };
        let states: Vec<CheckedState> = children
            .iter()
            .filter_map(|child| self.base.get_checked(child))
            .collect();
        if let Some(state) = self
            .base
            .config()
            .aggregate
            .aggregate(&states, self.check_mode())
        {
            self.write_root_checked(state);
        }
    }

    fn write_root_checked(&self, state: CheckedState) {
        let attr = self.base.config().checked_attr.clone();
        let old = self.root.set(&attr, ItemValue::Checked(state));
        if old.and_then(|v| v.as_checked()) == Some(state) {
            return;
        }
        tracing::debug!(target: targets::FOREST, %state, "root checked state changed");
        self.base
            .signals()
            .item_changed
            .emit((self.root.clone(), attr, ItemValue::Checked(state)));
    }

    fn is_cached_child(&self, item: &Item) -> bool {
        self.cache
            .lock()
            .children
            .as_ref()
            .is_some_and(|children| children.contains(item))
    }

    fn on_store_set(&self, item: &Item, attr: &str) {
        if self.is_torn_down() {
            return;
        }
        let config = self.base.config();
        if attr == config.checked_attr
            && !self.cascading.load(Ordering::SeqCst)
            && self.is_cached_child(item)
        {
            self.update_root_checked();
        }
        if config.query.attribute_names().iter().any(|name| name == attr) {
            self.requery();
        }
    }

    fn on_store_delete(&self, item: &Item) {
        if !self.is_torn_down() && self.is_cached_child(item) {
            self.requery();
        }
    }

    fn on_root_changed(&self, item: &Item, change: RootChange) {
        if self.is_torn_down() {
            return;
        }
        match change {
            RootChange::Attach => self.requery(),
            RootChange::Detach if self.is_cached_child(item) => self.requery(),
            RootChange::Detach => {}
        }
    }
}

impl TreeModel for ForestStoreModel {
    fn get_root(&self, on_item: RootComplete, _on_error: FetchFailed) {
        on_item(self.root.clone());
    }

    fn may_have_children(&self, item: &Item) -> bool {
        self.is_root(item) || self.base.may_have_children(item)
    }

    fn get_children(&self, parent: &Item, on_complete: FetchComplete, on_error: FetchFailed) {
        if self.is_root(parent) {
            self.load_root_children(on_complete, on_error);
        } else {
            self.base.get_children(parent, on_complete, on_error);
        }
    }

    fn is_item(&self, item: &Item) -> bool {
        self.is_root(item) || self.base.is_item(item)
    }

    fn fetch_item_by_identity(&self, identity: &str, on_item: ItemComplete, on_error: FetchFailed) {
        if identity == self.root.identity() {
            on_item(Some(self.root.clone()));
        } else {
            self.base.fetch_item_by_identity(identity, on_item, on_error);
        }
    }

    fn get_identity(&self, item: &Item) -> String {
        if self.is_root(item) {
            self.base.config().root_id.clone()
        } else {
            self.base.get_identity(item)
        }
    }

    fn get_label(&self, item: &Item) -> String {
        if self.is_root(item) {
            self.base.config().root_label.clone()
        } else {
            self.base.get_label(item)
        }
    }

    fn label_attr(&self) -> Option<String> {
        self.base.label_attr()
    }

    fn get_item_attr(&self, item: &Item, attr: &str) -> Option<ItemValue> {
        if self.is_root(item) {
            self.root.get(attr)
        } else {
            self.base.get_item_attr(item, attr)
        }
    }

    fn new_item(&self, identity: &str, attributes: ItemAttributes, parent: &Item) -> Result<Item> {
        if !self.is_root(parent) {
            return self.base.new_item(identity, attributes, parent);
        }
        // The store's attach notification requeries, and the commit
        // re-derives the root's checked state.
        Ok(self.base.store().new_item(identity, attributes, None)?)
    }

    fn paste_item(
        &self,
        child: &Item,
        old_parent: Option<&Item>,
        new_parent: &Item,
        copy: bool,
    ) -> Result<()> {
        let from_root = old_parent.is_some_and(|p| self.is_root(p));
        let to_root = self.is_root(new_parent);

        match (from_root, to_root) {
            (true, true) => Ok(()),
            (_, true) => {
                let moved_from = if copy { None } else { old_parent };
                if let Some(old) = moved_from {
                    self.base.remove_child(old, child)?;
                }
                self.base.store().attach_to_root(child)?;
                if let Some(old) = moved_from {
                    self.base.refresh_branch(old)?;
                }
                Ok(())
            }
            (true, false) => {
                if !copy {
                    self.base.store().detach_from_root(child)?;
                }
                self.base.paste_item(child, None, new_parent, copy)
            }
            (false, false) => self.base.paste_item(child, old_parent, new_parent, copy),
        }
    }

    fn checkbox_model(&self) -> Option<&dyn CheckboxModel> {
        Some(self)
    }

    fn signals(&self) -> &ModelSignals {
        self.base.signals()
    }

    fn destroy(&self) {
        if self.torn_down.swap(true, Ordering::SeqCst) {
            return;
        }
        let store = self.base.store();
        for connection in self.connections.lock().drain(..) {
            match connection {
                StoreConnection::ItemSet(id) => store.signals().item_set.disconnect(id),
                StoreConnection::ItemDeleted(id) => store.signals().item_deleted.disconnect(id),
                StoreConnection::RootChanged(id) => store.signals().root_changed.disconnect(id),
            };
        }
        let waiters = std::mem::take(&mut self.cache.lock().waiters);
        drop(waiters);
        self.base.destroy();
        tracing::debug!(target: targets::FOREST, "forest model destroyed");
    }
}

impl CheckboxModel for ForestStoreModel {
    fn check_mode(&self) -> CheckMode {
        self.base.check_mode()
    }

    fn checked_attr(&self) -> String {
        self.base.checked_attr()
    }

    fn get_checked(&self, item: &Item) -> Option<CheckedState> {
        if self.is_root(item) {
            self.root
                .get(&self.base.config().checked_attr)
                .and_then(|v| v.as_checked())
        } else {
            self.base.get_checked(item)
        }
    }

    fn set_checked(&self, item: &Item, state: CheckedState) -> Result<()> {
        if !self.is_root(item) {
            return self.base.set_checked(item, state);
        }

        let state = self.check_mode().validate(state).inspect_err(|err| {
            tracing::warn!(target: targets::FOREST, %err, "rejected root checked state");
        })?;
        self.write_root_checked(state);
        if state.is_mixed() {
            return Ok(());
        }

        let children = self.cached_children().unwrap_or_default();
        self.cascading.store(true, Ordering::SeqCst);
        let result = children
            .iter()
            .try_for_each(|child| self.base.set_checked(child, state));
        self.cascading.store(false, Ordering::SeqCst);
        self.update_root_checked();
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::memory_store::{FetchMode, MemoryStore};

    const FOREST: &str = r#"{
        "identifier": "id",
        "label": "name",
        "items": [
            { "id": "A", "name": "Alpha", "checked": false },
            { "id": "B", "name": "Beta", "checked": false },
            { "id": "C", "name": "Gamma", "checked": false }
        ]
    }"#;

    fn forest() -> (Arc<MemoryStore>, Arc<ForestStoreModel>) {
        let store = Arc::new(MemoryStore::from_json(FOREST).unwrap());
        let model = ForestStoreModel::new(store.clone(), ModelConfig::new());
        (store, model)
    }

    fn load(model: &ForestStoreModel) -> Arc<Mutex<Option<Vec<Item>>>> {
        let loaded = Arc::new(Mutex::new(None));
        let sink = loaded.clone();
        model.get_children(
            model.root(),
            Box::new(move |items| *sink.lock() = Some(items)),
            Box::new(|_| {}),
        );
        loaded
    }

    #[test]
    fn test_sentinel_is_answered_locally() {
        let (_store, model) = forest();
        let root = model.root().clone();

        assert!(model.is_item(&root));
        assert!(model.may_have_children(&root));
        assert_eq!(model.get_identity(&root), "$root$");
        assert_eq!(model.get_label(&root), "ROOT");

        let found = Arc::new(Mutex::new(None));
        let sink = found.clone();
        model.fetch_item_by_identity(
            "$root$",
            Box::new(move |item| *sink.lock() = item),
            Box::new(|_| {}),
        );
        assert!(found.lock().as_ref().is_some_and(|item| model.is_root(item)));
    }

    #[test]
    fn test_look_alike_is_not_the_root() {
        let (_store, model) = forest();
        let twin = Item::new("$root$", ItemAttributes::new());
        assert!(!model.is_root(&twin));
        assert!(!model.is_item(&twin));
    }

    #[test]
    fn test_state_machine() {
        let (store, model) = forest();
        store.set_fetch_mode(FetchMode::Deferred);
        assert_eq!(model.root_state(), RootState::Uninitialized);
        assert!(model.cached_children().is_none());

        // requery before anyone asked is ignored
        model.requery();
        assert_eq!(store.pending_count(), 0);

        let first = load(&model);
        let second = load(&model);
        assert_eq!(model.root_state(), RootState::Pending);
        assert_eq!(store.pending_count(), 1);

        store.complete_next();
        assert_eq!(model.root_state(), RootState::Ready);
        assert_eq!(first.lock().as_ref().map(Vec::len), Some(3));
        assert_eq!(second.lock().as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn test_first_load_failure_allows_retry() {
        let (store, model) = forest();
        store.set_fetch_mode(FetchMode::Deferred);

        let failed = Arc::new(Mutex::new(None));
        let sink = failed.clone();
        model.get_children(
            model.root(),
            Box::new(|_| panic!("first load should fail")),
            Box::new(move |err| *sink.lock() = Some(err)),
        );
        store.fail_next(StoreError::Fetch("offline".into()));

        assert_eq!(*failed.lock(), Some(StoreError::Fetch("offline".into())));
        assert_eq!(model.root_state(), RootState::Uninitialized);

        store.set_fetch_mode(FetchMode::Immediate);
        assert_eq!(load(&model).lock().as_ref().map(Vec::len), Some(3));
    }

    #[test]
    fn test_root_aggregate_follows_children() {
        let (store, model) = forest();
        load(&model);

        model
            .set_checked(&store.item("A").unwrap(), CheckedState::Checked)
            .unwrap();
        assert_eq!(model.get_checked(model.root()), Some(CheckedState::Mixed));

        // external write to a root-level item
        store
            .set_value(&store.item("B").unwrap(), "checked", true.into())
            .unwrap();
        store
            .set_value(&store.item("C").unwrap(), "checked", true.into())
            .unwrap();
        assert_eq!(model.get_checked(model.root()), Some(CheckedState::Checked));
    }

    #[test]
    fn test_set_checked_on_root_cascades_once() {
        let (store, model) = forest();
        load(&model);

        let root_changes = Arc::new(Mutex::new(Vec::new()));
        let sink = root_changes.clone();
        let root = model.root().clone();
        model.signals().item_changed.connect(move |(item, _, value)| {
            if item.ptr_eq(&root) {
                sink.lock().push(value.clone());
            }
        });

        model
            .set_checked(model.root(), CheckedState::Checked)
            .unwrap();
        for id in ["A", "B", "C"] {
            assert_eq!(
                model.get_checked(&store.item(id).unwrap()),
                Some(CheckedState::Checked)
            );
        }
        assert_eq!(
            *root_changes.lock(),
            vec![ItemValue::Checked(CheckedState::Checked)]
        );
    }

    #[test]
    fn test_new_item_under_root_is_top_level() {
        let (store, model) = forest();
        load(&model);

        let mut attributes = ItemAttributes::new();
        attributes.insert("checked".into(), true.into());
        let item = model
            .new_item("D", attributes, &model.root().clone())
            .unwrap();

        assert!(store.is_top_level(&item));
        let cached = model.cached_children().unwrap();
        assert_eq!(cached.last(), Some(&item));
        assert_eq!(model.get_checked(model.root()), Some(CheckedState::Mixed));
    }

    #[test]
    fn test_paste_between_root_and_item() {
        let (store, model) = forest();
        load(&model);
        let a = store.item("A").unwrap();
        let b = store.item("B").unwrap();
        let root = model.root().clone();

        model.paste_item(&b, Some(&root), &a, false).unwrap();
        assert!(!store.is_top_level(&b));
        assert_eq!(model.cached_children().unwrap().len(), 2);
        assert_eq!(model.base().children_of(&a), vec![b.clone()]);

        model.paste_item(&b, Some(&a), &root, false).unwrap();
        assert!(store.is_top_level(&b));
        assert!(model.base().children_of(&a).is_empty());
        assert_eq!(model.cached_children().unwrap().len(), 3);
    }
}
