use std::{
    cell::RefCell,
    collections::{BTreeMap, HashMap},
    fmt,
    rc::{Rc, Weak},
};

use derive_ex::derive_ex;
use futures::future::LocalBoxFuture;
use serde_json::{Map, Value};

use crate::{
    config::next_module_id, effect::EffectFn, registry::Registry, ActionCreator, ActionSubscription,
    ActionTree, ActionType, CloneDraft, DraftEngine, EffectOrdering, Error, Helper, Hooks,
    ModuleConfig, Props, Reducer, Result, ScreamingSnake, Selector, SelectorSpec, Snapshot,
    TypeFormatter,
};


pub(crate) struct ModuleDescriptor {
    pub(crate) mid: String,
    pub(crate) config: ModuleConfig,
    pub(crate) hooks: Hooks,
    pub(crate) engine: Box<dyn DraftEngine>,
    pub(crate) formatter: Box<dyn TypeFormatter>,
    pub(crate) state: RefCell<Snapshot>,
    pub(crate) tables: RefCell<Tables>,
    pub(crate) registry: RefCell<Registry>,
    pub(crate) pending_effects: RefCell<Vec<LocalBoxFuture<'static, Result<()>>>>,
    pub(crate) pending_scopes: RefCell<Vec<LocalBoxFuture<'static, Result<()>>>>,
}

#[derive(Default)]
pub(crate) struct Tables {
    pub components: Vec<String>,
    pub actions: ActionTree,
    pub reducers: HashMap<ActionType, Vec<Reducer>>,
    pub effects: HashMap<ActionType, Vec<EffectFn>>,
    pub selectors: BTreeMap<String, Selector>,
    pub helpers: BTreeMap<String, Helper>,
    pub scopes: BTreeMap<String, Value>,
    pub deferred: Vec<ActionSubscription>,
}

/// A state module: an immutable state tree with the components that read and update it.
///
/// Cloning yields another handle to the same module.
#[derive(Clone)]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct Store(pub(crate) Rc<ModuleDescriptor>);

#[derive(Clone)]
pub(crate) struct WeakStore(Weak<ModuleDescriptor>);

impl WeakStore {
    pub fn upgrade(&self) -> Option<Store> {
        self.0.upgrade().map(Store)
    }
}

impl Store {
    pub fn new() -> Self {
        Self::builder().build()
    }
    pub fn with_config(config: ModuleConfig) -> Self {
        Self::builder().config(config).build()
    }
    pub fn builder() -> StoreBuilder {
        StoreBuilder::new()
    }

    pub(crate) fn downgrade(&self) -> WeakStore {
        WeakStore(Rc::downgrade(&self.0))
    }

    pub fn mid(&self) -> &str {
        &self.0.mid
    }
    pub fn config(&self) -> &ModuleConfig {
        &self.0.config
    }
    pub fn effect_ordering(&self) -> EffectOrdering {
        self.0.config.effect_ordering
    }
    /// The current state snapshot.
    pub fn state(&self) -> Snapshot {
        self.0.state.borrow().clone()
    }
    /// Ids of the registered components, in registration order.
    pub fn components(&self) -> Vec<String> {
        self.0.tables.borrow().components.clone()
    }
    pub fn actions(&self) -> ActionTree {
        self.0.tables.borrow().actions.clone()
    }
    /// A bound action creator by dotted name.
    pub fn action(&self, name: &str) -> Option<ActionCreator> {
        self.0.tables.borrow().actions.get(name).cloned()
    }
    pub fn has_reducer(&self, ty: &ActionType) -> bool {
        self.0.tables.borrow().reducers.contains_key(ty)
    }
    pub fn has_effects(&self, ty: &ActionType) -> bool {
        self.0.tables.borrow().effects.contains_key(ty)
    }

    /// A registered selector, or an entry of a composite one when `id` is dotted.
    pub fn selector(&self, id: &str) -> Result<Selector> {
        let tables = self.0.tables.borrow();
        let found = match tables.selectors.get(id) {
            Some(selector) => Some(selector.clone()),
            None => id.split_once('.').and_then(|(head, rest)| {
                let mut selector = tables.selectors.get(head)?;
                for key in rest.split('.') {
                    selector = selector.get(key)?;
                }
                Some(selector.clone())
            }),
        };
        found.ok_or_else(|| Error::UnknownSelector {
            mid: self.mid().to_string(),
            id: id.to_string(),
        })
    }
    pub fn selector_ids(&self) -> Vec<String> {
        self.0.tables.borrow().selectors.keys().cloned().collect()
    }

    pub fn select(&self, id: &str) -> Result<Value> {
        self.select_with(id, &Value::Object(Map::new()))
    }
    pub fn select_with(&self, id: &str, props: &Value) -> Result<Value> {
        let selector = self.selector(id)?;
        Ok(selector.select(&self.state(), props))
    }
    /// Reads the state through an ad hoc function.
    pub fn select_fn<T>(&self, f: impl FnOnce(&Value) -> T) -> T {
        f(&self.state())
    }
    /// Compiles and evaluates an ad hoc selector.
    pub fn select_spec(&self, spec: impl Into<SelectorSpec>, props: Option<&Props>) -> Result<Value> {
        let selector = Selector::compile(spec).map_err(|e| Error::InvalidSelectorSpec {
            mid: self.mid().to_string(),
            cid: "<select>".to_string(),
            reason: e.reason,
        })?;
        Ok(match props {
            Some(props) => selector.select(&self.state(), props),
            None => selector.select(&self.state(), &Value::Object(Map::new())),
        })
    }

    /// Number of subscriptions watching `path`.
    pub fn watcher_count(&self, path: &str) -> usize {
        self.0.registry.borrow().watcher_count(path)
    }
    /// Every path with at least one watcher, sorted.
    pub fn watched_paths(&self) -> Vec<String> {
        self.0.registry.borrow().watched_paths()
    }
    /// Number of distinct conditions with live action subscribers.
    pub fn action_condition_count(&self) -> usize {
        self.0.registry.borrow().condition_count()
    }
}
impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("mid", &self.0.mid)
            .field("state", &self.0.state.borrow())
            .finish_non_exhaustive()
    }
}

#[must_use]
#[derive_ex(Default)]
#[default(Self::new())]
pub struct StoreBuilder {
    config: ModuleConfig,
    hooks: Hooks,
    state: Value,
    engine: Box<dyn DraftEngine>,
    formatter: Box<dyn TypeFormatter>,
}

impl StoreBuilder {
    pub fn new() -> Self {
        Self {
            config: ModuleConfig::default(),
            hooks: Hooks::default(),
            state: Value::Object(Map::new()),
            engine: Box::new(CloneDraft),
            formatter: Box::new(ScreamingSnake),
        }
    }
    pub fn config(mut self, config: ModuleConfig) -> Self {
        self.config = config;
        self
    }
    pub fn mid(mut self, mid: impl Into<String>) -> Self {
        self.config.mid = Some(mid.into());
        self
    }
    pub fn effect_ordering(mut self, ordering: EffectOrdering) -> Self {
        self.config.effect_ordering = ordering;
        self
    }
    pub fn hooks(mut self, hooks: Hooks) -> Self {
        self.hooks = hooks;
        self
    }
    /// State the module starts with, before any component is registered.
    pub fn state(mut self, state: Value) -> Self {
        self.state = state;
        self
    }
    pub fn engine(mut self, engine: impl DraftEngine + 'static) -> Self {
        self.engine = Box::new(engine);
        self
    }
    pub fn formatter(mut self, formatter: impl TypeFormatter + 'static) -> Self {
        self.formatter = Box::new(formatter);
        self
    }
    pub fn build(self) -> Store {
        let mid = self.config.mid.clone().unwrap_or_else(next_module_id);
        tracing::debug!(%mid, "created state module");
        Store(Rc::new(ModuleDescriptor {
            mid,
            config: self.config,
            hooks: self.hooks,
            engine: self.engine,
            formatter: self.formatter,
            state: RefCell::new(Rc::new(self.state)),
            tables: RefCell::new(Tables::default()),
            registry: RefCell::new(Registry::new()),
            pending_effects: RefCell::new(Vec::new()),
            pending_scopes: RefCell::new(Vec::new()),
        }))
    }
}
