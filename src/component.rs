use std::{cell::RefCell, collections::BTreeMap, future::Future, rc::Rc};

use futures::{future::LocalBoxFuture, FutureExt};
use serde_json::Value;

use crate::{
    actions::ActionBinding, effect::EffectFn, Action, ActionCondition, ActionSpec, ActionType,
    Effect, EffectContext, Error, ModuleContext, Result, Selector, SelectorSpec, StatePath, Store,
};

#[cfg(test)]
mod tests;

pub type Reducer = Rc<dyn Fn(&ModuleContext, &Action, &mut Value) -> Result<()>>;
pub type Helper = Rc<dyn Fn(&mut Value, &[Value]) -> Result<Value>>;

type ScopeResult = std::result::Result<Value, Box<dyn std::error::Error>>;
type ScopeLoader = Box<dyn FnOnce() -> LocalBoxFuture<'static, ScopeResult>>;
type OnLoad = Box<dyn FnOnce(&ModuleContext)>;

/// A unit of registration: state, actions, reducers, selectors, helpers and effects
/// contributed to a module under one id.
#[must_use]
pub struct Component {
    id: String,
    prefix: Option<String>,
    scope_id: Option<String>,
    state: Option<Value>,
    actions: BTreeMap<String, ActionSpec>,
    reducers: Vec<(String, Reducer)>,
    selectors: Vec<(String, SelectorSpec)>,
    helpers: Vec<(String, Helper)>,
    effects: BTreeMap<String, EffectFn>,
    routes: Vec<(String, String)>,
    scope: Option<ScopeLoader>,
    loads_on_action: Option<ActionCondition>,
    on_load: Option<OnLoad>,
}

impl Component {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            prefix: None,
            scope_id: None,
            state: None,
            actions: BTreeMap::new(),
            reducers: Vec::new(),
            selectors: Vec::new(),
            helpers: Vec::new(),
            effects: BTreeMap::new(),
            routes: Vec::new(),
            scope: None,
            loads_on_action: None,
            on_load: None,
        }
    }
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Prefix of every action type declared by this component.
    pub fn prefix(mut self, prefix: impl Into<String>) -> Self {
        self.prefix = Some(prefix.into());
        self
    }
    /// Initial state, merged into the module state.
    pub fn state(mut self, state: Value) -> Self {
        self.state = Some(state);
        self
    }
    pub fn action(mut self, name: impl Into<String>, spec: ActionSpec) -> Self {
        self.actions.insert(name.into(), spec);
        self
    }
    pub fn reducer(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&ModuleContext, &Action, &mut Value) -> Result<()> + 'static,
    ) -> Self {
        self.reducers.push((name.into(), Rc::new(f)));
        self
    }
    pub fn selector(mut self, id: impl Into<String>, spec: impl Into<SelectorSpec>) -> Self {
        self.selectors.push((id.into(), spec.into()));
        self
    }
    pub fn helper(
        mut self,
        name: impl Into<String>,
        f: impl Fn(&mut Value, &[Value]) -> Result<Value> + 'static,
    ) -> Self {
        self.helpers.push((name.into(), Rc::new(f)));
        self
    }
    pub fn effect(
        mut self,
        name: impl Into<String>,
        f: impl Fn(EffectContext, Action) -> Effect + 'static,
    ) -> Self {
        self.effects.insert(name.into(), Rc::new(f));
        self
    }
    /// Runs the effect named `effect` whenever the action named `action` is dispatched.
    pub fn route(mut self, action: impl Into<String>, effect: impl Into<String>) -> Self {
        self.routes.push((action.into(), effect.into()));
        self
    }
    /// Asynchronous loader of the component scope, awaited by [`Store::resolve`].
    pub fn scope<F, Fut>(mut self, f: F) -> Self
    where
        F: FnOnce() -> Fut + 'static,
        Fut: Future<Output = ScopeResult> + 'static,
    {
        self.scope = Some(Box::new(move || f().boxed_local()));
        self
    }
    /// Key of the loaded scope. Defaults to the component id.
    pub fn scope_id(mut self, id: impl Into<String>) -> Self {
        self.scope_id = Some(id.into());
        self
    }
    /// Defers routes and scope until an action matching `condition` is dispatched.
    pub fn loads_on_action(mut self, condition: impl Into<ActionCondition>) -> Self {
        self.loads_on_action = Some(condition.into());
        self
    }
    /// Called once the routes of the component are registered.
    pub fn on_load(mut self, f: impl FnOnce(&ModuleContext) + 'static) -> Self {
        self.on_load = Some(Box::new(f));
        self
    }
}

/// The parts of a component registered after its scope has loaded.
struct Deferred {
    cid: String,
    scope_id: String,
    scope: Option<ScopeLoader>,
    routes: Vec<(ActionType, EffectFn)>,
    on_load: Option<OnLoad>,
}

impl Store {
    /// Registers a component. Nothing is registered if any part of it is rejected.
    pub fn component(&self, component: Component) -> Result<()> {
        let Component {
            id: cid,
            prefix,
            scope_id,
            state,
            actions,
            reducers,
            selectors,
            helpers,
            effects,
            routes,
            scope,
            loads_on_action,
            on_load,
        } = component;
        let mid = self.mid().to_string();
        if self.0.tables.borrow().components.contains(&cid) {
            return Err(Error::DuplicateComponent { mid, cid });
        }
        let format = |name: &str| ActionType::from(self.0.formatter.format(prefix.as_deref(), name));

        let state = match state {
            Some(state) if !is_empty_state(&state) => {
                let mut next = Value::clone(&self.state());
                merge_state(&mut next, state, &StatePath::default())
                    .map_err(|path| Error::StateCollision {
                        mid: mid.clone(),
                        cid: cid.clone(),
                        path: path.into_string(),
                    })?;
                Some(Rc::new(next))
            }
            Some(_) => {
                tracing::warn!(%mid, %cid, "component registered an empty state");
                None
            }
            None => None,
        };

        let mut routed = Vec::new();
        for (action, effect) in routes {
            let Some(f) = effects.get(&effect) else {
                return Err(Error::MissingRoute {
                    mid,
                    cid,
                    route: action,
                    effect,
                });
            };
            routed.push((format(&action), f.clone()));
        }

        let mut compiled = BTreeMap::new();
        let mut helper_table = BTreeMap::new();
        let action_tree = {
            let tables = self.0.tables.borrow();
            for (id, spec) in selectors {
                if tables.selectors.contains_key(&id) || compiled.contains_key(&id) {
                    return Err(Error::DuplicateSelector { mid, id });
                }
                let selector =
                    Selector::compile(spec).map_err(|e| Error::InvalidSelectorSpec {
                        mid: mid.clone(),
                        cid: cid.clone(),
                        reason: e.reason,
                    })?;
                compiled.insert(id, selector);
            }
            for (name, helper) in helpers {
                if tables.helpers.contains_key(&name) || helper_table.contains_key(&name) {
                    return Err(Error::DuplicateHelper { mid, cid, name });
                }
                helper_table.insert(name, helper);
            }
            let mut tree = tables.actions.clone();
            tree.insert(
                &actions,
                &ActionBinding {
                    store: self.downgrade(),
                    mid: mid.as_str().into(),
                    cid: cid.as_str().into(),
                    format: &format,
                },
            )?;
            tree
        };

        {
            let mut tables = self.0.tables.borrow_mut();
            tables.components.push(cid.clone());
            tables.actions = action_tree;
            tables.selectors.extend(compiled);
            tables.helpers.extend(helper_table);
            for (name, reducer) in reducers {
                tables.reducers.entry(format(&name)).or_default().push(reducer);
            }
        }
        if let Some(state) = state {
            *self.0.state.borrow_mut() = state;
        }
        tracing::debug!(%mid, %cid, "registered component");

        let deferred = Deferred {
            scope_id: scope_id.unwrap_or_else(|| cid.clone()),
            cid,
            scope,
            routes: routed,
            on_load,
        };
        match loads_on_action {
            Some(condition) => {
                let store = self.downgrade();
                let deferred = RefCell::new(Some(deferred));
                let subscription =
                    self.subscribe_to_action(condition)
                        .once()
                        .subscribe(move |_: &Action| {
                            let deferred = deferred.borrow_mut().take();
                            if let (Some(store), Some(deferred)) = (store.upgrade(), deferred) {
                                store.prune_deferred();
                                store.load(deferred);
                            }
                        });
                self.0.tables.borrow_mut().deferred.push(subscription);
            }
            None => self.load(deferred),
        }
        Ok(())
    }

    /// Same as [`Store::component`].
    pub fn create(&self, component: Component) -> Result<()> {
        self.component(component)
    }

    /// Awaits every pending scope load, returning how many completed.
    ///
    /// Loads queued while waiting are awaited too. The first failure is returned
    /// after all loads have settled.
    pub async fn resolve(&self) -> Result<usize> {
        let mut loaded = 0;
        let mut first_err = None;
        loop {
            let pending = std::mem::take(&mut *self.0.pending_scopes.borrow_mut());
            if pending.is_empty() {
                break;
            }
            for result in futures::future::join_all(pending).await {
                match result {
                    Ok(()) => loaded += 1,
                    Err(e) if first_err.is_none() => first_err = Some(e),
                    Err(e) => tracing::error!(mid = self.mid(), error = %e, "scope load failed"),
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(loaded),
        }
    }

    /// Number of scope loads waiting for [`Store::resolve`].
    pub fn pending_scopes(&self) -> usize {
        self.0.pending_scopes.borrow().len()
    }

    fn load(&self, mut deferred: Deferred) {
        let Some(scope) = deferred.scope.take() else {
            self.finish_load(deferred);
            return;
        };
        let store = self.downgrade();
        let mid = self.mid().to_string();
        let fut = async move {
            let value = scope().await.map_err(|source| Error::ScopeLoadFailure {
                mid: mid.clone(),
                scope: deferred.scope_id.clone(),
                source,
            })?;
            let store = store.upgrade().ok_or(Error::ModuleDropped { mid })?;
            store
                .0
                .tables
                .borrow_mut()
                .scopes
                .insert(deferred.scope_id.clone(), value);
            store.finish_load(deferred);
            Ok(())
        };
        self.0.pending_scopes.borrow_mut().push(fut.boxed_local());
    }

    /// Drops the handles of deferred loads that have fired or been cancelled.
    fn prune_deferred(&self) {
        let done: Vec<_> = {
            let mut tables = self.0.tables.borrow_mut();
            let (live, done) = std::mem::take(&mut tables.deferred)
                .into_iter()
                .partition(|s| s.is_attached());
            tables.deferred = live;
            done
        };
        drop(done);
    }

    fn finish_load(&self, deferred: Deferred) {
        let Deferred {
            cid,
            routes,
            on_load,
            ..
        } = deferred;
        {
            let mut tables = self.0.tables.borrow_mut();
            for (ty, effect) in routes {
                tables.effects.entry(ty).or_default().push(effect);
            }
        }
        tracing::trace!(mid = self.mid(), %cid, "component loaded");
        if let Some(on_load) = on_load {
            on_load(&ModuleContext::new(self));
        }
    }

    pub fn scope(&self, id: &str) -> Option<Value> {
        self.0.tables.borrow().scopes.get(id).cloned()
    }
}

fn is_empty_state(state: &Value) -> bool {
    match state {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

/// Merges `incoming` into `target`, returning the path of the first collision.
///
/// Objects merge key by key. Any other value may only meet an equal value.
fn merge_state(
    target: &mut Value,
    incoming: Value,
    at: &StatePath,
) -> std::result::Result<(), StatePath> {
    match (target, incoming) {
        (Value::Object(target), Value::Object(incoming)) => {
            for (key, value) in incoming {
                match target.get_mut(&key) {
                    Some(existing) => merge_state(existing, value, &at.join(&key))?,
                    None => {
                        target.insert(key, value);
                    }
                }
            }
            Ok(())
        }
        (target, incoming) if *target == incoming => Ok(()),
        _ => Err(at.clone()),
    }
}
