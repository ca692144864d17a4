use std::{
    cell::{Cell, RefCell},
    collections::{BTreeSet, HashMap},
    rc::{Rc, Weak},
};

use parse_display::{Display, FromStr};
use serde_json::{Map, Value};

use crate::{
    dynamic::{DynamicBindings, Rebind},
    registry::{ActionSink, SinkKey, UpdateSink},
    Action, ActionCondition, ActionType, Error, Props, Result, Selector, SelectorSpec, Snapshot,
    Store, WeakStore,
};


/// Receives the values pushed by a subscription.
pub trait Observer<T: ?Sized> {
    fn next(&mut self, value: &T);
    fn complete(&mut self) {}
}
impl<T: ?Sized, F: FnMut(&T)> Observer<T> for F {
    fn next(&mut self, value: &T) {
        self(value)
    }
}

/// Builds an observer from a `next` callback, see [`FnObserver::on_complete`].
pub fn observer<T: ?Sized, N: FnMut(&T)>(next: N) -> FnObserver<N, fn()> {
    FnObserver {
        next,
        complete: || {},
    }
}

pub struct FnObserver<N, C> {
    next: N,
    complete: C,
}
impl<N, C> FnObserver<N, C> {
    pub fn on_complete<C2: FnMut()>(self, complete: C2) -> FnObserver<N, C2> {
        FnObserver {
            next: self.next,
            complete,
        }
    }
}
impl<T: ?Sized, N: FnMut(&T), C: FnMut()> Observer<T> for FnObserver<N, C> {
    fn next(&mut self, value: &T) {
        (self.next)(value)
    }
    fn complete(&mut self) {
        (self.complete)()
    }
}

/// Selector reads shared by every subscriber notified for one state change.
///
/// Each selector is evaluated at most once per props value.
pub struct MemoizedSelect {
    state: Snapshot,
    memo: HashMap<(usize, usize), Memo>,
    evaluations: usize,
}

/// A cached read. Holds the selector and props it is keyed by, so their addresses
/// cannot be reused while the cache lives.
struct Memo {
    _selector: Selector,
    _props: Option<Props>,
    value: Value,
}

impl MemoizedSelect {
    pub(crate) fn new(state: Snapshot) -> Self {
        Self {
            state,
            memo: HashMap::new(),
            evaluations: 0,
        }
    }
    pub fn state(&self) -> &Snapshot {
        &self.state
    }
    pub fn get_state(&mut self, selector: &Selector, props: &Props) -> Value {
        let held = selector.is_dynamic().then(|| props.clone());
        let props_key = held.as_ref().map_or(0, |p| Rc::as_ptr(p) as usize);
        let key = (selector.key(), props_key);
        if let Some(memo) = self.memo.get(&key) {
            return memo.value.clone();
        }
        self.evaluations += 1;
        let value = selector.select(&self.state, props);
        self.memo.insert(
            key,
            Memo {
                _selector: selector.clone(),
                _props: held,
                value: value.clone(),
            },
        );
        value
    }
    /// Number of selector evaluations that were not served from the cache.
    pub fn evaluations(&self) -> usize {
        self.evaluations
    }
}

fn empty_props() -> Props {
    Rc::new(Value::Object(Map::new()))
}

struct ObserverSlot<T: ?Sized> {
    closed: Cell<bool>,
    observer: RefCell<Option<Box<dyn Observer<T>>>>,
}

impl<T: ?Sized> ObserverSlot<T> {
    fn new(observer: impl Observer<T> + 'static) -> Self {
        Self {
            closed: Cell::new(false),
            observer: RefCell::new(Some(Box::new(observer))),
        }
    }
    fn is_closed(&self) -> bool {
        self.closed.get()
    }
    fn next(&self, value: &T) {
        if self.closed.get() {
            return;
        }
        // `None` while the observer is already running, which drops re-entrant values.
        let Some(mut o) = self.observer.borrow_mut().take() else {
            return;
        };
        o.next(value);
        if self.closed.get() {
            o.complete();
        } else {
            *self.observer.borrow_mut() = Some(o);
        }
    }
    fn close(&self) {
        if self.closed.replace(true) {
            return;
        }
        let o = self.observer.borrow_mut().take();
        if let Some(mut o) = o {
            o.complete();
        }
    }
}

struct ActionWatch {
    store: WeakStore,
    condition: ActionCondition,
    once: bool,
    key: Cell<Option<SinkKey>>,
    slot: ObserverSlot<Action>,
}

impl ActionWatch {
    fn detach(&self) {
        let Some(key) = self.key.take() else {
            return;
        };
        if let Some(store) = self.store.upgrade() {
            let mut registry = store.0.registry.borrow_mut();
            registry.unwatch_action(&self.condition, key);
            registry.remove_sink(key);
        }
    }
    fn cancel(&self) {
        self.detach();
        self.slot.close();
    }
}
impl ActionSink for ActionWatch {
    fn on_action(self: Rc<Self>, action: &Action) {
        if self.slot.is_closed() {
            return;
        }
        if self.once {
            self.detach();
        }
        self.slot.next(action);
        if self.once {
            self.slot.close();
        }
    }
}

struct SelectorWatch {
    store: WeakStore,
    selector: Selector,
    once: bool,
    key: Cell<Option<SinkKey>>,
    bindings: RefCell<DynamicBindings>,
    slot: ObserverSlot<Value>,
}

impl SelectorWatch {
    fn props(&self) -> Props {
        self.bindings
            .borrow()
            .props()
            .cloned()
            .unwrap_or_else(empty_props)
    }
    fn set_props(&self, props: Props) -> bool {
        let Some(key) = self.key.get() else {
            return false;
        };
        let Some(store) = self.store.upgrade() else {
            return false;
        };
        let state = store.state();
        let mut bindings = self.bindings.take();
        let rebinds = bindings.update(&self.selector, &props, &state);
        *self.bindings.borrow_mut() = bindings;
        let Some(rebinds) = rebinds else {
            return false;
        };
        let mut registry = store.0.registry.borrow_mut();
        for rebind in rebinds {
            tracing::trace!(mid = store.mid(), ?rebind, "rebinding dynamic selector");
            match rebind {
                Rebind::Watch(path) => registry.watch_path(&path, key),
                Rebind::Unwatch(path) => registry.unwatch_path(&path, key),
            };
        }
        true
    }
    fn detach(&self) {
        let Some(key) = self.key.take() else {
            return;
        };
        let rebinds = self.bindings.borrow_mut().release_all(&self.selector);
        if let Some(store) = self.store.upgrade() {
            let mut registry = store.0.registry.borrow_mut();
            for path in self.selector.children() {
                registry.unwatch_path(path, key);
            }
            for rebind in rebinds {
                if let Rebind::Unwatch(path) = rebind {
                    registry.unwatch_path(&path, key);
                }
            }
            registry.remove_sink(key);
        }
    }
    fn cancel(&self) {
        self.detach();
        self.slot.close();
    }
}
impl UpdateSink for SelectorWatch {
    fn on_update(self: Rc<Self>, memo: &mut MemoizedSelect) {
        if self.slot.is_closed() {
            return;
        }
        let value = memo.get_state(&self.selector, &self.props());
        if self.once {
            self.detach();
        }
        self.slot.next(&value);
        if self.once {
            self.slot.close();
        }
    }
}

/// Builder returned by [`Store::subscribe_to_action`].
#[must_use]
pub struct ActionSubscriber {
    store: Store,
    condition: ActionCondition,
    once: bool,
}

impl ActionSubscriber {
    /// Completes the subscription after the first matching action.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
    pub fn subscribe(self, observer: impl Observer<Action> + 'static) -> ActionSubscription {
        let node = Rc::new(ActionWatch {
            store: self.store.downgrade(),
            condition: self.condition,
            once: self.once,
            key: Cell::new(None),
            slot: ObserverSlot::new(observer),
        });
        let mut registry = self.store.0.registry.borrow_mut();
        let key = registry.insert_action_sink(Rc::downgrade(&node) as Weak<dyn ActionSink>);
        registry.watch_action(&node.condition, key);
        node.key.set(Some(key));
        ActionSubscription(node)
    }
}

/// Builder returned by [`Store::subscribe_to_selector`].
#[must_use]
pub struct SelectorSubscriber {
    store: Store,
    selector: Selector,
    once: bool,
    props: Option<Props>,
}

impl SelectorSubscriber {
    /// Completes the subscription after the first notification.
    pub fn once(mut self) -> Self {
        self.once = true;
        self
    }
    /// Props applied as soon as the subscription is live.
    pub fn with_props(mut self, props: impl Into<Props>) -> Self {
        self.props = Some(props.into());
        self
    }
    pub fn subscribe(self, observer: impl Observer<Value> + 'static) -> SelectorSubscription {
        let node = Rc::new(SelectorWatch {
            store: self.store.downgrade(),
            selector: self.selector,
            once: self.once,
            key: Cell::new(None),
            bindings: RefCell::new(DynamicBindings::new()),
            slot: ObserverSlot::new(observer),
        });
        {
            let mut registry = self.store.0.registry.borrow_mut();
            let key = registry.insert_update_sink(Rc::downgrade(&node) as Weak<dyn UpdateSink>);
            for path in node.selector.children() {
                registry.watch_path(path, key);
            }
            node.key.set(Some(key));
        }
        if let Some(props) = self.props {
            node.set_props(props);
        }
        SelectorSubscription(node)
    }
}

/// A live action subscription. Dropping it cancels the subscription.
#[must_use]
pub struct ActionSubscription(Rc<ActionWatch>);

impl ActionSubscription {
    pub fn condition(&self) -> &ActionCondition {
        &self.0.condition
    }
    pub fn is_closed(&self) -> bool {
        self.0.slot.is_closed()
    }
    /// `false` once the subscription has left the registry, even if its observer
    /// is still running.
    pub(crate) fn is_attached(&self) -> bool {
        self.0.key.get().is_some()
    }
    /// Stops delivery and completes the observer. Calling it again does nothing.
    pub fn cancel(&self) {
        self.0.cancel();
    }
    pub fn unsubscribe(&self) {
        self.cancel();
    }
}
impl Drop for ActionSubscription {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

/// A live selector subscription. Dropping it cancels the subscription.
#[must_use]
pub struct SelectorSubscription(Rc<SelectorWatch>);

impl SelectorSubscription {
    pub fn selector(&self) -> &Selector {
        &self.0.selector
    }
    pub fn is_closed(&self) -> bool {
        self.0.slot.is_closed()
    }

    /// Re-resolves the dynamic paths of the selector for `props`.
    ///
    /// Returns `false` if the subscription is closed or `props` is the same `Rc`
    /// that was applied last time.
    pub fn set_selector_props(&self, props: impl Into<Props>) -> bool {
        self.0.set_props(props.into())
    }

    /// Evaluates the selector against the current state, with `props` or the last applied ones.
    pub fn selector_state(&self, props: Option<&Props>) -> Value {
        let props = props.cloned().unwrap_or_else(|| self.0.props());
        match self.0.store.upgrade() {
            Some(store) => self.0.selector.select(&store.state(), &props),
            None => Value::Null,
        }
    }

    /// Paths this subscription currently watches.
    pub fn watched_paths(&self) -> BTreeSet<String> {
        if self.is_closed() {
            return BTreeSet::new();
        }
        self.0.bindings.borrow().watched(&self.0.selector)
    }

    pub fn cancel(&self) {
        self.0.cancel();
    }
    pub fn unsubscribe(&self) {
        self.cancel();
    }
}
impl Drop for SelectorSubscription {
    fn drop(&mut self) {
        self.0.cancel();
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Display, FromStr)]
#[display(style = "lowercase")]
pub enum SubscriptionKind {
    Action,
    Selector,
}

/// A subscriber chosen by kind name, delivering JSON values.
#[must_use]
pub enum Subscriber {
    Action(ActionSubscriber),
    Selector(SelectorSubscriber),
}

impl Subscriber {
    pub fn kind(&self) -> SubscriptionKind {
        match self {
            Subscriber::Action(_) => SubscriptionKind::Action,
            Subscriber::Selector(_) => SubscriptionKind::Selector,
        }
    }
    pub fn once(self) -> Self {
        match self {
            Subscriber::Action(s) => Subscriber::Action(s.once()),
            Subscriber::Selector(s) => Subscriber::Selector(s.once()),
        }
    }
    /// Actions are delivered as their JSON rendering, see [`Action::to_value`].
    pub fn subscribe(self, observer: impl Observer<Value> + 'static) -> Subscription {
        match self {
            Subscriber::Action(s) => Subscription::Action(s.subscribe(AsJson(observer))),
            Subscriber::Selector(s) => Subscription::Selector(s.subscribe(observer)),
        }
    }
}

struct AsJson<O>(O);

impl<O: Observer<Value>> Observer<Action> for AsJson<O> {
    fn next(&mut self, value: &Action) {
        self.0.next(&value.to_value())
    }
    fn complete(&mut self) {
        self.0.complete()
    }
}

#[must_use]
pub enum Subscription {
    Action(ActionSubscription),
    Selector(SelectorSubscription),
}

impl Subscription {
    pub fn is_closed(&self) -> bool {
        match self {
            Subscription::Action(s) => s.is_closed(),
            Subscription::Selector(s) => s.is_closed(),
        }
    }
    pub fn cancel(&self) {
        match self {
            Subscription::Action(s) => s.cancel(),
            Subscription::Selector(s) => s.cancel(),
        }
    }
    pub fn unsubscribe(&self) {
        self.cancel();
    }
}

impl Store {
    pub fn subscribe_to_action(&self, condition: impl Into<ActionCondition>) -> ActionSubscriber {
        ActionSubscriber {
            store: self.clone(),
            condition: condition.into(),
            once: false,
        }
    }

    pub fn subscribe_to_selector(
        &self,
        spec: impl Into<SelectorSpec>,
    ) -> Result<SelectorSubscriber> {
        let selector = Selector::compile(spec).map_err(|e| Error::InvalidSelectorSpec {
            mid: self.mid().to_string(),
            cid: "<subscription>".to_string(),
            reason: e.reason,
        })?;
        Ok(SelectorSubscriber {
            store: self.clone(),
            selector,
            once: false,
            props: None,
        })
    }

    /// Subscribes by kind name: `"action"` with a type or list of types, or `"selector"`
    /// with a registered selector id or a JSON selector spec.
    pub fn subscribe(&self, kind: &str, target: &Value) -> Result<Subscriber> {
        let kind: SubscriptionKind = kind.parse().map_err(|_| Error::InvalidSubscriptionKind {
            mid: self.mid().to_string(),
            kind: kind.to_string(),
        })?;
        match kind {
            SubscriptionKind::Action => {
                let condition = self.condition_from_value(target)?;
                Ok(Subscriber::Action(self.subscribe_to_action(condition)))
            }
            SubscriptionKind::Selector => {
                if let Some(selector) = target.as_str().and_then(|id| self.selector(id).ok()) {
                    return Ok(Subscriber::Selector(self.subscribe_to_selector(selector)?));
                }
                let spec = SelectorSpec::from_value(target).map_err(|e| {
                    Error::InvalidSelectorSpec {
                        mid: self.mid().to_string(),
                        cid: "<subscription>".to_string(),
                        reason: e.reason,
                    }
                })?;
                Ok(Subscriber::Selector(self.subscribe_to_selector(spec)?))
            }
        }
    }

    fn condition_from_value(&self, value: &Value) -> Result<ActionCondition> {
        let invalid = || Error::InvalidActionType {
            mid: self.mid().to_string(),
            found: value.to_string(),
        };
        match value {
            Value::Array(items) => items
                .iter()
                .map(|item| ActionType::from_value(item).ok_or_else(invalid))
                .collect::<Result<Vec<_>>>()
                .map(ActionCondition::any_of),
            _ => ActionType::from_value(value)
                .map(ActionCondition::Type)
                .ok_or_else(invalid),
        }
    }
}
