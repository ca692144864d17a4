use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    rc::{Rc, Weak},
};

use slabmap::SlabMap;

use crate::{Action, ActionType, ChangedPaths, MemoizedSelect, Symbol};


/// Decides whether an action subscriber is interested in a dispatched action.
#[derive(Clone)]
pub enum ActionCondition {
    Type(ActionType),
    AnyOf(Vec<ActionCondition>),
    Predicate(Rc<dyn Fn(&Action) -> bool>),
}

impl ActionCondition {
    pub fn predicate(f: impl Fn(&Action) -> bool + 'static) -> Self {
        ActionCondition::Predicate(Rc::new(f))
    }
    pub fn any_of<C: Into<ActionCondition>>(conditions: impl IntoIterator<Item = C>) -> Self {
        ActionCondition::AnyOf(conditions.into_iter().map(Into::into).collect())
    }
    pub fn matches(&self, action: &Action) -> bool {
        match self {
            ActionCondition::Type(ty) => action.ty() == ty,
            ActionCondition::AnyOf(conditions) => conditions.iter().any(|c| c.matches(action)),
            ActionCondition::Predicate(f) => f(action),
        }
    }

    /// Identity used to group handlers: equal types, or the very same predicate.
    fn same(&self, other: &Self) -> bool {
        match (self, other) {
            (ActionCondition::Type(a), ActionCondition::Type(b)) => a == b,
            (ActionCondition::AnyOf(a), ActionCondition::AnyOf(b)) => {
                a.len() == b.len() && a.iter().zip(b).all(|(a, b)| a.same(b))
            }
            (ActionCondition::Predicate(a), ActionCondition::Predicate(b)) => Rc::ptr_eq(a, b),
            _ => false,
        }
    }
}
impl fmt::Debug for ActionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionCondition::Type(ty) => write!(f, "{ty}"),
            ActionCondition::AnyOf(conditions) => f.debug_list().entries(conditions).finish(),
            ActionCondition::Predicate(_) => write!(f, "<predicate>"),
        }
    }
}
impl From<&str> for ActionCondition {
    fn from(value: &str) -> Self {
        ActionCondition::Type(value.into())
    }
}
impl From<String> for ActionCondition {
    fn from(value: String) -> Self {
        ActionCondition::Type(value.into())
    }
}
impl From<ActionType> for ActionCondition {
    fn from(value: ActionType) -> Self {
        ActionCondition::Type(value)
    }
}
impl From<Symbol> for ActionCondition {
    fn from(value: Symbol) -> Self {
        ActionCondition::Type(value.into())
    }
}
impl<C: Into<ActionCondition>, const N: usize> From<[C; N]> for ActionCondition {
    fn from(value: [C; N]) -> Self {
        ActionCondition::any_of(value)
    }
}
impl<C: Into<ActionCondition>> From<Vec<C>> for ActionCondition {
    fn from(value: Vec<C>) -> Self {
        ActionCondition::any_of(value)
    }
}

pub(crate) trait ActionSink: 'static {
    fn on_action(self: Rc<Self>, action: &Action);
}

pub(crate) trait UpdateSink: 'static {
    fn on_update(self: Rc<Self>, memo: &mut MemoizedSelect);
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub(crate) struct SinkKey(usize);

enum Sink {
    Action(Weak<dyn ActionSink>),
    Update(Weak<dyn UpdateSink>),
}

struct ConditionEntry {
    condition: ActionCondition,
    keys: Vec<SinkKey>,
}

/// Maps action conditions and state paths to the sinks interested in them.
///
/// Emptied entries are removed immediately, so an entry exists only while it has sinks.
#[derive(Default)]
pub(crate) struct Registry {
    sinks: SlabMap<Sink>,
    actions: Vec<ConditionEntry>,
    updates: HashMap<String, BTreeSet<SinkKey>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_action_sink(&mut self, sink: Weak<dyn ActionSink>) -> SinkKey {
        SinkKey(self.sinks.insert(Sink::Action(sink)))
    }
    pub fn insert_update_sink(&mut self, sink: Weak<dyn UpdateSink>) -> SinkKey {
        SinkKey(self.sinks.insert(Sink::Update(sink)))
    }
    pub fn remove_sink(&mut self, key: SinkKey) {
        self.sinks.remove(key.0);
    }

    pub fn watch_action(&mut self, condition: &ActionCondition, key: SinkKey) {
        if let Some(entry) = self.actions.iter_mut().find(|e| e.condition.same(condition)) {
            if !entry.keys.contains(&key) {
                entry.keys.push(key);
            }
        } else {
            self.actions.push(ConditionEntry {
                condition: condition.clone(),
                keys: vec![key],
            });
        }
    }
    pub fn unwatch_action(&mut self, condition: &ActionCondition, key: SinkKey) {
        if let Some(index) = self.actions.iter().position(|e| e.condition.same(condition)) {
            let entry = &mut self.actions[index];
            entry.keys.retain(|k| *k != key);
            if entry.keys.is_empty() {
                self.actions.remove(index);
            }
        }
    }

    /// Returns `true` if `key` was not already watching `path`.
    pub fn watch_path(&mut self, path: &str, key: SinkKey) -> bool {
        self.updates.entry(path.to_string()).or_default().insert(key)
    }
    /// Returns `true` if `key` was watching `path`.
    pub fn unwatch_path(&mut self, path: &str, key: SinkKey) -> bool {
        let Some(keys) = self.updates.get_mut(path) else {
            return false;
        };
        let removed = keys.remove(&key);
        if keys.is_empty() {
            self.updates.remove(path);
        }
        removed
    }

    pub fn has_action_watchers(&self) -> bool {
        !self.actions.is_empty()
    }
    pub fn has_path_watchers(&self) -> bool {
        !self.updates.is_empty()
    }
    pub fn condition_count(&self) -> usize {
        self.actions.len()
    }
    pub fn watcher_count(&self, path: &str) -> usize {
        self.updates.get(path).map_or(0, |keys| keys.len())
    }
    pub fn watched_paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.updates.keys().cloned().collect();
        paths.sort();
        paths
    }
    pub fn is_watching(&self, path: &str, key: SinkKey) -> bool {
        self.updates.get(path).is_some_and(|keys| keys.contains(&key))
    }

    /// Sinks whose condition matches `action`, in registration order.
    pub fn action_sinks(&self, action: &Action) -> Vec<Rc<dyn ActionSink>> {
        let mut sinks = Vec::new();
        for entry in &self.actions {
            if entry.condition.matches(action) {
                for key in &entry.keys {
                    if let Some(Sink::Action(sink)) = self.sinks.get(key.0) {
                        if let Some(sink) = sink.upgrade() {
                            sinks.push(sink);
                        }
                    }
                }
            }
        }
        sinks
    }

    /// Sinks watching at least one of the `changed` paths, each listed once.
    pub fn update_sinks(&self, changed: &ChangedPaths) -> Vec<Rc<dyn UpdateSink>> {
        self.changed_keys(changed)
            .into_iter()
            .filter_map(|key| match self.sinks.get(key.0) {
                Some(Sink::Update(sink)) => sink.upgrade(),
                _ => None,
            })
            .collect()
    }

    fn changed_keys(&self, changed: &ChangedPaths) -> BTreeSet<SinkKey> {
        if changed.len() >= self.updates.len() {
            self.keys_by_watched(changed)
        } else {
            self.keys_by_changed(changed)
        }
    }
    fn keys_by_watched(&self, changed: &ChangedPaths) -> BTreeSet<SinkKey> {
        let mut keys = BTreeSet::new();
        for (path, watchers) in &self.updates {
            if changed.contains(path) {
                keys.extend(watchers.iter().copied());
            }
        }
        keys
    }
    fn keys_by_changed(&self, changed: &ChangedPaths) -> BTreeSet<SinkKey> {
        let mut keys = BTreeSet::new();
        for path in changed {
            if let Some(watchers) = self.updates.get(path) {
                keys.extend(watchers.iter().copied());
            }
        }
        keys
    }
}
