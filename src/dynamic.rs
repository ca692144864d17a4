use std::{
    collections::{BTreeSet, HashMap},
    rc::Rc,
};

use serde_json::Value;

use crate::{Props, Selector};


/// A registry change requested while rebinding dynamic paths.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Rebind {
    Watch(String),
    Unwatch(String),
}

/// Per-subscription record of the paths resolved by a selector's dynamic leaves.
///
/// A path stays watched while any dynamic leaf resolves to it, and is never watched
/// through this record when it is also a static child of the selector.
#[derive(Default)]
pub(crate) struct DynamicBindings {
    props: Option<Props>,
    resolved: HashMap<usize, String>,
    counts: HashMap<String, usize>,
}

impl DynamicBindings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn props(&self) -> Option<&Props> {
        self.props.as_ref()
    }

    /// Re-resolves every dynamic leaf of `selector` for `props`.
    ///
    /// Returns `None` without doing anything if `props` is the same `Rc` as last time.
    pub fn update(
        &mut self,
        selector: &Selector,
        props: &Props,
        state: &Value,
    ) -> Option<Vec<Rebind>> {
        if self.props.as_ref().is_some_and(|old| Rc::ptr_eq(old, props)) {
            return None;
        }
        self.props = Some(props.clone());
        let mut rebinds = Vec::new();
        for f in selector.dynamic() {
            let path = f.resolve(props, state).into_string();
            let key = f.key();
            match self.resolved.get(&key) {
                Some(prev) if *prev == path => continue,
                Some(_) => {
                    if let Some(prev) = self.resolved.remove(&key) {
                        self.release(prev, selector, &mut rebinds);
                    }
                }
                None => {}
            }
            self.acquire(&path, selector, &mut rebinds);
            self.resolved.insert(key, path);
        }
        Some(rebinds)
    }

    /// Forgets every resolved path, returning the unwatches needed to undo them.
    pub fn release_all(&mut self, selector: &Selector) -> Vec<Rebind> {
        let mut paths: Vec<_> = self.counts.drain().map(|(path, _)| path).collect();
        paths.sort();
        self.resolved.clear();
        self.props = None;
        paths
            .into_iter()
            .filter(|path| !selector.has_child(path))
            .map(Rebind::Unwatch)
            .collect()
    }

    pub fn count(&self, path: &str) -> usize {
        self.counts.get(path).copied().unwrap_or(0)
    }

    /// Static children plus the currently resolved dynamic paths.
    pub fn watched(&self, selector: &Selector) -> BTreeSet<String> {
        selector
            .children()
            .map(str::to_string)
            .chain(self.counts.keys().cloned())
            .collect()
    }

    fn acquire(&mut self, path: &str, selector: &Selector, rebinds: &mut Vec<Rebind>) {
        let count = self.counts.entry(path.to_string()).or_insert(0);
        *count += 1;
        if *count == 1 && !selector.has_child(path) {
            rebinds.push(Rebind::Watch(path.to_string()));
        }
    }
    fn release(&mut self, path: String, selector: &Selector, rebinds: &mut Vec<Rebind>) {
        let Some(count) = self.counts.get_mut(&path) else {
            return;
        };
        *count -= 1;
        if *count == 0 {
            self.counts.remove(&path);
            if !selector.has_child(&path) {
                rebinds.push(Rebind::Unwatch(path));
            }
        }
    }
}
