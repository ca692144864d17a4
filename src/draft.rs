use std::{collections::BTreeSet, rc::Rc};

use serde::Serialize;
use serde_json::Value;

use crate::{Result, StatePath};


/// An immutable state snapshot. Identity is `Rc::ptr_eq`.
pub type Snapshot = Rc<Value>;

/// The dot-joined paths that differ between two snapshots.
///
/// Every changed location is listed together with all of its ancestors.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ChangedPaths(BTreeSet<String>);

impl ChangedPaths {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn contains(&self, path: &str) -> bool {
        self.0.contains(path)
    }
    pub fn len(&self) -> usize {
        self.0.len()
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|s| s.as_str())
    }
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
    fn insert(&mut self, path: &StatePath) {
        if !path.is_root() {
            self.0.insert(path.as_str().to_string());
        }
    }
}
impl<'a> IntoIterator for &'a ChangedPaths {
    type Item = &'a String;
    type IntoIter = std::collections::btree_set::Iter<'a, String>;
    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
impl<S: Into<String>> FromIterator<S> for ChangedPaths {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

/// Result of [`DraftEngine::produce`].
#[derive(Debug)]
pub struct Produced {
    pub snapshot: Snapshot,
    /// `None` if the recipe left the state unchanged, in which case `snapshot` is the base itself.
    pub changed: Option<ChangedPaths>,
}

impl Produced {
    pub fn is_changed(&self) -> bool {
        self.changed.is_some()
    }
}

/// Produces a new snapshot from a mutation applied to a draft of the current one.
///
/// Implementations must return the base snapshot itself when nothing changed, and must
/// either commit the whole draft or none of it when the recipe fails.
pub trait DraftEngine {
    fn produce(
        &self,
        base: &Snapshot,
        recipe: &mut dyn FnMut(&mut Value) -> Result<()>,
    ) -> Result<Produced>;
}

/// Drafts by deep cloning the base and diffing the result.
#[derive(Clone, Copy, Debug, Default)]
pub struct CloneDraft;

impl DraftEngine for CloneDraft {
    fn produce(
        &self,
        base: &Snapshot,
        recipe: &mut dyn FnMut(&mut Value) -> Result<()>,
    ) -> Result<Produced> {
        let mut draft = Value::clone(base);
        recipe(&mut draft)?;
        let changed = diff(base, &draft);
        if changed.is_empty() {
            Ok(Produced {
                snapshot: base.clone(),
                changed: None,
            })
        } else {
            Ok(Produced {
                snapshot: Rc::new(draft),
                changed: Some(changed),
            })
        }
    }
}

/// Lists the paths that differ between `prev` and `next`.
///
/// When a subtree appears, disappears or changes kind, every path inside it is listed.
pub fn diff(prev: &Value, next: &Value) -> ChangedPaths {
    let mut changed = ChangedPaths::new();
    diff_at(prev, next, &StatePath::default(), &mut changed);
    changed
}

fn diff_at(prev: &Value, next: &Value, path: &StatePath, out: &mut ChangedPaths) -> bool {
    if prev == next {
        return false;
    }
    match (prev, next) {
        (Value::Object(p), Value::Object(n)) => {
            for (key, p_value) in p {
                let child = path.join(key);
                match n.get(key) {
                    Some(n_value) => {
                        diff_at(p_value, n_value, &child, out);
                    }
                    None => mark_all(p_value, &child, out),
                }
            }
            for (key, n_value) in n {
                if !p.contains_key(key) {
                    mark_all(n_value, &path.join(key), out);
                }
            }
        }
        (Value::Array(p), Value::Array(n)) => {
            for i in 0..p.len().max(n.len()) {
                let child = path.join(&i.to_string());
                match (p.get(i), n.get(i)) {
                    (Some(p_value), Some(n_value)) => {
                        diff_at(p_value, n_value, &child, out);
                    }
                    (Some(value), None) | (None, Some(value)) => mark_all(value, &child, out),
                    (None, None) => {}
                }
            }
        }
        _ => {
            mark_all(prev, path, out);
            mark_all(next, path, out);
        }
    }
    out.insert(path);
    true
}

fn mark_all(value: &Value, path: &StatePath, out: &mut ChangedPaths) {
    out.insert(path);
    match value {
        Value::Object(map) => {
            for (key, value) in map {
                mark_all(value, &path.join(key), out);
            }
        }
        Value::Array(items) => {
            for (i, value) in items.iter().enumerate() {
                mark_all(value, &path.join(&i.to_string()), out);
            }
        }
        _ => {}
    }
}
