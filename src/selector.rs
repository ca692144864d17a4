use std::{collections::BTreeMap, collections::BTreeSet, fmt, rc::Rc};

use parse_display::Display;
use serde_json::{Map, Value};

use crate::{path, StatePath};

#[cfg(test)]
mod tests;

/// Props supplied by a subscriber. Compared by identity.
pub type Props = Rc<Value>;

/// A selector leaf whose path is computed from subscriber props and the current state.
#[derive(Clone)]
pub struct DynamicPath(Rc<dyn Fn(&Value, &Value) -> StatePath>);

impl DynamicPath {
    pub fn new<P: Into<StatePath>>(f: impl Fn(&Value, &Value) -> P + 'static) -> Self {
        Self(Rc::new(move |props, state| f(props, state).into()))
    }
    pub fn resolve(&self, props: &Value, state: &Value) -> StatePath {
        (self.0)(props, state)
    }
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.0).cast::<()>() as usize
    }
}
impl PartialEq for DynamicPath {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}
impl fmt::Debug for DynamicPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DynamicPath({:#x})", self.key())
    }
}

/// Describes which parts of the state a reader wants.
pub enum SelectorSpec {
    Path(StatePath),
    Dynamic(DynamicPath),
    Composite(BTreeMap<String, SelectorSpec>),
    Compiled(Selector),
}

impl SelectorSpec {
    pub fn dynamic<P: Into<StatePath>>(f: impl Fn(&Value, &Value) -> P + 'static) -> Self {
        SelectorSpec::Dynamic(DynamicPath::new(f))
    }
    pub fn composite<K, S>(entries: impl IntoIterator<Item = (K, S)>) -> Self
    where
        K: Into<String>,
        S: Into<SelectorSpec>,
    {
        SelectorSpec::Composite(
            entries
                .into_iter()
                .map(|(k, s)| (k.into(), s.into()))
                .collect(),
        )
    }

    /// Reads a spec from JSON: strings and string arrays are paths, objects are composites.
    pub fn from_value(value: &Value) -> Result<Self, SpecError> {
        match value {
            Value::String(s) => Ok(SelectorSpec::Path(StatePath::new(s.as_str()))),
            Value::Array(items) => {
                let mut segments = Vec::with_capacity(items.len());
                for item in items {
                    let Value::String(s) = item else {
                        return Err(SpecError::new(format!(
                            "selector path segments must be strings, got {item}"
                        )));
                    };
                    segments.push(s.as_str());
                }
                Ok(SelectorSpec::Path(StatePath::from_segments(segments)))
            }
            Value::Object(map) => Ok(SelectorSpec::Composite(
                map.iter()
                    .map(|(k, v)| Ok((k.clone(), Self::from_value(v)?)))
                    .collect::<Result<_, SpecError>>()?,
            )),
            other => Err(SpecError::new(format!(
                "selector must be a string, array or plain object but got {other}"
            ))),
        }
    }
}
impl From<&str> for SelectorSpec {
    fn from(value: &str) -> Self {
        SelectorSpec::Path(value.into())
    }
}
impl From<String> for SelectorSpec {
    fn from(value: String) -> Self {
        SelectorSpec::Path(value.into())
    }
}
impl From<StatePath> for SelectorSpec {
    fn from(value: StatePath) -> Self {
        SelectorSpec::Path(value)
    }
}
impl<S: AsRef<str>, const N: usize> From<[S; N]> for SelectorSpec {
    fn from(value: [S; N]) -> Self {
        SelectorSpec::Path(StatePath::from_segments(value))
    }
}
impl From<DynamicPath> for SelectorSpec {
    fn from(value: DynamicPath) -> Self {
        SelectorSpec::Dynamic(value)
    }
}
impl From<Selector> for SelectorSpec {
    fn from(value: Selector) -> Self {
        SelectorSpec::Compiled(value)
    }
}
impl From<&Selector> for SelectorSpec {
    fn from(value: &Selector) -> Self {
        SelectorSpec::Compiled(value.clone())
    }
}

#[derive(Display, Debug, Clone, PartialEq, Eq)]
#[display("{reason}")]
pub struct SpecError {
    pub reason: String,
}
impl SpecError {
    fn new(reason: String) -> Self {
        Self { reason }
    }
}
impl std::error::Error for SpecError {}

/// A compiled selector.
///
/// Every node knows all static paths and all dynamic leaves reachable underneath it,
/// so watching a node is the same as watching each of its leaves.
#[derive(Clone)]
pub struct Selector(Rc<SelectorNode>);

struct SelectorNode {
    kind: SelectorKind,
    deps: Deps,
}

enum SelectorKind {
    Path(StatePath),
    Dynamic(DynamicPath),
    Composite(BTreeMap<String, Selector>),
}

#[derive(Default)]
struct Deps {
    children: BTreeSet<String>,
    dynamic: Vec<DynamicPath>,
}
impl Deps {
    fn add_path(&mut self, path: &str) {
        if !self.children.contains(path) {
            self.children.insert(path.to_string());
        }
    }
    fn add_dynamic(&mut self, f: &DynamicPath) {
        if !self.dynamic.contains(f) {
            self.dynamic.push(f.clone());
        }
    }
}

impl Selector {
    pub fn compile(spec: impl Into<SelectorSpec>) -> Result<Self, SpecError> {
        compile_in(spec.into(), &mut Vec::new())
    }

    /// Static paths watched by this selector.
    pub fn children(&self) -> impl Iterator<Item = &str> {
        self.0.deps.children.iter().map(|s| s.as_str())
    }
    pub fn has_child(&self, path: &str) -> bool {
        self.0.deps.children.contains(path)
    }
    /// Dynamic leaves reachable from this selector.
    pub fn dynamic(&self) -> &[DynamicPath] {
        &self.0.deps.dynamic
    }
    pub fn is_dynamic(&self) -> bool {
        !self.0.deps.dynamic.is_empty()
    }

    /// Entry of a composite selector.
    pub fn get(&self, key: &str) -> Option<&Selector> {
        match &self.0.kind {
            SelectorKind::Composite(entries) => entries.get(key),
            _ => None,
        }
    }

    /// Evaluates this selector against `state`.
    ///
    /// Leaves read their path, yielding `null` for missing locations. Composites
    /// build an object with the same keys.
    pub fn select(&self, state: &Value, props: &Value) -> Value {
        match &self.0.kind {
            SelectorKind::Path(p) => path::get_or_null(state, p.as_str()),
            SelectorKind::Dynamic(f) => path::get_or_null(state, f.resolve(props, state).as_str()),
            SelectorKind::Composite(entries) => {
                let mut map = Map::new();
                for (key, selector) in entries {
                    map.insert(key.clone(), selector.select(state, props));
                }
                Value::Object(map)
            }
        }
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Rc::ptr_eq(&self.0, &other.0)
    }
    pub(crate) fn key(&self) -> usize {
        Rc::as_ptr(&self.0) as usize
    }

    fn new(kind: SelectorKind, deps: Deps) -> Self {
        Self(Rc::new(SelectorNode { kind, deps }))
    }
}
impl fmt::Debug for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0.kind {
            SelectorKind::Path(p) => write!(f, "Selector({p})"),
            SelectorKind::Dynamic(d) => write!(f, "Selector({d:?})"),
            SelectorKind::Composite(entries) => f.debug_map().entries(entries.iter()).finish(),
        }
    }
}

fn compile_in(spec: SelectorSpec, ancestors: &mut Vec<Deps>) -> Result<Selector, SpecError> {
    match spec {
        SelectorSpec::Path(p) => {
            if p.is_root() {
                return Err(SpecError::new("selector path must not be empty".into()));
            }
            for a in ancestors.iter_mut() {
                a.add_path(p.as_str());
            }
            let mut deps = Deps::default();
            deps.add_path(p.as_str());
            Ok(Selector::new(SelectorKind::Path(p), deps))
        }
        SelectorSpec::Dynamic(f) => {
            for a in ancestors.iter_mut() {
                a.add_dynamic(&f);
            }
            let mut deps = Deps::default();
            deps.add_dynamic(&f);
            Ok(Selector::new(SelectorKind::Dynamic(f), deps))
        }
        SelectorSpec::Composite(specs) => {
            ancestors.push(Deps::default());
            let mut entries = BTreeMap::new();
            for (key, spec) in specs {
                match compile_in(spec, ancestors) {
                    Ok(selector) => {
                        entries.insert(key, selector);
                    }
                    Err(e) => {
                        ancestors.pop();
                        return Err(e);
                    }
                }
            }
            let deps = ancestors.pop().unwrap_or_default();
            Ok(Selector::new(SelectorKind::Composite(entries), deps))
        }
        SelectorSpec::Compiled(selector) => {
            for a in ancestors.iter_mut() {
                for child in selector.children() {
                    a.add_path(child);
                }
                for f in selector.dynamic() {
                    a.add_dynamic(f);
                }
            }
            Ok(selector)
        }
    }
}
