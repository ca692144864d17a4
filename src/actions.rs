use std::{collections::BTreeMap, rc::Rc};

use serde_json::{Map, Value};

use crate::{Action, ActionType, ChangedPaths, Error, Result, WeakStore};


/// Declares a bound action creator, or a group of them.
#[derive(Clone, Debug, PartialEq)]
pub enum ActionSpec {
    Creator {
        /// Field names given to positional arguments.
        args: Vec<String>,
        /// Fields every created action starts with.
        defaults: Map<String, Value>,
    },
    Group(BTreeMap<String, ActionSpec>),
}

impl ActionSpec {
    /// A creator taking no positional arguments.
    pub fn none() -> Self {
        ActionSpec::Creator {
            args: Vec::new(),
            defaults: Map::new(),
        }
    }
    pub fn args<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        ActionSpec::Creator {
            args: names.into_iter().map(Into::into).collect(),
            defaults: Map::new(),
        }
    }
    pub fn group<K: Into<String>>(entries: impl IntoIterator<Item = (K, ActionSpec)>) -> Self {
        ActionSpec::Group(entries.into_iter().map(|(k, s)| (k.into(), s)).collect())
    }
    /// Adds a default field. Has no effect on a group.
    pub fn with_default(mut self, name: &str, value: impl Into<Value>) -> Self {
        if let ActionSpec::Creator { defaults, .. } = &mut self {
            defaults.insert(name.to_string(), value.into());
        }
        self
    }
}

/// A bound action creator: maps positional arguments to fields and dispatches.
#[derive(Clone)]
pub struct ActionCreator {
    store: WeakStore,
    mid: Rc<str>,
    cid: Rc<str>,
    ty: ActionType,
    args: Rc<[String]>,
    defaults: Rc<Map<String, Value>>,
}

impl ActionCreator {
    pub fn ty(&self) -> &ActionType {
        &self.ty
    }
    pub fn args(&self) -> &[String] {
        &self.args
    }
    /// Id of the component that declared this creator.
    pub fn cid(&self) -> &str {
        &self.cid
    }

    /// Builds the action without dispatching it.
    ///
    /// Surplus arguments that are objects are merged into the action.
    pub fn create(&self, args: impl IntoIterator<Item = Value>) -> Result<Action> {
        let mut action = Action::new(self.ty.clone());
        for (name, value) in self.defaults.iter() {
            action.set(name, value.clone());
        }
        for (index, arg) in args.into_iter().enumerate() {
            if let Some(name) = self.args.get(index) {
                action.set(name, arg);
            } else if let Value::Object(fields) = arg {
                for (name, value) in fields {
                    action.set(&name, value);
                }
            } else {
                return Err(Error::TooManyArguments {
                    mid: self.mid.to_string(),
                    ty: self.ty.to_string(),
                    index,
                });
            }
        }
        Ok(action)
    }

    /// Creates the action and dispatches it to the module that owns this creator.
    pub fn call(&self, args: impl IntoIterator<Item = Value>) -> Result<Option<ChangedPaths>> {
        let action = self.create(args)?;
        let store = self.store.upgrade().ok_or_else(|| Error::ModuleDropped {
            mid: self.mid.to_string(),
        })?;
        store.dispatch(action)
    }
}

#[derive(Clone)]
pub enum ActionNode {
    Creator(ActionCreator),
    Group(ActionTree),
}

/// The module's bound action creators, nested as declared.
#[derive(Clone, Default)]
pub struct ActionTree(BTreeMap<String, ActionNode>);

impl ActionTree {
    /// Looks up a creator by dotted name, such as `"todos.add"`.
    pub fn get(&self, name: &str) -> Option<&ActionCreator> {
        let mut tree = self;
        let mut segments = name.split('.').peekable();
        while let Some(segment) = segments.next() {
            match (tree.0.get(segment)?, segments.peek()) {
                (ActionNode::Creator(c), None) => return Some(c),
                (ActionNode::Group(g), Some(_)) => tree = g,
                _ => return None,
            }
        }
        None
    }
    pub fn node(&self, name: &str) -> Option<&ActionNode> {
        self.0.get(name)
    }
    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(|k| k.as_str())
    }
    /// Dotted names of every creator, depth first.
    pub fn creator_names(&self) -> Vec<String> {
        let mut names = Vec::new();
        self.collect_names("", &mut names);
        names
    }
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn collect_names(&self, base: &str, names: &mut Vec<String>) {
        for (name, node) in &self.0 {
            let full = if base.is_empty() {
                name.clone()
            } else {
                format!("{base}.{name}")
            };
            match node {
                ActionNode::Creator(_) => names.push(full),
                ActionNode::Group(g) => g.collect_names(&full, names),
            }
        }
    }

    /// Adds the creators declared by `specs`. Groups merge with existing groups.
    pub(crate) fn insert(
        &mut self,
        specs: &BTreeMap<String, ActionSpec>,
        binding: &ActionBinding,
    ) -> Result<()> {
        for (name, spec) in specs {
            match spec {
                ActionSpec::Group(entries) => {
                    let node = self
                        .0
                        .entry(name.clone())
                        .or_insert_with(|| ActionNode::Group(ActionTree::default()));
                    let ActionNode::Group(tree) = node else {
                        return Err(binding.duplicate(name));
                    };
                    tree.insert(entries, binding)?;
                }
                ActionSpec::Creator { args, defaults } => {
                    if self.0.contains_key(name) {
                        return Err(binding.duplicate(name));
                    }
                    let creator = ActionCreator {
                        store: binding.store.clone(),
                        mid: binding.mid.clone(),
                        cid: binding.cid.clone(),
                        ty: (binding.format)(name),
                        args: args.as_slice().into(),
                        defaults: Rc::new(defaults.clone()),
                    };
                    self.0.insert(name.clone(), ActionNode::Creator(creator));
                }
            }
        }
        Ok(())
    }
}

/// What every creator of one component is bound to.
pub(crate) struct ActionBinding<'a> {
    pub store: WeakStore,
    pub mid: Rc<str>,
    pub cid: Rc<str>,
    pub format: &'a dyn Fn(&str) -> ActionType,
}

impl ActionBinding<'_> {
    fn duplicate(&self, name: &str) -> Error {
        Error::DuplicateAction {
            mid: self.mid.to_string(),
            cid: self.cid.to_string(),
            name: name.to_string(),
        }
    }
}
