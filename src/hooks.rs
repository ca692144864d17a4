use std::rc::Rc;

use serde_json::{Map, Value};

use crate::{Action, ChangedPaths, Error, ModuleContext, Result, Snapshot};

/// What a `before` hook wants done with the action it received.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum BeforeOutcome {
    #[default]
    Continue,
    /// Fields merged into the action. A `type` entry replaces the action type.
    Merge(Map<String, Value>),
    /// Cancels the dispatch.
    Stop,
}

pub type BeforeHook = Rc<dyn Fn(&ModuleContext, &Action) -> Result<BeforeOutcome>>;
pub type ChangeHook = Rc<dyn Fn(&ModuleContext, &Action, &Snapshot, &ChangedPaths) -> Result<()>>;
pub type AfterHook =
    Rc<dyn Fn(&ModuleContext, &Action, &Snapshot, Option<&ChangedPaths>) -> Result<()>>;
pub type ErrorHook = Rc<dyn Fn(&ModuleContext, &Action, &Error)>;

/// Lifecycle hooks of a module. Each list runs in registration order.
#[derive(Clone, Default)]
pub struct Hooks {
    pub(crate) before: Vec<BeforeHook>,
    pub(crate) change: Vec<ChangeHook>,
    pub(crate) after: Vec<AfterHook>,
    pub(crate) error: Vec<ErrorHook>,
}

impl Hooks {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn before(
        mut self,
        f: impl Fn(&ModuleContext, &Action) -> Result<BeforeOutcome> + 'static,
    ) -> Self {
        self.before.push(Rc::new(f));
        self
    }
    pub fn change(
        mut self,
        f: impl Fn(&ModuleContext, &Action, &Snapshot, &ChangedPaths) -> Result<()> + 'static,
    ) -> Self {
        self.change.push(Rc::new(f));
        self
    }
    pub fn after(
        mut self,
        f: impl Fn(&ModuleContext, &Action, &Snapshot, Option<&ChangedPaths>) -> Result<()> + 'static,
    ) -> Self {
        self.after.push(Rc::new(f));
        self
    }
    pub fn error(mut self, f: impl Fn(&ModuleContext, &Action, &Error) + 'static) -> Self {
        self.error.push(Rc::new(f));
        self
    }
    pub fn is_empty(&self) -> bool {
        self.before.is_empty()
            && self.change.is_empty()
            && self.after.is_empty()
            && self.error.is_empty()
    }
}
