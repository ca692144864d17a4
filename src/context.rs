use serde_json::Value;

use crate::{Error, Helper, Result, Snapshot, Store};

/// Read-only view of a module, passed to reducers, hooks and effects.
pub struct ModuleContext<'a> {
    store: &'a Store,
}

impl<'a> ModuleContext<'a> {
    pub(crate) fn new(store: &'a Store) -> Self {
        Self { store }
    }
    pub fn mid(&self) -> &str {
        self.store.mid()
    }
    /// The last committed state. Inside a reducer this is the state before the dispatch.
    pub fn state(&self) -> Snapshot {
        self.store.state()
    }
    pub fn select(&self, id: &str) -> Result<Value> {
        self.store.select(id)
    }
    pub fn helper(&self, name: &str) -> Result<Helper> {
        self.store
            .0
            .tables
            .borrow()
            .helpers
            .get(name)
            .cloned()
            .ok_or_else(|| Error::UnknownHelper {
                mid: self.mid().to_string(),
                name: name.to_string(),
            })
    }
    /// Runs a helper against `draft`.
    pub fn call_helper(&self, name: &str, draft: &mut Value, args: &[Value]) -> Result<Value> {
        let helper = self.helper(name)?;
        helper(draft, args)
    }
    /// A loaded component scope.
    pub fn scope(&self, id: &str) -> Option<Value> {
        self.store.scope(id)
    }
    pub fn components(&self) -> Vec<String> {
        self.store.components()
    }
}
