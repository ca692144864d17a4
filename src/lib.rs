//! Reactive state modules: an immutable JSON state tree updated by dispatched actions,
//! with path-level subscriptions driven by compiled selectors.

mod action;
mod actions;
mod component;
mod config;
mod context;
mod dispatch;
mod draft;
mod dynamic;
mod effect;
mod error;
mod format;
mod hooks;
pub mod path;
mod registry;
mod selector;
mod store;
mod subscription;

pub use action::*;
pub use actions::{ActionCreator, ActionNode, ActionSpec, ActionTree};
pub use component::{Component, Helper, Reducer};
pub use config::*;
pub use context::*;
pub use draft::*;
pub use effect::{Effect, EffectContext, EffectFn};
pub use error::*;
pub use format::*;
pub use hooks::*;
pub use path::StatePath;
pub use registry::ActionCondition;
pub use selector::*;
pub use store::{Store, StoreBuilder};
pub use subscription::*;

pub(crate) use store::WeakStore;

#[cfg(test)]
mod test_utils;
#[cfg(doctest)]
mod tests_readme;
