use std::cell::Cell;

use parse_display::Display;
use serde::{Deserialize, Serialize};


/// When a dispatch awaits the effects it fired, relative to notifying path subscribers.
///
/// Only [`Store::dispatch_async`](crate::Store::dispatch_async) honours this;
/// synchronous dispatches always queue their effects after notifying.
#[derive(Clone, Copy, Debug, Default, Display, PartialEq, Eq, Hash)]
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[display(style = "camelCase")]
pub enum EffectOrdering {
    BeforeNotify,
    #[default]
    AfterNotify,
}

/// Module settings, loadable from JSON.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[derive(Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ModuleConfig {
    /// Module id. Generated by [`next_module_id`] when absent.
    pub mid: Option<String>,
    pub effect_ordering: EffectOrdering,
}

impl ModuleConfig {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn mid(mut self, mid: impl Into<String>) -> Self {
        self.mid = Some(mid.into());
        self
    }
    pub fn effect_ordering(mut self, ordering: EffectOrdering) -> Self {
        self.effect_ordering = ordering;
        self
    }
}

thread_local! {
    static MODULE_IDS: ModuleIds = const { ModuleIds { next: Cell::new(0) } };
}

struct ModuleIds {
    next: Cell<usize>,
}

/// Returns `state-module-N`, counting up from 1 on each thread.
pub fn next_module_id() -> String {
    MODULE_IDS.with(|ids| {
        let n = ids.next.get() + 1;
        ids.next.set(n);
        format!("state-module-{n}")
    })
}

/// Restarts the id counter of the current thread.
///
/// Modules created earlier keep their ids, so ids may repeat afterwards.
pub fn reset_module_ids() {
    MODULE_IDS.with(|ids| ids.next.set(0));
}
