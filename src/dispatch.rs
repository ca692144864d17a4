use std::mem::take;

use futures::future::{join_all, LocalBoxFuture};
use serde_json::Value;

use crate::{
    effect::start_effects, subscription::MemoizedSelect, Action, BeforeOutcome, ChangedPaths,
    EffectOrdering, Error, ModuleContext, Result, Snapshot, Store,
};


/// An action that made it past the before hooks and through the reducers.
struct Reduced {
    action: Action,
    prev: Snapshot,
    changed: Option<ChangedPaths>,
}

impl Store {
    /// Dispatches `action` and returns the paths it changed, or `None` if the state
    /// is unchanged or a before hook cancelled the dispatch.
    ///
    /// Matching effects are invoked, and whatever they leave pending is queued for
    /// [`Store::flush_effects`].
    pub fn dispatch(&self, action: Action) -> Result<Option<ChangedPaths>> {
        let Some(reduced) = self.reduce_action(action)? else {
            return Ok(None);
        };
        if let Some(run) = self.fire_effects(&reduced.action) {
            self.0.pending_effects.borrow_mut().push(run);
        }
        self.finish(&reduced)?;
        Ok(reduced.changed)
    }

    /// Parses `action` from JSON and dispatches it.
    pub fn dispatch_value(&self, action: Value) -> Result<Option<ChangedPaths>> {
        let action = Action::from_value(action, self.mid())?;
        self.dispatch(action)
    }

    /// Dispatches `action` and awaits the effects it fires, ordered by
    /// [`EffectOrdering`].
    ///
    /// A failing effect does not undo the dispatch. Its error is returned once
    /// subscribers have been notified.
    pub async fn dispatch_async(&self, action: Action) -> Result<Option<ChangedPaths>> {
        let Some(reduced) = self.reduce_action(action)? else {
            return Ok(None);
        };
        let run = self.fire_effects(&reduced.action);
        let effects = match (self.effect_ordering(), run) {
            (EffectOrdering::BeforeNotify, Some(run)) => {
                let result = run.await;
                self.finish(&reduced)?;
                result
            }
            (EffectOrdering::AfterNotify, Some(run)) => {
                self.finish(&reduced)?;
                run.await
            }
            (_, None) => {
                self.finish(&reduced)?;
                Ok(())
            }
        };
        effects?;
        Ok(reduced.changed)
    }

    /// Awaits the effects queued by [`Store::dispatch`], including ones queued meanwhile.
    ///
    /// Returns the first effect error after every queued effect has settled.
    pub async fn flush_effects(&self) -> Result<()> {
        let mut first_err = None;
        loop {
            let pending = take(&mut *self.0.pending_effects.borrow_mut());
            if pending.is_empty() {
                break;
            }
            for result in join_all(pending).await {
                match result {
                    Ok(()) => {}
                    Err(e) if first_err.is_none() => first_err = Some(e),
                    Err(e) => tracing::error!(mid = self.mid(), error = %e, "effect failed"),
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Number of effect runs waiting for [`Store::flush_effects`].
    pub fn pending_effects(&self) -> usize {
        self.0.pending_effects.borrow().len()
    }

    fn reduce_action(&self, mut action: Action) -> Result<Option<Reduced>> {
        let result = self.try_reduce_action(&mut action);
        match result {
            Ok(Some((prev, changed))) => Ok(Some(Reduced {
                action,
                prev,
                changed,
            })),
            Ok(None) => Ok(None),
            Err(e) => Err(self.fail(&action, e)),
        }
    }

    fn try_reduce_action(
        &self,
        action: &mut Action,
    ) -> Result<Option<(Snapshot, Option<ChangedPaths>)>> {
        let cx = ModuleContext::new(self);
        for hook in &self.0.hooks.before {
            match hook(&cx, &*action)? {
                BeforeOutcome::Continue => {}
                BeforeOutcome::Merge(patch) => action.merge(patch, self.mid())?,
                BeforeOutcome::Stop => {
                    tracing::trace!(mid = self.mid(), ty = %action.ty(), "dispatch cancelled by hook");
                    return Ok(None);
                }
            }
        }

        let action = &*action;
        let sinks = self.0.registry.borrow().action_sinks(action);
        for sink in sinks {
            sink.on_action(action);
        }

        let prev = self.state();
        let changed = self.run_reducers(action, &prev)?;
        tracing::debug!(
            mid = self.mid(),
            ty = %action.ty(),
            changed = changed.as_ref().map_or(0, |c| c.len()),
            "dispatched"
        );
        if let Some(changed) = &changed {
            for hook in &self.0.hooks.change {
                hook(&cx, action, &prev, changed)?;
            }
        }
        Ok(Some((prev, changed)))
    }

    fn run_reducers(&self, action: &Action, base: &Snapshot) -> Result<Option<ChangedPaths>> {
        let reducers = match self.0.tables.borrow().reducers.get(action.ty()) {
            Some(reducers) => reducers.clone(),
            None => return Ok(None),
        };
        let cx = ModuleContext::new(self);
        let produced = self.0.engine.produce(base, &mut |draft: &mut Value| {
            for reducer in &reducers {
                reducer(&cx, action, draft)?;
            }
            Ok(())
        })?;
        if produced.changed.is_some() {
            *self.0.state.borrow_mut() = produced.snapshot;
        }
        Ok(produced.changed)
    }

    fn fire_effects(&self, action: &Action) -> Option<LocalBoxFuture<'static, Result<()>>> {
        let effects = self.0.tables.borrow().effects.get(action.ty()).cloned()?;
        Some(start_effects(self, effects, action))
    }

    fn finish(&self, reduced: &Reduced) -> Result<()> {
        let result = self.try_finish(reduced);
        result.map_err(|e| self.fail(&reduced.action, e))
    }

    fn try_finish(&self, reduced: &Reduced) -> Result<()> {
        let cx = ModuleContext::new(self);
        for hook in &self.0.hooks.after {
            hook(&cx, &reduced.action, &reduced.prev, reduced.changed.as_ref())?;
        }
        if let Some(changed) = &reduced.changed {
            self.notify(changed);
        }
        Ok(())
    }

    fn notify(&self, changed: &ChangedPaths) {
        let sinks = {
            let registry = self.0.registry.borrow();
            if !registry.has_path_watchers() {
                return;
            }
            registry.update_sinks(changed)
        };
        let mut memo = MemoizedSelect::new(self.state());
        for sink in sinks {
            sink.on_update(&mut memo);
        }
    }

    fn fail(&self, action: &Action, e: Error) -> Error {
        tracing::error!(mid = self.mid(), ty = %action.ty(), error = %e, "dispatch failed");
        let cx = ModuleContext::new(self);
        for hook in &self.0.hooks.error {
            hook(&cx, action, &e);
        }
        e
    }
}
