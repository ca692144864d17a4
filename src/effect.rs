use std::{future::Future, rc::Rc};

use futures::{
    future::{join_all, LocalBoxFuture},
    FutureExt,
};

use crate::{Action, ChangedPaths, ModuleContext, Result, Store};

/// The asynchronous part of an effect.
pub enum Effect {
    /// Later effects of the same dispatch are not invoked until this completes.
    Awaited(LocalBoxFuture<'static, Result<()>>),
    /// Runs alongside the other effects and is joined at the end of the run.
    Detached(LocalBoxFuture<'static, Result<()>>),
}

impl Effect {
    pub fn awaited(f: impl Future<Output = Result<()>> + 'static) -> Self {
        Effect::Awaited(f.boxed_local())
    }
    pub fn detached(f: impl Future<Output = Result<()>> + 'static) -> Self {
        Effect::Detached(f.boxed_local())
    }
    /// An effect with nothing left to do.
    pub fn done() -> Self {
        Effect::Detached(futures::future::ready(Ok(())).boxed_local())
    }
}

pub type EffectFn = Rc<dyn Fn(EffectContext, Action) -> Effect>;

/// Handle given to effects. Unlike [`ModuleContext`] it can dispatch.
#[derive(Clone)]
pub struct EffectContext {
    store: Store,
}

impl EffectContext {
    pub(crate) fn new(store: Store) -> Self {
        Self { store }
    }
    pub fn store(&self) -> &Store {
        &self.store
    }
    pub fn context(&self) -> ModuleContext {
        ModuleContext::new(&self.store)
    }
    pub fn dispatch(&self, action: Action) -> Result<Option<ChangedPaths>> {
        self.store.dispatch(action)
    }
    pub async fn dispatch_async(&self, action: Action) -> Result<Option<ChangedPaths>> {
        self.store.dispatch_async(action).await
    }
}

/// Invokes `effects` for `action`.
///
/// Effects up to the first awaited one are invoked immediately. The returned future
/// invokes the rest as each awaited effect completes, and stops invoking once an awaited
/// effect fails. Detached effects always run to completion. The first error is returned
/// after all of them have settled.
pub(crate) fn start_effects(
    store: &Store,
    effects: Vec<EffectFn>,
    action: &Action,
) -> LocalBoxFuture<'static, Result<()>> {
    let mut detached = Vec::new();
    let mut rest = effects.into_iter();
    let mut blocking = None;
    for f in rest.by_ref() {
        match f(EffectContext::new(store.clone()), action.clone()) {
            Effect::Detached(fut) => detached.push(fut),
            Effect::Awaited(fut) => {
                blocking = Some(fut);
                break;
            }
        }
    }
    let rest: Vec<_> = rest.collect();
    let store = store.clone();
    let action = action.clone();
    async move {
        let mut first_err = None;
        if let Some(fut) = blocking {
            first_err = fut.await.err();
            if first_err.is_none() {
                for f in rest {
                    match f(EffectContext::new(store.clone()), action.clone()) {
                        Effect::Detached(fut) => detached.push(fut),
                        Effect::Awaited(fut) => {
                            if let Err(e) = fut.await {
                                first_err = Some(e);
                                break;
                            }
                        }
                    }
                }
            }
        }
        for result in join_all(detached).await {
            match result {
                Ok(()) => {}
                Err(e) if first_err.is_none() => first_err = Some(e),
                Err(e) => tracing::error!(mid = store.mid(), error = %e, "effect failed"),
            }
        }
        match first_err {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
    .boxed_local()
}
