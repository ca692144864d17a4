use thiserror::Error;

/// Errors raised while registering components or dispatching actions.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error("module {mid}: tried to dispatch an empty action")]
    EmptyAction { mid: String },

    #[error("module {mid}: action type must be a string, number or symbol, got {found}")]
    InvalidActionType { mid: String, found: String },

    #[error("module {mid}: a before hook removed the type of the action")]
    HookRemovedType { mid: String },

    #[error("module {mid}: component {cid} has already been defined")]
    DuplicateComponent { mid: String, cid: String },

    #[error("module {mid}: selector {id} was already added")]
    DuplicateSelector { mid: String, id: String },

    #[error("module {mid}: component {cid}: {reason}")]
    InvalidSelectorSpec {
        mid: String,
        cid: String,
        reason: String,
    },

    #[error("module {mid}: component {cid}: state collision at {path}")]
    StateCollision {
        mid: String,
        cid: String,
        path: String,
    },

    #[error("module {mid}: component {cid}: route {route} has no matching effect {effect}")]
    MissingRoute {
        mid: String,
        cid: String,
        route: String,
        effect: String,
    },

    #[error("module {mid}: failed to load scope {scope}: {source}")]
    ScopeLoadFailure {
        mid: String,
        scope: String,
        #[source]
        source: Box<dyn std::error::Error>,
    },

    #[error("module {mid}: component {cid}: action {name} already exists")]
    DuplicateAction {
        mid: String,
        cid: String,
        name: String,
    },

    #[error("module {mid}: component {cid}: helper {name} already exists")]
    DuplicateHelper {
        mid: String,
        cid: String,
        name: String,
    },

    #[error("module {mid}: action {ty} called with too many arguments, argument {index} and onward are invalid")]
    TooManyArguments {
        mid: String,
        ty: String,
        index: usize,
    },

    #[error("module {mid}: selector {id} does not exist")]
    UnknownSelector { mid: String, id: String },

    #[error("module {mid}: helper {name} does not exist")]
    UnknownHelper { mid: String, name: String },

    #[error("module {mid}: unknown subscription kind {kind}, expected \"action\" or \"selector\"")]
    InvalidSubscriptionKind { mid: String, kind: String },

    #[error("module {mid} has been dropped")]
    ModuleDropped { mid: String },

    /// Raised by a user supplied reducer, hook, helper or effect.
    #[error(transparent)]
    Handler(Box<dyn std::error::Error>),
}

impl Error {
    /// Wraps an arbitrary error or message raised from user code.
    pub fn handler(e: impl Into<Box<dyn std::error::Error>>) -> Self {
        Error::Handler(e.into())
    }
}

pub type Result<T> = std::result::Result<T, Error>;
