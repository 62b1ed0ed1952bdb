use crate::reactive::{RawState, ReactiveState, StateValue};

use super::action::ActionMap;
use super::persist::PersistHandle;

/// Namespace under which a store registers with the devtools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamespaceOptions {
    pub name: String,
    pub enable_devtools: bool,
}

impl NamespaceOptions {
    /// A devtools-enabled namespace.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enable_devtools: true,
        }
    }

    /// The namespace a store gets when none was requested.
    pub fn fallback(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            enable_devtools: false,
        }
    }
}

/// State plus the metadata middleware attached to it.
#[derive(Debug, Clone)]
pub struct Decorated {
    pub state: RawState,
    pub actions: Option<ActionMap>,
    pub namespace: Option<NamespaceOptions>,
    pub deep_selector: Option<bool>,
    pub persist: Option<PersistHandle>,
}

impl Decorated {
    pub fn new(state: RawState) -> Self {
        Self {
            state,
            actions: None,
            namespace: None,
            deep_selector: None,
            persist: None,
        }
    }
}

/// What a setup function returns.
#[derive(Debug, Clone)]
pub enum StateDescriptor {
    Plain(RawState),
    Decorated(Box<Decorated>),
}

impl StateDescriptor {
    /// Plain state holding `value`.
    pub fn plain(value: impl Into<StateValue>) -> Self {
        StateDescriptor::Plain(RawState::new(value))
    }

    /// Plain state whose root is an already-reactive object.
    pub fn reactive(state: ReactiveState) -> Self {
        StateDescriptor::plain(StateValue::Reactive(state))
    }

    pub fn is_decorated(&self) -> bool {
        matches!(self, StateDescriptor::Decorated(_))
    }

    /// Convert into the decorated form, keeping any metadata.
    pub fn into_decorated(self) -> Decorated {
        match self {
            StateDescriptor::Plain(state) => Decorated::new(state),
            StateDescriptor::Decorated(decorated) => *decorated,
        }
    }
}

impl From<Decorated> for StateDescriptor {
    fn from(decorated: Decorated) -> Self {
        StateDescriptor::Decorated(Box::new(decorated))
    }
}

impl From<RawState> for StateDescriptor {
    fn from(state: RawState) -> Self {
        StateDescriptor::Plain(state)
    }
}

/// The plain state inside a descriptor.
pub fn get_final_state(descriptor: &StateDescriptor) -> RawState {
    match descriptor {
        StateDescriptor::Plain(state) => state.clone(),
        StateDescriptor::Decorated(decorated) => decorated.state.clone(),
    }
}

/// Generated actions; empty when no action middleware ran.
pub fn get_final_actions(descriptor: &StateDescriptor) -> ActionMap {
    match descriptor {
        StateDescriptor::Decorated(decorated) => decorated.actions.clone().unwrap_or_default(),
        StateDescriptor::Plain(_) => ActionMap::new(),
    }
}

/// Namespace options; a devtools-disabled `fallback` namespace when none was set.
pub fn get_final_namespace(descriptor: &StateDescriptor, fallback: &str) -> NamespaceOptions {
    match descriptor {
        StateDescriptor::Decorated(decorated) => decorated
            .namespace
            .clone()
            .unwrap_or_else(|| NamespaceOptions::fallback(fallback)),
        StateDescriptor::Plain(_) => NamespaceOptions::fallback(fallback),
    }
}

/// Deep-selector flag; `true` when none was set.
pub fn get_final_deep_selector(descriptor: &StateDescriptor) -> bool {
    match descriptor {
        StateDescriptor::Decorated(decorated) => decorated.deep_selector.unwrap_or(true),
        StateDescriptor::Plain(_) => true,
    }
}

/// Persistence attached by the persist middleware, if any.
pub fn get_final_persist(descriptor: &StateDescriptor) -> Option<PersistHandle> {
    match descriptor {
        StateDescriptor::Decorated(decorated) => decorated.persist.clone(),
        StateDescriptor::Plain(_) => None,
    }
}

/// Unwrap a root that is itself reactive to its raw form.
pub(crate) fn to_raw(state: RawState) -> RawState {
    let inner = state.with(|value| match value {
        StateValue::Reactive(reactive) => Some(reactive.raw()),
        _ => None,
    });
    inner.unwrap_or(state)
}
