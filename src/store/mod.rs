//! Named stores built from setup functions and middleware.
//!
//! A store is declared with a setup function returning a
//! [`StateDescriptor`], optionally wrapped by middleware (persistence,
//! generated actions, namespacing, deep selection). [`create_state`] runs
//! the setup once, checks the result, wires devtools when asked to, and
//! returns a [`StoreHook`] that components subscribe through.

mod action;
mod context;
mod create;
mod descriptor;
mod hook;
mod lifecycle;
mod middleware;
mod persist;
mod validate;

pub use action::{Action, ActionMap, ActionResult, ActionReturn, ANONYMOUS_ACTION};
pub use context::{Environment, StoreContext, StoreContextBuilder};
pub use create::{create_state, create_store, DEFAULT_STORE_NAME};
pub use descriptor::{
    get_final_actions, get_final_deep_selector, get_final_namespace, get_final_persist,
    get_final_state, Decorated, NamespaceOptions, StateDescriptor,
};
pub use hook::{StoreHook, Subscription};
pub use lifecycle::{LifeCycle, UpdateGate};
pub use middleware::{
    with_actions, with_deep_selector, with_namespace, with_persist, ActionsFactory,
    CreateStateOptions, Middleware, MiddlewareKind, Pipeline, Setup,
};
pub use persist::{MemoryStorage, PersistHandle, PersistOptions, PersistStorage};
pub use validate::validate_state;
