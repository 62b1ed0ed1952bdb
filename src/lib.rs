//! # Tinstore
//!
//! Named, middleware-composable stores on top of fine-grained reactive state,
//! with optional time-travel debugger integration.
//!
//! Tinstore is organized in layers:
//!
//! ## Reactive state (low level)
//!
//! - `ReactiveState` - Tracked view over plain state: reads register
//!   dependencies, writes notify dependents
//! - `Controller` - Tracked computation with an explicit update hook
//! - `Effect` - Computation that re-runs when its dependencies change
//!
//! ## Stores (high level)
//!
//! - `create_state` - Build a store from a setup function and middleware
//!   (persistence, generated actions, namespacing, deep selection)
//! - `StoreHook` - What components subscribe through, gated by the store's
//!   `LifeCycle`
//! - `StoreContext` - Environment, diagnostics and devtools shared by stores
//!
//! ## Devtools
//!
//! - `DevTools` - Reports every action call and out-of-band change of
//!   connected stores to a `DevToolsTransport`
//!
//! ```
//! use tinstore::{ActionMap, CreateStateOptions, Environment, MemoryTransport, StateDescriptor, StateValue, StoreContext};
//!
//! let transport = MemoryTransport::new();
//! let ctx = StoreContext::builder()
//!     .environment(Environment::development())
//!     .transport(transport.clone())
//!     .build();
//!
//! let store = ctx.create_state(
//!     || StateDescriptor::plain(serde_json::json!({ "count": 0 })),
//!     "counter",
//!     CreateStateOptions::new()
//!         .with_namespace("counter")
//!         .with_actions(|state| {
//!             let state = state.clone();
//!             ActionMap::new().action("increment", 1, move |args| {
//!                 let n = args.first().and_then(StateValue::as_i64).unwrap_or(1);
//!                 state.update("count", |v| *v = StateValue::from(v.as_i64().unwrap_or(0) + n));
//!                 Ok(StateValue::Null)
//!             })
//!         }),
//! );
//!
//! store.dispatch("increment", &[3.into()]).unwrap();
//! assert_eq!(transport.event_kinds(), vec!["syncAction-counter/increment"]);
//! ```

pub mod devtools;
pub mod error;
pub mod reactive;
pub mod runtime;
pub mod store;

// Re-export main types for convenience
pub use devtools::{
    ActionMeta, DevTools, DevToolsConnection, DevToolsEvent, DevToolsTransport, MemoryTransport,
    NamespaceRegistry,
};
pub use error::{ActionError, DevToolsError, PersistError, StoreDiagnostic};
pub use reactive::{Controller, Effect, RawState, ReactiveState, StateValue};
pub use store::{
    create_state, create_store, Action, ActionMap, ActionResult, ActionReturn, CreateStateOptions,
    Environment, LifeCycle, MemoryStorage, MiddlewareKind, NamespaceOptions, PersistOptions,
    PersistStorage, StateDescriptor, StoreContext, StoreHook, Subscription,
};
