use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use serde_json::Value;
use tracing::{debug, error};

use crate::reactive::{Controller, RawState, ReactiveState, StateValue};
use crate::store::{Action, ActionMap, ActionReturn, LifeCycle};

use super::registry::NamespaceRegistry;
use super::transport::{ActionMeta, DevToolsConnection, DevToolsTransport, DEVTOOLS_CONNECTION_NAME};

/// Namespace label carried by devtools shadow controllers.
pub const DEVTOOLS_NAMESPACE: &str = "$$__devtools__$$";

struct DevToolsInner {
    transport: Option<Rc<dyn DevToolsTransport>>,
    connection: RefCell<Option<Rc<dyn DevToolsConnection>>>,
    registry: NamespaceRegistry,
}

impl DevToolsInner {
    /// The shared connection, opened on first use.
    fn connection(&self) -> Option<Rc<dyn DevToolsConnection>> {
        let transport = self.transport.as_ref()?;
        if let Some(connection) = self.connection.borrow().as_ref() {
            return Some(Rc::clone(connection));
        }

        match transport.connect(DEVTOOLS_CONNECTION_NAME) {
            Ok(connection) => {
                debug!(name = DEVTOOLS_CONNECTION_NAME, "opened devtools connection");
                *self.connection.borrow_mut() = Some(Rc::clone(&connection));
                Some(connection)
            }
            Err(e) => {
                error!(error = %e, "failed to open devtools connection");
                None
            }
        }
    }

    /// Send `action` with a snapshot of every connected store.
    fn report(&self, action: &ActionMeta) {
        let Some(connection) = self.connection.borrow().clone() else {
            return;
        };
        let state = self.registry.snapshot();
        if let Err(e) = connection.send(action, &state) {
            error!(action = %action.kind, error = %e, "failed to send to devtools");
        }
    }
}

fn report(devtools: &Weak<DevToolsInner>, action: &ActionMeta) {
    if let Some(inner) = devtools.upgrade() {
        inner.report(action);
    }
}

/// Counts instrumented calls in flight for one store.
///
/// A counter rather than a flag, so nested and overlapping calls keep the
/// store marked busy until the last of them finishes.
#[derive(Clone, Default)]
struct ActionScope {
    depth: Rc<Cell<usize>>,
}

impl ActionScope {
    fn enter(&self) -> ActionGuard {
        self.depth.set(self.depth.get() + 1);
        ActionGuard {
            depth: Rc::clone(&self.depth),
        }
    }

    fn is_active(&self) -> bool {
        self.depth.get() > 0
    }
}

struct ActionGuard {
    depth: Rc<Cell<usize>>,
}

impl Drop for ActionGuard {
    fn drop(&mut self) {
        self.depth.set(self.depth.get().saturating_sub(1));
    }
}

/// Bridge between stores and a time-travel debugger.
///
/// Every connected store gets its actions instrumented, so each call is
/// reported once it finishes (or, for asynchronous actions, once it
/// settles), and a shadow controller that reports changes made outside
/// any action. Each report carries a snapshot of all connected stores.
///
/// Without a transport, [`connect`](DevTools::connect) hands the actions
/// back untouched.
#[derive(Clone)]
pub struct DevTools {
    inner: Rc<DevToolsInner>,
}

impl DevTools {
    pub fn new(transport: Option<Rc<dyn DevToolsTransport>>) -> Self {
        Self {
            inner: Rc::new(DevToolsInner {
                transport,
                connection: RefCell::new(None),
                registry: NamespaceRegistry::new(),
            }),
        }
    }

    /// Whether a transport is configured.
    pub fn is_enabled(&self) -> bool {
        self.inner.transport.is_some()
    }

    pub fn registry(&self) -> &NamespaceRegistry {
        &self.inner.registry
    }

    /// Register a store under `name` and instrument its actions.
    ///
    /// A store already registered under `name` is evicted and its shadow
    /// controller stopped first. Transport failures are logged and never
    /// reach the caller.
    pub fn connect(
        &self,
        name: &str,
        actions: ActionMap,
        state: &RawState,
        reactive: &ReactiveState,
    ) -> ActionMap {
        let Some(connection) = self.inner.connection() else {
            return actions;
        };

        let registry = &self.inner.registry;
        registry.evict(name);

        let lifecycle = LifeCycle::new();
        lifecycle.set_sync_update_component(true);

        let scope = ActionScope::default();
        let controller = {
            let reactive = reactive.clone();
            let devtools = Rc::downgrade(&self.inner);
            let scope = scope.clone();
            let store = name.to_string();
            Controller::new_in(
                Rc::clone(state.runtime()),
                move || reactive.traverse(),
                lifecycle,
                DEVTOOLS_NAMESPACE,
                move |controller| {
                    controller.run();
                    if scope.is_active() {
                        return;
                    }
                    report(&devtools, &ActionMeta::subscribe_action(&store));
                },
            )
        };

        registry.install(name, state.clone(), controller.clone());
        controller.run();

        if let Err(e) = connection.init(&registry.snapshot()) {
            error!(namespace = name, error = %e, "failed to initialize devtools");
        }
        debug!(
            namespace = name,
            actions = actions.len(),
            controller = controller.id(),
            "connected store to devtools"
        );

        actions
            .into_iter()
            .map(|(key, action)| {
                let wrapped = self.instrument(name, action, &scope);
                (key, wrapped)
            })
            .collect()
    }

    fn instrument(&self, store: &str, action: Action, scope: &ActionScope) -> Action {
        let name = action.name().map(str::to_string);
        let label = action.label().to_string();
        let arity = action.arity();
        let devtools = Rc::downgrade(&self.inner);
        let scope = scope.clone();
        let store = store.to_string();

        let wrapped = Action::new(arity, move |args| {
            let guard = scope.enter();
            let recorded = payload(args, arity);

            match action.call(args) {
                ActionReturn::Ready(result) => {
                    report(&devtools, &ActionMeta::sync_action(&store, &label, recorded));
                    drop(guard);
                    ActionReturn::Ready(result)
                }
                ActionReturn::Pending(pending) => {
                    let devtools = devtools.clone();
                    let meta = ActionMeta::async_action(&store, &label, recorded);
                    ActionReturn::Pending(Box::pin(async move {
                        let result = pending.await;
                        report(&devtools, &meta);
                        drop(guard);
                        result
                    }))
                }
            }
        });

        match name {
            Some(name) => wrapped.named(name),
            None => wrapped,
        }
    }
}

/// Arguments as recorded by the debugger: at most `arity` of them.
fn payload(args: &[StateValue], arity: usize) -> Vec<Value> {
    args.iter()
        .take(arity)
        .map(|arg| arg.to_snapshot().unwrap_or(Value::Null))
        .collect()
}

impl fmt::Debug for DevTools {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevTools")
            .field("enabled", &self.is_enabled())
            .field("connected", &self.inner.connection.borrow().is_some())
            .field("stores", &self.inner.registry.names())
            .finish()
    }
}
