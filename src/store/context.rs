use std::cell::RefCell;
use std::collections::HashSet;
use std::rc::Rc;

use tracing::{error, warn};

use crate::devtools::{DevTools, DevToolsTransport};
use crate::error::StoreDiagnostic;

use super::hook::StoreHook;
use super::lifecycle::LifeCycle;
use super::middleware::CreateStateOptions;
use super::{create, descriptor::StateDescriptor};

/// Where stores are running.
///
/// Diagnostics are only produced in development. Devtools integration
/// additionally requires a non-server environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Environment {
    pub development: bool,
    pub server: bool,
}

impl Environment {
    /// Development in debug builds, production otherwise; never a server.
    pub fn detect() -> Self {
        Self {
            development: cfg!(debug_assertions),
            server: false,
        }
    }

    pub fn development() -> Self {
        Self {
            development: true,
            server: false,
        }
    }

    pub fn production() -> Self {
        Self {
            development: false,
            server: false,
        }
    }

    /// Development, but headless.
    pub fn server() -> Self {
        Self {
            development: true,
            server: true,
        }
    }

    pub fn devtools_allowed(&self) -> bool {
        self.development && !self.server
    }
}

impl Default for Environment {
    fn default() -> Self {
        Self::detect()
    }
}

struct ContextInner {
    environment: Environment,
    devtools: DevTools,
    namespaces: RefCell<HashSet<String>>,
    diagnostics: RefCell<Vec<StoreDiagnostic>>,
    global_lifecycle: RefCell<Option<LifeCycle>>,
}

/// Everything stores share: environment, devtools connection and registry,
/// claimed namespaces, and collected diagnostics.
///
/// Cloning yields another handle to the same context. Separate contexts are
/// fully isolated from each other.
///
/// # Examples
///
/// ```
/// use tinstore::{CreateStateOptions, Environment, MemoryTransport, StateDescriptor, StoreContext};
///
/// let transport = MemoryTransport::new();
/// let ctx = StoreContext::builder()
///     .environment(Environment::development())
///     .transport(transport.clone())
///     .build();
///
/// let store = ctx.create_state(
///     || StateDescriptor::plain(serde_json::json!({ "count": 0 })),
///     "counter",
///     CreateStateOptions::new().with_namespace("counter"),
/// );
/// assert_eq!(store.namespace().name, "counter");
/// assert_eq!(transport.inits().len(), 1);
/// ```
#[derive(Clone)]
pub struct StoreContext {
    inner: Rc<ContextInner>,
}

impl StoreContext {
    /// A context for `environment` with no devtools transport.
    pub fn new(environment: Environment) -> Self {
        Self::builder().environment(environment).build()
    }

    pub fn builder() -> StoreContextBuilder {
        StoreContextBuilder::default()
    }

    pub fn environment(&self) -> Environment {
        self.inner.environment
    }

    pub fn devtools(&self) -> &DevTools {
        &self.inner.devtools
    }

    /// Record a diagnostic and log it. Ignored outside development.
    pub fn report(&self, diagnostic: StoreDiagnostic) {
        if !self.inner.environment.development {
            return;
        }
        if diagnostic.is_error() {
            error!(store = diagnostic.store(), "{diagnostic}");
        } else {
            warn!(store = diagnostic.store(), "{diagnostic}");
        }
        self.inner.diagnostics.borrow_mut().push(diagnostic);
    }

    pub fn diagnostics(&self) -> Vec<StoreDiagnostic> {
        self.inner.diagnostics.borrow().clone()
    }

    pub fn take_diagnostics(&self) -> Vec<StoreDiagnostic> {
        std::mem::take(&mut *self.inner.diagnostics.borrow_mut())
    }

    /// Claim a namespace. Returns false if it was already claimed.
    pub fn claim_namespace(&self, namespace: &str) -> bool {
        self.inner
            .namespaces
            .borrow_mut()
            .insert(namespace.to_string())
    }

    /// Lifecycle shared by stores created with [`create_store`](Self::create_store)
    /// that do not bring their own.
    pub fn global_lifecycle(&self) -> Option<LifeCycle> {
        self.inner.global_lifecycle.borrow().clone()
    }

    pub fn set_global_lifecycle(&self, lifecycle: Option<LifeCycle>) {
        *self.inner.global_lifecycle.borrow_mut() = lifecycle;
    }

    /// See [`create_state`](crate::create_state).
    pub fn create_state<S>(&self, setup: S, name: &str, options: CreateStateOptions) -> StoreHook
    where
        S: FnOnce() -> StateDescriptor + 'static,
    {
        create::create_state(self, setup, name, options)
    }

    /// See [`create_store`](crate::create_store).
    pub fn create_store<C>(&self, creator: C, name: &str, lifecycle: Option<LifeCycle>) -> StoreHook
    where
        C: FnOnce() -> StateDescriptor,
    {
        create::create_store(self, creator, name, lifecycle)
    }
}

impl Default for StoreContext {
    fn default() -> Self {
        Self::builder().build()
    }
}

/// Builder for [`StoreContext`].
#[derive(Default)]
pub struct StoreContextBuilder {
    environment: Environment,
    transport: Option<Rc<dyn DevToolsTransport>>,
}

impl StoreContextBuilder {
    pub fn environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    /// Debugger transport. Without one, devtools integration is a no-op.
    pub fn transport(mut self, transport: impl DevToolsTransport + 'static) -> Self {
        self.transport = Some(Rc::new(transport));
        self
    }

    pub fn build(self) -> StoreContext {
        StoreContext {
            inner: Rc::new(ContextInner {
                environment: self.environment,
                devtools: DevTools::new(self.transport),
                namespaces: RefCell::new(HashSet::new()),
                diagnostics: RefCell::new(Vec::new()),
                global_lifecycle: RefCell::new(None),
            }),
        }
    }
}
