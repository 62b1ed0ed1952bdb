use std::fmt;

use crate::reactive::ReactiveState;

use super::action::ActionMap;
use super::descriptor::{get_final_state, to_raw, NamespaceOptions, StateDescriptor};
use super::persist::{PersistHandle, PersistOptions};

/// A setup function: produces the state descriptor, once.
pub type Setup = Box<dyn FnOnce() -> StateDescriptor>;

/// Builds a store's actions from its reactive state.
pub type ActionsFactory = Box<dyn FnOnce(&ReactiveState) -> ActionMap>;

/// Kinds of middleware, declared in composition order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum MiddlewareKind {
    Persist,
    Actions,
    Namespace,
    DeepSelector,
}

/// One requested augmentation of a setup function.
pub enum Middleware {
    Persist(PersistOptions),
    Actions(ActionsFactory),
    Namespace(NamespaceOptions),
    DeepSelector(bool),
}

impl Middleware {
    pub fn kind(&self) -> MiddlewareKind {
        match self {
            Middleware::Persist(_) => MiddlewareKind::Persist,
            Middleware::Actions(_) => MiddlewareKind::Actions,
            Middleware::Namespace(_) => MiddlewareKind::Namespace,
            Middleware::DeepSelector(_) => MiddlewareKind::DeepSelector,
        }
    }

    /// Wrap `setup` with this middleware.
    pub fn apply(self, setup: Setup) -> Setup {
        match self {
            Middleware::Persist(options) => with_persist(setup, options),
            Middleware::Actions(factory) => with_actions(setup, factory),
            Middleware::Namespace(options) => with_namespace(setup, options),
            Middleware::DeepSelector(deep) => with_deep_selector(setup, deep),
        }
    }
}

impl fmt::Debug for Middleware {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Middleware::Persist(options) => f.debug_tuple("Persist").field(options).finish(),
            Middleware::Actions(_) => f.write_str("Actions(..)"),
            Middleware::Namespace(options) => f.debug_tuple("Namespace").field(options).finish(),
            Middleware::DeepSelector(deep) => f.debug_tuple("DeepSelector").field(deep).finish(),
        }
    }
}

/// Restore the plain state from storage and keep it saved.
pub fn with_persist(setup: Setup, options: PersistOptions) -> Setup {
    Box::new(move || {
        let descriptor = setup();
        let handle = PersistHandle::attach(&to_raw(get_final_state(&descriptor)), options);
        let mut decorated = descriptor.into_decorated();
        decorated.persist = Some(handle);
        decorated.into()
    })
}

/// Generate actions over the reactive form of the state.
///
/// Actions already present on the descriptor are kept; generated ones
/// replace same-key entries.
pub fn with_actions(setup: Setup, factory: ActionsFactory) -> Setup {
    Box::new(move || {
        let mut decorated = setup().into_decorated();
        let generated = factory(&ReactiveState::new(to_raw(decorated.state.clone())));
        let mut actions = decorated.actions.take().unwrap_or_default();
        actions.extend(generated);
        decorated.actions = Some(actions);
        decorated.into()
    })
}

/// Attach namespace options.
pub fn with_namespace(setup: Setup, options: NamespaceOptions) -> Setup {
    Box::new(move || {
        let mut decorated = setup().into_decorated();
        decorated.namespace = Some(options);
        decorated.into()
    })
}

/// Attach the deep-selector flag.
pub fn with_deep_selector(setup: Setup, deep: bool) -> Setup {
    Box::new(move || {
        let mut decorated = setup().into_decorated();
        decorated.deep_selector = Some(deep);
        decorated.into()
    })
}

/// An ordered middleware chain.
///
/// Layers are always applied persist → actions → namespace → deep selector,
/// whatever order they were requested in. Layers of the same kind keep
/// their relative order.
#[derive(Debug, Default)]
pub struct Pipeline {
    layers: Vec<Middleware>,
}

impl Pipeline {
    pub fn new(layers: impl IntoIterator<Item = Middleware>) -> Self {
        let mut layers: Vec<Middleware> = layers.into_iter().collect();
        layers.sort_by_key(Middleware::kind);
        Self { layers }
    }

    /// Kinds of the layers, innermost first.
    pub fn kinds(&self) -> Vec<MiddlewareKind> {
        self.layers.iter().map(Middleware::kind).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Wrap `setup` with every layer.
    pub fn compose(self, setup: Setup) -> Setup {
        self.layers
            .into_iter()
            .fold(setup, |setup, layer| layer.apply(setup))
    }
}

/// Middleware requested for a store.
///
/// # Examples
///
/// ```
/// use tinstore::{CreateStateOptions, MiddlewareKind};
///
/// let options = CreateStateOptions::new()
///     .with_deep_selector(false)
///     .with_namespace("counter");
/// assert_eq!(
///     options.into_pipeline().kinds(),
///     vec![MiddlewareKind::Namespace, MiddlewareKind::DeepSelector]
/// );
/// ```
#[derive(Default)]
pub struct CreateStateOptions {
    persist: Option<PersistOptions>,
    actions: Option<ActionsFactory>,
    namespace: Option<NamespaceOptions>,
    deep_selector: Option<bool>,
}

impl CreateStateOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_persist(mut self, options: PersistOptions) -> Self {
        self.persist = Some(options);
        self
    }

    pub fn with_actions<F>(mut self, factory: F) -> Self
    where
        F: FnOnce(&ReactiveState) -> ActionMap + 'static,
    {
        self.actions = Some(Box::new(factory));
        self
    }

    /// Register under `name` with devtools enabled.
    pub fn with_namespace(self, name: impl Into<String>) -> Self {
        self.with_namespace_options(NamespaceOptions::new(name))
    }

    pub fn with_namespace_options(mut self, options: NamespaceOptions) -> Self {
        self.namespace = Some(options);
        self
    }

    pub fn with_deep_selector(mut self, deep: bool) -> Self {
        self.deep_selector = Some(deep);
        self
    }

    pub fn into_pipeline(self) -> Pipeline {
        let layers = [
            self.persist.map(Middleware::Persist),
            self.actions.map(Middleware::Actions),
            self.namespace.map(Middleware::Namespace),
            self.deep_selector.map(Middleware::DeepSelector),
        ];
        Pipeline::new(layers.into_iter().flatten())
    }
}

impl fmt::Debug for CreateStateOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CreateStateOptions")
            .field("persist", &self.persist)
            .field("actions", &self.actions.is_some())
            .field("namespace", &self.namespace)
            .field("deep_selector", &self.deep_selector)
            .finish()
    }
}

impl From<CreateStateOptions> for Pipeline {
    fn from(options: CreateStateOptions) -> Self {
        options.into_pipeline()
    }
}
