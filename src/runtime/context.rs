use std::cell::{Cell, RefCell};
use std::collections::{BTreeSet, HashMap, HashSet};
use std::rc::Rc;

/// A field path inside a tracked target. The empty path is the target itself.
pub type Path = Vec<String>;

type Observer = Rc<dyn Fn()>;

/// Reactive context for tracking dependencies (thread-local).
struct ReactiveContext {
    current_observer: Option<usize>,
    // Map from target ID to tracked paths and the observers reading them
    dependencies: HashMap<usize, HashMap<Path, HashSet<usize>>>,
    // Map from observer ID to the (target, path) pairs it depends on
    observer_deps: HashMap<usize, HashSet<(usize, Path)>>,
    // Map from observer ID to its change callback
    observers: HashMap<usize, Observer>,
}

impl ReactiveContext {
    fn new() -> Self {
        Self {
            current_observer: None,
            dependencies: HashMap::new(),
            observer_deps: HashMap::new(),
            observers: HashMap::new(),
        }
    }

    fn clear(&mut self) {
        self.current_observer = None;
        self.dependencies.clear();
        self.observer_deps.clear();
        self.observers.clear();
    }

    fn clear_dependencies(&mut self, observer_id: usize) {
        let Some(old_deps) = self.observer_deps.remove(&observer_id) else {
            return;
        };
        for (target, path) in old_deps {
            let Some(paths) = self.dependencies.get_mut(&target) else {
                continue;
            };
            if let Some(observers) = paths.get_mut(&path) {
                observers.remove(&observer_id);
                if observers.is_empty() {
                    paths.remove(&path);
                }
            }
            if paths.is_empty() {
                self.dependencies.remove(&target);
            }
        }
    }
}

/// Single-threaded reactive runtime.
///
/// Supports both a per-thread global runtime (default) and scoped runtimes
/// for isolation. The runtime records which observers read which field
/// paths of which targets, and calls those observers back when a write
/// touches a path they depend on.
///
/// # Examples
///
/// Using the default global runtime:
///
/// ```
/// use tinstore::ReactiveState;
///
/// let state = ReactiveState::from_value(serde_json::json!({ "count": 42 }));
/// assert_eq!(state.get("count").and_then(|v| v.as_i64()), Some(42));
/// ```
///
/// Using scoped runtimes for isolation:
///
/// ```
/// use tinstore::runtime::ReactiveRuntime;
/// use tinstore::ReactiveState;
///
/// ReactiveRuntime::scope(|| {
///     let state = ReactiveState::from_value(serde_json::json!({ "count": 0 }));
///     assert_eq!(state.get("count").and_then(|v| v.as_i64()), Some(0));
/// });
/// // Runtime and all its state is dropped here
/// ```
pub struct ReactiveRuntime {
    next_id: Cell<usize>,
    context: RefCell<ReactiveContext>,
}

thread_local! {
    static RUNTIME_STACK: RefCell<Vec<Rc<ReactiveRuntime>>> = const { RefCell::new(Vec::new()) };
    static GLOBAL_RUNTIME: Rc<ReactiveRuntime> = ReactiveRuntime::new();
}

impl ReactiveRuntime {
    /// Create a new isolated runtime with its own dependency graph.
    pub fn new() -> Rc<Self> {
        Rc::new(ReactiveRuntime {
            next_id: Cell::new(0),
            context: RefCell::new(ReactiveContext::new()),
        })
    }

    /// Run a function with a fresh isolated runtime.
    ///
    /// The runtime and all its state is cleaned up when the function
    /// returns, unless something created inside keeps a handle to it.
    pub fn scope<F, R>(f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let runtime = Self::new();
        Self::with_runtime(runtime, f)
    }

    /// Get the global runtime of the current thread (fallback).
    pub fn global() -> Rc<Self> {
        GLOBAL_RUNTIME.with(Rc::clone)
    }

    /// Get the current reactive runtime (scoped or global fallback).
    ///
    /// Returns the runtime from the top of the thread-local stack,
    /// or the global runtime if no scoped runtime is active.
    pub fn current() -> Rc<Self> {
        RUNTIME_STACK.with(|stack| {
            stack
                .borrow()
                .last()
                .cloned()
                .unwrap_or_else(Self::global)
        })
    }

    /// Run a function with a specific runtime as the current context.
    ///
    /// This pushes the runtime onto the thread-local stack for the duration
    /// of the function execution.
    ///
    /// # Examples
    ///
    /// ```
    /// use tinstore::runtime::ReactiveRuntime;
    /// use std::rc::Rc;
    ///
    /// let runtime = ReactiveRuntime::new();
    /// let inside = ReactiveRuntime::with_runtime(runtime.clone(), || ReactiveRuntime::current());
    /// assert!(Rc::ptr_eq(&runtime, &inside));
    /// ```
    pub fn with_runtime<F, R>(runtime: Rc<Self>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().push(runtime);
        });

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(f));

        RUNTIME_STACK.with(|stack| {
            stack.borrow_mut().pop();
        });

        match result {
            Ok(r) => r,
            Err(e) => std::panic::resume_unwind(e),
        }
    }

    /// Clear all observers, dependencies, and reset the ID counter.
    ///
    /// Useful for resetting between tests.
    pub fn clear(&self) {
        self.context.borrow_mut().clear();
        self.next_id.set(0);
    }

    /// Generate the next unique ID for a target or observer.
    pub fn next_id(&self) -> usize {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        id
    }

    /// ID of the observer currently collecting dependencies, if any.
    pub fn current_observer(&self) -> Option<usize> {
        self.context.borrow().current_observer
    }

    /// Track a read of `path` on `target` by the current observer.
    pub fn track_read(&self, target: usize, path: &[String]) {
        let mut ctx = self.context.borrow_mut();
        let Some(current_observer) = ctx.current_observer else {
            return;
        };
        ctx.dependencies
            .entry(target)
            .or_default()
            .entry(path.to_vec())
            .or_default()
            .insert(current_observer);
        ctx.observer_deps
            .entry(current_observer)
            .or_default()
            .insert((target, path.to_vec()));
    }

    /// Notify every observer affected by a write to `path` on `target`.
    ///
    /// Observers of `path` and of anything below it are notified. When the
    /// write added or removed a key (`structural`), observers of the parent
    /// path are notified as well. Each observer runs at most once per call.
    pub fn notify_observers(&self, target: usize, path: &[String], structural: bool) {
        let pending: Vec<Observer> = {
            let ctx = self.context.borrow();
            let Some(paths) = ctx.dependencies.get(&target) else {
                return;
            };
            let parent = path.split_last().map(|(_, parent)| parent);
            let mut ids = BTreeSet::new();
            for (tracked, observers) in paths {
                let hit = tracked.starts_with(path)
                    || (structural && parent == Some(tracked.as_slice()));
                if hit {
                    ids.extend(observers.iter().copied());
                }
            }
            if let Some(current) = ctx.current_observer {
                ids.remove(&current);
            }
            ids.into_iter()
                .filter_map(|id| ctx.observers.get(&id).cloned())
                .collect()
        };

        for observer in pending {
            observer();
        }
    }

    /// Register the change callback of an observer, dropping its old dependencies.
    pub fn create_observer<F>(&self, observer_id: usize, f: F)
    where
        F: Fn() + 'static,
    {
        let mut ctx = self.context.borrow_mut();
        ctx.clear_dependencies(observer_id);
        ctx.observers.insert(observer_id, Rc::new(f));
    }

    /// Forget every dependency of an observer, keeping its callback.
    pub fn clear_dependencies(&self, observer_id: usize) {
        self.context.borrow_mut().clear_dependencies(observer_id);
    }

    /// Remove an observer and all of its dependencies.
    pub fn remove_observer(&self, observer_id: usize) {
        let mut ctx = self.context.borrow_mut();
        ctx.observers.remove(&observer_id);
        ctx.clear_dependencies(observer_id);
    }

    /// Run a function with a specific observer as the current context.
    pub fn with_observer<F, R>(&self, observer_id: usize, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.swap_observer(Some(observer_id), f)
    }

    /// Run a function without tracking any reads.
    pub fn untracked<F, R>(&self, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        self.swap_observer(None, f)
    }

    fn swap_observer<F, R>(&self, observer: Option<usize>, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        let prev = std::mem::replace(&mut self.context.borrow_mut().current_observer, observer);
        let result = f();
        self.context.borrow_mut().current_observer = prev;
        result
    }

    /// Paths of `target` that `observer_id` currently depends on.
    pub fn observer_paths(&self, observer_id: usize, target: usize) -> Vec<Path> {
        let ctx = self.context.borrow();
        ctx.observer_deps
            .get(&observer_id)
            .map(|deps| {
                deps.iter()
                    .filter(|(t, _)| *t == target)
                    .map(|(_, path)| path.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Whether `observer_id` is still registered.
    pub fn has_observer(&self, observer_id: usize) -> bool {
        self.context.borrow().observers.contains_key(&observer_id)
    }
}
