use std::cell::Cell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::runtime::ReactiveRuntime;
use crate::store::LifeCycle;

type Getter = Box<dyn Fn()>;
type OnUpdate = Box<dyn Fn(&Controller)>;

struct ControllerInner {
    id: usize,
    runtime: Rc<ReactiveRuntime>,
    getter: Getter,
    lifecycle: LifeCycle,
    namespace: String,
    on_update: OnUpdate,
    active: Cell<bool>,
}

/// A tracked computation with an explicit update hook.
///
/// `run` executes the getter while recording every reactive read as a
/// dependency. When any dependency changes, `on_update` is called with the
/// controller; it decides whether to `run` again and what else to do. The
/// controller never re-runs on its own.
///
/// Cloning yields another handle to the same computation. The
/// computation is detached when [`stop`](Controller::stop) is called or the
/// last handle is dropped.
#[derive(Clone)]
pub struct Controller {
    inner: Rc<ControllerInner>,
}

impl Controller {
    /// Create a controller in the current runtime. It does not run yet.
    pub fn new<G, U>(getter: G, lifecycle: LifeCycle, namespace: &str, on_update: U) -> Self
    where
        G: Fn() + 'static,
        U: Fn(&Controller) + 'static,
    {
        Self::new_in(
            ReactiveRuntime::current(),
            getter,
            lifecycle,
            namespace,
            on_update,
        )
    }

    /// Create a controller in a specific runtime. It does not run yet.
    pub fn new_in<G, U>(
        runtime: Rc<ReactiveRuntime>,
        getter: G,
        lifecycle: LifeCycle,
        namespace: &str,
        on_update: U,
    ) -> Self
    where
        G: Fn() + 'static,
        U: Fn(&Controller) + 'static,
    {
        let id = runtime.next_id();
        let inner = Rc::new(ControllerInner {
            id,
            runtime: Rc::clone(&runtime),
            getter: Box::new(getter),
            lifecycle,
            namespace: namespace.to_string(),
            on_update: Box::new(on_update),
            active: Cell::new(true),
        });

        let weak = Rc::downgrade(&inner);
        runtime.create_observer(id, move || {
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if inner.active.get() {
                let controller = Controller { inner };
                (controller.inner.on_update)(&controller);
            }
        });

        Self { inner }
    }

    /// Run the getter, replacing the previous dependency set.
    ///
    /// A stopped controller still runs the getter, but tracks nothing.
    pub fn run(&self) {
        let inner = &self.inner;
        if !inner.active.get() {
            inner.runtime.untracked(|| (inner.getter)());
            return;
        }
        inner.runtime.clear_dependencies(inner.id);
        inner.runtime.with_observer(inner.id, || (inner.getter)());
    }

    /// Detach from every dependency. Further changes are ignored.
    pub fn stop(&self) {
        if self.inner.active.replace(false) {
            self.inner.runtime.remove_observer(self.inner.id);
        }
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.get()
    }

    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn lifecycle(&self) -> &LifeCycle {
        &self.inner.lifecycle
    }

    pub fn namespace(&self) -> &str {
        &self.inner.namespace
    }

    pub fn ptr_eq(&self, other: &Controller) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// A handle that does not keep the computation alive.
    pub fn downgrade(&self) -> WeakController {
        WeakController {
            inner: Rc::downgrade(&self.inner),
        }
    }
}

/// Non-owning handle to a [`Controller`].
#[derive(Clone)]
pub struct WeakController {
    inner: Weak<ControllerInner>,
}

impl WeakController {
    pub fn upgrade(&self) -> Option<Controller> {
        self.inner.upgrade().map(|inner| Controller { inner })
    }
}

impl Drop for ControllerInner {
    fn drop(&mut self) {
        self.runtime.remove_observer(self.id);
    }
}

impl fmt::Debug for Controller {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Controller")
            .field("id", &self.inner.id)
            .field("namespace", &self.inner.namespace)
            .field("active", &self.inner.active.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::ReactiveState;
    use serde_json::json;

    #[test]
    fn update_hook_fires_on_dependency_change() {
        let state = ReactiveState::from_value(json!({ "count": 0 }));
        let updates = Rc::new(Cell::new(0));

        let reader = state.clone();
        let counter = updates.clone();
        let controller = Controller::new(
            move || {
                let _ = reader.get("count");
            },
            LifeCycle::new(),
            "test",
            move |c| {
                counter.set(counter.get() + 1);
                c.run();
            },
        );
        controller.run();

        state.set("count", 1);
        state.set("count", 2);
        assert_eq!(updates.get(), 2);
    }

    #[test]
    fn dependencies_persist_until_next_run() {
        let state = ReactiveState::from_value(json!({ "count": 0 }));
        let updates = Rc::new(Cell::new(0));

        let reader = state.clone();
        let counter = updates.clone();
        let controller = Controller::new(
            move || {
                let _ = reader.get("count");
            },
            LifeCycle::new(),
            "test",
            move |_| counter.set(counter.get() + 1),
        );
        controller.run();

        state.set("count", 1);
        state.set("count", 2);
        assert_eq!(updates.get(), 2);
    }

    #[test]
    fn stopped_controller_ignores_changes() {
        let state = ReactiveState::from_value(json!({ "count": 0 }));
        let updates = Rc::new(Cell::new(0));

        let reader = state.clone();
        let counter = updates.clone();
        let controller = Controller::new(
            move || {
                let _ = reader.get("count");
            },
            LifeCycle::new(),
            "test",
            move |_| counter.set(counter.get() + 1),
        );
        controller.run();
        controller.stop();

        state.set("count", 1);
        assert_eq!(updates.get(), 0);
        assert!(!controller.is_active());
    }

    #[test]
    fn dropping_last_handle_detaches() {
        let state = ReactiveState::from_value(json!({ "count": 0 }));
        let updates = Rc::new(Cell::new(0));

        {
            let reader = state.clone();
            let counter = updates.clone();
            let controller = Controller::new(
                move || {
                    let _ = reader.get("count");
                },
                LifeCycle::new(),
                "test",
                move |_| counter.set(counter.get() + 1),
            );
            controller.run();
        }

        state.set("count", 1);
        assert_eq!(updates.get(), 0);
    }

    #[test]
    fn weak_handle_does_not_keep_controller_alive() {
        let controller = Controller::new(|| {}, LifeCycle::new(), "test", |_| {});
        let weak = controller.downgrade();
        assert!(weak.upgrade().is_some_and(|c| c.ptr_eq(&controller)));

        drop(controller);
        assert!(weak.upgrade().is_none());
    }
}
