use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use tracing::trace;

use crate::error::ActionError;
use crate::reactive::{Controller, RawState, ReactiveState, StateValue};

use super::action::{ActionMap, ActionReturn};
use super::descriptor::NamespaceOptions;
use super::lifecycle::LifeCycle;
use super::persist::PersistHandle;

type Delivery = Box<dyn FnOnce()>;
type Deliver = Rc<dyn Fn(&Controller)>;

struct HookInner {
    reactive: ReactiveState,
    raw: RawState,
    lifecycle: LifeCycle,
    deep_selector: bool,
    namespace: NamespaceOptions,
    actions: ActionMap,
    pending: Rc<RefCell<VecDeque<Delivery>>>,
    _persist: Option<PersistHandle>,
}

/// A created store, as seen by the components that use it.
///
/// Components [`subscribe`](StoreHook::subscribe) to the parts of the state
/// they read and are notified when those parts change, subject to the
/// store's [`LifeCycle`]. When `sync_update_component` is off,
/// notifications are queued until [`flush`](StoreHook::flush).
///
/// Cloning yields another handle to the same store.
#[derive(Clone)]
pub struct StoreHook {
    inner: Rc<HookInner>,
}

impl StoreHook {
    pub(crate) fn new(
        reactive: ReactiveState,
        lifecycle: LifeCycle,
        deep_selector: bool,
        namespace: NamespaceOptions,
        actions: ActionMap,
        persist: Option<PersistHandle>,
    ) -> Self {
        Self {
            inner: Rc::new(HookInner {
                raw: reactive.raw(),
                reactive,
                lifecycle,
                deep_selector,
                namespace,
                actions,
                pending: Rc::new(RefCell::new(VecDeque::new())),
                _persist: persist,
            }),
        }
    }

    /// Watch the value picked by `selector`.
    ///
    /// `on_change` receives the new value whenever it differs from the last
    /// one delivered. With the deep-selector flag on, containers the
    /// selector reads are watched down to their nested fields.
    ///
    /// # Examples
    ///
    /// ```
    /// use tinstore::{CreateStateOptions, StateDescriptor, StoreContext};
    /// use std::cell::Cell;
    /// use std::rc::Rc;
    ///
    /// let ctx = StoreContext::default();
    /// let store = ctx.create_state(
    ///     || StateDescriptor::plain(serde_json::json!({ "count": 0 })),
    ///     "counter",
    ///     CreateStateOptions::new(),
    /// );
    ///
    /// let seen = Rc::new(Cell::new(0));
    /// let _sub = store.subscribe(
    ///     |state| state.get("count").and_then(|v| v.as_i64()).unwrap_or(0),
    ///     {
    ///         let seen = seen.clone();
    ///         move |count| seen.set(*count)
    ///     },
    /// );
    ///
    /// store.get_final_state().set("count", 2);
    /// assert_eq!(seen.get(), 0);
    /// store.flush();
    /// assert_eq!(seen.get(), 2);
    /// ```
    pub fn subscribe<T, S, F>(&self, selector: S, on_change: F) -> Subscription<T>
    where
        T: Clone + PartialEq + 'static,
        S: Fn(&ReactiveState) -> T + 'static,
        F: Fn(&T) + 'static,
    {
        let slot: Rc<RefCell<Option<T>>> = Rc::new(RefCell::new(None));

        let getter = {
            let state = self.inner.reactive.clone();
            let slot = slot.clone();
            let deep = self.inner.deep_selector;
            move || {
                let value = selector(&state);
                if deep {
                    state.track_deep();
                }
                *slot.borrow_mut() = Some(value);
            }
        };

        let deliver: Deliver = {
            let slot = slot.clone();
            Rc::new(move |controller: &Controller| {
                let before = slot.borrow().clone();
                controller.run();
                let after = slot.borrow().clone();
                if let Some(after) = after {
                    if before.as_ref() != Some(&after) {
                        on_change(&after);
                    }
                }
            })
        };

        let controller = self.watch(getter, deliver);
        Subscription { controller, slot }
    }

    /// Watch the whole state; `on_change` fires on every change.
    ///
    /// Without the deep-selector flag only top-level fields are watched.
    pub fn subscribe_state<F>(&self, on_change: F) -> Subscription<()>
    where
        F: Fn(&ReactiveState) + 'static,
    {
        let getter = {
            let state = self.inner.reactive.clone();
            let deep = self.inner.deep_selector;
            move || {
                if deep {
                    state.traverse();
                } else {
                    for key in state.keys() {
                        let _ = state.get(&key);
                    }
                }
            }
        };

        let deliver: Deliver = {
            let state = self.inner.reactive.clone();
            Rc::new(move |controller: &Controller| {
                controller.run();
                on_change(&state);
            })
        };

        let controller = self.watch(getter, deliver);
        Subscription {
            controller,
            slot: Rc::new(RefCell::new(Some(()))),
        }
    }

    fn watch<G>(&self, getter: G, deliver: Deliver) -> Controller
    where
        G: Fn() + 'static,
    {
        let pending = self.inner.pending.clone();
        let queued = Rc::new(Cell::new(false));

        let controller = Controller::new_in(
            Rc::clone(self.inner.reactive.runtime()),
            getter,
            self.inner.lifecycle.clone(),
            &self.inner.namespace.name,
            move |controller| {
                let lifecycle = controller.lifecycle();
                if !lifecycle.can_update_component() {
                    trace!(store = controller.namespace(), "component update suppressed");
                    return;
                }
                if lifecycle.sync_update_component() {
                    deliver(controller);
                    return;
                }
                if queued.replace(true) {
                    return;
                }

                let weak = controller.downgrade();
                let deliver = deliver.clone();
                let queued = queued.clone();
                pending.borrow_mut().push_back(Box::new(move || {
                    queued.set(false);
                    let Some(controller) = weak.upgrade() else {
                        return;
                    };
                    if !controller.is_active() {
                        return;
                    }
                    if !controller.lifecycle().can_update_component() {
                        trace!(store = controller.namespace(), "queued component update suppressed");
                        return;
                    }
                    deliver(&controller);
                }));
            },
        );
        controller.run();
        controller
    }

    /// Deliver every queued notification. Returns how many were processed.
    pub fn flush(&self) -> usize {
        let mut processed = 0;
        loop {
            let next = self.inner.pending.borrow_mut().pop_front();
            let Some(delivery) = next else {
                break;
            };
            delivery();
            processed += 1;
        }
        processed
    }

    /// Call an action by name.
    pub fn dispatch(&self, action: &str, args: &[StateValue]) -> Result<ActionReturn, ActionError> {
        self.inner.actions.dispatch(action, args)
    }

    /// The store's final actions, instrumented when devtools are connected.
    pub fn actions(&self) -> &ActionMap {
        &self.inner.actions
    }

    pub fn namespace(&self) -> &NamespaceOptions {
        &self.inner.namespace
    }

    pub fn deep_selector(&self) -> bool {
        self.inner.deep_selector
    }

    /// The raw, untracked state.
    pub fn get_state(&self) -> RawState {
        self.inner.raw.clone()
    }

    /// The reactive state, for reads and writes from outside components.
    pub fn get_final_state(&self) -> ReactiveState {
        self.inner.reactive.clone()
    }

    pub fn get_life_cycle(&self) -> &LifeCycle {
        &self.inner.lifecycle
    }

    /// Mutate state without notifying subscribed components.
    ///
    /// The update gate is closed while `mutator` runs and restored to its
    /// previous value afterwards, also when `mutator` panics. Writes still
    /// land and are still seen by observers that are not component
    /// subscriptions, such as a connected debugger.
    ///
    /// # Examples
    ///
    /// ```
    /// use tinstore::{CreateStateOptions, StateDescriptor, StoreContext};
    ///
    /// let ctx = StoreContext::default();
    /// let store = ctx.create_state(
    ///     || StateDescriptor::plain(serde_json::json!({ "count": 0 })),
    ///     "counter",
    ///     CreateStateOptions::new(),
    /// );
    /// store.update_state_without_reactive_update(|state| state.set("count", 5));
    /// assert_eq!(store.get_state().get("count").and_then(|v| v.as_i64()), Some(5));
    /// assert!(store.get_life_cycle().can_update_component());
    /// ```
    pub fn update_state_without_reactive_update<R, F>(&self, mutator: F) -> R
    where
        F: FnOnce(&ReactiveState) -> R,
    {
        let _gate = self.inner.lifecycle.suspend_component_updates();
        mutator(&self.inner.reactive)
    }
}

impl fmt::Debug for StoreHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreHook")
            .field("namespace", &self.inner.namespace)
            .field("deep_selector", &self.inner.deep_selector)
            .field("lifecycle", &self.inner.lifecycle)
            .field("actions", &self.inner.actions.keys().collect::<Vec<_>>())
            .finish_non_exhaustive()
    }
}

/// A live subscription. Dropping it unsubscribes.
pub struct Subscription<T> {
    controller: Controller,
    slot: Rc<RefCell<Option<T>>>,
}

impl<T: Clone> Subscription<T> {
    /// The last value the selector produced.
    pub fn value(&self) -> Option<T> {
        self.slot.borrow().clone()
    }
}

impl<T> Subscription<T> {
    pub fn is_active(&self) -> bool {
        self.controller.is_active()
    }

    /// Stop receiving notifications.
    pub fn unsubscribe(&self) {
        self.controller.stop();
    }
}

impl<T> Drop for Subscription<T> {
    fn drop(&mut self) {
        self.controller.stop();
    }
}

impl<T: fmt::Debug> fmt::Debug for Subscription<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("controller", &self.controller)
            .field("value", &*self.slot.borrow())
            .finish()
    }
}
