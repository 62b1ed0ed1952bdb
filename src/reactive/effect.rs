use std::rc::Rc;

use super::controller::Controller;
use crate::runtime::ReactiveRuntime;
use crate::store::LifeCycle;

/// A side effect that runs when its dependencies change.
///
/// Effects track reactive reads and re-run when any of them changes. The
/// effect runs immediately on creation to establish initial dependencies.
///
/// # Examples
///
/// ```
/// use tinstore::{Effect, ReactiveState};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let state = ReactiveState::from_value(serde_json::json!({ "count": 0 }));
/// let runs = Rc::new(Cell::new(0));
///
/// let _effect = Effect::new({
///     let state = state.clone();
///     let runs = runs.clone();
///     move || {
///         let _ = state.get("count");
///         runs.set(runs.get() + 1);
///     }
/// });
///
/// // Effect runs immediately
/// assert_eq!(runs.get(), 1);
///
/// state.set("count", 1);
/// assert_eq!(runs.get(), 2);
/// ```
pub struct Effect {
    controller: Controller,
}

impl Effect {
    /// Create a new effect that runs when dependencies change.
    pub fn new<F>(effect: F) -> Self
    where
        F: Fn() + 'static,
    {
        Self::new_in(ReactiveRuntime::current(), effect)
    }

    /// Create an effect owned by a specific runtime.
    pub fn new_in<F>(runtime: Rc<ReactiveRuntime>, effect: F) -> Self
    where
        F: Fn() + 'static,
    {
        let controller = Controller::new_in(runtime, effect, LifeCycle::new(), "effect", |c| c.run());
        controller.run();
        Self { controller }
    }

    /// Manually trigger the effect.
    pub fn run(&self) {
        self.controller.run();
    }

    /// Detach the effect from its dependencies.
    pub fn stop(&self) {
        self.controller.stop();
    }
}

impl Drop for Effect {
    fn drop(&mut self) {
        self.controller.stop();
    }
}
