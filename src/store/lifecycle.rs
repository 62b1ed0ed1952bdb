use std::cell::Cell;
use std::fmt;
use std::rc::Rc;

struct LifeCycleFlags {
    can_update_component: Cell<bool>,
    sync_update_component: Cell<bool>,
}

/// Per-store flags gating how reactive changes reach subscribers.
///
/// - `can_update_component`: when false, change notifications are dropped.
/// - `sync_update_component`: when true, notifications are delivered
///   immediately; otherwise they are batched until the store is flushed.
///
/// Cloning yields another handle to the same flags.
#[derive(Clone)]
pub struct LifeCycle {
    flags: Rc<LifeCycleFlags>,
}

impl LifeCycle {
    pub fn new() -> Self {
        Self {
            flags: Rc::new(LifeCycleFlags {
                can_update_component: Cell::new(true),
                sync_update_component: Cell::new(false),
            }),
        }
    }

    pub fn can_update_component(&self) -> bool {
        self.flags.can_update_component.get()
    }

    pub fn set_can_update_component(&self, value: bool) {
        self.flags.can_update_component.set(value);
    }

    pub fn sync_update_component(&self) -> bool {
        self.flags.sync_update_component.get()
    }

    pub fn set_sync_update_component(&self, value: bool) {
        self.flags.sync_update_component.set(value);
    }

    /// Close the update gate until the returned guard is dropped.
    ///
    /// The flag is restored to the value it had before the call, so guards
    /// nest.
    ///
    /// # Examples
    ///
    /// ```
    /// use tinstore::LifeCycle;
    ///
    /// let lifecycle = LifeCycle::new();
    /// {
    ///     let _gate = lifecycle.suspend_component_updates();
    ///     assert!(!lifecycle.can_update_component());
    /// }
    /// assert!(lifecycle.can_update_component());
    /// ```
    pub fn suspend_component_updates(&self) -> UpdateGate {
        let previous = self.flags.can_update_component.replace(false);
        UpdateGate {
            lifecycle: self.clone(),
            previous,
        }
    }

    pub fn ptr_eq(&self, other: &LifeCycle) -> bool {
        Rc::ptr_eq(&self.flags, &other.flags)
    }
}

impl Default for LifeCycle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for LifeCycle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LifeCycle")
            .field("can_update_component", &self.can_update_component())
            .field("sync_update_component", &self.sync_update_component())
            .finish()
    }
}

/// RAII guard returned by [`LifeCycle::suspend_component_updates`].
#[must_use = "the update gate reopens as soon as the guard is dropped"]
pub struct UpdateGate {
    lifecycle: LifeCycle,
    previous: bool,
}

impl Drop for UpdateGate {
    fn drop(&mut self) {
        self.lifecycle.set_can_update_component(self.previous);
    }
}
