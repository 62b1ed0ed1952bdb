use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::warn;

use super::value::{Assign, StateValue};
use crate::runtime::{Path, ReactiveRuntime};

struct RawInner {
    id: usize,
    runtime: Rc<ReactiveRuntime>,
    value: RefCell<StateValue>,
}

/// The plain, untracked form of store state.
///
/// Reads never register dependencies and writes never notify. Cloning
/// yields another handle to the same underlying object.
#[derive(Clone)]
pub struct RawState {
    inner: Rc<RawInner>,
}

impl RawState {
    /// Create raw state owned by the current runtime.
    pub fn new(value: impl Into<StateValue>) -> Self {
        Self::new_in(ReactiveRuntime::current(), value)
    }

    /// Create raw state owned by a specific runtime.
    pub fn new_in(runtime: Rc<ReactiveRuntime>, value: impl Into<StateValue>) -> Self {
        let id = runtime.next_id();
        Self {
            inner: Rc::new(RawInner {
                id,
                runtime,
                value: RefCell::new(value.into()),
            }),
        }
    }

    /// Identity of this state in the dependency graph.
    pub fn id(&self) -> usize {
        self.inner.id
    }

    pub fn runtime(&self) -> &Rc<ReactiveRuntime> {
        &self.inner.runtime
    }

    pub fn ptr_eq(&self, other: &RawState) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    /// Read the whole value without cloning.
    pub fn with<R>(&self, f: impl FnOnce(&StateValue) -> R) -> R {
        f(&self.inner.value.borrow())
    }

    /// Mutate the whole value without notifying anyone.
    pub fn with_mut<R>(&self, f: impl FnOnce(&mut StateValue) -> R) -> R {
        f(&mut self.inner.value.borrow_mut())
    }

    /// Clone of the whole value.
    pub fn value(&self) -> StateValue {
        self.inner.value.borrow().clone()
    }

    pub fn get(&self, key: &str) -> Option<StateValue> {
        self.get_path(&[key])
    }

    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<StateValue> {
        self.inner.value.borrow().lookup(path).cloned()
    }

    pub fn set(&self, key: &str, value: impl Into<StateValue>) {
        self.set_path(&[key], value);
    }

    pub fn set_path<S: AsRef<str>>(&self, path: &[S], value: impl Into<StateValue>) {
        self.assign(path, value.into());
    }

    pub(crate) fn assign<S: AsRef<str>>(&self, path: &[S], value: StateValue) -> Assign {
        let outcome = self.inner.value.borrow_mut().assign(path, value);
        if outcome == Assign::Rejected {
            warn!(
                target_id = self.id(),
                path = ?path.iter().map(|s| s.as_ref()).collect::<Vec<&str>>(),
                "write rejected: intermediate value is not a container"
            );
        }
        outcome
    }

    /// Top-level keys of the state.
    pub fn keys(&self) -> Vec<String> {
        self.inner.value.borrow().keys()
    }

    /// Lossy JSON snapshot of the state.
    pub fn snapshot(&self) -> Value {
        self.snapshot_with(&mut Vec::new()).unwrap_or(Value::Null)
    }

    pub(crate) fn snapshot_with(&self, seen: &mut Vec<usize>) -> Option<Value> {
        if seen.contains(&self.id()) {
            return None;
        }
        seen.push(self.id());
        let out = self.inner.value.borrow().snapshot_with(seen);
        seen.pop();
        out
    }
}

impl fmt::Debug for RawState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RawState")
            .field("id", &self.id())
            .field("value", &*self.inner.value.borrow())
            .finish()
    }
}

/// Tracked view over [`RawState`].
///
/// Reads register the running observer as a dependent of the path read;
/// writes notify the dependents of the path written. Every view over the
/// same raw state shares one set of dependencies.
///
/// # Examples
///
/// ```
/// use tinstore::{Effect, ReactiveState};
/// use std::cell::Cell;
/// use std::rc::Rc;
///
/// let state = ReactiveState::from_value(serde_json::json!({ "count": 1 }));
/// let seen = Rc::new(Cell::new(0));
///
/// let _effect = Effect::new({
///     let state = state.clone();
///     let seen = seen.clone();
///     move || seen.set(state.get("count").and_then(|v| v.as_i64()).unwrap_or(0))
/// });
///
/// state.set("count", 5);
/// assert_eq!(seen.get(), 5);
/// ```
#[derive(Clone)]
pub struct ReactiveState {
    raw: RawState,
}

impl ReactiveState {
    /// Wrap raw state so reads track and writes notify.
    pub fn new(raw: RawState) -> Self {
        Self { raw }
    }

    /// Wrap a fresh raw state holding `value`.
    pub fn from_value(value: impl Into<StateValue>) -> Self {
        Self::new(RawState::new(value))
    }

    /// The untracked state underneath.
    pub fn raw(&self) -> RawState {
        self.raw.clone()
    }

    pub fn runtime(&self) -> &Rc<ReactiveRuntime> {
        self.raw.runtime()
    }

    fn track(&self, path: &[String]) {
        self.raw.runtime().track_read(self.raw.id(), path);
    }

    fn owned_path<S: AsRef<str>>(path: &[S]) -> Path {
        path.iter().map(|s| s.as_ref().to_string()).collect()
    }

    pub fn get(&self, key: &str) -> Option<StateValue> {
        self.get_path(&[key])
    }

    pub fn get_path<S: AsRef<str>>(&self, path: &[S]) -> Option<StateValue> {
        self.track(&Self::owned_path(path));
        self.raw.get_path(path)
    }

    /// Read the value at `path` without cloning it.
    pub fn with_path<S: AsRef<str>, R>(
        &self,
        path: &[S],
        f: impl FnOnce(Option<&StateValue>) -> R,
    ) -> R {
        self.track(&Self::owned_path(path));
        self.raw.with(|value| f(value.lookup(path)))
    }

    /// Top-level keys; tracks key additions and removals.
    pub fn keys(&self) -> Vec<String> {
        self.track(&[]);
        self.raw.keys()
    }

    pub fn set(&self, key: &str, value: impl Into<StateValue>) {
        self.set_path(&[key], value);
    }

    pub fn set_path<S: AsRef<str>>(&self, path: &[S], value: impl Into<StateValue>) {
        let outcome = self.raw.assign(path, value.into());
        self.trigger(path, outcome);
    }

    /// Mutate the value at `path` in place; a missing slot starts as `Null`.
    pub fn update<F>(&self, key: &str, f: F)
    where
        F: FnOnce(&mut StateValue),
    {
        self.update_path(&[key], f);
    }

    pub fn update_path<S, F>(&self, path: &[S], f: F)
    where
        S: AsRef<str>,
        F: FnOnce(&mut StateValue),
    {
        let mut next = self.raw.get_path(path).unwrap_or_default();
        f(&mut next);
        let outcome = self.raw.assign(path, next);
        self.trigger(path, outcome);
    }

    /// Remove the entry at `path`, notifying readers of it and of its parent.
    ///
    /// Removing a list item shifts the items after it, so every reader of
    /// the list is notified.
    pub fn remove_path<S: AsRef<str>>(&self, path: &[S]) -> Option<StateValue> {
        let (removed, from_list) = self.raw.with_mut(|value| {
            let from_list = path
                .split_last()
                .and_then(|(_, parents)| value.lookup(parents))
                .is_some_and(|parent| matches!(parent, StateValue::List(_)));
            (value.remove(path), from_list)
        });
        if removed.is_some() {
            match path.split_last() {
                Some((_, parents)) if from_list => self.trigger(parents, Assign::Replaced),
                _ => self.trigger(path, Assign::Inserted { at: path.len() }),
            }
        }
        removed
    }

    fn trigger<S: AsRef<str>>(&self, path: &[S], outcome: Assign) {
        let (path, structural) = match outcome {
            Assign::Unchanged | Assign::Rejected => return,
            Assign::Replaced => (path, false),
            Assign::Inserted { at } => (&path[..at.min(path.len())], true),
        };
        self.raw
            .runtime()
            .notify_observers(self.raw.id(), &Self::owned_path(path), structural);
    }

    /// Read every nested field, so the running observer depends on all of them.
    pub fn traverse(&self) {
        self.traverse_with(&mut Vec::new());
    }

    fn traverse_with(&self, seen: &mut Vec<usize>) {
        self.traverse_from(&[], seen);
    }

    /// Deepen the current observer's reads of this state: every container it
    /// has read so far becomes a dependency on all of its nested fields.
    pub fn track_deep(&self) {
        let runtime = self.raw.runtime();
        let Some(observer) = runtime.current_observer() else {
            return;
        };
        let mut seen = Vec::new();
        for path in runtime.observer_paths(observer, self.raw.id()) {
            self.traverse_from(&path, &mut seen);
        }
    }

    fn traverse_from(&self, base: &[String], seen: &mut Vec<usize>) {
        if seen.contains(&self.raw.id()) && base.is_empty() {
            return;
        }
        if base.is_empty() {
            seen.push(self.raw.id());
        }

        let (paths, nested) = self.raw.with(|value| {
            let Some(node) = value.lookup(base) else {
                return (Vec::new(), Vec::new());
            };
            let mut nested = Vec::new();
            let paths: Vec<Path> = node
                .descendant_paths()
                .into_iter()
                .map(|rel| {
                    if let Some(StateValue::Reactive(inner)) = node.lookup(&rel) {
                        nested.push(inner.clone());
                    }
                    base.iter().cloned().chain(rel).collect()
                })
                .collect();
            if let StateValue::Reactive(inner) = node {
                nested.push(inner.clone());
            }
            (paths, nested)
        });

        self.track(base);
        for path in &paths {
            self.track(path);
        }
        for inner in nested {
            inner.traverse_with(seen);
        }
    }

    /// Lossy JSON snapshot, untracked.
    pub fn snapshot(&self) -> Value {
        self.raw.snapshot()
    }
}

impl fmt::Debug for ReactiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("ReactiveState").field(&self.raw).finish()
    }
}
