use std::collections::btree_map::{self, BTreeMap};
use std::fmt;
use std::future::Future;
use std::rc::Rc;

use futures::future::LocalBoxFuture;

use crate::error::ActionError;
use crate::reactive::StateValue;

/// Label used when an action has no name.
pub const ANONYMOUS_ACTION: &str = "anonymous";

pub type ActionResult = Result<StateValue, ActionError>;

/// What an action call hands back: a finished result or one still pending.
pub enum ActionReturn {
    Ready(ActionResult),
    Pending(LocalBoxFuture<'static, ActionResult>),
}

impl ActionReturn {
    pub fn is_pending(&self) -> bool {
        matches!(self, ActionReturn::Pending(_))
    }

    /// The result of a synchronous call, or `None` if it is still pending.
    pub fn ready(self) -> Option<ActionResult> {
        match self {
            ActionReturn::Ready(result) => Some(result),
            ActionReturn::Pending(_) => None,
        }
    }

    /// Wait for the result, whichever form it came in.
    pub async fn settle(self) -> ActionResult {
        match self {
            ActionReturn::Ready(result) => result,
            ActionReturn::Pending(future) => future.await,
        }
    }
}

impl fmt::Debug for ActionReturn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionReturn::Ready(result) => f.debug_tuple("Ready").field(result).finish(),
            ActionReturn::Pending(_) => f.write_str("Pending(..)"),
        }
    }
}

type ActionBody = Rc<dyn Fn(&[StateValue]) -> ActionReturn>;

/// A named operation on store state.
///
/// `arity` is the number of declared parameters; callers may pass more
/// arguments, but only the first `arity` are recorded by the devtools.
#[derive(Clone)]
pub struct Action {
    name: Option<String>,
    arity: usize,
    body: ActionBody,
}

impl Action {
    /// An unnamed action.
    pub fn new<F>(arity: usize, body: F) -> Self
    where
        F: Fn(&[StateValue]) -> ActionReturn + 'static,
    {
        Self {
            name: None,
            arity,
            body: Rc::new(body),
        }
    }

    /// An unnamed synchronous action.
    pub fn sync<F>(arity: usize, body: F) -> Self
    where
        F: Fn(&[StateValue]) -> ActionResult + 'static,
    {
        Self::new(arity, move |args| ActionReturn::Ready(body(args)))
    }

    /// An unnamed asynchronous action.
    pub fn future<F, Fut>(arity: usize, body: F) -> Self
    where
        F: Fn(&[StateValue]) -> Fut + 'static,
        Fut: Future<Output = ActionResult> + 'static,
    {
        Self::new(arity, move |args| ActionReturn::Pending(Box::pin(body(args))))
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The name, or [`ANONYMOUS_ACTION`].
    pub fn label(&self) -> &str {
        self.name().unwrap_or(ANONYMOUS_ACTION)
    }

    pub fn arity(&self) -> usize {
        self.arity
    }

    pub fn call(&self, args: &[StateValue]) -> ActionReturn {
        (self.body)(args)
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Action")
            .field("name", &self.name)
            .field("arity", &self.arity)
            .finish()
    }
}

/// Actions of a store, by key.
#[derive(Clone, Debug, Default)]
pub struct ActionMap {
    actions: BTreeMap<String, Action>,
}

impl ActionMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a synchronous action named after its key.
    ///
    /// # Examples
    ///
    /// ```
    /// use tinstore::{ActionMap, StateValue};
    ///
    /// let actions = ActionMap::new().action("double", 1, |args| {
    ///     let n = args.first().and_then(StateValue::as_i64).unwrap_or(0);
    ///     Ok(StateValue::from(n * 2))
    /// });
    /// let result = actions.get("double").unwrap().call(&[21.into()]).ready();
    /// assert_eq!(result, Some(Ok(StateValue::from(42))));
    /// ```
    pub fn action<F>(self, key: &str, arity: usize, body: F) -> Self
    where
        F: Fn(&[StateValue]) -> ActionResult + 'static,
    {
        self.with(key, Action::sync(arity, body).named(key))
    }

    /// Add an asynchronous action named after its key.
    pub fn async_action<F, Fut>(self, key: &str, arity: usize, body: F) -> Self
    where
        F: Fn(&[StateValue]) -> Fut + 'static,
        Fut: Future<Output = ActionResult> + 'static,
    {
        self.with(key, Action::future(arity, body).named(key))
    }

    /// Add an action under `key`, keeping its own name (if any).
    pub fn with(mut self, key: &str, action: Action) -> Self {
        self.insert(key, action);
        self
    }

    pub fn insert(&mut self, key: &str, action: Action) -> Option<Action> {
        self.actions.insert(key.to_string(), action)
    }

    /// Add every action of `other`, replacing same-key entries.
    pub fn extend(&mut self, other: ActionMap) {
        self.actions.extend(other.actions);
    }

    pub fn get(&self, key: &str) -> Option<&Action> {
        self.actions.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.actions.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.actions.keys().map(String::as_str)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Action)> {
        self.actions.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// Call the action under `key`.
    pub fn dispatch(&self, key: &str, args: &[StateValue]) -> Result<ActionReturn, ActionError> {
        self.get(key)
            .map(|action| action.call(args))
            .ok_or_else(|| ActionError::UnknownAction(key.to_string()))
    }
}

impl IntoIterator for ActionMap {
    type Item = (String, Action);
    type IntoIter = btree_map::IntoIter<String, Action>;

    fn into_iter(self) -> Self::IntoIter {
        self.actions.into_iter()
    }
}

impl FromIterator<(String, Action)> for ActionMap {
    fn from_iter<I: IntoIterator<Item = (String, Action)>>(iter: I) -> Self {
        Self {
            actions: iter.into_iter().collect(),
        }
    }
}
