use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fmt;
use std::rc::Rc;

use futures::future::LocalBoxFuture;
use serde::{Serialize, Serializer};
use serde_json::Value;

use super::state::ReactiveState;

/// A callable stored inside state. State should hold data only, so this
/// exists to let setup code express (and validation catch) the mistake.
pub type StateFn = Rc<dyn Fn(&[StateValue]) -> StateValue>;

/// A value that is not available yet.
#[derive(Clone)]
pub struct PendingValue {
    future: Rc<RefCell<Option<LocalBoxFuture<'static, StateValue>>>>,
}

impl PendingValue {
    /// Take the underlying future. Returns `None` once taken.
    pub fn take(&self) -> Option<LocalBoxFuture<'static, StateValue>> {
        self.future.borrow_mut().take()
    }
}

/// A node of store state.
///
/// Plain data variants mirror JSON. `Function`, `Pending` and `Reactive`
/// are representable so that malformed setup output can be diagnosed;
/// they do not survive snapshotting.
#[derive(Clone, Default)]
pub enum StateValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    List(Vec<StateValue>),
    Map(BTreeMap<String, StateValue>),
    Function(StateFn),
    Pending(PendingValue),
    Reactive(ReactiveState),
}

/// Outcome of writing a value at a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Assign {
    /// The new value equals the old one.
    Unchanged,
    /// An existing slot was overwritten.
    Replaced,
    /// A new key or list slot was created. `at` is the length of the
    /// shortest prefix of the written path that did not exist before.
    Inserted { at: usize },
    /// An intermediate node is not a container.
    Rejected,
}

impl StateValue {
    /// Build a map value from key/value pairs.
    pub fn map<K, V, I>(entries: I) -> Self
    where
        K: Into<String>,
        V: Into<StateValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        StateValue::Map(
            entries
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }

    /// Wrap a callable as a state value.
    pub fn function(f: impl Fn(&[StateValue]) -> StateValue + 'static) -> Self {
        StateValue::Function(Rc::new(f))
    }

    /// Wrap a future as a pending state value.
    pub fn pending(future: impl std::future::Future<Output = StateValue> + 'static) -> Self {
        StateValue::Pending(PendingValue {
            future: Rc::new(RefCell::new(Some(Box::pin(future)))),
        })
    }

    pub fn is_null(&self) -> bool {
        matches!(self, StateValue::Null)
    }

    pub fn is_container(&self) -> bool {
        matches!(self, StateValue::List(_) | StateValue::Map(_))
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            StateValue::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            StateValue::Int(i) => Some(*i),
            StateValue::Float(f) if f.fract() == 0.0 => Some(*f as i64),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            StateValue::Int(i) => Some(*i as f64),
            StateValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            StateValue::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, StateValue>> {
        match self {
            StateValue::Map(map) => Some(map),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[StateValue]> {
        match self {
            StateValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Keys of a map (or indices of a list) in iteration order.
    pub fn keys(&self) -> Vec<String> {
        match self {
            StateValue::Map(map) => map.keys().cloned().collect(),
            StateValue::List(items) => (0..items.len()).map(|i| i.to_string()).collect(),
            _ => Vec::new(),
        }
    }

    /// Direct child by key (map) or index (list).
    pub fn child(&self, key: &str) -> Option<&StateValue> {
        match self {
            StateValue::Map(map) => map.get(key),
            StateValue::List(items) => key.parse::<usize>().ok().and_then(|i| items.get(i)),
            _ => None,
        }
    }

    /// Follow `path` from this node.
    pub fn lookup<S: AsRef<str>>(&self, path: &[S]) -> Option<&StateValue> {
        path.iter()
            .try_fold(self, |node, segment| node.child(segment.as_ref()))
    }

    fn child_mut(&mut self, key: &str) -> Option<&mut StateValue> {
        match self {
            StateValue::Map(map) => map.get_mut(key),
            StateValue::List(items) => key
                .parse::<usize>()
                .ok()
                .and_then(move |i| items.get_mut(i)),
            _ => None,
        }
    }

    pub(crate) fn lookup_mut<S: AsRef<str>>(&mut self, path: &[S]) -> Option<&mut StateValue> {
        path.iter()
            .try_fold(self, |node, segment| node.child_mut(segment.as_ref()))
    }

    /// Write `value` at `path`, creating intermediate maps for missing keys.
    pub(crate) fn assign<S: AsRef<str>>(&mut self, path: &[S], value: StateValue) -> Assign {
        let Some((last, parents)) = path.split_last() else {
            if *self == value {
                return Assign::Unchanged;
            }
            *self = value;
            return Assign::Replaced;
        };

        let mut created = None;
        let mut node = self;
        for (depth, segment) in parents.iter().enumerate() {
            let segment = segment.as_ref();
            node = match node {
                StateValue::Map(map) => {
                    if !map.contains_key(segment) {
                        created.get_or_insert(depth + 1);
                    }
                    map.entry(segment.to_string())
                        .or_insert_with(|| StateValue::Map(BTreeMap::new()))
                }
                StateValue::List(items) => match segment.parse::<usize>() {
                    Ok(i) if i < items.len() => &mut items[i],
                    _ => return Assign::Rejected,
                },
                _ => return Assign::Rejected,
            };
        }

        let inserted = Assign::Inserted {
            at: created.unwrap_or(path.len()),
        };
        let last = last.as_ref();
        match node {
            StateValue::Map(map) => match map.get_mut(last) {
                Some(slot) if *slot == value => Assign::Unchanged,
                Some(slot) => {
                    *slot = value;
                    Assign::Replaced
                }
                None => {
                    map.insert(last.to_string(), value);
                    inserted
                }
            },
            StateValue::List(items) => match last.parse::<usize>() {
                Ok(i) if i < items.len() => {
                    if items[i] == value {
                        Assign::Unchanged
                    } else {
                        items[i] = value;
                        Assign::Replaced
                    }
                }
                Ok(i) if i == items.len() => {
                    items.push(value);
                    inserted
                }
                _ => Assign::Rejected,
            },
            _ => Assign::Rejected,
        }
    }

    /// Remove the entry at `path`. Returns the removed value.
    pub(crate) fn remove<S: AsRef<str>>(&mut self, path: &[S]) -> Option<StateValue> {
        let (last, parents) = path.split_last()?;
        match self.lookup_mut(parents)? {
            StateValue::Map(map) => map.remove(last.as_ref()),
            StateValue::List(items) => {
                let i = last.as_ref().parse::<usize>().ok()?;
                (i < items.len()).then(|| items.remove(i))
            }
            _ => None,
        }
    }

    /// Every path below this node (not including the node itself).
    pub(crate) fn descendant_paths(&self) -> Vec<Vec<String>> {
        let mut out = Vec::new();
        let mut stack: Vec<(Vec<String>, &StateValue)> = vec![(Vec::new(), self)];
        while let Some((prefix, node)) = stack.pop() {
            for key in node.keys() {
                if let Some(child) = node.child(&key) {
                    let mut path = prefix.clone();
                    path.push(key);
                    out.push(path.clone());
                    stack.push((path, child));
                }
            }
        }
        out
    }

    /// Lossy JSON form of this value.
    ///
    /// Returns `None` for values JSON cannot represent at all (functions,
    /// cyclic references); containers skip or null those entries.
    pub fn to_snapshot(&self) -> Option<Value> {
        self.snapshot_with(&mut Vec::new())
    }

    pub(crate) fn snapshot_with(&self, seen: &mut Vec<usize>) -> Option<Value> {
        match self {
            StateValue::Null => Some(Value::Null),
            StateValue::Bool(b) => Some(Value::Bool(*b)),
            StateValue::Int(i) => Some(Value::from(*i)),
            StateValue::Float(f) => Some(
                serde_json::Number::from_f64(*f)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
            ),
            StateValue::String(s) => Some(Value::String(s.clone())),
            StateValue::List(items) => Some(Value::Array(
                items
                    .iter()
                    .map(|item| item.snapshot_with(seen).unwrap_or(Value::Null))
                    .collect(),
            )),
            StateValue::Map(map) => Some(Value::Object(
                map.iter()
                    .filter_map(|(k, v)| v.snapshot_with(seen).map(|v| (k.clone(), v)))
                    .collect(),
            )),
            StateValue::Function(_) => None,
            StateValue::Pending(_) => Some(Value::Object(serde_json::Map::new())),
            StateValue::Reactive(state) => state.raw().snapshot_with(seen),
        }
    }
}

impl PartialEq for StateValue {
    fn eq(&self, other: &Self) -> bool {
        use StateValue::*;
        match (self, other) {
            (Null, Null) => true,
            (Bool(a), Bool(b)) => a == b,
            (Int(a), Int(b)) => a == b,
            (Float(a), Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (Int(a), Float(b)) | (Float(b), Int(a)) => (*a as f64) == *b,
            (String(a), String(b)) => a == b,
            (List(a), List(b)) => a == b,
            (Map(a), Map(b)) => a == b,
            (Function(a), Function(b)) => Rc::ptr_eq(a, b),
            (Pending(a), Pending(b)) => Rc::ptr_eq(&a.future, &b.future),
            (Reactive(a), Reactive(b)) => a.raw().id() == b.raw().id(),
            _ => false,
        }
    }
}

impl fmt::Debug for StateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StateValue::Null => f.write_str("Null"),
            StateValue::Bool(b) => write!(f, "Bool({b})"),
            StateValue::Int(i) => write!(f, "Int({i})"),
            StateValue::Float(x) => write!(f, "Float({x})"),
            StateValue::String(s) => write!(f, "String({s:?})"),
            StateValue::List(items) => f.debug_list().entries(items).finish(),
            StateValue::Map(map) => f.debug_map().entries(map).finish(),
            StateValue::Function(_) => f.write_str("Function(..)"),
            StateValue::Pending(_) => f.write_str("Pending(..)"),
            StateValue::Reactive(state) => write!(f, "Reactive(#{})", state.raw().id()),
        }
    }
}

impl Serialize for StateValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.to_snapshot()
            .unwrap_or(Value::Null)
            .serialize(serializer)
    }
}

impl From<Value> for StateValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => StateValue::Null,
            Value::Bool(b) => StateValue::Bool(b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => StateValue::Int(i),
                None => StateValue::Float(n.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(s) => StateValue::String(s),
            Value::Array(items) => StateValue::List(items.into_iter().map(Into::into).collect()),
            Value::Object(map) => {
                StateValue::Map(map.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<bool> for StateValue {
    fn from(b: bool) -> Self {
        StateValue::Bool(b)
    }
}

impl From<i32> for StateValue {
    fn from(i: i32) -> Self {
        StateValue::Int(i64::from(i))
    }
}

impl From<i64> for StateValue {
    fn from(i: i64) -> Self {
        StateValue::Int(i)
    }
}

impl From<f64> for StateValue {
    fn from(f: f64) -> Self {
        StateValue::Float(f)
    }
}

impl From<&str> for StateValue {
    fn from(s: &str) -> Self {
        StateValue::String(s.to_string())
    }
}

impl From<String> for StateValue {
    fn from(s: String) -> Self {
        StateValue::String(s)
    }
}

impl<T: Into<StateValue>> From<Vec<T>> for StateValue {
    fn from(items: Vec<T>) -> Self {
        StateValue::List(items.into_iter().map(Into::into).collect())
    }
}

impl From<ReactiveState> for StateValue {
    fn from(state: ReactiveState) -> Self {
        StateValue::Reactive(state)
    }
}
