use std::cell::RefCell;
use std::rc::Rc;

use serde::Serialize;
use serde_json::Value;

use crate::error::DevToolsError;

/// Name of the single connection every store shares.
pub const DEVTOOLS_CONNECTION_NAME: &str = "__tinstore-devtools__";

/// A time-travel debugger that stores can connect to.
pub trait DevToolsTransport {
    /// Open a connection. Called at most once per [`DevTools`](super::DevTools).
    fn connect(&self, name: &str) -> Result<Rc<dyn DevToolsConnection>, DevToolsError>;
}

/// An open debugger connection.
pub trait DevToolsConnection {
    /// Replace the debugger's view with `state`.
    fn init(&self, state: &Value) -> Result<(), DevToolsError>;

    /// Record that `action` happened and left the stores in `state`.
    fn send(&self, action: &ActionMeta, state: &Value) -> Result<(), DevToolsError>;
}

/// What the debugger is told about one recorded change.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActionMeta {
    #[serde(rename = "type")]
    pub kind: String,

    #[serde(rename = "$payload", skip_serializing_if = "Option::is_none")]
    pub payload: Option<Vec<Value>>,
}

impl ActionMeta {
    /// A synchronous action on `store` finished.
    pub fn sync_action(store: &str, action: &str, payload: Vec<Value>) -> Self {
        Self {
            kind: format!("syncAction-{store}/{action}"),
            payload: Some(payload),
        }
    }

    /// An asynchronous action on `store` settled.
    pub fn async_action(store: &str, action: &str, payload: Vec<Value>) -> Self {
        Self {
            kind: format!("asyncAction-{store}/{action}"),
            payload: Some(payload),
        }
    }

    /// State of `store` changed outside any instrumented action.
    pub fn subscribe_action(store: &str) -> Self {
        Self {
            kind: format!("subscribeAction-{store}"),
            payload: None,
        }
    }
}

/// One `send` received by a [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct DevToolsEvent {
    pub action: ActionMeta,
    pub state: Value,
}

#[derive(Debug, Default)]
struct MemoryLog {
    connections: Vec<String>,
    inits: Vec<Value>,
    events: Vec<DevToolsEvent>,
}

/// In-process debugger that records everything it receives.
///
/// Clones share the same log, so a host can keep one handle and give
/// another to a [`StoreContext`](crate::StoreContext).
#[derive(Debug, Clone, Default)]
pub struct MemoryTransport {
    log: Rc<RefCell<MemoryLog>>,
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Names passed to every `connect` so far.
    pub fn connections(&self) -> Vec<String> {
        self.log.borrow().connections.clone()
    }

    pub fn inits(&self) -> Vec<Value> {
        self.log.borrow().inits.clone()
    }

    pub fn events(&self) -> Vec<DevToolsEvent> {
        self.log.borrow().events.clone()
    }

    /// Event type tags in the order they were sent.
    pub fn event_kinds(&self) -> Vec<String> {
        self.log
            .borrow()
            .events
            .iter()
            .map(|event| event.action.kind.clone())
            .collect()
    }

    pub fn last_event(&self) -> Option<DevToolsEvent> {
        self.log.borrow().events.last().cloned()
    }

    pub fn clear(&self) {
        let mut log = self.log.borrow_mut();
        log.inits.clear();
        log.events.clear();
    }
}

impl DevToolsTransport for MemoryTransport {
    fn connect(&self, name: &str) -> Result<Rc<dyn DevToolsConnection>, DevToolsError> {
        self.log.borrow_mut().connections.push(name.to_string());
        Ok(Rc::new(self.clone()))
    }
}

impl DevToolsConnection for MemoryTransport {
    fn init(&self, state: &Value) -> Result<(), DevToolsError> {
        self.log.borrow_mut().inits.push(state.clone());
        Ok(())
    }

    fn send(&self, action: &ActionMeta, state: &Value) -> Result<(), DevToolsError> {
        self.log.borrow_mut().events.push(DevToolsEvent {
            action: action.clone(),
            state: state.clone(),
        });
        Ok(())
    }
}
