use std::cell::RefCell;
use std::collections::BTreeMap;

use serde_json::{Map, Value};
use tracing::debug;

use crate::reactive::{Controller, RawState};

struct RegistryEntry {
    state: RawState,
    controller: Controller,
}

/// Connected stores by namespace, each with its shadow controller.
///
/// At most one live controller exists per namespace: installing a store
/// under a taken name stops and evicts the previous one first.
#[derive(Default)]
pub struct NamespaceRegistry {
    entries: RefCell<BTreeMap<String, RegistryEntry>>,
}

impl NamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stop and remove the entry for `name`. Returns whether one existed.
    pub fn evict(&self, name: &str) -> bool {
        let removed = self.entries.borrow_mut().remove(name);
        match removed {
            Some(entry) => {
                entry.controller.stop();
                debug!(namespace = name, controller = entry.controller.id(), "evicted devtools controller");
                true
            }
            None => false,
        }
    }

    /// Register `state` under `name`, replacing any previous entry.
    pub fn install(&self, name: &str, state: RawState, controller: Controller) {
        self.evict(name);
        self.entries
            .borrow_mut()
            .insert(name.to_string(), RegistryEntry { state, controller });
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.borrow().contains_key(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.entries.borrow().keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn controller(&self, name: &str) -> Option<Controller> {
        self.entries
            .borrow()
            .get(name)
            .map(|entry| entry.controller.clone())
    }

    /// Controllers that are still attached to their state.
    pub fn live_controllers(&self) -> Vec<Controller> {
        self.entries
            .borrow()
            .values()
            .filter(|entry| entry.controller.is_active())
            .map(|entry| entry.controller.clone())
            .collect()
    }

    /// JSON view of every registered store, keyed by namespace.
    pub fn snapshot(&self) -> Value {
        let entries = self.entries.borrow();
        let stores: Map<String, Value> = entries
            .iter()
            .map(|(name, entry)| (name.clone(), entry.state.snapshot()))
            .collect();
        Value::Object(stores)
    }
}
