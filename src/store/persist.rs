use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

use serde_json::Value;
use tracing::{debug, error, warn};

use crate::error::PersistError;
use crate::reactive::{Effect, RawState, ReactiveState};

/// A key/value string store used to persist state between sessions.
pub trait PersistStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError>;
    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError>;
    fn remove_item(&self, key: &str) -> Result<(), PersistError>;
}

/// In-memory [`PersistStorage`]. Clones share the same entries.
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    entries: Rc<RefCell<HashMap<String, String>>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PersistStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, PersistError> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), PersistError> {
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove_item(&self, key: &str) -> Result<(), PersistError> {
        self.entries.borrow_mut().remove(key);
        Ok(())
    }
}

/// Where and under which key a store is persisted.
#[derive(Clone)]
pub struct PersistOptions {
    pub key: String,
    pub storage: Rc<dyn PersistStorage>,
}

impl PersistOptions {
    pub fn new(key: impl Into<String>, storage: impl PersistStorage + 'static) -> Self {
        Self {
            key: key.into(),
            storage: Rc::new(storage),
        }
    }
}

impl fmt::Debug for PersistOptions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistOptions")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Keeps a store persisted for as long as it is alive.
#[derive(Clone)]
pub struct PersistHandle {
    key: String,
    _effect: Rc<Effect>,
}

impl PersistHandle {
    /// Restore `state` from storage, then save it on every change.
    pub(crate) fn attach(state: &RawState, options: PersistOptions) -> Self {
        restore(state, &options);

        let tracked = ReactiveState::new(state.clone());
        let PersistOptions { key, storage } = options;
        let save_key = key.clone();
        let effect = Effect::new_in(Rc::clone(state.runtime()), move || {
            tracked.traverse();
            if let Err(e) = save(&tracked.raw(), &save_key, &*storage) {
                error!(key = %save_key, error = %e, "failed to persist state");
            }
        });

        Self {
            key,
            _effect: Rc::new(effect),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }
}

impl fmt::Debug for PersistHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PersistHandle")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

/// Merge stored JSON into the existing top-level keys of `state`.
fn restore(state: &RawState, options: &PersistOptions) {
    let stored = match options.storage.get_item(&options.key) {
        Ok(Some(stored)) => stored,
        Ok(None) => return,
        Err(e) => {
            error!(key = %options.key, error = %e, "failed to read persisted state");
            return;
        }
    };

    let parsed = match serde_json::from_str::<Value>(&stored) {
        Ok(Value::Object(map)) => map,
        Ok(_) => {
            warn!(key = %options.key, "persisted state is not an object, ignoring it");
            return;
        }
        Err(e) => {
            warn!(key = %options.key, error = %e, "persisted state is not valid JSON, ignoring it");
            return;
        }
    };

    let known = state.keys();
    let mut restored = 0usize;
    for (field, value) in parsed {
        if known.contains(&field) {
            state.set(&field, value);
            restored += 1;
        }
    }
    debug!(key = %options.key, restored, "restored persisted state");
}

fn save(state: &RawState, key: &str, storage: &dyn PersistStorage) -> Result<(), PersistError> {
    let encoded = serde_json::to_string(&state.snapshot())?;
    storage.set_item(key, &encoded)
}
