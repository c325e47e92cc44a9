use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::marshal::ScriptValue;

/// Key/value state shared by every script.
///
/// Values are stored detached from the interpreter, so the store can be read
/// from host code as well. Entries live until cleared.
#[derive(Clone, Default)]
pub struct StateStore {
    entries: Arc<RwLock<HashMap<String, ScriptValue>>>,
}

impl StateStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<ScriptValue> {
        self.entries.read().get(key).cloned()
    }

    /// Store a value; storing nil removes the key
    pub fn set(&self, key: impl Into<String>, value: ScriptValue) {
        let key = key.into();
        let mut entries = self.entries.write();
        if value.is_nil() {
            entries.remove(&key);
        } else {
            entries.insert(key, value);
        }
    }

    pub fn remove(&self, key: &str) -> Option<ScriptValue> {
        self.entries.write().remove(key)
    }

    pub fn clear(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
