//! Context for dialects without session variables.
//!
//! A `ContextStore` belongs to one connection. The `env(key)` and `jwt()`
//! SQL functions registered on that connection read from it. Values are
//! only visible while a [`ContextScope`] is alive.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use super::Env;

/// Env key whose value `jwt()` returns
pub const JWT_CLAIMS_KEY: &str = "request.jwt.claims";

#[derive(Debug, Clone, Default)]
pub struct ContextStore {
    inner: Arc<Mutex<HashMap<String, String>>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Populate the store from `env`; cleared when the scope drops.
    ///
    /// Later duplicates win.
    pub fn enter(&self, env: &Env) -> ContextScope {
        let mut map = self.lock();
        map.clear();
        for (key, value) in env.iter() {
            map.insert(key.to_string(), value.to_string());
        }
        ContextScope {
            store: self.clone(),
        }
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    pub fn jwt(&self) -> Option<String> {
        self.get(JWT_CLAIMS_KEY)
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn clear(&self) {
        self.lock().clear();
    }

    // A poisoned lock only means a panic mid-insert; the map is still usable.
    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Guard returned by [`ContextStore::enter`]
#[derive(Debug)]
#[must_use = "the context is cleared as soon as the scope is dropped"]
pub struct ContextScope {
    store: ContextStore,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        self.store.clear();
    }
}
