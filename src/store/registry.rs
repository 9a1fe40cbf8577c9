//! Named store registry
//!
//! An explicit object handed to whoever needs lookup by name, instead of
//! process-wide state. Teardown closes every registered store exactly once:
//! a store that is a tier of a chain registered through
//! [`StoreRegistry::register_chain`] is closed by that chain.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use super::{Chain, Store};
use crate::error::{Result, StoreError};

/// Registry of stores by name
#[derive(Default)]
pub struct StoreRegistry {
    stores: RwLock<HashMap<String, Arc<dyn Store>>>,
    /// Tier identities of every chain registered by name
    chain_tiers: RwLock<HashMap<String, Vec<usize>>>,
}

/// Address of the shared store, used to recognise the same tier twice
fn identity(store: &Arc<dyn Store>) -> usize {
    Arc::as_ptr(store) as *const () as usize
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `store` under `name`, returning the store it replaced
    pub fn register(&self, name: impl Into<String>, store: Arc<dyn Store>) -> Option<Arc<dyn Store>> {
        let name = name.into();
        debug!(name = %name, store = store.name(), "registering store");
        self.chain_tiers.write().remove(&name);
        self.stores.write().insert(name, store)
    }

    /// Register a chain under `name`, remembering its tiers so teardown
    /// leaves closing them to the chain
    pub fn register_chain(&self, name: impl Into<String>, chain: Chain) -> Option<Arc<dyn Store>> {
        let name = name.into();
        let tiers = chain.tiers().iter().map(identity).collect();
        let replaced = self.register(name.clone(), Arc::new(chain));
        self.chain_tiers.write().insert(name, tiers);
        replaced
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Store>> {
        self.stores.read().get(name).cloned()
    }

    /// Like [`StoreRegistry::get`] but unknown names are an error
    pub fn require(&self, name: &str) -> Result<Arc<dyn Store>> {
        self.get(name)
            .ok_or_else(|| StoreError::UnknownStore(name.to_string()))
    }

    /// Unregister without closing
    pub fn remove(&self, name: &str) -> Option<Arc<dyn Store>> {
        self.chain_tiers.write().remove(name);
        self.stores.write().remove(name)
    }

    /// Registered names, sorted
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.stores.read().keys().cloned().collect();
        names.sort();
        names
    }

    pub fn len(&self) -> usize {
        self.stores.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.stores.read().is_empty()
    }

    /// Close and unregister every store. Tiers of registered chains are
    /// closed by their chain only. Close failures are logged, not
    /// returned. Returns the number of stores that failed to close.
    pub fn close_all(&self) -> usize {
        let drained: Vec<(String, Arc<dyn Store>)> = self.stores.write().drain().collect();
        let owned: HashSet<usize> = self
            .chain_tiers
            .write()
            .drain()
            .flat_map(|(_, tiers)| tiers)
            .collect();
        let total = drained.len();
        let mut failed = 0;

        for (name, store) in drained {
            if owned.contains(&identity(&store)) {
                debug!(name = %name, "left for its chain to close");
                continue;
            }
            if let Err(e) = store.close() {
                warn!(name = %name, error = %e, "failed to close store");
                failed += 1;
            }
        }

        info!(total, failed, "store registry closed");
        failed
    }
}

impl std::fmt::Debug for StoreRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreRegistry")
            .field("stores", &self.names())
            .finish()
    }
}

// =============================================================================
// Tests
// =============================================================================
