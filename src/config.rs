//! Store configuration
//!
//! Declares named stores and the chains composed from them, loaded from
//! YAML:
//!
//! ```yaml
//! stores:
//!   - name: hot
//!     kind: lru
//!     capacity: 1024
//!   - name: main
//!     kind: memory
//! chains:
//!   - name: default
//!     tiers: [hot, main]
//! ```

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::{Result, StoreError};
use crate::store::{Chain, LruStore, MemoryStore, Store, StoreRegistry};

/// Default LRU capacity when a config omits it
pub const DEFAULT_LRU_CAPACITY: usize = 1024;

fn default_lru_capacity() -> usize {
    DEFAULT_LRU_CAPACITY
}

/// Backend kind of a configured store
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TierKind {
    /// Unbounded in-process map
    Memory,
    /// Capacity-bounded LRU
    Lru {
        #[serde(default = "default_lru_capacity")]
        capacity: usize,
    },
}

/// A named backend
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: TierKind,
}

impl StoreSpec {
    fn build(&self) -> Arc<dyn Store> {
        match self.kind {
            TierKind::Memory => Arc::new(MemoryStore::named(self.name.clone())),
            TierKind::Lru { capacity } => {
                Arc::new(LruStore::new(capacity).named(self.name.clone()))
            }
        }
    }
}

/// A named chain; `tiers[0]` is the nearest tier
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSpec {
    pub name: String,
    #[serde(default)]
    pub tiers: Vec<String>,
}

/// Top-level configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KvConfig {
    #[serde(default)]
    pub stores: Vec<StoreSpec>,
    #[serde(default)]
    pub chains: Vec<ChainSpec>,
}

impl Default for KvConfig {
    fn default() -> Self {
        Self {
            stores: vec![StoreSpec {
                name: "default".to_string(),
                kind: TierKind::Memory,
            }],
            chains: Vec::new(),
        }
    }
}

impl KvConfig {
    /// Parse configuration from YAML text
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        serde_yaml::from_str(text)
            .map_err(|e| StoreError::Config(format!("invalid configuration: {}", e)))
    }

    /// Load configuration from a YAML file
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            StoreError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        Self::from_yaml_str(&text)
    }

    /// Check names are unique, LRU capacities are positive and every chain
    /// tier names a store or an earlier chain
    pub fn validate(&self) -> Result<()> {
        let mut defined: HashSet<&str> = HashSet::new();

        for spec in &self.stores {
            if spec.name.is_empty() {
                return Err(StoreError::Config("store name must not be empty".into()));
            }
            if !defined.insert(spec.name.as_str()) {
                return Err(StoreError::Config(format!(
                    "duplicate store name: {}",
                    spec.name
                )));
            }
            if let TierKind::Lru { capacity: 0 } = spec.kind {
                return Err(StoreError::Config(format!(
                    "lru store {} must have a positive capacity",
                    spec.name
                )));
            }
        }

        for chain in &self.chains {
            for tier in &chain.tiers {
                if !defined.contains(tier.as_str()) {
                    return Err(StoreError::Config(format!(
                        "chain {} references undefined tier {}",
                        chain.name, tier
                    )));
                }
            }
            if chain.name.is_empty() || !defined.insert(chain.name.as_str()) {
                return Err(StoreError::Config(format!(
                    "invalid or duplicate chain name: {:?}",
                    chain.name
                )));
            }
        }

        Ok(())
    }

    /// Validate and build every store and chain into a registry
    pub fn build_registry(&self) -> Result<StoreRegistry> {
        self.validate()?;
        let registry = StoreRegistry::new();

        for spec in &self.stores {
            registry.register(spec.name.clone(), spec.build());
        }

        for chain in &self.chains {
            let tiers = chain
                .tiers
                .iter()
                .map(|tier| registry.require(tier))
                .collect::<Result<Vec<_>>>()?;
            registry.register_chain(chain.name.clone(), Chain::new(tiers));
        }

        info!(
            stores = self.stores.len(),
            chains = self.chains.len(),
            "store registry built"
        );
        Ok(registry)
    }
}

// =============================================================================
// Tests
// =============================================================================
