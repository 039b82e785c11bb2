//! Filter engine configuration.

use std::collections::BTreeMap;

/// Configuration for the filter services.
#[derive(Debug, Clone)]
pub struct FiltersConfig {
    /// Concurrent writes during bulk soft-delete (default: 10).
    pub max_parallel_writes: usize,
    /// Concurrent writes while seeding basic rules or backfilling
    /// permission sets (default: 5).
    pub bootstrap_parallelism: usize,
    /// Owner identity → secret accepted for writes delegated by that owner.
    pub trusted_owners: BTreeMap<String, String>,
    /// Declared Resource-typed fields a resource needs to be offered as a
    /// chain hop (default: 2).
    pub min_chain_hop_fields: usize,
}

impl FiltersConfig {
    pub fn with_trusted_owner(
        mut self,
        owner: impl Into<String>,
        secret: impl Into<String>,
    ) -> Self {
        self.trusted_owners.insert(owner.into(), secret.into());
        self
    }
}

impl Default for FiltersConfig {
    fn default() -> Self {
        Self {
            max_parallel_writes: 10,
            bootstrap_parallelism: 5,
            trusted_owners: BTreeMap::new(),
            min_chain_hop_fields: 2,
        }
    }
}
