//! ServiceSet storage
//!
//! Writes use optimistic concurrency: every stored ServiceSet carries a
//! resource version and an update based on a stale version is rejected with
//! [`Error::Conflict`]. Retrying is up to the caller.

use crate::{
    ChainLookup, Error, ObjectKey, Operation, Result, ServiceSet, ServiceSetStatus, ServiceState,
    TemplateCatalog, TemplateChain, TemplateKind, aggregate_observed,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::debug;

/// Trait for ServiceSet storage backends
#[async_trait]
pub trait ServiceSetStore: Send + Sync {
    /// Get a ServiceSet by identity
    async fn get(&self, key: &ObjectKey) -> Result<Option<ServiceSet>>;

    /// List ServiceSets targeting `cluster` in `namespace`
    async fn list_for_cluster(&self, namespace: &str, cluster: &str) -> Result<Vec<ServiceSet>>;

    /// Store a new ServiceSet
    async fn create(&self, set: &ServiceSet) -> Result<ServiceSet>;

    /// Replace a stored ServiceSet, checking its resource version
    async fn update(&self, set: &ServiceSet) -> Result<ServiceSet>;

    /// Request deletion. Deleting twice is a no-op.
    async fn delete(&self, key: &ObjectKey) -> Result<()>;

    /// Drop a ServiceSet for good
    async fn remove(&self, key: &ObjectKey) -> Result<Option<ServiceSet>>;

    /// Record observed state
    async fn update_status(&self, key: &ObjectKey, status: ServiceSetStatus)
    -> Result<ServiceSet>;
}

/// Observed services of every ServiceSet of a cluster, excluding those being deleted
pub async fn aggregate_for_cluster(
    store: &dyn ServiceSetStore,
    namespace: &str,
    cluster: &str,
) -> Result<Vec<ServiceState>> {
    let sets = store.list_for_cluster(namespace, cluster).await?;
    Ok(aggregate_observed(&sets))
}

/// Apply a create or update decision.
///
/// A create racing with another writer falls back to updating the stored
/// ServiceSet. Other operations are not writes and return `set` unchanged.
pub async fn create_or_update(
    store: &dyn ServiceSetStore,
    operation: Operation,
    set: ServiceSet,
) -> Result<ServiceSet> {
    match operation {
        Operation::Create => match store.create(&set).await {
            Err(Error::AlreadyExists(_)) => {
                let current = store
                    .get(&set.key)
                    .await?
                    .ok_or_else(|| Error::NotFound(format!("ServiceSet {}", set.key)))?;
                let mut set = set;
                set.resource_version = current.resource_version;
                set.status = current.status;
                store.update(&set).await
            }
            other => other,
        },
        Operation::Update => store.update(&set).await,
        Operation::None | Operation::Delete => Ok(set),
    }
}

fn read<T>(lock: &RwLock<T>) -> Result<RwLockReadGuard<'_, T>> {
    lock.read().map_err(|e| Error::Store(e.to_string()))
}

fn write<T>(lock: &RwLock<T>) -> Result<RwLockWriteGuard<'_, T>> {
    lock.write().map_err(|e| Error::Store(e.to_string()))
}

/// In-memory store
///
/// Also serves template chains and the template catalog.
#[derive(Debug, Default)]
pub struct MemoryStore {
    service_sets: RwLock<BTreeMap<ObjectKey, ServiceSet>>,
    chains: RwLock<BTreeMap<ObjectKey, TemplateChain>>,
    templates: RwLock<BTreeSet<(TemplateKind, ObjectKey)>>,
}

impl MemoryStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template chain under its namespace and name
    pub fn add_chain(&self, chain: TemplateChain) -> Result<()> {
        let key = ObjectKey::new(&chain.namespace, &chain.name);
        write(&self.chains)?.insert(key, chain);
        Ok(())
    }

    /// Register an existing template
    pub fn add_template(&self, kind: TemplateKind, namespace: &str, name: &str) -> Result<()> {
        write(&self.templates)?.insert((kind, ObjectKey::new(namespace, name)));
        Ok(())
    }

    /// Insert a ServiceSet as is, keeping its resource version
    pub fn seed(&self, set: ServiceSet) -> Result<()> {
        write(&self.service_sets)?.insert(set.key.clone(), set);
        Ok(())
    }

    /// All stored ServiceSets ordered by identity
    pub fn service_sets(&self) -> Result<Vec<ServiceSet>> {
        Ok(read(&self.service_sets)?.values().cloned().collect())
    }
}

#[async_trait]
impl ServiceSetStore for MemoryStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<ServiceSet>> {
        Ok(read(&self.service_sets)?.get(key).cloned())
    }

    async fn list_for_cluster(&self, namespace: &str, cluster: &str) -> Result<Vec<ServiceSet>> {
        Ok(read(&self.service_sets)?
            .values()
            .filter(|set| set.key.namespace == namespace && set.spec.cluster == cluster)
            .cloned()
            .collect())
    }

    async fn create(&self, set: &ServiceSet) -> Result<ServiceSet> {
        let mut sets = write(&self.service_sets)?;
        if sets.contains_key(&set.key) {
            return Err(Error::AlreadyExists(set.key.to_string()));
        }

        let mut stored = set.clone();
        stored.resource_version = 1;
        sets.insert(stored.key.clone(), stored.clone());
        debug!("Created ServiceSet {}", stored.key);
        Ok(stored)
    }

    async fn update(&self, set: &ServiceSet) -> Result<ServiceSet> {
        let mut sets = write(&self.service_sets)?;
        let current = sets
            .get(&set.key)
            .ok_or_else(|| Error::NotFound(format!("ServiceSet {}", set.key)))?;
        if current.resource_version != set.resource_version {
            return Err(Error::Conflict {
                key: set.key.to_string(),
                expected: set.resource_version,
                found: current.resource_version,
            });
        }

        let mut stored = set.clone();
        stored.resource_version += 1;
        // deletion can only be requested through delete
        stored.deletion_timestamp = current.deletion_timestamp;
        sets.insert(stored.key.clone(), stored.clone());
        debug!("Updated ServiceSet {} to version {}", stored.key, stored.resource_version);
        Ok(stored)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<()> {
        let mut sets = write(&self.service_sets)?;
        let set = sets
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(format!("ServiceSet {}", key)))?;
        if set.deletion_timestamp.is_none() {
            set.deletion_timestamp = Some(Utc::now());
            set.resource_version += 1;
            debug!("Marked ServiceSet {} for deletion", key);
        }
        Ok(())
    }

    async fn remove(&self, key: &ObjectKey) -> Result<Option<ServiceSet>> {
        Ok(write(&self.service_sets)?.remove(key))
    }

    async fn update_status(
        &self,
        key: &ObjectKey,
        status: ServiceSetStatus,
    ) -> Result<ServiceSet> {
        let mut sets = write(&self.service_sets)?;
        let set = sets
            .get_mut(key)
            .ok_or_else(|| Error::NotFound(format!("ServiceSet {}", key)))?;
        set.status = status;
        set.resource_version += 1;
        Ok(set.clone())
    }
}

impl ChainLookup for MemoryStore {
    fn template_chain(&self, namespace: &str, name: &str) -> Result<TemplateChain> {
        read(&self.chains)?
            .get(&ObjectKey::new(namespace, name))
            .cloned()
            .ok_or_else(|| Error::NotFound(format!("TemplateChain {}/{}", namespace, name)))
    }
}

impl TemplateCatalog for MemoryStore {
    fn template_exists(&self, kind: TemplateKind, namespace: &str, name: &str) -> Result<bool> {
        Ok(read(&self.templates)?.contains(&(kind, ObjectKey::new(namespace, name))))
    }
}
