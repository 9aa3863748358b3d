//! ServiceSet assembly

use crate::{
    Error, LabelSelector, ObjectKey, ProviderConfig, Result, ServiceSet, ServiceWithValues,
};

/// Builder wrapper assembling a ServiceSet for create or update.
///
/// Starting from an existing ServiceSet keeps its store version, deletion
/// state and status; only the spec is replaced.
#[derive(Debug, Clone)]
pub struct ServiceSetBuilder(ServiceSet);

impl ServiceSetBuilder {
    /// Start a new ServiceSet with the given identity
    pub fn new(key: ObjectKey) -> Self {
        Self(ServiceSet::new(key))
    }

    /// Start from a previously stored ServiceSet
    pub fn from_existing(existing: ServiceSet) -> Self {
        Self(existing)
    }

    /// Set the identity
    pub fn key(mut self, key: ObjectKey) -> Self {
        self.0.key = key;
        self
    }

    /// Set the target cluster name
    pub fn cluster(mut self, cluster: impl Into<String>) -> Self {
        self.0.spec.cluster = cluster.into();
        self
    }

    /// Set the owning multi-cluster service
    pub fn multi_cluster_service(mut self, policy: Option<String>) -> Self {
        self.0.spec.multi_cluster_service = policy;
        self
    }

    /// Set the provider configuration
    pub fn provider(mut self, provider: ProviderConfig) -> Self {
        self.0.spec.provider = provider;
        self
    }

    /// Set the provider selector
    pub fn selector(mut self, selector: LabelSelector) -> Self {
        self.0.spec.selector = selector;
        self
    }

    /// Set the services to deploy
    pub fn services(mut self, services: Vec<ServiceWithValues>) -> Self {
        self.0.spec.services = services;
        self
    }

    /// Finish, checking that the ServiceSet is addressable
    pub fn build(self) -> Result<ServiceSet> {
        let set = self.0;
        if set.key.name.is_empty() {
            return Err(Error::Build("name is not set".to_string()));
        }
        if set.key.namespace.is_empty() {
            return Err(Error::Build(format!("namespace of {} is not set", set.key.name)));
        }
        // only policies may target the management cluster
        if set.spec.cluster.is_empty() && set.spec.multi_cluster_service.is_none() {
            return Err(Error::Build(format!("cluster of {} is not set", set.key)));
        }
        Ok(set)
    }
}
