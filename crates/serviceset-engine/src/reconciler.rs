//! Reconciliation of one requester against a store

use crate::{
    ChainLookup, ClusterDeployment, Error, LabelSelector, MultiClusterService, ObjectKey,
    Operation, OperationRequisites, PlanInput, Planner, ProviderConfig, Result, Service,
    ServiceSetStore, ServiceWithValues, aggregate_for_cluster, create_or_update,
    service_set_object_key, validate_service_dependency_overall,
};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Object asking for services on a target
#[derive(Debug, Clone, PartialEq)]
pub enum Requester {
    /// A single cluster with its own service list
    Cluster(ClusterDeployment),
    /// A policy applied to a matching cluster, or to the management cluster
    Policy {
        /// The policy
        policy: MultiClusterService,
        /// Target cluster, `None` for the management cluster
        cluster: Option<ClusterDeployment>,
    },
}

impl Requester {
    /// Desired services.
    ///
    /// A policy whose selector no longer matches its cluster desires nothing.
    pub fn services(&self) -> &[Service] {
        match self {
            Requester::Cluster(cd) => cd.services.as_slice(),
            Requester::Policy {
                policy,
                cluster: Some(cd),
            } if !policy.cluster_selector.matches(&cd.labels) => &[],
            Requester::Policy { policy, .. } => policy.services.as_slice(),
        }
    }

    fn provider(&self) -> &ProviderConfig {
        match self {
            Requester::Cluster(cd) => &cd.provider,
            Requester::Policy { policy, .. } => &policy.provider,
        }
    }

    fn selector(&self) -> &LabelSelector {
        match self {
            Requester::Cluster(cd) => &cd.selector,
            Requester::Policy { policy, .. } => &policy.selector,
        }
    }

    fn cluster(&self) -> Option<&ClusterDeployment> {
        match self {
            Requester::Cluster(cd) => Some(cd),
            Requester::Policy { cluster, .. } => cluster.as_ref(),
        }
    }

    fn policy_name(&self) -> Option<&str> {
        match self {
            Requester::Cluster(_) => None,
            Requester::Policy { policy, .. } => Some(&policy.name),
        }
    }

    /// ServiceSet identity of this requester
    pub fn service_set_key(&self, system_namespace: &str) -> ObjectKey {
        let cluster = self.cluster().map(ObjectKey::of_cluster);
        match self.policy_name() {
            Some(policy) => service_set_object_key(system_namespace, cluster.as_ref(), policy),
            None => cluster.unwrap_or_default(),
        }
    }

    /// Namespace and name of the targeted cluster
    fn target(&self, system_namespace: &str) -> (String, String) {
        match self.cluster() {
            Some(cd) => (cd.namespace.clone(), cd.name.clone()),
            None => (system_namespace.to_string(), String::new()),
        }
    }
}

/// Result of one reconciliation
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    /// ServiceSet identity
    pub key: ObjectKey,
    /// Operation that was applied
    pub operation: Operation,
    /// Services the ServiceSet carries after the pass
    pub services: Vec<ServiceWithValues>,
    /// Upgrade path resolution failures
    pub errors: Vec<Error>,
}

impl ReconcileOutcome {
    /// Whether the pass is waiting on the target
    pub fn is_pending(&self) -> bool {
        self.operation == Operation::None
    }
}

/// Drives ServiceSets of requesters through a store
pub struct Reconciler<S> {
    store: Arc<S>,
    system_namespace: String,
}

impl<S> Reconciler<S>
where
    S: ServiceSetStore + ChainLookup,
{
    /// Create a reconciler
    pub fn new(store: Arc<S>, system_namespace: impl Into<String>) -> Self {
        Self {
            store,
            system_namespace: system_namespace.into(),
        }
    }

    /// The underlying store
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// Run one pass for a requester.
    ///
    /// Structural problems of the service list fail the pass before anything
    /// is read or written. Chain lookup failures are reported in the outcome.
    pub async fn reconcile(&self, requester: &Requester) -> Result<ReconcileOutcome> {
        let services = requester.services();
        validate_service_dependency_overall(services)?;

        let key = requester.service_set_key(&self.system_namespace);
        let (namespace, cluster) = requester.target(&self.system_namespace);

        let existing = self.store.get(&key).await?;
        let observed = aggregate_for_cluster(self.store.as_ref(), &namespace, &cluster).await?;

        let input = PlanInput {
            existing,
            requisites: OperationRequisites {
                key: key.clone(),
                services: services.to_vec(),
                provider: requester.provider().clone(),
                propagate_credentials: requester.cluster().is_some_and(|cd| {
                    requester.policy_name().is_none() && cd.propagate_credentials
                }),
            },
            observed,
            cluster,
            multi_cluster_service: requester.policy_name().map(str::to_string),
            selector: requester.selector().clone(),
            chain_namespace: namespace,
        };
        let plan = Planner::new(self.store.as_ref()).plan(&input)?;
        for err in &plan.errors {
            warn!("ServiceSet {}: {}", key, err);
        }

        let services = match (plan.operation, plan.service_set) {
            (Operation::Create | Operation::Update, Some(set)) => {
                let stored = create_or_update(self.store.as_ref(), plan.operation, set).await?;
                info!(
                    "Applied {} to ServiceSet {} (version {})",
                    plan.operation, key, stored.resource_version
                );
                stored.spec.services
            }
            (Operation::Delete, _) => {
                self.store.delete(&key).await?;
                info!("ServiceSet {} is being deleted", key);
                Vec::new()
            }
            _ => {
                debug!("No changes for ServiceSet {}", key);
                input
                    .existing
                    .map(|set| set.spec.services)
                    .unwrap_or_default()
            }
        };

        Ok(ReconcileOutcome {
            key,
            operation: plan.operation,
            services,
            errors: plan.errors,
        })
    }
}
