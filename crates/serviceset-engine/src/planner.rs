//! One reconciliation pass as a pure computation
//!
//! The planner chains the decision, upgrade resolution, readiness filtering
//! and assembly steps. It performs no writes; applying the plan is left to the
//! caller.

use crate::{
    ChainLookup, Error, LabelSelector, Operation, OperationRequisites, Result, Service,
    ServiceKey, ServiceSet, ServiceSetBuilder, ServiceState, ServiceWithValues,
    filter_service_dependencies, service_set_operation, services_to_deploy,
    services_upgrade_paths, services_with_desired_chains,
};
use std::collections::BTreeSet;
use tracing::debug;

/// Everything a pass needs to know about one ServiceSet
#[derive(Debug, Clone, Default)]
pub struct PlanInput {
    /// Previously stored ServiceSet, if any
    pub existing: Option<ServiceSet>,
    /// Identity, desired services, provider and credential propagation
    pub requisites: OperationRequisites,
    /// Observed services aggregated over all ServiceSets of the target
    pub observed: Vec<ServiceState>,
    /// Target cluster name, empty for the management cluster
    pub cluster: String,
    /// Owning multi-cluster service, if any
    pub multi_cluster_service: Option<String>,
    /// Provider selector
    pub selector: LabelSelector,
    /// Namespace template chains are looked up in
    pub chain_namespace: String,
}

/// Outcome of a pass
#[derive(Debug, Clone, PartialEq)]
pub struct Plan {
    /// Store operation to apply
    pub operation: Operation,
    /// ServiceSet to write for create and update, the stored one for delete
    pub service_set: Option<ServiceSet>,
    /// Upgrade path resolution failures; affected services keep their entries
    pub errors: Vec<Error>,
}

impl Plan {
    fn unchanged(operation: Operation, service_set: Option<ServiceSet>) -> Self {
        Self {
            operation,
            service_set,
            errors: Vec::new(),
        }
    }

    /// Joined resolution error, if any
    pub fn error(&self) -> Option<Error> {
        Error::join(self.errors.iter().cloned())
    }
}

/// Computes plans against a template chain lookup
pub struct Planner<'a> {
    lookup: &'a dyn ChainLookup,
}

impl<'a> Planner<'a> {
    /// Create a planner
    pub fn new(lookup: &'a dyn ChainLookup) -> Self {
        Self { lookup }
    }

    /// Compute the plan for one ServiceSet.
    ///
    /// Identical inputs always yield an identical plan.
    pub fn plan(&self, input: &PlanInput) -> Result<Plan> {
        let requisites = &input.requisites;
        let operation = service_set_operation(input.existing.as_ref(), requisites);

        match operation {
            Operation::None => return Ok(Plan::unchanged(operation, None)),
            Operation::Delete => return Ok(Plan::unchanged(operation, input.existing.clone())),
            Operation::Create | Operation::Update => {}
        }

        let deployed = input
            .existing
            .as_ref()
            .map(|set| set.spec.services.as_slice())
            .unwrap_or_default();

        let paths = services_upgrade_paths(
            self.lookup,
            &services_with_desired_chains(&requisites.services, deployed),
            &input.chain_namespace,
        );
        debug!("Upgrade paths for {}: {:?}", requisites.key, paths.services);

        let ready = ready_services(&requisites.services, deployed, &input.observed);
        let services = services_to_deploy(&paths.services, &ready, deployed);
        debug!(
            "ServiceSet {} will carry {} of {} desired services",
            requisites.key,
            services.len(),
            requisites.services.len()
        );

        let builder = match &input.existing {
            Some(existing) => ServiceSetBuilder::from_existing(existing.clone()),
            None => ServiceSetBuilder::new(requisites.key.clone()),
        };
        let service_set = builder
            .key(requisites.key.clone())
            .cluster(input.cluster.clone())
            .multi_cluster_service(input.multi_cluster_service.clone())
            .provider(requisites.provider.clone())
            .selector(input.selector.clone())
            .services(services)
            .build()?;

        // held upgrades and unready services can leave the assembled spec unchanged
        if let Some(existing) = input.existing.as_ref().filter(|e| e.spec == service_set.spec) {
            debug!("ServiceSet {} already carries the assembled spec", existing.key);
            return Ok(Plan {
                operation: Operation::None,
                service_set: None,
                errors: paths.errors,
            });
        }

        Ok(Plan {
            operation,
            service_set: Some(service_set),
            errors: paths.errors,
        })
    }
}

/// Desired services eligible for the next ServiceSet, in desired order.
///
/// Services already carried by the previous ServiceSet stay regardless of
/// their dependencies; only new services go through the readiness filter.
fn ready_services(
    desired: &[Service],
    deployed: &[ServiceWithValues],
    observed: &[ServiceState],
) -> Vec<Service> {
    let carried: BTreeSet<ServiceKey> = deployed.iter().map(ServiceWithValues::key).collect();
    let pending: Vec<Service> = desired
        .iter()
        .filter(|svc| !carried.contains(&svc.key()))
        .cloned()
        .collect();
    let ready: BTreeSet<ServiceKey> = filter_service_dependencies(&pending, observed)
        .iter()
        .map(Service::key)
        .collect();

    desired
        .iter()
        .filter(|svc| {
            let key = svc.key();
            carried.contains(&key) || ready.contains(&key)
        })
        .cloned()
        .collect()
}
