//! Upgrade path resolution
//!
//! Upgrades advance one hop per reconciliation: a deployed service may only
//! move to a template its chain lists as a direct successor of the deployed
//! template. Multi-hop moves happen over several passes as the observed
//! template changes.

use crate::{
    Error, Result, Service, ServiceKey, ServiceWithValues, TemplateChain, effective_namespace,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// Resolves template chains by identity
pub trait ChainLookup {
    /// Fetch the chain `name` in `namespace`
    fn template_chain(&self, namespace: &str, name: &str) -> Result<TemplateChain>;
}

impl<F> ChainLookup for F
where
    F: Fn(&str, &str) -> Result<TemplateChain>,
{
    fn template_chain(&self, namespace: &str, name: &str) -> Result<TemplateChain> {
        self(namespace, name)
    }
}

/// Upgrade targets of one service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceUpgradePaths {
    /// Service name
    pub name: String,
    /// Service namespace, never empty
    pub namespace: String,
    /// Template the paths were computed for
    pub template: String,
    /// Chain constraining the service, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<String>,
    /// Templates reachable in one hop
    #[serde(default)]
    pub available_upgrades: Vec<String>,
}

/// Upgrade paths of a service list together with per-service failures
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpgradePaths {
    /// Paths of every service that could be resolved
    pub services: Vec<ServiceUpgradePaths>,
    /// Lookup failures, one per unresolved service
    pub errors: Vec<Error>,
}

impl UpgradePaths {
    /// Joined error of all failures, if any
    pub fn error(&self) -> Option<Error> {
        Error::join(self.errors.iter().cloned())
    }

    /// Fail if any service could not be resolved
    pub fn into_result(self) -> Result<Vec<ServiceUpgradePaths>> {
        match Error::join(self.errors) {
            Some(err) => Err(err),
            None => Ok(self.services),
        }
    }
}

/// Compute upgrade paths for each service.
///
/// Chains are looked up in `namespace`. A failed lookup is recorded and the
/// service skipped; the remaining services are still resolved.
pub fn services_upgrade_paths(
    lookup: &dyn ChainLookup,
    services: &[Service],
    namespace: &str,
) -> UpgradePaths {
    let mut result = UpgradePaths::default();

    for svc in services {
        let mut paths = ServiceUpgradePaths {
            name: svc.name.clone(),
            namespace: effective_namespace(&svc.namespace).to_string(),
            template: svc.template.clone(),
            chain: svc.template_chain.clone(),
            available_upgrades: Vec::new(),
        };

        let Some(chain_name) = svc.template_chain.as_deref() else {
            result.services.push(paths);
            continue;
        };

        let chain = match lookup.template_chain(namespace, chain_name) {
            Ok(chain) => chain,
            Err(e) => {
                warn!(
                    "Failed to get template chain {}/{} for service {}: {}",
                    namespace,
                    chain_name,
                    svc.key(),
                    e
                );
                result.errors.push(Error::ChainLookup {
                    chain: format!("{}/{}", namespace, chain_name),
                    message: e.to_string(),
                });
                continue;
            }
        };

        match chain.upgrade_paths(&svc.template) {
            Ok(upgrades) => {
                paths.available_upgrades = upgrades;
                result.services.push(paths);
            }
            Err(e) => result.errors.push(e),
        }
    }

    debug!(
        "Resolved upgrade paths for {}/{} services",
        result.services.len(),
        services.len()
    );
    result
}

/// Deployed services paired with the chain their desired counterpart names.
///
/// Upgrade paths are computed from what is deployed, constrained by the chain
/// the user currently asks for.
pub fn services_with_desired_chains(
    desired: &[Service],
    deployed: &[ServiceWithValues],
) -> Vec<Service> {
    let chains: BTreeMap<ServiceKey, Option<String>> = desired
        .iter()
        .map(|s| (s.key(), s.template_chain.clone()))
        .collect();

    deployed
        .iter()
        .map(|d| Service {
            name: d.name.clone(),
            namespace: d.namespace.clone(),
            template: d.template.clone(),
            template_chain: chains.get(&d.key()).cloned().flatten(),
            ..Default::default()
        })
        .collect()
}

/// Whether a service may move from its deployed template to `desired`.
///
/// Never-deployed services and services without a chain are unconstrained.
/// A deployed template unknown to the chain is never upgraded.
pub fn can_upgrade(chain: Option<&TemplateChain>, deployed: Option<&str>, desired: &str) -> bool {
    match (deployed, chain) {
        (None, _) => true,
        (Some(current), _) if current == desired => true,
        (Some(_), None) => true,
        (Some(current), Some(chain)) => chain.allows(current, desired),
    }
}

/// Whether a deployed service may move to `desired`, given precomputed paths.
///
/// A deployed service without an entry, for example because its chain could
/// not be fetched, keeps its current template.
pub fn is_upgrade_legal(
    paths: &[ServiceUpgradePaths],
    deployed: &ServiceWithValues,
    desired: &str,
) -> bool {
    if deployed.template == desired {
        return true;
    }

    let key = deployed.key();
    let Some(entry) = paths
        .iter()
        .find(|p| p.name == key.name && p.namespace == key.namespace)
    else {
        return false;
    };

    if entry.chain.is_none() {
        return true;
    }
    // paths computed for another version say nothing about this one
    if entry.template != deployed.template {
        return false;
    }
    entry.available_upgrades.iter().any(|t| t == desired)
}
