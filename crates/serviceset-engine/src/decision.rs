//! Deployment decisions
//!
//! Decides which store operation a ServiceSet needs and which services it
//! should carry, given the previous descriptor and the desired services.

use crate::{
    LifecycleState, ObjectKey, ProviderConfig, Service, ServiceKey, ServiceSet,
    ServiceUpgradePaths, ServiceWithValues, is_upgrade_legal,
};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Store operation to apply to a ServiceSet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    /// Nothing to do
    None,
    /// Create the ServiceSet
    Create,
    /// Update the ServiceSet
    Update,
    /// Delete the ServiceSet
    Delete,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Operation::None => "none",
            Operation::Create => "create",
            Operation::Update => "update",
            Operation::Delete => "delete",
        };
        write!(f, "{}", s)
    }
}

/// Inputs of a deployment decision
#[derive(Debug, Clone, Default, PartialEq)]
pub struct OperationRequisites {
    /// ServiceSet identity
    pub key: ObjectKey,
    /// Full desired service list, before readiness filtering
    pub services: Vec<Service>,
    /// Provider configuration the ServiceSet should carry
    pub provider: ProviderConfig,
    /// Whether credentials must be propagated even without services
    pub propagate_credentials: bool,
}

impl OperationRequisites {
    /// Whether a ServiceSet has to exist at all
    pub fn service_set_required(&self) -> bool {
        !self.services.is_empty() || self.propagate_credentials
    }
}

/// Decide the store operation for a ServiceSet.
///
/// An existing ServiceSet is only updated once its observed state matches what
/// it declares; until then the decision is [`Operation::None`] and the caller
/// retries on the next pass.
pub fn service_set_operation(
    existing: Option<&ServiceSet>,
    requisites: &OperationRequisites,
) -> Operation {
    let required = requisites.service_set_required();

    let operation = match existing {
        None if required => Operation::Create,
        None => Operation::None,
        Some(set) if set.is_deleting() => Operation::None,
        Some(_) if !required => Operation::Delete,
        Some(set) if needs_update(set, &requisites.provider, &requisites.services) => {
            Operation::Update
        }
        Some(_) => Operation::None,
    };

    debug!(
        "ServiceSet {} exists: {}, required: {}, operation: {}",
        requisites.key,
        existing.is_some(),
        required,
        operation
    );
    operation
}

fn needs_update(set: &ServiceSet, provider: &ProviderConfig, services: &[Service]) -> bool {
    if set.spec.provider != *provider {
        return true;
    }

    let observed: BTreeMap<ServiceKey, (&str, LifecycleState)> = set
        .status
        .services
        .iter()
        .map(|s| (s.key(), (s.template.as_str(), s.state)))
        .collect();
    let declared: BTreeMap<ServiceKey, (&str, LifecycleState)> = set
        .spec
        .services
        .iter()
        .map(|s| (s.key(), (s.template.as_str(), LifecycleState::Deployed)))
        .collect();
    // not fully deployed yet, wait
    if observed != declared {
        return false;
    }

    let current: BTreeMap<ServiceKey, &ServiceWithValues> =
        set.spec.services.iter().map(|s| (s.key(), s)).collect();
    let desired: BTreeMap<ServiceKey, ServiceWithValues> = services
        .iter()
        .filter(|s| !s.disable)
        .map(|s| (s.key(), ServiceWithValues::from(s)))
        .collect();

    current.len() != desired.len()
        || current
            .iter()
            .any(|(key, svc)| desired.get(key).is_none_or(|d| d != *svc))
}

/// Services a ServiceSet should carry.
///
/// `desired` is the readiness-filtered desired list and `deployed` the
/// services of the previous ServiceSet. A deployed service whose move to the
/// desired template is not a legal upgrade keeps its previous entry; disabled
/// services are skipped. The result keeps the order of `desired`.
pub fn services_to_deploy(
    paths: &[ServiceUpgradePaths],
    desired: &[Service],
    deployed: &[ServiceWithValues],
) -> Vec<ServiceWithValues> {
    let desired_templates: BTreeMap<ServiceKey, &str> = desired
        .iter()
        .map(|s| (s.key(), s.template.as_str()))
        .collect();

    let held: BTreeMap<ServiceKey, &ServiceWithValues> = deployed
        .iter()
        .filter(|d| {
            let target = desired_templates.get(&d.key()).copied().unwrap_or_default();
            !is_upgrade_legal(paths, d, target)
        })
        .map(|d| (d.key(), d))
        .collect();

    let mut services = Vec::with_capacity(desired.len());
    for svc in desired {
        if svc.disable {
            continue;
        }
        let key = svc.key();
        if let Some(previous) = held.get(&key) {
            debug!(
                "Keeping {} on template {}, upgrade to {} is not available",
                key, previous.template, svc.template
            );
            services.push((*previous).clone());
        } else {
            services.push(ServiceWithValues::from(svc));
        }
    }
    services
}
