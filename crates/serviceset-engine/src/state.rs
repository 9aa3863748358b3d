//! ServiceSet descriptors and observed service state
//!
//! A ServiceSet is the persisted record of what should run on one target for
//! one requester. Its status carries what the provider observed; observed
//! state of all ServiceSets of a target is aggregated for readiness decisions.

use crate::{LabelSelector, ObjectKey, ProviderConfig, ServiceKey, ServiceWithValues};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle state of a service as observed on the target
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LifecycleState {
    /// Being installed or upgraded
    #[default]
    Provisioning,
    /// Installed and ready
    Deployed,
    /// Being removed
    Deleting,
    /// Installation failed
    Failed,
    /// Not installed on the target
    NotInstalled,
}

impl fmt::Display for LifecycleState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LifecycleState::Provisioning => "Provisioning",
            LifecycleState::Deployed => "Deployed",
            LifecycleState::Deleting => "Deleting",
            LifecycleState::Failed => "Failed",
            LifecycleState::NotInstalled => "NotInstalled",
        };
        write!(f, "{}", s)
    }
}

/// Observed state of one service
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceState {
    /// Release name
    pub name: String,
    /// Release namespace
    #[serde(default)]
    pub namespace: String,
    /// Template currently installed
    #[serde(default)]
    pub template: String,
    /// Lifecycle state
    #[serde(default)]
    pub state: LifecycleState,
    /// Failure reported by the provider
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_message: Option<String>,
    /// When the state last changed
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_state_transition_time: Option<DateTime<Utc>>,
}

impl ServiceState {
    /// Create an observed state record
    pub fn new(name: &str, namespace: &str, template: &str, state: LifecycleState) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            template: template.to_string(),
            state,
            ..Default::default()
        }
    }

    /// Identity of the observed service
    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(&self.namespace, &self.name)
    }

    /// Whether the service is deployed
    pub fn is_deployed(&self) -> bool {
        self.state == LifecycleState::Deployed
    }
}

/// Desired content of a ServiceSet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSetSpec {
    /// Name of the target cluster, empty for the management cluster
    #[serde(default)]
    pub cluster: String,
    /// Owning multi-cluster service, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub multi_cluster_service: Option<String>,
    /// Provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Provider selector
    #[serde(default)]
    pub selector: LabelSelector,
    /// Services to deploy
    #[serde(default)]
    pub services: Vec<ServiceWithValues>,
}

/// Observed content of a ServiceSet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSetStatus {
    /// Observed services
    #[serde(default)]
    pub services: Vec<ServiceState>,
}

/// Deployment descriptor for one target and requester
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceSet {
    /// Identity
    pub key: ObjectKey,
    /// Store version, bumped on every write
    #[serde(default)]
    pub resource_version: u64,
    /// Set once deletion was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<DateTime<Utc>>,
    /// Desired content
    #[serde(default)]
    pub spec: ServiceSetSpec,
    /// Observed content
    #[serde(default)]
    pub status: ServiceSetStatus,
}

impl ServiceSet {
    /// Create an empty ServiceSet
    pub fn new(key: ObjectKey) -> Self {
        Self {
            key,
            ..Default::default()
        }
    }

    /// Whether deletion was requested
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }
}

/// Count of ready services out of all counted services
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServicesSummary {
    /// Deployed services
    pub ready: usize,
    /// Counted services
    pub total: usize,
}

impl ServicesSummary {
    /// Whether every counted service is ready
    pub fn all_ready(&self) -> bool {
        self.ready >= self.total
    }
}

impl fmt::Display for ServicesSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.ready, self.total)
    }
}

/// Flatten observed services of all ServiceSets not being deleted
pub fn aggregate_observed(service_sets: &[ServiceSet]) -> Vec<ServiceState> {
    service_sets
        .iter()
        .filter(|set| !set.is_deleting())
        .flat_map(|set| set.status.services.iter().cloned())
        .collect()
}

/// Ready over total services across ServiceSets of a target.
///
/// ServiceSets being deleted and services in `Deleting` state are not counted.
pub fn services_summary(service_sets: &[ServiceSet]) -> ServicesSummary {
    aggregate_observed(service_sets)
        .iter()
        .filter(|svc| svc.state != LifecycleState::Deleting)
        .fold(ServicesSummary::default(), |mut summary, svc| {
            summary.total += 1;
            if svc.is_deployed() {
                summary.ready += 1;
            }
            summary
        })
}
