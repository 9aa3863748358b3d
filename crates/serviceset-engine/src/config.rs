//! Service descriptors and the objects that request them.
//!
//! These types mirror what a user declares: the services to install on a
//! target, their dependency edges, and the provider configuration used to
//! materialize them.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Namespace used when a service does not name one
pub const DEFAULT_NAMESPACE: &str = "default";

/// Falls back to [`DEFAULT_NAMESPACE`] for an empty namespace.
pub fn effective_namespace(namespace: &str) -> &str {
    if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    }
}

/// Identity of a service within a reconciliation domain
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServiceKey {
    /// Namespace, never empty
    pub namespace: String,
    /// Service name
    pub name: String,
}

impl ServiceKey {
    /// Create a key, defaulting an empty namespace
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            namespace: effective_namespace(namespace).to_string(),
            name: name.to_string(),
        }
    }
}

impl fmt::Display for ServiceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A service to be deployed on a target cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    /// Release name
    pub name: String,
    /// Release namespace, `default` when empty
    #[serde(default)]
    pub namespace: String,
    /// Template the service is rendered from
    pub template: String,
    /// Template chain constraining upgrades of this service
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template_chain: Option<String>,
    /// Values passed to the template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Value>,
    /// Additional values sources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_from: Vec<ValuesFrom>,
    /// Helm install/upgrade options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm_options: Option<HelmOptions>,
    /// Services that must be deployed before this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<ServiceDependsOn>,
    /// Skip this service entirely
    #[serde(default)]
    pub disable: bool,
}

impl Service {
    /// Create a service with no values and no dependencies
    pub fn new(name: &str, namespace: &str, template: &str) -> Self {
        Self {
            name: name.to_string(),
            namespace: namespace.to_string(),
            template: template.to_string(),
            ..Default::default()
        }
    }

    /// Add a dependency
    pub fn with_dependency(mut self, namespace: &str, name: &str) -> Self {
        self.depends_on.push(ServiceDependsOn {
            namespace: namespace.to_string(),
            name: name.to_string(),
        });
        self
    }

    /// Set the template chain
    pub fn with_chain(mut self, chain: &str) -> Self {
        self.template_chain = Some(chain.to_string());
        self
    }

    /// Set the values
    pub fn with_values(mut self, values: serde_json::Value) -> Self {
        self.values = Some(values);
        self
    }

    /// Mark the service as disabled
    pub fn disabled(mut self) -> Self {
        self.disable = true;
        self
    }

    /// Identity of this service
    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(&self.namespace, &self.name)
    }
}

/// A dependency edge to another service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceDependsOn {
    /// Namespace of the dependency
    #[serde(default)]
    pub namespace: String,
    /// Name of the dependency
    pub name: String,
}

impl ServiceDependsOn {
    /// Identity of the referenced service
    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(&self.namespace, &self.name)
    }
}

/// Kind of object values are read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValuesSourceKind {
    /// A ConfigMap
    ConfigMap,
    /// A Secret
    Secret,
}

/// Reference to an object holding template values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValuesFrom {
    /// Source kind
    pub kind: ValuesSourceKind,
    /// Source name
    pub name: String,
}

/// Helm install/upgrade options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HelmOptions {
    /// Wait for resources to become ready
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait: Option<bool>,
    /// Roll back on failure
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub atomic: Option<bool>,
    /// Skip CRD installation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_crds: Option<bool>,
    /// Operation timeout, e.g. `5m`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

/// A service as materialized in a ServiceSet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceWithValues {
    /// Release name
    pub name: String,
    /// Release namespace, never empty
    pub namespace: String,
    /// Template in use
    pub template: String,
    /// Values passed to the template
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<serde_json::Value>,
    /// Additional values sources
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub values_from: Vec<ValuesFrom>,
    /// Helm install/upgrade options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub helm_options: Option<HelmOptions>,
}

impl ServiceWithValues {
    /// Identity of this service
    pub fn key(&self) -> ServiceKey {
        ServiceKey::new(&self.namespace, &self.name)
    }
}

impl From<&Service> for ServiceWithValues {
    fn from(service: &Service) -> Self {
        Self {
            name: service.name.clone(),
            namespace: effective_namespace(&service.namespace).to_string(),
            template: service.template.clone(),
            values: service.values.clone(),
            values_from: service.values_from.clone(),
            helm_options: service.helm_options.clone(),
        }
    }
}

/// Configuration of the state management provider materializing a ServiceSet
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderConfig {
    /// Provider name
    pub name: String,
    /// Provider specific configuration
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config: Option<serde_json::Value>,
    /// Whether the provider also manages the management cluster
    #[serde(default)]
    pub self_management: bool,
}

/// Equality-based label selector
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LabelSelector {
    /// Labels that must all match
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub match_labels: BTreeMap<String, String>,
}

impl LabelSelector {
    /// Whether the given labels satisfy this selector
    pub fn matches(&self, labels: &BTreeMap<String, String>) -> bool {
        self.match_labels
            .iter()
            .all(|(k, v)| labels.get(k).is_some_and(|actual| actual == v))
    }
}

/// Services requested for a single cluster
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClusterDeployment {
    /// Cluster name
    pub name: String,
    /// Cluster namespace
    pub namespace: String,
    /// Cluster labels, matched by policy selectors
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    /// Services to deploy
    #[serde(default)]
    pub services: Vec<Service>,
    /// Provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Provider selector attached to the ServiceSet
    #[serde(default)]
    pub selector: LabelSelector,
    /// Propagate cluster credentials even without services
    #[serde(default)]
    pub propagate_credentials: bool,
}

/// Services requested for every cluster matching a selector
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultiClusterService {
    /// Policy name
    pub name: String,
    /// Policies that must be satisfied first
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub depends_on: Vec<String>,
    /// Clusters this policy applies to
    #[serde(default)]
    pub cluster_selector: LabelSelector,
    /// Services to deploy
    #[serde(default)]
    pub services: Vec<Service>,
    /// Provider configuration
    #[serde(default)]
    pub provider: ProviderConfig,
    /// Provider selector attached to the ServiceSet
    #[serde(default)]
    pub selector: LabelSelector,
}
