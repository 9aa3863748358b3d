//! # ServiceSet Configuration
//!
//! YAML snapshot format for the ServiceSet engine.
//!
//! A snapshot describes the cluster deployments and multi-cluster services
//! requesting services, the template chains and templates they refer to, and
//! optionally ServiceSets already stored. This crate parses and validates a
//! snapshot and turns it into engine inputs.

#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use serviceset_engine::{ClusterDeployment, MultiClusterService, ServiceSet, TemplateChain, TemplateKind};
use thiserror::Error;

pub mod parser;
pub mod snapshot;

pub use snapshot::{requesters, seed_store};

/// Snapshot format version understood by this crate
pub const CONFIG_VERSION: &str = "1.0";

/// Namespace of management-cluster ServiceSets unless configured otherwise
pub const DEFAULT_SYSTEM_NAMESPACE: &str = "kcm-system";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    /// Failed to parse YAML
    #[error("Failed to parse YAML: {0}")]
    YamlError(#[from] serde_yaml::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    ValidationError(String),

    /// Environment variable not found
    #[error("Environment variable not found: {0}")]
    EnvVarNotFound(String),

    /// Cluster deployment reference not found
    #[error("Cluster deployment '{0}' not found")]
    ClusterNotFound(String),

    /// Multi-cluster service reference not found
    #[error("Multi-cluster service '{0}' not found")]
    PolicyNotFound(String),

    /// Engine rejected the configuration
    #[error(transparent)]
    Engine(#[from] serviceset_engine::Error),
}

/// Result type for configuration operations
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Root configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version
    pub version: String,

    /// Optional snapshot name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    /// Optional description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Global settings
    #[serde(default)]
    pub settings: Settings,

    /// Clusters with their own service lists
    #[serde(default)]
    pub cluster_deployments: Vec<ClusterDeployment>,

    /// Policies applying services to matching clusters
    #[serde(default)]
    pub multi_cluster_services: Vec<MultiClusterService>,

    /// Template chains
    #[serde(default)]
    pub template_chains: Vec<TemplateChain>,

    /// Templates known to exist
    #[serde(default)]
    pub templates: Vec<TemplateRef>,

    /// ServiceSets already stored
    #[serde(default)]
    pub service_sets: Vec<ServiceSet>,
}

impl Config {
    /// Find a cluster deployment by `namespace/name`, or by name when unambiguous
    pub fn cluster(&self, reference: &str) -> Result<&ClusterDeployment> {
        let mut matches = self.cluster_deployments.iter().filter(|cd| {
            match reference.split_once('/') {
                Some((namespace, name)) => cd.namespace == namespace && cd.name == name,
                None => cd.name == reference,
            }
        });
        match (matches.next(), matches.next()) {
            (Some(cd), None) => Ok(cd),
            (Some(_), Some(_)) => Err(ConfigError::ValidationError(format!(
                "cluster deployment name '{}' is ambiguous, use namespace/name",
                reference
            ))),
            (None, _) => Err(ConfigError::ClusterNotFound(reference.to_string())),
        }
    }

    /// Find a multi-cluster service by name
    pub fn policy(&self, name: &str) -> Result<&MultiClusterService> {
        self.multi_cluster_services
            .iter()
            .find(|p| p.name == name)
            .ok_or_else(|| ConfigError::PolicyNotFound(name.to_string()))
    }
}

/// Global settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Namespace of management-cluster ServiceSets
    #[serde(default = "default_system_namespace")]
    pub system_namespace: String,

    /// Default log level
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            system_namespace: default_system_namespace(),
            log_level: None,
        }
    }
}

fn default_system_namespace() -> String {
    DEFAULT_SYSTEM_NAMESPACE.to_string()
}

/// Reference to an existing template
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TemplateRef {
    /// Template kind
    pub kind: TemplateKind,
    /// Template namespace
    pub namespace: String,
    /// Template name
    pub name: String,
}
