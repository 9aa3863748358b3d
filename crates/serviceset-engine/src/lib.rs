//! # ServiceSet Engine
//!
//! Dependency-aware deployment decisions for add-on services.
//!
//! This crate decides, on every reconciliation pass, which services of a
//! deployment target are eligible to be deployed or upgraded, and whether the
//! ServiceSet describing that target has to be created, updated, deleted or
//! left alone. The decision logic is pure and synchronous; the store and
//! reconciler modules wire it to an object store for end-to-end use.
//!
//! ## Example
//!
//! ```rust
//! use serviceset_engine::{Service, filter_service_dependencies};
//!
//! let a = Service::new("a", "addons", "a-1-0-0");
//! let b = Service::new("b", "addons", "b-1-0-0").with_dependency("addons", "a");
//!
//! // Nothing is deployed yet, so only `a` is eligible.
//! let ready = filter_service_dependencies(&[a.clone(), b], &[]);
//! assert_eq!(ready, vec![a]);
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]

mod builder;
mod chain;
mod config;
mod decision;
mod graph;
mod naming;
mod planner;
mod readiness;
mod reconciler;
mod state;
mod store;
mod upgrade;

pub use builder::ServiceSetBuilder;
pub use chain::{AvailableUpgrade, SupportedTemplate, TemplateCatalog, TemplateChain, TemplateKind};
pub use config::{
    ClusterDeployment, DEFAULT_NAMESPACE, HelmOptions, LabelSelector, MultiClusterService,
    ProviderConfig, Service, ServiceDependsOn, ServiceKey, ServiceWithValues, ValuesFrom,
    ValuesSourceKind, effective_namespace,
};
pub use decision::{Operation, OperationRequisites, service_set_operation, services_to_deploy};
pub use graph::{
    DependencyGraph, validate_policy_dependencies, validate_service_dependencies,
    validate_service_dependency_cycle, validate_service_dependency_overall,
    validate_unique_services,
};
pub use naming::{MANAGEMENT_PREFIX, ObjectKey, service_set_object_key};
pub use planner::{Plan, PlanInput, Planner};
pub use readiness::{deployed_services, filter_service_dependencies};
pub use reconciler::{ReconcileOutcome, Reconciler, Requester};
pub use state::{
    LifecycleState, ServiceSet, ServiceSetSpec, ServiceSetStatus, ServiceState, ServicesSummary,
    aggregate_observed, services_summary,
};
pub use store::{MemoryStore, ServiceSetStore, aggregate_for_cluster, create_or_update};
pub use upgrade::{
    ChainLookup, ServiceUpgradePaths, UpgradePaths, can_upgrade, is_upgrade_legal,
    services_upgrade_paths, services_with_desired_chains,
};

/// Result type for engine operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for the ServiceSet engine
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum Error {
    /// A service depends on something that is not part of its domain
    #[error("dependency {dependency} of service {dependent} is not defined as a service")]
    UndefinedDependency {
        /// The missing dependency
        dependency: String,
        /// The service declaring the dependency
        dependent: String,
    },

    /// A policy depends on a policy that does not exist
    #[error("dependency {dependency} of {dependent} is not defined")]
    UndefinedPolicyDependency {
        /// The missing policy
        dependency: String,
        /// The policy declaring the dependency
        dependent: String,
    },

    /// The dependency graph contains a cycle
    #[error("dependency cycle detected: {from} depends on {to}")]
    DependencyCycle {
        /// Source of the offending edge
        from: String,
        /// Target of the offending edge, already on the traversal stack
        to: String,
    },

    /// Two services share the same identity
    #[error("service {0} is defined more than once")]
    DuplicateService(String),

    /// Template chain could not be fetched
    #[error("failed to get template chain {chain} to fetch upgrade paths: {message}")]
    ChainLookup {
        /// Chain identity as namespace/name
        chain: String,
        /// Underlying failure
        message: String,
    },

    /// Template is not a supported template of the chain
    #[error("template {template} is not supported by template chain {chain}")]
    TemplateNotSupported {
        /// Template name
        template: String,
        /// Chain name
        chain: String,
    },

    /// Template chain failed validation
    #[error("the template chain spec is invalid: {}", .0.join("; "))]
    InvalidChain(Vec<String>),

    /// ServiceSet could not be assembled
    #[error("failed to build ServiceSet: {0}")]
    Build(String),

    /// Object not found in the store
    #[error("{0} not found")]
    NotFound(String),

    /// ServiceSet already exists in the store
    #[error("ServiceSet already exists: {0}")]
    AlreadyExists(String),

    /// Write rejected because the stored object changed
    #[error("conflict writing ServiceSet {key}: expected version {expected}, found {found}")]
    Conflict {
        /// ServiceSet identity
        key: String,
        /// Version the writer based its change on
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Store backend error
    #[error("store error: {0}")]
    Store(String),

    /// Several independent errors
    #[error("{}", join_messages(.0))]
    Multiple(Vec<Error>),
}

impl Error {
    /// Join errors into one, flattening nested groups.
    ///
    /// Returns `None` for an empty list and the error itself for a single one.
    pub fn join(errors: impl IntoIterator<Item = Error>) -> Option<Error> {
        let mut flat = Vec::new();
        for err in errors {
            match err {
                Error::Multiple(inner) => flat.extend(inner),
                other => flat.push(other),
            }
        }
        match flat.len() {
            0 => None,
            1 => flat.pop(),
            _ => Some(Error::Multiple(flat)),
        }
    }

    /// Whether this error is a structural problem of the dependency graph
    pub fn is_structural(&self) -> bool {
        match self {
            Error::UndefinedDependency { .. }
            | Error::UndefinedPolicyDependency { .. }
            | Error::DependencyCycle { .. }
            | Error::DuplicateService(_) => true,
            Error::Multiple(inner) => inner.iter().any(Error::is_structural),
            _ => false,
        }
    }
}

fn join_messages(errors: &[Error]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("\n")
}
