//! Dependency graph construction and structural validation
//!
//! The graph maps every node to the nodes it depends on. It is used at
//! admission time to reject undefined dependencies and cycles before any
//! input is persisted, and again before readiness filtering.

use crate::{Error, MultiClusterService, Result, Service, ServiceKey};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::Display;

/// Traversal state of a node during cycle detection
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Visit {
    OnStack,
    Done,
}

/// Directed dependency graph
#[derive(Debug, Clone)]
pub struct DependencyGraph<K> {
    /// Node -> nodes it depends on
    edges: BTreeMap<K, Vec<K>>,
}

impl<K: Ord> Default for DependencyGraph<K> {
    fn default() -> Self {
        Self {
            edges: BTreeMap::new(),
        }
    }
}

impl<K: Ord + Clone + Display> DependencyGraph<K> {
    /// Create an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node with its dependencies.
    ///
    /// Adding the same node twice appends the new dependencies.
    pub fn add_node(&mut self, node: K, dependencies: impl IntoIterator<Item = K>) {
        self.edges.entry(node).or_default().extend(dependencies);
    }

    /// Whether the node was added to the graph
    pub fn contains(&self, node: &K) -> bool {
        self.edges.contains_key(node)
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// Whether the graph has no nodes
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }

    /// Nodes of the graph in order
    pub fn nodes(&self) -> impl Iterator<Item = &K> {
        self.edges.keys()
    }

    /// Direct dependencies of a node
    pub fn dependencies(&self, node: &K) -> &[K] {
        self.edges.get(node).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Reverse index: dependency -> nodes depending on it
    pub fn dependents(&self) -> BTreeMap<K, Vec<K>> {
        let mut reverse: BTreeMap<K, Vec<K>> = BTreeMap::new();
        for (node, deps) in &self.edges {
            for dep in deps {
                reverse.entry(dep.clone()).or_default().push(node.clone());
            }
        }
        reverse
    }

    /// Edges `(dependent, dependency)` whose target is not a node
    pub fn undefined_dependencies(&self) -> Vec<(K, K)> {
        let mut missing = Vec::new();
        for (node, deps) in &self.edges {
            for dep in deps {
                if !self.edges.contains_key(dep) {
                    missing.push((node.clone(), dep.clone()));
                }
            }
        }
        missing
    }

    /// Find a cycle, returning the edge that closes it.
    ///
    /// Depth-first from every unvisited node with an explicit stack, so deep
    /// chains cannot overflow the call stack. Undefined targets are leaves.
    pub fn detect_cycle(&self) -> Option<(K, K)> {
        let mut visits: BTreeMap<&K, Visit> = BTreeMap::new();

        for root in self.edges.keys() {
            if visits.contains_key(root) {
                continue;
            }

            let mut stack: Vec<(&K, usize)> = vec![(root, 0)];
            visits.insert(root, Visit::OnStack);

            while let Some(&(node, next)) = stack.last() {
                let Some(dep) = self.dependencies(node).get(next) else {
                    visits.insert(node, Visit::Done);
                    stack.pop();
                    continue;
                };
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }

                match visits.get(dep).copied() {
                    Some(Visit::OnStack) => return Some((node.clone(), dep.clone())),
                    Some(Visit::Done) => {}
                    None => {
                        visits.insert(dep, Visit::OnStack);
                        stack.push((dep, 0));
                    }
                }
            }
        }

        None
    }

    /// All nodes reachable from `start` through dependency edges, excluding `start`
    /// unless it lies on a cycle.
    pub fn reachable_from(&self, start: &K) -> BTreeSet<K> {
        let mut seen = BTreeSet::new();
        let mut pending: Vec<&K> = self.dependencies(start).iter().collect();

        while let Some(node) = pending.pop() {
            if seen.insert(node.clone()) {
                pending.extend(self.dependencies(node));
            }
        }

        seen
    }
}

impl DependencyGraph<ServiceKey> {
    /// Build the graph of a desired service list
    pub fn from_services(services: &[Service]) -> Self {
        let mut graph = Self::new();
        for svc in services {
            graph.add_node(svc.key(), svc.depends_on.iter().map(|d| d.key()));
        }
        graph
    }
}

impl DependencyGraph<String> {
    /// Build the graph of multi-cluster service policies
    pub fn from_policies<'a>(policies: impl IntoIterator<Item = &'a MultiClusterService>) -> Self {
        let mut graph = Self::new();
        for policy in policies {
            graph.add_node(policy.name.clone(), policy.depends_on.iter().cloned());
        }
        graph
    }
}

/// Check that every dependency of every service is itself a service of the list.
///
/// All missing dependencies are reported together.
pub fn validate_service_dependencies(services: &[Service]) -> Result<()> {
    let graph = DependencyGraph::from_services(services);
    let errors = graph
        .undefined_dependencies()
        .into_iter()
        .map(|(dependent, dependency)| Error::UndefinedDependency {
            dependency: dependency.to_string(),
            dependent: dependent.to_string(),
        });

    match Error::join(errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Check that the service dependency graph is acyclic
pub fn validate_service_dependency_cycle(services: &[Service]) -> Result<()> {
    match DependencyGraph::from_services(services).detect_cycle() {
        Some((from, to)) => Err(Error::DependencyCycle {
            from: from.to_string(),
            to: to.to_string(),
        }),
        None => Ok(()),
    }
}

/// Check that no two services share an identity
pub fn validate_unique_services(services: &[Service]) -> Result<()> {
    let mut seen = BTreeSet::new();
    let errors = services
        .iter()
        .map(Service::key)
        .filter(|key| !seen.insert(key.clone()))
        .map(|key| Error::DuplicateService(key.to_string()))
        .collect::<Vec<_>>();

    match Error::join(errors) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

/// Run every structural check on a desired service list
pub fn validate_service_dependency_overall(services: &[Service]) -> Result<()> {
    validate_unique_services(services)?;
    validate_service_dependencies(services)?;
    validate_service_dependency_cycle(services)
}

/// Validate the dependencies of a policy against the existing policies.
///
/// Every dependency must name an existing policy, and adding the candidate
/// must keep the policy graph acyclic.
pub fn validate_policy_dependencies(
    candidate: &MultiClusterService,
    existing: &[MultiClusterService],
) -> Result<()> {
    if candidate.depends_on.is_empty() {
        return Ok(());
    }

    let others = existing.iter().filter(|p| p.name != candidate.name);
    let known = DependencyGraph::from_policies(others.clone());
    let errors = candidate
        .depends_on
        .iter()
        .filter(|dep| !known.contains(dep))
        .map(|dep| Error::UndefinedPolicyDependency {
            dependency: dep.clone(),
            dependent: candidate.name.clone(),
        });
    if let Some(err) = Error::join(errors) {
        return Err(err);
    }

    let graph = DependencyGraph::from_policies(others.chain(std::iter::once(candidate)));
    match graph.detect_cycle() {
        Some((from, to)) => Err(Error::DependencyCycle { from, to }),
        None => Ok(()),
    }
}
