//! Dependency readiness filtering
//!
//! A desired service becomes eligible once every service it depends on is
//! observed as deployed somewhere on the same target.

use crate::{Service, ServiceKey, ServiceState};
use std::collections::{BTreeMap, BTreeSet};
use tracing::debug;

/// Identities of all services observed as deployed
pub fn deployed_services(observed: &[ServiceState]) -> BTreeSet<ServiceKey> {
    observed
        .iter()
        .filter(|svc| svc.is_deployed())
        .map(ServiceState::key)
        .collect()
}

/// Desired services whose dependencies are all deployed.
///
/// `observed` is the aggregate of all ServiceSets of the target. Services
/// without dependencies are always returned. The result keeps the order of
/// `desired`.
pub fn filter_service_dependencies(desired: &[Service], observed: &[ServiceState]) -> Vec<Service> {
    let mut depends_on_count: BTreeMap<ServiceKey, i64> = BTreeMap::new();
    let mut dependents: BTreeMap<ServiceKey, Vec<ServiceKey>> = BTreeMap::new();

    for svc in desired {
        let key = svc.key();
        for dep in &svc.depends_on {
            dependents.entry(dep.key()).or_default().push(key.clone());
        }
        depends_on_count.insert(key, svc.depends_on.len() as i64);
    }

    for deployed in deployed_services(observed) {
        for dependent in dependents.get(&deployed).into_iter().flatten() {
            if let Some(count) = depends_on_count.get_mut(dependent) {
                *count -= 1;
            }
        }
    }

    let ready: Vec<Service> = desired
        .iter()
        .filter(|svc| depends_on_count.get(&svc.key()).is_some_and(|count| *count <= 0))
        .cloned()
        .collect();

    debug!(
        "{} of {} desired services have their dependencies deployed",
        ready.len(),
        desired.len()
    );
    ready
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::LifecycleState;

    fn svc(name: &str) -> Service {
        Service::new(name, "", &format!("{}-1-0-0", name))
    }

    fn deployed(name: &str) -> ServiceState {
        ServiceState::new(name, "default", &format!("{}-1-0-0", name), LifecycleState::Deployed)
    }

    fn names(services: &[Service]) -> Vec<&str> {
        services.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_single_dependency() {
        let desired = vec![svc("a"), svc("b").with_dependency("", "a")];

        assert_eq!(names(&filter_service_dependencies(&desired, &[])), vec!["a"]);
        assert_eq!(
            names(&filter_service_dependencies(&desired, &[deployed("a")])),
            vec!["a", "b"]
        );
    }

    #[test]
    fn test_only_deployed_state_counts() {
        let desired = vec![svc("a"), svc("b").with_dependency("", "a")];
        let provisioning =
            ServiceState::new("a", "default", "a-1-0-0", LifecycleState::Provisioning);
        let failed = ServiceState::new("a", "default", "a-1-0-0", LifecycleState::Failed);

        assert_eq!(
            names(&filter_service_dependencies(&desired, &[provisioning, failed])),
            vec!["a"]
        );
    }

    #[test]
    fn test_namespace_is_part_of_identity() {
        let desired = vec![svc("b").with_dependency("infra", "a")];
        let wrong_ns = ServiceState::new("a", "default", "a-1-0-0", LifecycleState::Deployed);
        let right_ns = ServiceState::new("a", "infra", "a-1-0-0", LifecycleState::Deployed);

        assert!(filter_service_dependencies(&desired, &[wrong_ns]).is_empty());
        assert_eq!(
            names(&filter_service_dependencies(&desired, &[right_ns])),
            vec!["b"]
        );
    }

    #[test]
    fn test_multi_iteration_rollout() {
        // A->D, B->D, C->E,F, D->E, F->E, E and G are free
        let desired = vec![
            svc("a").with_dependency("", "d"),
            svc("b").with_dependency("", "d"),
            svc("c").with_dependency("", "e").with_dependency("", "f"),
            svc("d").with_dependency("", "e"),
            svc("e"),
            svc("f").with_dependency("", "e"),
            svc("g"),
        ];

        let first = filter_service_dependencies(&desired, &[]);
        assert_eq!(names(&first), vec!["e", "g"]);

        // deployed state spread across two ServiceSets
        let observed = vec![deployed("e"), deployed("g")];
        let second = filter_service_dependencies(&desired, &observed);
        assert_eq!(names(&second), vec!["d", "e", "f", "g"]);

        let observed = vec![
            deployed("e"),
            deployed("g"),
            deployed("d"),
            deployed("f"),
        ];
        let third = filter_service_dependencies(&desired, &observed);
        assert_eq!(names(&third), vec!["a", "b", "c", "d", "e", "f", "g"]);
    }

    #[test]
    fn test_readiness_is_monotonic() {
        let desired = vec![
            svc("a"),
            svc("b").with_dependency("", "a"),
            svc("c").with_dependency("", "a").with_dependency("", "b"),
        ];
        let all = [deployed("a"), deployed("b"), deployed("c")];

        let mut previous: BTreeSet<String> = BTreeSet::new();
        for n in 0..=all.len() {
            let ready: BTreeSet<String> = filter_service_dependencies(&desired, &all[..n])
                .into_iter()
                .map(|s| s.name)
                .collect();
            assert!(previous.is_subset(&ready));
            previous = ready;
        }
    }

    #[test]
    fn test_services_without_dependencies_always_ready() {
        let desired = vec![svc("x"), svc("y")];
        let unrelated = vec![deployed("z")];
        assert_eq!(
            names(&filter_service_dependencies(&desired, &unrelated)),
            vec!["x", "y"]
        );
    }

    #[test]
    fn test_deployed_services_dedup() {
        let observed = vec![
            deployed("a"),
            deployed("a"),
            ServiceState::new("b", "", "b-1", LifecycleState::Deleting),
        ];
        let keys = deployed_services(&observed);
        assert_eq!(keys.len(), 1);
        assert!(keys.contains(&ServiceKey::new("default", "a")));
    }
}
