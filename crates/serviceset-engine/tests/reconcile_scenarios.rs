//! End-to-end reconciliation scenarios against the in-memory store

use serviceset_engine::{
    AvailableUpgrade, ClusterDeployment, Error, LifecycleState, MemoryStore, ObjectKey, Operation,
    ProviderConfig, Reconciler, Requester, Service, ServiceSetStatus, ServiceSetStore,
    ServiceState, SupportedTemplate, TemplateChain, TemplateKind, services_summary,
};
use std::sync::Arc;

const SYSTEM_NAMESPACE: &str = "kcm-system";

fn cluster(name: &str, services: Vec<Service>) -> ClusterDeployment {
    ClusterDeployment {
        name: name.to_string(),
        namespace: "team-a".to_string(),
        services,
        provider: ProviderConfig {
            name: "ksm-projectsveltos".to_string(),
            ..Default::default()
        },
        ..Default::default()
    }
}

fn versions_chain() -> TemplateChain {
    let step = |name: &str, next: &[&str]| SupportedTemplate {
        name: name.to_string(),
        available_upgrades: next
            .iter()
            .map(|n| AvailableUpgrade {
                name: n.to_string(),
            })
            .collect(),
    };
    TemplateChain {
        name: "ingress-chain".to_string(),
        namespace: "team-a".to_string(),
        kind: TemplateKind::Service,
        supported_templates: vec![
            step("ingress-1", &["ingress-2"]),
            step("ingress-2", &["ingress-3"]),
            step("ingress-3", &[]),
        ],
    }
}

/// Pretend the provider installed everything the ServiceSet declares
async fn provider_deploys(store: &MemoryStore, key: &ObjectKey) {
    let set = store.get(key).await.unwrap().unwrap();
    let services = set
        .spec
        .services
        .iter()
        .map(|s| ServiceState::new(&s.name, &s.namespace, &s.template, LifecycleState::Deployed))
        .collect();
    store
        .update_status(key, ServiceSetStatus { services })
        .await
        .unwrap();
}

fn templates(services: &[serviceset_engine::ServiceWithValues]) -> Vec<(&str, &str)> {
    services
        .iter()
        .map(|s| (s.name.as_str(), s.template.as_str()))
        .collect()
}

#[smol_potat::test]
async fn test_full_lifecycle() {
    let store = Arc::new(MemoryStore::new());
    let reconciler = Reconciler::new(store.clone(), SYSTEM_NAMESPACE);

    let services = vec![
        Service::new("cert-manager", "cert", "cert-manager-1"),
        Service::new("ingress", "", "ingress-1").with_dependency("cert", "cert-manager"),
        Service::new("app", "apps", "app-1").with_dependency("", "ingress"),
    ];
    let requester = Requester::Cluster(cluster("prod", services));

    // first pass deploys only the root
    let outcome = reconciler.reconcile(&requester).await.unwrap();
    assert_eq!(outcome.operation, Operation::Create);
    assert_eq!(templates(&outcome.services), vec![("cert-manager", "cert-manager-1")]);

    // nothing changes until the provider reports
    let outcome = reconciler.reconcile(&requester).await.unwrap();
    assert_eq!(outcome.operation, Operation::None);

    provider_deploys(&store, &outcome.key).await;
    let outcome = reconciler.reconcile(&requester).await.unwrap();
    assert_eq!(outcome.operation, Operation::Update);
    assert_eq!(outcome.services.len(), 2);

    provider_deploys(&store, &outcome.key).await;
    let outcome = reconciler.reconcile(&requester).await.unwrap();
    assert_eq!(outcome.operation, Operation::Update);
    assert_eq!(
        templates(&outcome.services),
        vec![
            ("cert-manager", "cert-manager-1"),
            ("ingress", "ingress-1"),
            ("app", "app-1"),
        ]
    );

    provider_deploys(&store, &outcome.key).await;
    let outcome = reconciler.reconcile(&requester).await.unwrap();
    assert_eq!(outcome.operation, Operation::None);

    let sets = store.list_for_cluster("team-a", "prod").await.unwrap();
    assert_eq!(services_summary(&sets).to_string(), "3/3");

    // all services removed: soft delete, then nothing more
    let emptied = Requester::Cluster(cluster("prod", Vec::new()));
    let outcome = reconciler.reconcile(&emptied).await.unwrap();
    assert_eq!(outcome.operation, Operation::Delete);
    assert!(store.get(&outcome.key).await.unwrap().unwrap().is_deleting());

    let outcome = reconciler.reconcile(&emptied).await.unwrap();
    assert_eq!(outcome.operation, Operation::None);

    let sets = store.list_for_cluster("team-a", "prod").await.unwrap();
    assert_eq!(services_summary(&sets).to_string(), "0/0");
}

#[smol_potat::test]
async fn test_stepwise_upgrade_along_chain() {
    let store = Arc::new(MemoryStore::new());
    store.add_chain(versions_chain()).unwrap();
    let reconciler = Reconciler::new(store.clone(), SYSTEM_NAMESPACE);

    let ingress = |template: &str| {
        Requester::Cluster(cluster(
            "prod",
            vec![Service::new("ingress", "", template).with_chain("ingress-chain")],
        ))
    };

    let outcome = reconciler.reconcile(&ingress("ingress-1")).await.unwrap();
    assert_eq!(outcome.operation, Operation::Create);
    provider_deploys(&store, &outcome.key).await;

    // skipping a version is held back without rewriting the ServiceSet
    let version = store.get(&outcome.key).await.unwrap().unwrap().resource_version;
    for _ in 0..2 {
        let outcome = reconciler.reconcile(&ingress("ingress-3")).await.unwrap();
        assert_eq!(outcome.operation, Operation::None);
        assert_eq!(templates(&outcome.services), vec![("ingress", "ingress-1")]);
        assert!(outcome.errors.is_empty());
    }
    let stored = store.get(&outcome.key).await.unwrap().unwrap();
    assert_eq!(stored.resource_version, version);

    // one hop at a time
    let outcome = reconciler.reconcile(&ingress("ingress-2")).await.unwrap();
    assert_eq!(outcome.operation, Operation::Update);
    assert_eq!(templates(&outcome.services), vec![("ingress", "ingress-2")]);

    // waits while the provider upgrades
    let outcome = reconciler.reconcile(&ingress("ingress-3")).await.unwrap();
    assert_eq!(outcome.operation, Operation::None);

    provider_deploys(&store, &outcome.key).await;
    let outcome = reconciler.reconcile(&ingress("ingress-3")).await.unwrap();
    assert_eq!(templates(&outcome.services), vec![("ingress", "ingress-3")]);
}

#[smol_potat::test]
async fn test_cycle_rejected_before_any_write() {
    let store = Arc::new(MemoryStore::new());
    let reconciler = Reconciler::new(store.clone(), SYSTEM_NAMESPACE);
    let requester = Requester::Cluster(cluster(
        "prod",
        vec![
            Service::new("a", "", "a-1").with_dependency("", "b"),
            Service::new("b", "", "b-1").with_dependency("", "a"),
        ],
    ));

    let err = reconciler.reconcile(&requester).await.unwrap_err();
    assert!(matches!(err, Error::DependencyCycle { .. }));
    assert!(store.service_sets().unwrap().is_empty());
}

#[smol_potat::test]
async fn test_peer_state_satisfies_declared_dependency() {
    let store = Arc::new(MemoryStore::new());
    let reconciler = Reconciler::new(store.clone(), SYSTEM_NAMESPACE);

    // a peer ServiceSet of the same cluster already runs the dependency
    let mut peer = serviceset_engine::ServiceSet::new(ObjectKey::new("team-a", "prod-peer"));
    peer.spec.cluster = "prod".to_string();
    peer.status.services = vec![ServiceState::new(
        "cert-manager",
        "cert",
        "cert-manager-1",
        LifecycleState::Deployed,
    )];
    store.seed(peer).unwrap();

    let requester = Requester::Cluster(cluster(
        "prod",
        vec![Service::new("ingress", "", "ingress-1").with_dependency("cert", "cert-manager")],
    ));
    let err = reconciler.reconcile(&requester).await.unwrap_err();
    // the dependency must still be part of the desired list
    assert!(matches!(err, Error::UndefinedDependency { .. }));

    let requester = Requester::Cluster(cluster(
        "prod",
        vec![
            Service::new("cert-manager", "cert", "cert-manager-1"),
            Service::new("ingress", "", "ingress-1").with_dependency("cert", "cert-manager"),
        ],
    ));
    let outcome = reconciler.reconcile(&requester).await.unwrap();
    assert_eq!(outcome.services.len(), 2);
}

#[smol_potat::test]
async fn test_clusters_reconcile_concurrently() {
    let store = Arc::new(MemoryStore::new());
    let reconciler = Reconciler::new(store.clone(), SYSTEM_NAMESPACE);
    let requesters: Vec<Requester> = ["prod", "staging", "dev"]
        .iter()
        .map(|name| Requester::Cluster(cluster(name, vec![Service::new("a", "", "a-1")])))
        .collect();

    let outcomes =
        futures::future::join_all(requesters.iter().map(|r| reconciler.reconcile(r))).await;

    for outcome in outcomes {
        assert_eq!(outcome.unwrap().operation, Operation::Create);
    }
    assert_eq!(store.service_sets().unwrap().len(), 3);
}
