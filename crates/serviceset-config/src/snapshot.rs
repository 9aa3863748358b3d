//! Conversion of a snapshot into engine inputs

use crate::{Config, Result};
use serviceset_engine::{MemoryStore, Requester};
use tracing::debug;

/// Build an in-memory store holding the snapshot's chains, templates and ServiceSets
pub fn seed_store(config: &Config) -> Result<MemoryStore> {
    let store = MemoryStore::new();
    for chain in &config.template_chains {
        store.add_chain(chain.clone())?;
    }
    for template in &config.templates {
        store.add_template(template.kind, &template.namespace, &template.name)?;
    }
    for set in &config.service_sets {
        store.seed(set.clone())?;
    }
    debug!(
        "Seeded store with {} chains, {} templates and {} ServiceSets",
        config.template_chains.len(),
        config.templates.len(),
        config.service_sets.len()
    );
    Ok(store)
}

/// Every requester of the snapshot.
///
/// Each cluster deployment requests its own services. Each policy requests its
/// services on every cluster its selector matches, and on the management
/// cluster when its provider manages it.
pub fn requesters(config: &Config) -> Vec<Requester> {
    let mut requesters: Vec<Requester> = config
        .cluster_deployments
        .iter()
        .cloned()
        .map(Requester::Cluster)
        .collect();

    for policy in &config.multi_cluster_services {
        for cd in config
            .cluster_deployments
            .iter()
            .filter(|cd| policy.cluster_selector.matches(&cd.labels))
        {
            requesters.push(Requester::Policy {
                policy: policy.clone(),
                cluster: Some(cd.clone()),
            });
        }
        if policy.provider.self_management {
            requesters.push(Requester::Policy {
                policy: policy.clone(),
                cluster: None,
            });
        }
    }

    requesters
}
