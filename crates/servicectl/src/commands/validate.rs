use anyhow::{Context, Result};
use serviceset_config::{Config, parser, seed_store};
use std::path::Path;
use tracing::debug;

pub fn run(config_path: &Path) -> Result<()> {
    println!("Validating {}...", config_path.display());

    // Structural validation of service lists and policies happens during parsing
    let config = parser::parse_file(config_path).context("Failed to parse configuration")?;
    let warnings = chain_warnings(&config)?;

    println!("  Version: {}", config.version);
    if let Some(name) = &config.name {
        println!("  Name: {}", name);
    }
    println!("  Cluster deployments: {}", config.cluster_deployments.len());
    println!("  Multi-cluster services: {}", config.multi_cluster_services.len());
    println!("  Template chains: {}", config.template_chains.len());
    println!("  ServiceSets: {}", config.service_sets.len());

    if warnings.is_empty() {
        println!("✓ Configuration valid");
        return Ok(());
    }

    for (chain, chain_warnings) in &warnings {
        for warning in chain_warnings {
            println!("  ⚠ Template chain '{}': {}", chain, warning);
        }
    }
    anyhow::bail!("{} template chain(s) are invalid", warnings.len())
}

/// Warnings of every invalid template chain, keyed by `namespace/name`
fn chain_warnings(config: &Config) -> Result<Vec<(String, Vec<String>)>> {
    let store = seed_store(config).context("Failed to load template catalog")?;

    let mut invalid = Vec::new();
    for chain in &config.template_chains {
        let warnings = chain.validate(&store);
        debug!(
            "Template chain {}/{}: {} warnings",
            chain.namespace,
            chain.name,
            warnings.len()
        );
        if !warnings.is_empty() {
            invalid.push((format!("{}/{}", chain.namespace, chain.name), warnings));
        }
    }
    Ok(invalid)
}
