use crate::Format;
use anyhow::{Context, Result};
use comfy_table::Table;
use serviceset_config::{parser, seed_store};
use serviceset_engine::{ServiceUpgradePaths, services_upgrade_paths};
use std::path::Path;

pub fn run(config_path: &Path, cluster: &str, format: Format) -> Result<()> {
    let config = parser::parse_file(config_path).context("Failed to parse configuration")?;
    let cd = config.cluster(cluster)?;
    let store = seed_store(&config)?;

    let paths = services_upgrade_paths(&store, &cd.services, &cd.namespace);
    for error in &paths.errors {
        eprintln!("⚠ {}", error);
    }

    match format {
        Format::Yaml => print!("{}", serde_yaml::to_string(&paths.services)?),
        Format::Table => println!("{}", render_table(&paths.services)),
    }
    Ok(())
}

fn render_table(services: &[ServiceUpgradePaths]) -> Table {
    let mut table = Table::new();
    table.set_header(vec!["SERVICE", "TEMPLATE", "CHAIN", "UPGRADES"]);

    for svc in services {
        let upgrades = if svc.chain.is_none() {
            "any".to_string()
        } else if svc.available_upgrades.is_empty() {
            "-".to_string()
        } else {
            svc.available_upgrades.join(", ")
        };
        table.add_row(vec![
            format!("{}/{}", svc.namespace, svc.name),
            svc.template.clone(),
            svc.chain.clone().unwrap_or_else(|| "-".to_string()),
            upgrades,
        ]);
    }
    table
}
