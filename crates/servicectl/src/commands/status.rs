use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table};
use serviceset_config::parser;
use serviceset_engine::{ServiceSet, ServicesSummary, services_summary};
use std::collections::BTreeMap;
use std::path::Path;

pub fn run(config_path: &Path) -> Result<()> {
    let config = parser::parse_file(config_path).context("Failed to parse configuration")?;

    let summaries = summarize(&config.service_sets);
    if summaries.is_empty() {
        println!("No ServiceSets stored");
        return Ok(());
    }

    let mut table = Table::new();
    table.set_header(vec!["NAMESPACE", "CLUSTER", "SERVICESETS", "SERVICES"]);
    for ((namespace, cluster), (count, summary)) in &summaries {
        let color = if summary.all_ready() {
            Color::Green
        } else {
            Color::Yellow
        };
        table.add_row(vec![
            Cell::new(namespace),
            Cell::new(if cluster.is_empty() { "<management>" } else { cluster.as_str() }),
            Cell::new(count),
            Cell::new(summary.to_string()).fg(color),
        ]);
    }
    println!("{}", table);
    Ok(())
}

/// ServiceSet count and services summary per (namespace, cluster)
fn summarize(service_sets: &[ServiceSet]) -> BTreeMap<(String, String), (usize, ServicesSummary)> {
    let mut grouped: BTreeMap<(String, String), Vec<ServiceSet>> = BTreeMap::new();
    for set in service_sets {
        grouped
            .entry((set.key.namespace.clone(), set.spec.cluster.clone()))
            .or_default()
            .push(set.clone());
    }

    grouped
        .into_iter()
        .map(|(target, sets)| (target, (sets.len(), services_summary(&sets))))
        .collect()
}
