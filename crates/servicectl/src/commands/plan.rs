use crate::Format;
use anyhow::{Context, Result};
use comfy_table::{Cell, Color, Table};
use serde::Serialize;
use serviceset_config::{Config, parser, requesters, seed_store};
use serviceset_engine::{
    ObjectKey, Operation, ReconcileOutcome, Reconciler, Requester, ServiceWithValues,
};
use std::path::Path;
use std::sync::Arc;

/// Printable result of one reconciliation
#[derive(Debug, Serialize)]
struct PlanReport {
    requester: String,
    key: ObjectKey,
    operation: Operation,
    services: Vec<ServiceWithValues>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    errors: Vec<String>,
}

impl PlanReport {
    fn new(requester: &Requester, outcome: ReconcileOutcome) -> Self {
        Self {
            requester: describe(requester),
            key: outcome.key,
            operation: outcome.operation,
            services: outcome.services,
            errors: outcome.errors.iter().map(ToString::to_string).collect(),
        }
    }
}

pub async fn run(config_path: &Path, cluster: Option<&str>, format: Format) -> Result<()> {
    let config = parser::parse_file(config_path).context("Failed to parse configuration")?;
    let reports = plan(&config, cluster).await?;

    match format {
        Format::Yaml => print!("{}", serde_yaml::to_string(&reports)?),
        Format::Table => display_table(&reports),
    }
    Ok(())
}

/// Reconcile every requester of the snapshot once, in snapshot order
async fn plan(config: &Config, cluster: Option<&str>) -> Result<Vec<PlanReport>> {
    let target = cluster
        .map(|reference| config.cluster(reference).map(ObjectKey::of_cluster))
        .transpose()?;

    let store = Arc::new(seed_store(config)?);
    let reconciler = Reconciler::new(store, config.settings.system_namespace.clone());

    let mut reports = Vec::new();
    for requester in requesters(config) {
        if let Some(target) = &target {
            let targets_cluster = match &requester {
                Requester::Cluster(cd) => ObjectKey::of_cluster(cd) == *target,
                Requester::Policy { cluster, .. } => cluster
                    .as_ref()
                    .is_some_and(|cd| ObjectKey::of_cluster(cd) == *target),
            };
            if !targets_cluster {
                continue;
            }
        }

        let outcome = reconciler
            .reconcile(&requester)
            .await
            .with_context(|| format!("Failed to reconcile {}", describe(&requester)))?;
        reports.push(PlanReport::new(&requester, outcome));
    }
    Ok(reports)
}

fn describe(requester: &Requester) -> String {
    match requester {
        Requester::Cluster(cd) => format!("cluster {}/{}", cd.namespace, cd.name),
        Requester::Policy {
            policy,
            cluster: Some(cd),
        } => format!("policy {} on {}/{}", policy.name, cd.namespace, cd.name),
        Requester::Policy { policy, .. } => format!("policy {} on management", policy.name),
    }
}

fn display_table(reports: &[PlanReport]) {
    let mut table = Table::new();
    table.set_header(vec!["REQUESTER", "SERVICESET", "OPERATION", "SERVICES", "ERRORS"]);

    for report in reports {
        let color = match report.operation {
            Operation::Create => Color::Green,
            Operation::Update => Color::Yellow,
            Operation::Delete => Color::Red,
            Operation::None => Color::DarkGrey,
        };
        let services = report
            .services
            .iter()
            .map(|s| format!("{}/{}@{}", s.namespace, s.name, s.template))
            .collect::<Vec<_>>()
            .join("\n");

        table.add_row(vec![
            Cell::new(&report.requester),
            Cell::new(report.key.to_string()),
            Cell::new(report.operation.to_string()).fg(color),
            Cell::new(services),
            Cell::new(report.errors.join("\n")),
        ]);
    }

    println!("{}", table);
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"
version: "1.0"
cluster_deployments:
  - name: prod
    namespace: team-a
    labels: {env: prod}
    services:
      - name: a
        template: a-1
      - name: b
        template: b-1
        dependsOn: [{name: a}]
  - name: dev
    namespace: team-a
multi_cluster_services:
  - name: logging
    clusterSelector:
      matchLabels: {env: prod}
    services:
      - name: fluent-bit
        template: fluent-bit-3
"#;

    #[test]
    fn test_plan_all_requesters() {
        let config = parser::parse_str(SNAPSHOT).unwrap();
        let reports = smol::block_on(plan(&config, None)).unwrap();

        assert_eq!(reports.len(), 3);
        assert_eq!(reports[0].operation, Operation::Create);
        assert_eq!(reports[0].services.len(), 1);
        // dev has nothing to deploy
        assert_eq!(reports[1].operation, Operation::None);
        assert_eq!(reports[2].requester, "policy logging on team-a/prod");
    }

    #[test]
    fn test_plan_filtered_by_cluster() {
        let config = parser::parse_str(SNAPSHOT).unwrap();
        let reports = smol::block_on(plan(&config, Some("team-a/dev"))).unwrap();
        assert_eq!(reports.len(), 1);

        assert!(smol::block_on(plan(&config, Some("missing"))).is_err());
    }

    #[test]
    fn test_report_yaml() {
        let config = parser::parse_str(SNAPSHOT).unwrap();
        let reports = smol::block_on(plan(&config, Some("prod"))).unwrap();
        let yaml = serde_yaml::to_string(&reports).unwrap();

        assert!(yaml.contains("operation: create"));
        assert!(yaml.contains("template: a-1"));
    }
}
