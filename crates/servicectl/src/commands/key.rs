use anyhow::{Context, Result};
use serviceset_config::{Config, parser};
use serviceset_engine::{ObjectKey, Requester};
use std::path::Path;

pub fn run(config_path: &Path, cluster: Option<&str>, policy: Option<&str>) -> Result<()> {
    let config = parser::parse_file(config_path).context("Failed to parse configuration")?;
    println!("{}", resolve(&config, cluster, policy)?);
    Ok(())
}

fn resolve(config: &Config, cluster: Option<&str>, policy: Option<&str>) -> Result<ObjectKey> {
    let cluster = cluster.map(|c| config.cluster(c)).transpose()?;

    let requester = match (policy, cluster) {
        (Some(policy), cluster) => Requester::Policy {
            policy: config.policy(policy)?.clone(),
            cluster: cluster.cloned(),
        },
        (None, Some(cd)) => Requester::Cluster(cd.clone()),
        (None, None) => anyhow::bail!("Either --cluster or --policy must be given"),
    };

    Ok(requester.service_set_key(&config.settings.system_namespace))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SNAPSHOT: &str = r#"
version: "1.0"
settings:
  system_namespace: kcm-system
cluster_deployments:
  - name: prod
    namespace: team-a
multi_cluster_services:
  - name: logging
"#;

    #[test]
    fn test_cluster_key() {
        let config = parser::parse_str(SNAPSHOT).unwrap();
        let key = resolve(&config, Some("prod"), None).unwrap();
        assert_eq!(key.to_string(), "team-a/prod");
    }

    #[test]
    fn test_policy_keys() {
        let config = parser::parse_str(SNAPSHOT).unwrap();

        let management = resolve(&config, None, Some("logging")).unwrap();
        assert_eq!(management.namespace, "kcm-system");
        assert!(management.name.starts_with("management-"));

        let on_cluster = resolve(&config, Some("team-a/prod"), Some("logging")).unwrap();
        assert_eq!(on_cluster.namespace, "team-a");
        assert!(on_cluster.name.starts_with("prod-"));
        assert_eq!(on_cluster.name.len(), "prod-".len() + 8);
    }

    #[test]
    fn test_requires_target() {
        let config = parser::parse_str(SNAPSHOT).unwrap();
        assert!(resolve(&config, None, None).is_err());
        assert!(resolve(&config, None, Some("missing")).is_err());
    }
}
