//! Configuration parser with environment variable substitution

use crate::{CONFIG_VERSION, Config, ConfigError, Result};
use regex::Regex;
use serviceset_engine::{
    ObjectKey, validate_policy_dependencies, validate_service_dependency_overall,
};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::LazyLock;
use tracing::debug;

static ENV_VAR: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$\{([^}]+)\}").expect("valid env var pattern"));

/// Parse a YAML configuration file
pub fn parse_file(path: impl AsRef<Path>) -> Result<Config> {
    let content = std::fs::read_to_string(path)?;
    parse_str(&content)
}

/// Parse YAML configuration from a string, substituting environment variables first
pub fn parse_str(content: &str) -> Result<Config> {
    let content = substitute_env_vars(content)?;
    let config: Config = serde_yaml::from_str(&content)?;
    validate_config(&config)?;
    debug!(
        "Parsed configuration with {} cluster deployments and {} multi-cluster services",
        config.cluster_deployments.len(),
        config.multi_cluster_services.len()
    );
    Ok(config)
}

/// Validate configuration
///
/// Checks the version, unique identities, and the dependency structure of
/// every service list and of the policies.
pub fn validate_config(config: &Config) -> Result<()> {
    if config.version != CONFIG_VERSION {
        return Err(ConfigError::ValidationError(format!(
            "Unsupported version: {}, expected {}",
            config.version, CONFIG_VERSION
        )));
    }

    if config.settings.system_namespace.is_empty() {
        return Err(ConfigError::ValidationError(
            "settings.system_namespace must not be empty".to_string(),
        ));
    }

    let mut clusters = BTreeSet::new();
    for cd in &config.cluster_deployments {
        let key = ObjectKey::new(&cd.namespace, &cd.name);
        if cd.name.is_empty() || cd.namespace.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "Cluster deployment '{}' needs both a name and a namespace",
                key
            )));
        }
        if !clusters.insert(key.clone()) {
            return Err(ConfigError::ValidationError(format!(
                "Cluster deployment '{}' is defined more than once",
                key
            )));
        }
        validate_service_dependency_overall(&cd.services).map_err(|e| {
            ConfigError::ValidationError(format!("Cluster deployment '{}': {}", key, e))
        })?;
    }

    let mut policies = BTreeSet::new();
    for policy in &config.multi_cluster_services {
        if !policies.insert(policy.name.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Multi-cluster service '{}' is defined more than once",
                policy.name
            )));
        }
        validate_service_dependency_overall(&policy.services).map_err(|e| {
            ConfigError::ValidationError(format!("Multi-cluster service '{}': {}", policy.name, e))
        })?;
        validate_policy_dependencies(policy, &config.multi_cluster_services)?;
    }

    let mut chains = BTreeSet::new();
    for chain in &config.template_chains {
        if !chains.insert((chain.kind, ObjectKey::new(&chain.namespace, &chain.name))) {
            return Err(ConfigError::ValidationError(format!(
                "Template chain '{}/{}' is defined more than once",
                chain.namespace, chain.name
            )));
        }
    }

    Ok(())
}

/// Substitute environment variables in a string
///
/// Supports `${VAR}` and `${VAR:-default}`. All missing variables are
/// reported together.
pub fn substitute_env_vars(input: &str) -> Result<String> {
    let mut result = input.to_string();
    let mut errors = BTreeSet::new();

    for cap in ENV_VAR.captures_iter(input) {
        let full_match = &cap[0];
        let var_expr = &cap[1];

        let (var_name, default_value) = match var_expr.split_once(":-") {
            Some((name, default)) => (name, Some(default)),
            None => (var_expr, None),
        };

        match (std::env::var(var_name), default_value) {
            (Ok(value), _) => result = result.replace(full_match, &value),
            (Err(_), Some(default)) => result = result.replace(full_match, default),
            (Err(_), None) => {
                errors.insert(var_name.to_string());
            }
        }
    }

    if !errors.is_empty() {
        let missing: Vec<String> = errors.into_iter().collect();
        return Err(ConfigError::EnvVarNotFound(missing.join(", ")));
    }

    Ok(result)
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
version: "1.0"
cluster_deployments:
  - name: prod
    namespace: team-a
    provider:
      name: ksm-projectsveltos
    services:
      - name: ingress
        template: ingress-1-0-0
"#;

    #[test]
    fn test_env_var_with_default() {
        let result =
            substitute_env_vars("${MISSING_VAR_UNLIKELY_TO_EXIST:-default_value}").unwrap();
        assert_eq!(result, "default_value");

        if let Ok(path) = std::env::var("PATH") {
            let result = substitute_env_vars("${PATH:-default}").unwrap();
            assert_eq!(result, path);
        }
    }

    #[test]
    fn test_missing_env_vars_reported_together() {
        let err = substitute_env_vars("${MISSING_ONE_XYZ} and ${MISSING_TWO_XYZ}").unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable not found: MISSING_ONE_XYZ, MISSING_TWO_XYZ"
        );
    }

    #[test]
    fn test_missing_env_var_reported_once() {
        let err = substitute_env_vars("${MISSING_B_XYZ} ${MISSING_A_XYZ} ${MISSING_B_XYZ}")
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "Environment variable not found: MISSING_A_XYZ, MISSING_B_XYZ"
        );
    }

    #[test]
    fn test_parse_minimal_config() {
        let config = parse_str(MINIMAL).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.settings.system_namespace, "kcm-system");
        assert_eq!(config.cluster_deployments.len(), 1);
        assert_eq!(config.cluster_deployments[0].services[0].name, "ingress");
    }

    #[test]
    fn test_unsupported_version() {
        let err = parse_str(&MINIMAL.replace("\"1.0\"", "\"2.0\"")).unwrap_err();
        assert!(err.to_string().contains("Unsupported version: 2.0"));
    }

    #[test]
    fn test_undefined_service_dependency_rejected() {
        let yaml = r#"
version: "1.0"
cluster_deployments:
  - name: prod
    namespace: team-a
    services:
      - name: ingress
        template: ingress-1-0-0
        dependsOn:
          - name: cert-manager
"#;
        let err = parse_str(yaml).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Invalid configuration: Cluster deployment 'team-a/prod': dependency default/cert-manager of service default/ingress is not defined as a service"
        );
    }

    #[test]
    fn test_duplicate_cluster_rejected() {
        let yaml = r#"
version: "1.0"
cluster_deployments:
  - name: prod
    namespace: team-a
  - name: prod
    namespace: team-a
"#;
        assert!(matches!(
            parse_str(yaml),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_policy_dependencies_validated() {
        let yaml = r#"
version: "1.0"
multi_cluster_services:
  - name: apps
    dependsOn: [mesh]
"#;
        let err = parse_str(yaml).unwrap_err();
        assert_eq!(err.to_string(), "dependency mesh of apps is not defined");
    }
}
