//! Template chains: which template versions may follow which.

use crate::{DependencyGraph, Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Kind of template a chain is made of
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TemplateKind {
    /// Templates describing clusters
    Cluster,
    /// Templates describing add-on services
    Service,
}

impl fmt::Display for TemplateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TemplateKind::Cluster => write!(f, "ClusterTemplate"),
            TemplateKind::Service => write!(f, "ServiceTemplate"),
        }
    }
}

/// A one-hop upgrade target
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvailableUpgrade {
    /// Template name
    pub name: String,
}

/// A template of the chain with its one-hop upgrade targets
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SupportedTemplate {
    /// Template name
    pub name: String,
    /// Templates reachable in one hop
    #[serde(default)]
    pub available_upgrades: Vec<AvailableUpgrade>,
}

/// Ordered description of legal template transitions
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateChain {
    /// Chain name
    pub name: String,
    /// Namespace the chain and its templates live in
    #[serde(default)]
    pub namespace: String,
    /// Kind of templates in the chain
    pub kind: TemplateKind,
    /// Supported templates
    #[serde(default)]
    pub supported_templates: Vec<SupportedTemplate>,
}

/// Lookup of existing templates, used to validate chains
pub trait TemplateCatalog {
    /// Whether a template of the given kind exists
    fn template_exists(&self, kind: TemplateKind, namespace: &str, name: &str) -> Result<bool>;
}

impl TemplateChain {
    /// Templates reachable in one hop from `template`.
    ///
    /// Fails when the chain does not list `template` as supported.
    pub fn upgrade_paths(&self, template: &str) -> Result<Vec<String>> {
        self.supported_templates
            .iter()
            .find(|t| t.name == template)
            .map(|t| t.available_upgrades.iter().map(|u| u.name.clone()).collect())
            .ok_or_else(|| Error::TemplateNotSupported {
                template: template.to_string(),
                chain: self.name.clone(),
            })
    }

    /// Whether moving from `from` to `to` is a single legal hop
    pub fn allows(&self, from: &str, to: &str) -> bool {
        self.upgrade_paths(from)
            .is_ok_and(|targets| targets.iter().any(|t| t == to))
    }

    /// Validate the chain, returning warnings. An empty list means valid.
    ///
    /// Supported templates must exist in the catalog. Upgrade targets must be
    /// supported templates, and the upgrade graph must be acyclic apart from
    /// a template listing itself.
    pub fn validate(&self, catalog: &dyn TemplateCatalog) -> Vec<String> {
        let supported: BTreeSet<&str> = self
            .supported_templates
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        let upgrade_targets: BTreeSet<&str> = self
            .supported_templates
            .iter()
            .flat_map(|t| t.available_upgrades.iter().map(|u| u.name.as_str()))
            .collect();

        let mut warnings = Vec::new();
        for name in &supported {
            match catalog.template_exists(self.kind, &self.namespace, name) {
                Ok(true) => {}
                Ok(false) => warnings.push(format!(
                    "template {} not available in {} namespace",
                    name, self.namespace
                )),
                Err(e) => warnings.push(format!(
                    "could not verify if template {} exists in {} namespace: {}",
                    name, self.namespace, e
                )),
            }
        }
        if !warnings.is_empty() {
            return warnings;
        }

        for name in upgrade_targets.difference(&supported) {
            warnings.push(format!(
                "template {} is allowed for upgrade but is not present in the list of supported templates",
                name
            ));
        }

        let mut graph = DependencyGraph::new();
        for t in &self.supported_templates {
            graph.add_node(
                t.name.clone(),
                t.available_upgrades
                    .iter()
                    .filter(|u| u.name != t.name)
                    .map(|u| u.name.clone()),
            );
        }
        if let Some((from, to)) = graph.detect_cycle() {
            warnings.push(format!(
                "upgrade from {} to {} closes a cycle in the chain",
                from, to
            ));
        }

        warnings
    }

    /// Validate the chain, turning warnings into an error
    pub fn ensure_valid(&self, catalog: &dyn TemplateCatalog) -> Result<()> {
        let warnings = self.validate(catalog);
        if warnings.is_empty() {
            Ok(())
        } else {
            Err(Error::InvalidChain(warnings))
        }
    }
}
