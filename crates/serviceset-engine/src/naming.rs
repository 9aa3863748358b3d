//! Deterministic ServiceSet identities

use crate::ClusterDeployment;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

/// Name prefix of ServiceSets targeting the management cluster
pub const MANAGEMENT_PREFIX: &str = "management";

/// Namespaced identity of a stored object
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectKey {
    /// Object namespace
    pub namespace: String,
    /// Object name
    pub name: String,
}

impl ObjectKey {
    /// Create a key
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }

    /// Identity of a cluster deployment
    pub fn of_cluster(cluster: &ClusterDeployment) -> Self {
        Self::new(&cluster.namespace, &cluster.name)
    }
}

impl fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// Identity of the ServiceSet produced by a policy for a cluster.
///
/// The name is `<cluster>-<hash>` in the cluster namespace, where `hash` is the
/// hex of the first four bytes of the SHA-256 of the policy name. Without a
/// cluster the ServiceSet targets the management cluster and is named
/// `management-<hash>` in the system namespace.
pub fn service_set_object_key(
    system_namespace: &str,
    cluster: Option<&ObjectKey>,
    policy_name: &str,
) -> ObjectKey {
    let digest = Sha256::digest(policy_name.as_bytes());
    let hash = hex::encode(&digest[..4]);

    match cluster {
        Some(cluster) => ObjectKey::new(&cluster.namespace, format!("{}-{}", cluster.name, hash)),
        None => ObjectKey::new(system_namespace, format!("{}-{}", MANAGEMENT_PREFIX, hash)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_for_cluster() {
        let cluster = ObjectKey::new("team-a", "prod-1");
        let key = service_set_object_key("kcm-system", Some(&cluster), "ingress");

        assert_eq!(key.namespace, "team-a");
        assert!(key.name.starts_with("prod-1-"));
        assert_eq!(key.name.len(), "prod-1-".len() + 8);
        assert!(key.name["prod-1-".len()..].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_key_for_management_cluster() {
        let key = service_set_object_key("kcm-system", None, "ingress");
        assert_eq!(key.namespace, "kcm-system");
        assert!(key.name.starts_with("management-"));
    }

    #[test]
    fn test_key_is_deterministic() {
        let cluster = ObjectKey::new("ns", "c");
        let first = service_set_object_key("sys", Some(&cluster), "policy");
        let second = service_set_object_key("sys", Some(&cluster), "policy");
        let other = service_set_object_key("sys", Some(&cluster), "other-policy");

        assert_eq!(first, second);
        assert_ne!(first, other);
    }

    #[test]
    fn test_known_digest() {
        // sha256("") starts with e3b0c442
        let key = service_set_object_key("sys", None, "");
        assert_eq!(key.name, "management-e3b0c442");
        assert_eq!(key.to_string(), "sys/management-e3b0c442");
    }
}
