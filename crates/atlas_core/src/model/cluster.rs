//! Constellation (cluster) model and membership signature.
//!
//! # Responsibility
//! - Define persisted cluster records and their canonical signature.
//!
//! # Invariants
//! - A persisted cluster always has at least `MIN_CLUSTER_MEMBERS` members.
//! - `ClusterSignature` is independent of member discovery order.

use super::star::StarId;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Smallest member count for a cluster to exist.
pub const MIN_CLUSTER_MEMBERS: usize = 2;
/// Separator used when joining sorted member ids into a signature.
pub const SIGNATURE_SEPARATOR: &str = "|";

/// Named, connected group of stars.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cluster {
    pub id: String,
    #[serde(alias = "starIds")]
    pub member_ids: Vec<StarId>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
}

impl Cluster {
    /// Creates an unnamed cluster with a freshly generated id.
    pub fn new(member_ids: Vec<StarId>) -> Self {
        Self::with_id(generate_cluster_id(), member_ids)
    }

    pub fn with_id(id: impl Into<String>, member_ids: Vec<StarId>) -> Self {
        Self {
            id: id.into(),
            member_ids,
            name: None,
            summary: None,
        }
    }

    /// Returns whether the cluster satisfies the minimum member rule.
    pub fn is_viable(&self) -> bool {
        self.member_ids.len() >= MIN_CLUSTER_MEMBERS
    }

    pub fn contains(&self, star_id: &str) -> bool {
        self.member_ids.iter().any(|id| id == star_id)
    }

    /// Removes `star_id` from the member list. Returns whether it was present.
    pub fn remove_member(&mut self, star_id: &str) -> bool {
        let before = self.member_ids.len();
        self.member_ids.retain(|id| id != star_id);
        self.member_ids.len() != before
    }

    /// Copies `identity` onto the cluster.
    pub fn apply_identity(&mut self, identity: &ClusterIdentity) {
        self.name = Some(identity.name.clone());
        self.summary = Some(identity.summary.clone());
    }

    /// Recomputes the signature from the current member list.
    pub fn signature(&self) -> ClusterSignature {
        ClusterSignature::from_member_ids(&self.member_ids)
    }
}

/// Canonical cache key for a member-id set.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClusterSignature(String);

impl ClusterSignature {
    /// Sorts and deduplicates member ids, then joins them with `|`.
    pub fn from_member_ids<S: AsRef<str>>(member_ids: &[S]) -> Self {
        let mut ids = member_ids.iter().map(AsRef::as_ref).collect::<Vec<_>>();
        ids.sort_unstable();
        ids.dedup();
        Self(ids.join(SIGNATURE_SEPARATOR))
    }

    /// Wraps an already-canonical signature string (e.g. read from storage).
    pub fn from_raw(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for ClusterSignature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Display name and one-sentence summary of a constellation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterIdentity {
    pub name: String,
    pub summary: String,
}

impl ClusterIdentity {
    pub fn new(name: impl Into<String>, summary: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
        }
    }

    /// Returns whether both fields carry non-blank text.
    pub fn is_complete(&self) -> bool {
        !self.name.trim().is_empty() && !self.summary.trim().is_empty()
    }
}

/// Returns a new, never-reused cluster id.
pub fn generate_cluster_id() -> String {
    format!("const-{}", Uuid::new_v4())
}

#[cfg(test)]
mod tests {
    use super::{Cluster, ClusterSignature};

    #[test]
    fn signature_is_order_independent() {
        assert_eq!(
            ClusterSignature::from_member_ids(&["b", "a"]),
            ClusterSignature::from_member_ids(&["a", "b"])
        );
        assert_eq!(ClusterSignature::from_member_ids(&["b", "a"]).as_str(), "a|b");
    }

    #[test]
    fn legacy_star_ids_field_is_accepted() {
        let cluster: Cluster = serde_json::from_value(serde_json::json!({
            "id": "const-0",
            "name": "Quiet mornings",
            "summary": "Days that started slowly.",
            "starIds": ["star-2024-01-01", "star-2024-01-02"]
        }))
        .unwrap();
        assert_eq!(cluster.member_ids.len(), 2);
        assert!(cluster.is_viable());

        let json = serde_json::to_value(&cluster).unwrap();
        assert!(json.get("memberIds").is_some());
    }

    #[test]
    fn generated_ids_are_unique() {
        assert_ne!(Cluster::new(vec![]).id, Cluster::new(vec![]).id);
    }
}
