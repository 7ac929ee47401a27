//! Signature-keyed side table of constellation names.
//!
//! # Invariants
//! - Keys are canonical `ClusterSignature`s; member order never matters.
//! - Only complete identities (non-blank name and summary) are stored.
//! - Entries never expire.

use crate::model::cluster::{ClusterIdentity, ClusterSignature};
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Wire shape of one persisted cache entry.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct CacheEntry {
    name: String,
    summary: String,
    #[serde(default)]
    star_ids: Vec<String>,
}

/// In-memory identity cache.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterIdentityCache {
    entries: BTreeMap<ClusterSignature, ClusterIdentity>,
}

impl ClusterIdentityCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, signature: &ClusterSignature) -> Option<&ClusterIdentity> {
        self.entries.get(signature)
    }

    /// Looks up by member ids in any order.
    pub fn get_for_members<S: AsRef<str>>(&self, member_ids: &[S]) -> Option<&ClusterIdentity> {
        self.get(&ClusterSignature::from_member_ids(member_ids))
    }

    /// Stores `identity`. Incomplete identities are ignored; returns whether
    /// the entry was written.
    pub fn set(&mut self, signature: ClusterSignature, identity: ClusterIdentity) -> bool {
        if !identity.is_complete() {
            return false;
        }
        self.entries.insert(signature, identity);
        true
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&ClusterSignature, &ClusterIdentity)> {
        self.entries.iter()
    }

    /// Parses the persisted `{ signature: { name, summary, starIds } }` map.
    ///
    /// A corrupt document yields an empty cache; malformed or incomplete
    /// entries are skipped. Both cases are logged at `warn`.
    pub fn from_json_lenient(json: &str) -> Self {
        let mut cache = Self::new();
        let root = match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!("event=identity_cache_load module=store status=error reason=corrupt_document");
                return cache;
            }
        };

        let mut skipped = 0usize;
        for (signature, raw) in root {
            match serde_json::from_value::<CacheEntry>(raw) {
                Ok(entry) => {
                    let identity = ClusterIdentity::new(entry.name, entry.summary);
                    if !cache.set(ClusterSignature::from_raw(signature), identity) {
                        skipped += 1;
                    }
                }
                Err(_) => skipped += 1,
            }
        }
        if skipped > 0 {
            warn!(
                "event=identity_cache_load module=store status=ok skipped={} loaded={}",
                skipped,
                cache.len()
            );
        }
        cache
    }

    /// Serializes to the persisted map shape.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let map = self
            .entries
            .iter()
            .map(|(signature, identity)| {
                let entry = CacheEntry {
                    name: identity.name.clone(),
                    summary: identity.summary.clone(),
                    star_ids: split_signature(signature),
                };
                (signature.as_str().to_string(), entry)
            })
            .collect::<BTreeMap<_, _>>();
        serde_json::to_string(&map)
    }
}

/// Member ids encoded in a signature.
pub fn split_signature(signature: &ClusterSignature) -> Vec<String> {
    signature
        .as_str()
        .split(crate::model::cluster::SIGNATURE_SEPARATOR)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}
