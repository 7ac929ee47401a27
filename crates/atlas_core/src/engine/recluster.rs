//! Full recluster pass over an atlas store.
//!
//! # Responsibility
//! - Re-derive clusters and derived edges from the current star set.
//! - Keep cluster ids stable across passes while a cluster persists.
//! - Name new member sets through the cache, then the namer.
//!
//! # Invariants
//! - Supplied edges are never removed by a pass.
//! - A cluster whose member set did not change keeps its stored identity.
//! - A naming failure keeps the claimed cluster's identity, or yields an
//!   uncached placeholder for a new one.
//! - Stars rejected by the filter keep their previous clusters and gain no
//!   new edges or memberships.

use super::clusterer::{cluster, floating_ids, is_constellation};
use super::connections::{build_connections, extend_unique, link_shared_keywords};
use super::filter::{is_accessible, StarFilter};
use super::naming::{
    is_placeholder, placeholder_identity, sanitize_identity, ConstellationNamer, NamingRequest,
};
use crate::config::ClusterConfig;
use crate::model::cluster::{generate_cluster_id, Cluster, ClusterIdentity, ClusterSignature};
use crate::model::connection::ConnectionOrigin;
use crate::store::atlas_store::AtlasStore;
use crate::store::identity_cache::ClusterIdentityCache;
use log::{debug, info, warn};
use std::collections::HashSet;
use std::time::Instant;

/// Counters describing one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReclusterReport {
    pub clusters: usize,
    pub floating: usize,
    pub derived_edges: usize,
    pub cache_hits: usize,
    /// Clusters whose members did not change and kept their stored identity.
    pub identities_kept: usize,
    pub namer_calls: usize,
    pub naming_failures: usize,
}

struct GroupPlan {
    member_ids: Vec<String>,
    dates: Vec<String>,
    keywords: Vec<String>,
}

/// Recomputes clusters, derived edges and identities for accessible stars.
pub fn recluster(
    store: &mut AtlasStore,
    cache: &mut ClusterIdentityCache,
    namer: &dyn ConstellationNamer,
    config: &ClusterConfig,
    filter: Option<&dyn StarFilter>,
) -> ReclusterReport {
    let started_at = Instant::now();
    let mut report = ReclusterReport::default();

    let (plans, derived, accessible) = {
        let groups = cluster(store.stars(), config.threshold, filter);
        report.floating = floating_ids(&groups).len();

        let mut derived = build_connections(&groups, config.fan_out);
        if config.link_shared_keywords {
            extend_unique(&mut derived, link_shared_keywords(store.stars(), filter));
        }
        let plans = groups
            .iter()
            .filter(|group| is_constellation(group))
            .map(|group| GroupPlan {
                member_ids: group.iter().map(|star| star.id.clone()).collect(),
                dates: group.iter().map(|star| star.date.clone()).collect(),
                keywords: group.iter().flat_map(|star| star.keywords.clone()).collect(),
            })
            .collect::<Vec<_>>();
        let accessible = store
            .stars()
            .iter()
            .filter(|star| is_accessible(filter, star))
            .map(|star| star.id.clone())
            .collect::<HashSet<_>>();
        (plans, derived, accessible)
    };

    store.retain_connections(|edge| {
        edge.origin != ConnectionOrigin::Derived
            || !(accessible.contains(&edge.from) || accessible.contains(&edge.to))
    });
    report.derived_edges = store.add_connections(derived);

    let previous = store.clusters().to_vec();
    let mut claimed = vec![false; previous.len()];
    let mut next = Vec::with_capacity(plans.len() + previous.len());

    for (index, plan) in plans.into_iter().enumerate() {
        let plan_signature = ClusterSignature::from_member_ids(&plan.member_ids);
        let claim = claim_previous(&previous, &mut claimed, &plan.member_ids, &plan_signature);
        let prior = claim.map(|claimed_index| &previous[claimed_index]);

        let mut member_ids = plan.member_ids.clone();
        if let Some(prior) = prior {
            // Hidden members were not re-evaluated; they stay where they were.
            member_ids.extend(
                prior
                    .member_ids
                    .iter()
                    .filter(|id| !accessible.contains(*id))
                    .cloned(),
            );
            member_ids.sort();
            member_ids.dedup();
        }
        let signature = ClusterSignature::from_member_ids(&member_ids);
        let id = prior.map_or_else(generate_cluster_id, |prior| prior.id.clone());
        let mut cluster = Cluster::with_id(id, member_ids);
        let prior_identity = prior.and_then(identity_of);
        let unchanged = prior.is_some_and(|prior| prior.signature() == signature);

        if let Some(identity) = cache.get(&signature) {
            report.cache_hits += 1;
            cluster.apply_identity(identity);
            debug!(
                "event=cluster_naming module=engine status=skip reason=cache_hit members={}",
                cluster.member_ids.len()
            );
        } else if let Some(identity) = prior_identity.clone().filter(|_| unchanged) {
            report.identities_kept += 1;
            cluster.apply_identity(&identity);
            cache.set(signature, identity);
            debug!(
                "event=cluster_naming module=engine status=skip reason=unchanged_members members={}",
                cluster.member_ids.len()
            );
        } else {
            report.namer_calls += 1;
            let request = NamingRequest {
                signature: signature.clone(),
                ordinal: index + 1,
                dates: plan.dates,
                keywords: plan.keywords,
            };
            match namer.name_constellation(&request).and_then(sanitize_identity) {
                Ok(identity) => {
                    cluster.apply_identity(&identity);
                    cache.set(signature, identity);
                    debug!(
                        "event=cluster_naming module=engine status=ok members={}",
                        cluster.member_ids.len()
                    );
                }
                Err(err) => {
                    report.naming_failures += 1;
                    let kept_previous = prior_identity.is_some();
                    let fallback = prior_identity.unwrap_or_else(|| placeholder_identity(index + 1));
                    cluster.apply_identity(&fallback);
                    warn!(
                        "event=cluster_naming module=engine status=error members={} kept_previous={} error={}",
                        cluster.member_ids.len(),
                        kept_previous,
                        err
                    );
                }
            }
        }
        next.push(cluster);
    }

    // Clusters made only of filtered-out stars were not part of this pass.
    for (cluster, was_claimed) in previous.into_iter().zip(claimed) {
        if !was_claimed && cluster.member_ids.iter().all(|id| !accessible.contains(id)) {
            next.push(cluster);
        }
    }

    store.install_clusters(next);
    report.clusters = store.clusters().len();
    store.mark_clean();

    info!(
        "event=atlas_recluster module=engine status=ok stars={} clusters={} floating={} derived_edges={} cache_hits={} identities_kept={} namer_calls={} naming_failures={} duration_ms={}",
        accessible.len(),
        report.clusters,
        report.floating,
        report.derived_edges,
        report.cache_hits,
        report.identities_kept,
        report.namer_calls,
        report.naming_failures,
        started_at.elapsed().as_millis()
    );
    report
}

/// Picks the unclaimed previous cluster with the same signature, or failing
/// that the one sharing the most members. Returns its index.
fn claim_previous(
    previous: &[Cluster],
    claimed: &mut [bool],
    member_ids: &[String],
    signature: &ClusterSignature,
) -> Option<usize> {
    let exact = previous
        .iter()
        .enumerate()
        .find(|(index, cluster)| !claimed[*index] && cluster.signature() == *signature)
        .map(|(index, _)| index);

    let chosen = exact.or_else(|| {
        previous
            .iter()
            .enumerate()
            .filter(|(index, _)| !claimed[*index])
            .map(|(index, cluster)| {
                let overlap = member_ids.iter().filter(|id| cluster.contains(id)).count();
                (index, overlap)
            })
            .filter(|(_, overlap)| *overlap > 0)
            .max_by(|a, b| a.1.cmp(&b.1).then_with(|| b.0.cmp(&a.0)))
            .map(|(index, _)| index)
    })?;

    claimed[chosen] = true;
    Some(chosen)
}

/// Complete identity a cluster already carries, if any.
// Stored identity worth keeping: complete and not a placeholder.
fn identity_of(cluster: &Cluster) -> Option<ClusterIdentity> {
    let identity = ClusterIdentity::new(cluster.name.clone()?, cluster.summary.clone()?);
    (identity.is_complete() && !is_placeholder(&identity)).then_some(identity)
}

#[cfg(test)]
mod tests {
    use super::recluster;
    use crate::config::ClusterConfig;
    use crate::engine::naming::{ConstellationNamer, NamingError, NamingRequest, OfflineNamer};
    use crate::engine::projector::Projector;
    use crate::model::cluster::{Cluster, ClusterIdentity, ClusterSignature};
    use crate::model::connection::{Connection, ConnectionOrigin};
    use crate::model::star::{Point, Star};
    use crate::store::atlas_store::{AtlasStore, MergeRequest};
    use crate::store::identity_cache::ClusterIdentityCache;
    use std::cell::Cell;

    struct CountingNamer {
        calls: Cell<usize>,
    }

    impl ConstellationNamer for CountingNamer {
        fn name_constellation(&self, request: &NamingRequest) -> Result<ClusterIdentity, NamingError> {
            self.calls.set(self.calls.get() + 1);
            Ok(ClusterIdentity::new(
                format!("Named {}", request.dates.len()),
                "A run of similar days.",
            ))
        }
    }

    fn store_with(points: &[(&str, f64, f64)]) -> AtlasStore {
        let mut store = AtlasStore::new();
        for (date, x, y) in points {
            store
                .merge(MergeRequest::new(*date, Point::new(*x, *y)), &Projector::default())
                .unwrap();
        }
        store
    }

    #[test]
    fn pass_builds_clusters_edges_and_floating() {
        let mut store = store_with(&[
            ("2024-01-01", 30.0, 30.0),
            ("2024-01-02", 40.0, 35.0),
            ("2024-01-10", 85.0, 85.0),
        ]);
        let mut cache = ClusterIdentityCache::new();
        let report = recluster(&mut store, &mut cache, &OfflineNamer, &ClusterConfig::default(), None);

        assert_eq!(report.clusters, 1);
        assert_eq!(report.floating, 1);
        assert_eq!(report.derived_edges, 1);
        assert_eq!(report.naming_failures, 1);
        assert_eq!(store.clusters()[0].name.as_deref(), Some("Constellation 1"));
        assert!(cache.is_empty());
        assert!(!store.is_dirty());
        assert_eq!(store.floating_star_ids(None), vec!["star-2024-01-10"]);
    }

    #[test]
    fn placeholder_names_are_retried_on_the_next_pass() {
        let mut store = store_with(&[("2024-01-01", 30.0, 30.0), ("2024-01-02", 40.0, 35.0)]);
        let mut cache = ClusterIdentityCache::new();
        let config = ClusterConfig::default();
        recluster(&mut store, &mut cache, &OfflineNamer, &config, None);

        let namer = CountingNamer { calls: Cell::new(0) };
        let report = recluster(&mut store, &mut cache, &namer, &config, None);

        assert_eq!(report.identities_kept, 0);
        assert_eq!(namer.calls.get(), 1);
        assert_eq!(store.clusters()[0].name.as_deref(), Some("Named 2"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn cache_hit_short_circuits_namer_and_ids_stay_stable() {
        let mut store = store_with(&[("2024-01-01", 30.0, 30.0), ("2024-01-02", 40.0, 35.0)]);
        let mut cache = ClusterIdentityCache::new();
        let namer = CountingNamer { calls: Cell::new(0) };
        let config = ClusterConfig::default();

        recluster(&mut store, &mut cache, &namer, &config, None);
        let first_id = store.clusters()[0].id.clone();
        let second = recluster(&mut store, &mut cache, &namer, &config, None);

        assert_eq!(namer.calls.get(), 1);
        assert_eq!(second.cache_hits, 1);
        assert_eq!(store.clusters()[0].id, first_id);
        assert_eq!(store.clusters()[0].name.as_deref(), Some("Named 2"));
        assert!(cache
            .get(&ClusterSignature::from_member_ids(&["star-2024-01-01", "star-2024-01-02"]))
            .is_some());
    }

    #[test]
    fn growing_cluster_keeps_its_id() {
        let mut store = store_with(&[("2024-01-01", 30.0, 30.0), ("2024-01-02", 40.0, 35.0)]);
        let mut cache = ClusterIdentityCache::new();
        let config = ClusterConfig::default();
        recluster(&mut store, &mut cache, &OfflineNamer, &config, None);
        let id = store.clusters()[0].id.clone();

        store
            .merge(MergeRequest::new("2024-01-03", Point::new(35.0, 40.0)), &Projector::default())
            .unwrap();
        recluster(&mut store, &mut cache, &OfflineNamer, &config, None);
        assert_eq!(store.clusters()[0].id, id);
        assert_eq!(store.clusters()[0].member_ids.len(), 3);
    }

    #[test]
    fn supplied_edges_survive_and_derived_edges_refresh() {
        let mut store = store_with(&[("2024-01-01", 30.0, 30.0), ("2024-01-10", 85.0, 85.0)]);
        store.add_connections(vec![Connection::supplied("star-2024-01-01", "star-2024-01-10")]);
        let mut cache = ClusterIdentityCache::new();
        let config = ClusterConfig::default();
        recluster(&mut store, &mut cache, &OfflineNamer, &config, None);
        recluster(&mut store, &mut cache, &OfflineNamer, &config, None);

        assert_eq!(store.connections().len(), 1);
        assert_eq!(store.connections()[0].origin, ConnectionOrigin::Supplied);
    }

    #[test]
    fn supplied_link_over_a_derived_edge_outlives_the_cluster() {
        let mut store = store_with(&[("2024-01-01", 30.0, 30.0), ("2024-01-02", 40.0, 35.0)]);
        let mut cache = ClusterIdentityCache::new();
        let config = ClusterConfig::default();
        recluster(&mut store, &mut cache, &OfflineNamer, &config, None);
        assert_eq!(store.connections()[0].origin, ConnectionOrigin::Derived);

        let mut request = MergeRequest::new("2024-01-02", Point::new(40.0, 35.0));
        request.connections = vec![Connection::supplied("star-2024-01-02", "star-2024-01-01")];
        let outcome = store.merge(request, &Projector::default()).unwrap();
        assert_eq!(outcome.connections_added, 1);

        store
            .merge(MergeRequest::new("2024-01-02", Point::new(85.0, 85.0)), &Projector::default())
            .unwrap();
        let report = recluster(&mut store, &mut cache, &OfflineNamer, &config, None);

        assert_eq!(report.clusters, 0);
        assert_eq!(store.connections().len(), 1);
        assert_eq!(store.connections()[0].origin, ConnectionOrigin::Supplied);
    }

    #[test]
    fn filtered_stars_get_no_edges_or_membership() {
        let mut store = store_with(&[
            ("2024-01-01", 30.0, 30.0),
            ("2024-01-02", 32.0, 30.0),
            ("2024-01-03", 34.0, 30.0),
        ]);
        let mut cache = ClusterIdentityCache::new();
        let hide = |s: &Star| s.date != "2024-01-02";
        recluster(&mut store, &mut cache, &OfflineNamer, &ClusterConfig::default(), Some(&hide));

        assert!(store.connections().iter().all(|e| !e.touches("star-2024-01-02")));
        assert!(store.cluster_of("star-2024-01-02").is_none());
        assert!(store.cluster_of("star-2024-01-01").is_some());
    }

    fn named(id: &str, members: &[&str], name: &str) -> Cluster {
        let mut cluster = Cluster::with_id(id, members.iter().map(|m| m.to_string()).collect());
        cluster.apply_identity(&ClusterIdentity::new(name, "Days that rhyme."));
        cluster
    }

    #[test]
    fn unchanged_members_keep_their_stored_name_without_a_namer() {
        let mut store = store_with(&[("2024-01-01", 30.0, 30.0), ("2024-01-02", 40.0, 35.0)]);
        store.install_clusters(vec![named(
            "const-0",
            &["star-2024-01-02", "star-2024-01-01"],
            "Quiet mornings",
        )]);
        let mut cache = ClusterIdentityCache::new();

        let report = recluster(&mut store, &mut cache, &OfflineNamer, &ClusterConfig::default(), None);

        assert_eq!(report.identities_kept, 1);
        assert_eq!(report.naming_failures, 0);
        assert_eq!(store.clusters()[0].id, "const-0");
        assert_eq!(store.clusters()[0].name.as_deref(), Some("Quiet mornings"));
        assert_eq!(
            cache
                .get(&ClusterSignature::from_member_ids(&["star-2024-01-01", "star-2024-01-02"]))
                .map(|identity| identity.name.as_str()),
            Some("Quiet mornings")
        );
    }

    #[test]
    fn failed_naming_of_a_grown_cluster_keeps_its_previous_name() {
        let mut store = store_with(&[
            ("2024-01-01", 30.0, 30.0),
            ("2024-01-02", 40.0, 35.0),
            ("2024-01-03", 35.0, 40.0),
        ]);
        store.install_clusters(vec![named(
            "const-0",
            &["star-2024-01-01", "star-2024-01-02"],
            "Quiet mornings",
        )]);
        let mut cache = ClusterIdentityCache::new();

        let report = recluster(&mut store, &mut cache, &OfflineNamer, &ClusterConfig::default(), None);

        assert_eq!(report.naming_failures, 1);
        assert_eq!(store.clusters()[0].member_ids.len(), 3);
        assert_eq!(store.clusters()[0].name.as_deref(), Some("Quiet mornings"));
        assert!(cache.is_empty());
    }

    #[test]
    fn hidden_members_stay_in_their_cluster_during_a_filtered_pass() {
        let mut store = store_with(&[
            ("2024-01-01", 30.0, 30.0),
            ("2024-01-02", 32.0, 30.0),
            ("2024-01-03", 34.0, 30.0),
        ]);
        store.install_clusters(vec![named(
            "const-0",
            &["star-2024-01-01", "star-2024-01-02", "star-2024-01-03"],
            "Quiet mornings",
        )]);
        let mut cache = ClusterIdentityCache::new();
        let hide_first = |s: &Star| s.date != "2024-01-01";

        let report = recluster(
            &mut store,
            &mut cache,
            &OfflineNamer,
            &ClusterConfig::default(),
            Some(&hide_first),
        );

        assert_eq!(report.identities_kept, 1);
        assert_eq!(store.clusters().len(), 1);
        assert_eq!(
            store.clusters()[0].member_ids,
            vec!["star-2024-01-01", "star-2024-01-02", "star-2024-01-03"]
        );
        assert!(store.connections().iter().all(|e| !e.touches("star-2024-01-01")));
    }
}
