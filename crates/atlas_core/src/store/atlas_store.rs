//! Persisted atlas graph and its incremental mutations.
//!
//! # Responsibility
//! - Own stars, connections and clusters for one user.
//! - Apply Merge/Delete without recomputing clusters.
//! - Load persisted JSON leniently into strict structs.
//!
//! # Invariants
//! - Star ids are unique and equal `star-<date>`.
//! - Every connection references two distinct, present stars; at most one
//!   connection per unordered pair.
//! - Every cluster has at least two members, all present stars.

use crate::engine::connections::extend_unique;
use crate::engine::filter::{is_accessible, StarFilter};
use crate::engine::layout::LayoutPoint;
use crate::engine::projector::Projector;
use crate::model::cluster::{generate_cluster_id, Cluster};
use crate::model::connection::{Connection, ConnectionOrigin};
use crate::model::star::{
    normalize_date_key, star_id_for_date, Point, Star, StarValidationError,
};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Store-level validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AtlasError {
    Validation(StarValidationError),
}

impl Display for AtlasError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
        }
    }
}

impl Error for AtlasError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
        }
    }
}

impl From<StarValidationError> for AtlasError {
    fn from(value: StarValidationError) -> Self {
        Self::Validation(value)
    }
}

pub type AtlasResult<T> = Result<T, AtlasError>;

/// Serializable `{ stars, connections, clusters }` document.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtlasSnapshot {
    #[serde(default)]
    pub stars: Vec<Star>,
    #[serde(default)]
    pub connections: Vec<Connection>,
    #[serde(default)]
    pub clusters: Vec<Cluster>,
}

/// One day's upsert request.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeRequest {
    pub date: String,
    pub position: Point,
    /// Explicit size; when absent the size is derived from content length.
    pub size: Option<f64>,
    pub keywords: Vec<String>,
    /// Edges supplied by a collaborator; stored with `Supplied` origin.
    pub connections: Vec<Connection>,
    pub content_length: Option<usize>,
}

impl MergeRequest {
    pub fn new(date: impl Into<String>, position: Point) -> Self {
        Self {
            date: date.into(),
            position,
            size: None,
            keywords: Vec::new(),
            connections: Vec::new(),
            content_length: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeOutcome {
    pub star_id: String,
    /// `true` when the star did not exist before.
    pub created: bool,
    pub connections_added: usize,
    /// Self-loops, dangling ids and duplicates.
    pub connections_skipped: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeleteOutcome {
    pub removed: bool,
    pub connections_removed: usize,
    pub clusters_dissolved: Vec<String>,
}

/// In-memory atlas for one user.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AtlasStore {
    stars: Vec<Star>,
    connections: Vec<Connection>,
    clusters: Vec<Cluster>,
    dirty: bool,
}

impl AtlasStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from a snapshot, enforcing structural invariants.
    ///
    /// Duplicate stars keep their first occurrence; invalid edges and
    /// clusters are dropped.
    pub fn from_snapshot(snapshot: AtlasSnapshot) -> Self {
        let mut store = Self::new();
        let mut seen = HashSet::new();
        for mut star in snapshot.stars {
            star.id = star_id_for_date(&star.date);
            if seen.insert(star.id.clone()) {
                store.stars.push(star);
            }
        }
        store.add_connections(snapshot.connections);
        store.install_clusters(snapshot.clusters);
        store.dirty = false;
        store
    }

    /// Parses persisted JSON, skipping malformed entries.
    ///
    /// Corrupt documents yield an empty store. Positions and sizes are
    /// pulled into range with `projector`. Clusters may also appear under
    /// the legacy `constellations` key.
    pub fn from_json_lenient(json: &str, projector: &Projector) -> Self {
        let root = match serde_json::from_str::<Value>(json) {
            Ok(Value::Object(map)) => map,
            Ok(_) | Err(_) => {
                warn!("event=atlas_load module=store status=error reason=corrupt_document");
                return Self::new();
            }
        };

        let mut skipped = 0usize;
        let stars: Vec<Star> = entries(&root, &["stars"])
            .filter_map(|raw| {
                let star = lenient_star(raw, projector);
                if star.is_none() {
                    skipped += 1;
                }
                star
            })
            .collect();
        let connections: Vec<Connection> = entries(&root, &["connections"])
            .filter_map(|raw| {
                let parsed = serde_json::from_value::<Connection>(raw.clone()).ok();
                if parsed.is_none() {
                    skipped += 1;
                }
                parsed
            })
            .collect();
        let clusters: Vec<Cluster> = entries(&root, &["clusters", "constellations"])
            .filter_map(|raw| {
                let parsed = serde_json::from_value::<Cluster>(raw.clone()).ok();
                if parsed.is_none() {
                    skipped += 1;
                }
                parsed
            })
            .collect();

        if skipped > 0 {
            warn!(
                "event=atlas_load module=store status=ok skipped_entries={}",
                skipped
            );
        }
        Self::from_snapshot(AtlasSnapshot {
            stars,
            connections,
            clusters,
        })
    }

    pub fn to_snapshot(&self) -> AtlasSnapshot {
        AtlasSnapshot {
            stars: self.stars.clone(),
            connections: self.connections.clone(),
            clusters: self.clusters.clone(),
        }
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.to_snapshot())
    }

    pub fn stars(&self) -> &[Star] {
        &self.stars
    }

    pub fn connections(&self) -> &[Connection] {
        &self.connections
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    pub fn star(&self, star_id: &str) -> Option<&Star> {
        self.stars.iter().find(|star| star.id == star_id)
    }

    pub fn contains_star(&self, star_id: &str) -> bool {
        self.star(star_id).is_some()
    }

    pub fn cluster_of(&self, star_id: &str) -> Option<&Cluster> {
        self.clusters.iter().find(|cluster| cluster.contains(star_id))
    }

    /// Returns whether data changed since the last recluster or load.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Upserts one day's star and its supplied connections.
    ///
    /// Does not recompute clusters; marks the store dirty instead.
    ///
    /// # Errors
    /// - `Validation` when the date is not `YYYY-MM-DD`.
    pub fn merge(&mut self, request: MergeRequest, projector: &Projector) -> AtlasResult<MergeOutcome> {
        let date = normalize_date_key(&request.date)?;
        let star_id = star_id_for_date(&date);
        let position = projector.clamp_point(request.position);
        let size = match request.size {
            Some(size) => projector.clamp_size(size),
            None => projector.merge_size(request.content_length),
        };

        let created = match self.stars.iter_mut().find(|star| star.id == star_id) {
            Some(star) => {
                star.position = position;
                star.size = size;
                star.keywords = request.keywords;
                false
            }
            None => {
                self.stars.push(Star {
                    id: star_id.clone(),
                    date,
                    position,
                    size,
                    keywords: request.keywords,
                });
                true
            }
        };

        let offered = request.connections.len();
        let supplied = request
            .connections
            .into_iter()
            .map(|edge| Connection::new(edge.from, edge.to, ConnectionOrigin::Supplied))
            .collect();
        let connections_added = self.add_connections(supplied);
        self.dirty = true;

        debug!(
            "event=atlas_merge module=store status=ok star_id={} created={} connections_added={} connections_skipped={}",
            star_id,
            created,
            connections_added,
            offered - connections_added
        );
        Ok(MergeOutcome {
            star_id,
            created,
            connections_added,
            connections_skipped: offered - connections_added,
        })
    }

    /// Removes a star, its edges and its cluster memberships.
    ///
    /// Clusters left with fewer than two members dissolve. Unknown ids are a
    /// no-op and leave the dirty flag untouched.
    pub fn delete(&mut self, star_id: &str) -> DeleteOutcome {
        let before = self.stars.len();
        self.stars.retain(|star| star.id != star_id);
        if self.stars.len() == before {
            debug!("event=atlas_delete module=store status=skip reason=unknown_star");
            return DeleteOutcome::default();
        }

        let edges_before = self.connections.len();
        self.connections.retain(|edge| !edge.touches(star_id));
        let connections_removed = edges_before - self.connections.len();

        let mut clusters_dissolved = Vec::new();
        self.clusters.retain_mut(|cluster| {
            cluster.remove_member(star_id);
            if cluster.is_viable() {
                true
            } else {
                clusters_dissolved.push(cluster.id.clone());
                false
            }
        });
        self.dirty = true;

        info!(
            "event=atlas_delete module=store status=ok star_id={} connections_removed={} clusters_dissolved={}",
            star_id,
            connections_removed,
            clusters_dissolved.len()
        );
        DeleteOutcome {
            removed: true,
            connections_removed,
            clusters_dissolved,
        }
    }

    /// Deletes the star for `date`.
    pub fn delete_date(&mut self, date: &str) -> AtlasResult<DeleteOutcome> {
        let date = normalize_date_key(date)?;
        Ok(self.delete(&star_id_for_date(&date)))
    }

    /// Adds edges whose endpoints exist and whose key is new. Returns the
    /// number added.
    ///
    /// A supplied edge whose key is held by a derived edge takes that edge
    /// over as supplied and counts as added.
    pub fn add_connections(&mut self, incoming: Vec<Connection>) -> usize {
        let mut fresh = Vec::with_capacity(incoming.len());
        let mut upgraded = 0;
        for edge in incoming {
            if !(self.contains_star(&edge.from) && self.contains_star(&edge.to)) {
                continue;
            }
            let key = edge.key();
            match self.connections.iter_mut().find(|existing| existing.key() == key) {
                Some(existing)
                    if edge.origin == ConnectionOrigin::Supplied
                        && existing.origin == ConnectionOrigin::Derived =>
                {
                    existing.origin = ConnectionOrigin::Supplied;
                    upgraded += 1;
                }
                _ => fresh.push(edge),
            }
        }
        upgraded + extend_unique(&mut self.connections, fresh)
    }

    /// Keeps only edges matching `keep`. Returns the number removed.
    pub fn retain_connections<F>(&mut self, keep: F) -> usize
    where
        F: FnMut(&Connection) -> bool,
    {
        let before = self.connections.len();
        self.connections.retain(keep);
        before - self.connections.len()
    }

    /// Replaces the cluster list.
    ///
    /// Unknown members and repeated memberships are dropped, then clusters
    /// below two members are discarded. A cluster repeating an earlier id
    /// gets a fresh one.
    pub fn install_clusters(&mut self, clusters: Vec<Cluster>) {
        let mut claimed = HashSet::new();
        let mut ids = HashSet::new();
        let mut installed = Vec::with_capacity(clusters.len());
        for mut cluster in clusters {
            cluster
                .member_ids
                .retain(|id| self.contains_star(id) && claimed.insert(id.clone()));
            if !cluster.is_viable() {
                continue;
            }
            if !ids.insert(cluster.id.clone()) {
                let fresh = generate_cluster_id();
                warn!(
                    "event=atlas_install_clusters module=store status=degraded reason=duplicate_cluster_id"
                );
                ids.insert(fresh.clone());
                cluster.id = fresh;
            }
            installed.push(cluster);
        }
        self.clusters = installed;
    }

    /// Stars admitted by `filter`.
    pub fn visible_stars(&self, filter: Option<&dyn StarFilter>) -> Vec<&Star> {
        self.stars
            .iter()
            .filter(|star| is_accessible(filter, star))
            .collect()
    }

    /// Edges whose endpoints are both admitted by `filter`.
    pub fn visible_connections(&self, filter: Option<&dyn StarFilter>) -> Vec<&Connection> {
        let visible = self
            .visible_stars(filter)
            .into_iter()
            .map(|star| star.id.as_str())
            .collect::<HashSet<_>>();
        self.connections
            .iter()
            .filter(|edge| visible.contains(edge.from.as_str()) && visible.contains(edge.to.as_str()))
            .collect()
    }

    /// Visible stars that belong to no cluster.
    pub fn floating_star_ids(&self, filter: Option<&dyn StarFilter>) -> Vec<&str> {
        self.visible_stars(filter)
            .into_iter()
            .filter(|star| self.cluster_of(&star.id).is_none())
            .map(|star| star.id.as_str())
            .collect()
    }

    /// Stored positions of visible stars, ready for layout.
    pub fn layout_points(&self, filter: Option<&dyn StarFilter>) -> Vec<LayoutPoint> {
        self.visible_stars(filter)
            .into_iter()
            .map(|star| LayoutPoint::new(star.id.clone(), star.position.x, star.position.y))
            .collect()
    }
}

fn entries<'a>(
    root: &'a serde_json::Map<String, Value>,
    keys: &'a [&'a str],
) -> impl Iterator<Item = &'a Value> + 'a {
    keys.iter()
        .find_map(|key| root.get(*key).and_then(Value::as_array))
        .into_iter()
        .flatten()
}

fn lenient_star(raw: &Value, projector: &Projector) -> Option<Star> {
    let object = raw.as_object()?;
    let date = object
        .get("date")
        .and_then(Value::as_str)
        .and_then(|date| normalize_date_key(date).ok())?;
    let number = |key: &str| object.get(key).and_then(Value::as_f64).unwrap_or(f64::NAN);
    let keywords = object
        .get("keywords")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    Some(Star {
        id: star_id_for_date(&date),
        date,
        position: projector.clamp_point(Point::new(number("x"), number("y"))),
        size: projector.clamp_size(number("size")),
        keywords,
    })
}

#[cfg(test)]
mod tests {
    use super::{AtlasError, AtlasStore, MergeRequest};
    use crate::engine::projector::Projector;
    use crate::model::cluster::Cluster;
    use crate::model::connection::{Connection, ConnectionOrigin};
    use crate::model::star::Point;

    fn merge(store: &mut AtlasStore, date: &str, x: f64, y: f64) {
        store
            .merge(MergeRequest::new(date, Point::new(x, y)), &Projector::default())
            .unwrap();
    }

    #[test]
    fn merge_clamps_position_and_derives_size() {
        let mut store = AtlasStore::new();
        let mut request = MergeRequest::new(" 2024-02-05 ", Point::new(-20.0, f64::NAN));
        request.content_length = Some(400);
        let outcome = store.merge(request, &Projector::default()).unwrap();

        assert!(outcome.created);
        let star = store.star("star-2024-02-05").unwrap();
        assert_eq!(star.date, "2024-02-05");
        assert_eq!((star.position.x, star.position.y), (10.0, 50.0));
        assert_eq!(star.size, 6.0);
        assert!(store.is_dirty());
    }

    #[test]
    fn merge_rejects_invalid_dates() {
        let mut store = AtlasStore::new();
        let err = store
            .merge(MergeRequest::new("2024/02/05", Point::new(50.0, 50.0)), &Projector::default())
            .unwrap_err();
        assert!(matches!(err, AtlasError::Validation(_)));
        assert!(store.stars().is_empty());
    }

    #[test]
    fn supplied_connections_skip_self_loops_and_unknown_ids() {
        let mut store = AtlasStore::new();
        merge(&mut store, "2024-01-01", 30.0, 30.0);
        let mut request = MergeRequest::new("2024-01-02", Point::new(40.0, 40.0));
        request.connections = vec![
            Connection::derived("star-2024-01-02", "star-2024-01-01"),
            Connection::supplied("star-2024-01-02", "star-2024-01-02"),
            Connection::supplied("star-2024-01-02", "star-2099-01-01"),
            Connection::supplied("star-2024-01-01", "star-2024-01-02"),
        ];
        let outcome = store.merge(request, &Projector::default()).unwrap();

        assert_eq!(outcome.connections_added, 1);
        assert_eq!(outcome.connections_skipped, 3);
        assert_eq!(store.connections()[0].origin, ConnectionOrigin::Supplied);
    }

    #[test]
    fn delete_unknown_id_is_noop() {
        let mut store = AtlasStore::new();
        merge(&mut store, "2024-01-01", 30.0, 30.0);
        store.mark_clean();
        let outcome = store.delete("star-2030-01-01");
        assert!(!outcome.removed);
        assert!(!store.is_dirty());
        assert_eq!(store.stars().len(), 1);
    }

    #[test]
    fn install_drops_unknown_members_and_small_clusters() {
        let mut store = AtlasStore::new();
        merge(&mut store, "2024-01-01", 30.0, 30.0);
        merge(&mut store, "2024-01-02", 32.0, 30.0);
        store.install_clusters(vec![
            Cluster::with_id("keep", vec!["star-2024-01-01".into(), "star-2024-01-02".into()]),
            Cluster::with_id("ghost", vec!["star-2024-01-01".into(), "star-2099-01-01".into()]),
        ]);
        assert_eq!(store.clusters().len(), 1);
        assert_eq!(store.clusters()[0].id, "keep");
    }

    #[test]
    fn install_renames_repeated_cluster_ids() {
        let mut store = AtlasStore::new();
        merge(&mut store, "2024-01-01", 30.0, 30.0);
        merge(&mut store, "2024-01-02", 32.0, 30.0);
        merge(&mut store, "2024-01-03", 60.0, 30.0);
        merge(&mut store, "2024-01-04", 62.0, 30.0);
        store.install_clusters(vec![
            Cluster::with_id("twin", vec!["star-2024-01-01".into(), "star-2024-01-02".into()]),
            Cluster::with_id("twin", vec!["star-2024-01-03".into(), "star-2024-01-04".into()]),
        ]);

        assert_eq!(store.clusters().len(), 2);
        assert_eq!(store.clusters()[0].id, "twin");
        assert_ne!(store.clusters()[1].id, "twin");
        assert_eq!(
            store.cluster_of("star-2024-01-04").map(|c| c.id.as_str()),
            Some(store.clusters()[1].id.as_str())
        );
    }

    #[test]
    fn supplied_link_takes_over_a_derived_edge() {
        let mut store = AtlasStore::new();
        merge(&mut store, "2024-01-01", 30.0, 30.0);
        merge(&mut store, "2024-01-02", 32.0, 30.0);
        store.add_connections(vec![Connection::derived("star-2024-01-01", "star-2024-01-02")]);

        let added = store.add_connections(vec![
            Connection::supplied("star-2024-01-02", "star-2024-01-01"),
            Connection::derived("star-2024-01-02", "star-2024-01-01"),
        ]);

        assert_eq!(added, 1);
        assert_eq!(store.connections().len(), 1);
        assert_eq!(store.connections()[0].origin, ConnectionOrigin::Supplied);
    }

    #[test]
    fn lenient_json_skips_bad_entries_and_reads_legacy_clusters() {
        let json = r#"{
            "stars": [
                {"id": "wrong", "date": "2024-01-01", "x": 200, "y": 50, "size": 4},
                {"id": "star-bad", "date": "January", "x": 10, "y": 10, "size": 4},
                {"date": "2024-01-02", "x": 52, "y": 50},
                "garbage"
            ],
            "connections": [{"from": "star-2024-01-01", "to": "star-2024-01-02"}, 7],
            "constellations": [{"id": "c1", "name": "Pair", "summary": "s",
                "starIds": ["star-2024-01-01", "star-2024-01-02"]}]
        }"#;
        let store = AtlasStore::from_json_lenient(json, &Projector::default());

        assert_eq!(store.stars().len(), 2);
        assert_eq!(store.stars()[0].id, "star-2024-01-01");
        assert_eq!(store.stars()[0].position.x, 90.0);
        assert_eq!(store.stars()[1].size, 4.0);
        assert_eq!(store.connections().len(), 1);
        assert_eq!(store.clusters().len(), 1);
        assert!(!store.is_dirty());
    }

    #[test]
    fn corrupt_json_yields_empty_store() {
        let store = AtlasStore::from_json_lenient("{{{", &Projector::default());
        assert!(store.stars().is_empty());
    }

    #[test]
    fn visible_connections_require_both_endpoints() {
        let mut store = AtlasStore::new();
        merge(&mut store, "2024-01-01", 30.0, 30.0);
        merge(&mut store, "2024-01-02", 32.0, 30.0);
        merge(&mut store, "2024-01-03", 34.0, 30.0);
        store.add_connections(vec![
            Connection::supplied("star-2024-01-01", "star-2024-01-02"),
            Connection::supplied("star-2024-01-02", "star-2024-01-03"),
        ]);
        let hide_first = |s: &crate::model::star::Star| s.date != "2024-01-01";
        let visible = store.visible_connections(Some(&hide_first));
        assert_eq!(visible.len(), 1);
        assert_eq!(visible[0].from, "star-2024-01-02");
        assert_eq!(store.layout_points(Some(&hide_first)).len(), 2);
    }
}
