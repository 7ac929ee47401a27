//! Intra-cluster edge synthesis.
//!
//! # Responsibility
//! - Connect each clustered star to its nearest neighbours in the same group.
//! - Link stars that share a keyword.
//!
//! # Invariants
//! - Output never contains a self-loop or two edges with the same `EdgeKey`.
//! - Every synthesized edge has `ConnectionOrigin::Derived`.
//!
//! Each star links to at most `fan_out` nearest neighbours, which keeps the
//! edge count in O(fan_out · n) and reads as a constellation shape; it is
//! neither a spanning tree nor a complete graph.

use super::clusterer::{is_constellation, StarGroup};
use super::filter::{is_accessible, StarFilter};
use crate::model::connection::{Connection, EdgeKey};
use crate::model::star::Star;
use std::collections::{BTreeSet, HashSet};

/// Builds nearest-neighbour edges inside every group with ≥2 members.
///
/// Ties in distance are broken by neighbour id so output is deterministic.
pub fn build_connections(groups: &[StarGroup<'_>], fan_out: usize) -> Vec<Connection> {
    let mut seen = HashSet::new();
    let mut edges = Vec::new();

    for group in groups.iter().filter(|group| is_constellation(group)) {
        for (i, from) in group.iter().enumerate() {
            let mut candidates = group
                .iter()
                .enumerate()
                .filter(|(j, to)| *j != i && to.id != from.id)
                .map(|(_, to)| (from.distance_to(to), *to))
                .collect::<Vec<_>>();
            candidates.sort_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.id.cmp(&b.1.id)));

            for (_, to) in candidates.into_iter().take(fan_out) {
                if seen.insert(EdgeKey::new(&from.id, &to.id)) {
                    edges.push(Connection::derived(from.id.clone(), to.id.clone()));
                }
            }
        }
    }

    edges
}

/// Links every pair of accessible stars that share a normalized keyword.
pub fn link_shared_keywords(stars: &[Star], filter: Option<&dyn StarFilter>) -> Vec<Connection> {
    let mut tagged = stars
        .iter()
        .filter(|star| is_accessible(filter, star))
        .map(|star| (star, normalized_keywords(star)))
        .filter(|(_, keywords)| !keywords.is_empty())
        .collect::<Vec<_>>();
    tagged.sort_by(|a, b| a.0.id.cmp(&b.0.id));

    let mut seen = HashSet::new();
    let mut edges = Vec::new();
    for i in 0..tagged.len() {
        for j in (i + 1)..tagged.len() {
            let (a, a_words) = &tagged[i];
            let (b, b_words) = &tagged[j];
            if a.id == b.id || a_words.is_disjoint(b_words) {
                continue;
            }
            if seen.insert(EdgeKey::new(&a.id, &b.id)) {
                edges.push(Connection::derived(a.id.clone(), b.id.clone()));
            }
        }
    }
    edges
}

/// Appends `incoming` edges whose key is not already in `edges`.
///
/// Returns the number of edges added. Self-loops are dropped.
pub fn extend_unique(edges: &mut Vec<Connection>, incoming: Vec<Connection>) -> usize {
    let mut seen = edges.iter().map(Connection::key).collect::<HashSet<_>>();
    let before = edges.len();
    for edge in incoming {
        if !edge.is_self_loop() && seen.insert(edge.key()) {
            edges.push(edge);
        }
    }
    edges.len() - before
}

fn normalized_keywords(star: &Star) -> BTreeSet<String> {
    star.keywords
        .iter()
        .map(|keyword| keyword.trim().to_lowercase())
        .filter(|keyword| !keyword.is_empty())
        .collect()
}
