//! Distance-threshold clustering over star positions.
//!
//! # Responsibility
//! - Group stars into connected components where every link is a pair
//!   closer than the threshold.
//!
//! # Invariants
//! - Output is independent of input order: stars are processed sorted by id,
//!   members are sorted by id, groups are ordered by their first member.
//! - Stars rejected by the filter appear in no group.
//! - Singletons are returned as groups of one; callers treat them as floating.

use super::filter::{is_accessible, StarFilter};
use super::union_find::UnionFind;
use crate::model::cluster::MIN_CLUSTER_MEMBERS;
use crate::model::star::Star;

/// One connected component, members sorted by id.
pub type StarGroup<'a> = Vec<&'a Star>;

/// Groups stars whose pairwise chain distance stays below `threshold`.
///
/// Runs an O(n²) pairwise pass; atlas sizes are one star per day.
pub fn cluster<'a>(
    stars: &'a [Star],
    threshold: f64,
    filter: Option<&dyn StarFilter>,
) -> Vec<StarGroup<'a>> {
    let mut points = stars
        .iter()
        .filter(|star| is_accessible(filter, star))
        .collect::<Vec<_>>();
    points.sort_by(|a, b| a.id.cmp(&b.id));
    points.dedup_by(|a, b| a.id == b.id);

    let n = points.len();
    let mut sets = UnionFind::new(n);
    for i in 0..n {
        for j in (i + 1)..n {
            if points[i].distance_to(points[j]) < threshold {
                sets.union(i, j);
            }
        }
    }

    sets.groups()
        .into_iter()
        .map(|indices| indices.into_iter().map(|index| points[index]).collect())
        .collect()
}

/// Returns whether a group is large enough to form a constellation.
pub fn is_constellation(group: &[&Star]) -> bool {
    group.len() >= MIN_CLUSTER_MEMBERS
}

/// Ids of stars left in singleton groups.
pub fn floating_ids<'a>(groups: &[StarGroup<'a>]) -> Vec<&'a str> {
    groups
        .iter()
        .filter(|group| !is_constellation(group))
        .flat_map(|group| group.iter().map(|star| star.id.as_str()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{cluster, floating_ids, is_constellation};
    use crate::model::star::{Point, Star};

    fn star(date: &str, x: f64, y: f64) -> Star {
        Star::new(date, Point::new(x, y), 4.0, vec![]).unwrap()
    }

    fn ids(groups: &[Vec<&Star>]) -> Vec<Vec<String>> {
        groups
            .iter()
            .map(|g| g.iter().map(|s| s.id.clone()).collect())
            .collect()
    }

    #[test]
    fn empty_input_yields_no_groups() {
        assert!(cluster(&[], 28.0, None).is_empty());
    }

    #[test]
    fn close_pair_and_far_singleton() {
        let stars = vec![
            star("2024-01-01", 30.0, 30.0),
            star("2024-01-02", 40.0, 35.0),
            star("2024-01-10", 85.0, 85.0),
        ];
        let groups = cluster(&stars, 28.0, None);
        assert_eq!(
            ids(&groups),
            vec![
                vec!["star-2024-01-01".to_string(), "star-2024-01-02".to_string()],
                vec!["star-2024-01-10".to_string()],
            ]
        );
        assert!(is_constellation(&groups[0]));
        assert_eq!(floating_ids(&groups), vec!["star-2024-01-10"]);
    }

    #[test]
    fn chains_join_transitively() {
        let stars = vec![
            star("2024-01-01", 10.0, 50.0),
            star("2024-01-02", 35.0, 50.0),
            star("2024-01-03", 60.0, 50.0),
        ];
        let groups = cluster(&stars, 28.0, None);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].len(), 3);
    }

    #[test]
    fn threshold_is_strict() {
        let stars = vec![star("2024-01-01", 10.0, 10.0), star("2024-01-02", 38.0, 10.0)];
        assert_eq!(cluster(&stars, 28.0, None).len(), 2);
        assert_eq!(cluster(&stars, 28.01, None).len(), 1);
    }

    #[test]
    fn grouping_ignores_input_order() {
        let forward = vec![
            star("2024-01-03", 70.0, 70.0),
            star("2024-01-01", 20.0, 20.0),
            star("2024-01-04", 75.0, 72.0),
            star("2024-01-02", 25.0, 22.0),
            star("2024-01-05", 50.0, 90.0),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(
            ids(&cluster(&forward, 28.0, None)),
            ids(&cluster(&reversed, 28.0, None))
        );
    }

    #[test]
    fn filtered_stars_are_excluded() {
        let stars = vec![
            star("2024-01-01", 30.0, 30.0),
            star("2024-01-02", 32.0, 30.0),
            star("2024-01-03", 34.0, 30.0),
        ];
        let hide_middle = |s: &Star| s.date != "2024-01-02";
        let groups = cluster(&stars, 3.0, Some(&hide_middle));
        assert_eq!(
            ids(&groups),
            vec![
                vec!["star-2024-01-01".to_string()],
                vec!["star-2024-01-03".to_string()],
            ]
        );
    }
}
