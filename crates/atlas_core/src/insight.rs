//! Read-only insights over clusters and per-day scores.
//!
//! # Responsibility
//! - Categorize constellations by their dominant mood dimension.
//! - Rank constellations and order members by similarity.
//! - Report constellations with enough recent activity to graduate.

use crate::model::cluster::Cluster;
use crate::model::scores::{MoodDimension, MoodScores};
use crate::model::star::date_from_star_id;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Per-day score vectors keyed by `YYYY-MM-DD`.
pub type ScoresHistory = BTreeMap<String, MoodScores>;

/// Constellations returned by `rank_constellations` by default.
pub const DEFAULT_RANK_LIMIT: usize = 7;
/// Bonus added to the total score per member star.
pub const MEMBER_BONUS: f64 = 5.0;

/// Display category of a constellation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoodCategory {
    Echo,
    Flame,
    Galaxy,
    Voyage,
    Value,
    Reconcile,
}

impl MoodCategory {
    /// Categories in tie-break order.
    pub const ALL: [MoodCategory; 6] = [
        MoodCategory::Echo,
        MoodCategory::Flame,
        MoodCategory::Galaxy,
        MoodCategory::Voyage,
        MoodCategory::Value,
        MoodCategory::Reconcile,
    ];

    pub fn dimensions(self) -> &'static [MoodDimension] {
        match self {
            Self::Echo => &[MoodDimension::SelfAwareness, MoodDimension::Openness],
            Self::Flame => &[MoodDimension::Resilience],
            Self::Galaxy => &[MoodDimension::Empathy],
            Self::Voyage => &[MoodDimension::SelfDirection],
            Self::Value => &[MoodDimension::MeaningOrientation],
            Self::Reconcile => &[MoodDimension::SelfAcceptance],
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Echo => "echo",
            Self::Flame => "flame",
            Self::Galaxy => "galaxy",
            Self::Voyage => "voyage",
            Self::Value => "value",
            Self::Reconcile => "reconcile",
        }
    }
}

/// One entry of a ranking.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankedConstellation {
    pub cluster_id: String,
    pub category: MoodCategory,
    pub total_score: f64,
}

/// Scores recorded for each member, in member order; unscored days are skipped.
fn member_scores<'a>(cluster: &Cluster, history: &'a ScoresHistory) -> Vec<&'a MoodScores> {
    cluster
        .member_ids
        .iter()
        .filter_map(|id| date_from_star_id(id))
        .filter_map(|date| history.get(date))
        .collect()
}

/// Component-wise mean of the given vectors, or `None` when empty.
pub fn centroid<'a, I>(scores: I) -> Option<MoodScores>
where
    I: IntoIterator<Item = &'a MoodScores>,
{
    let mut sum = MoodScores::uniform(0.0);
    let mut count = 0usize;
    for scores in scores {
        let clean = scores.sanitized();
        for dimension in MoodDimension::ALL {
            sum.set(dimension, sum.get(dimension) + clean.get(dimension));
        }
        count += 1;
    }
    if count == 0 {
        return None;
    }
    for dimension in MoodDimension::ALL {
        sum.set(dimension, sum.get(dimension) / count as f64);
    }
    Some(sum)
}

/// Category whose dimensions have the highest mean over the members'
/// averaged scores. Ties go to the earlier category in `MoodCategory::ALL`;
/// clusters without any scored member fall back to `Reconcile`.
pub fn assign_category(cluster: &Cluster, history: &ScoresHistory) -> MoodCategory {
    let Some(average) = centroid(member_scores(cluster, history)) else {
        return MoodCategory::Reconcile;
    };

    let mut best = MoodCategory::Reconcile;
    let mut best_score = f64::NEG_INFINITY;
    for category in MoodCategory::ALL {
        let dimensions = category.dimensions();
        let score =
            dimensions.iter().map(|d| average.get(*d)).sum::<f64>() / dimensions.len() as f64;
        if score > best_score {
            best = category;
            best_score = score;
        }
    }
    best
}

/// Σ(per-member mean score) + `MEMBER_BONUS` × member count.
pub fn total_score(cluster: &Cluster, history: &ScoresHistory) -> f64 {
    let scored: f64 = member_scores(cluster, history)
        .into_iter()
        .map(MoodScores::mean)
        .sum();
    scored + MEMBER_BONUS * cluster.member_ids.len() as f64
}

/// Highest-scoring constellations first, at most `limit` entries.
pub fn rank_constellations(
    clusters: &[Cluster],
    history: &ScoresHistory,
    limit: usize,
) -> Vec<RankedConstellation> {
    let mut ranked = clusters
        .iter()
        .map(|cluster| RankedConstellation {
            cluster_id: cluster.id.clone(),
            category: assign_category(cluster, history),
            total_score: total_score(cluster, history),
        })
        .collect::<Vec<_>>();
    ranked.sort_by(|a, b| {
        b.total_score
            .total_cmp(&a.total_score)
            .then_with(|| a.cluster_id.cmp(&b.cluster_id))
    });
    ranked.truncate(limit);
    ranked
}

/// Members sorted by score-space distance to the cluster centroid.
///
/// Members without scores sort last, keeping their relative order.
pub fn order_by_similarity(cluster: &Cluster, history: &ScoresHistory) -> Vec<String> {
    let Some(center) = centroid(member_scores(cluster, history)) else {
        return cluster.member_ids.clone();
    };

    let mut with_distance = cluster
        .member_ids
        .iter()
        .map(|id| {
            let distance = date_from_star_id(id)
                .and_then(|date| history.get(date))
                .map_or(f64::INFINITY, |scores| scores.distance_to(&center));
            (id.clone(), distance)
        })
        .collect::<Vec<_>>();
    with_distance.sort_by(|a, b| a.1.total_cmp(&b.1));
    with_distance.into_iter().map(|(id, _)| id).collect()
}

/// Constellations with at least `min_stars` members dated on or after
/// `cutoff`, in input order.
pub fn graduation_candidates<'a>(
    clusters: &'a [Cluster],
    cutoff: &str,
    min_stars: usize,
) -> Vec<&'a Cluster> {
    clusters
        .iter()
        .filter(|cluster| {
            let recent = cluster
                .member_ids
                .iter()
                .filter_map(|id| date_from_star_id(id))
                .filter(|date| *date >= cutoff)
                .count();
            recent >= min_stars
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{
        assign_category, graduation_candidates, order_by_similarity, rank_constellations,
        total_score, MoodCategory, ScoresHistory,
    };
    use crate::model::cluster::Cluster;
    use crate::model::scores::{MoodDimension, MoodScores};

    fn cluster(id: &str, dates: &[&str]) -> Cluster {
        Cluster::with_id(id, dates.iter().map(|d| format!("star-{d}")).collect())
    }

    fn history(entries: &[(&str, MoodScores)]) -> ScoresHistory {
        entries
            .iter()
            .map(|(date, scores)| (date.to_string(), *scores))
            .collect()
    }

    fn peaked(dimension: MoodDimension) -> MoodScores {
        let mut scores = MoodScores::uniform(40.0);
        scores.set(dimension, 90.0);
        scores
    }

    #[test]
    fn category_follows_dominant_dimension() {
        let c = cluster("c", &["2024-01-01", "2024-01-02"]);
        let h = history(&[
            ("2024-01-01", peaked(MoodDimension::Empathy)),
            ("2024-01-02", peaked(MoodDimension::Empathy)),
        ]);
        assert_eq!(assign_category(&c, &h), MoodCategory::Galaxy);
        assert_eq!(assign_category(&c, &ScoresHistory::new()), MoodCategory::Reconcile);
    }

    #[test]
    fn average_ignores_unscored_members() {
        let c = cluster("c", &["2024-01-01", "2024-01-02"]);
        let h = history(&[("2024-01-01", peaked(MoodDimension::Resilience))]);
        assert_eq!(assign_category(&c, &h), MoodCategory::Flame);
    }

    #[test]
    fn total_score_adds_member_bonus() {
        let c = cluster("c", &["2024-01-01", "2024-01-02", "2024-01-03"]);
        let h = history(&[
            ("2024-01-01", MoodScores::uniform(60.0)),
            ("2024-01-02", MoodScores::uniform(40.0)),
        ]);
        assert_eq!(total_score(&c, &h), 115.0);
    }

    #[test]
    fn ranking_is_descending_and_limited() {
        let clusters = (0..9)
            .map(|i| cluster(&format!("c{i}"), &vec!["2024-01-01"; i + 2]))
            .collect::<Vec<_>>();
        let ranked = rank_constellations(&clusters, &ScoresHistory::new(), 7);
        assert_eq!(ranked.len(), 7);
        assert_eq!(ranked[0].cluster_id, "c8");
        assert!(ranked.windows(2).all(|w| w[0].total_score >= w[1].total_score));
    }

    #[test]
    fn similarity_orders_closest_first_and_unknown_last() {
        let c = cluster("c", &["2024-01-03", "2024-01-01", "2024-01-02"]);
        let h = history(&[
            ("2024-01-01", MoodScores::uniform(50.0)),
            ("2024-01-02", MoodScores::uniform(90.0)),
        ]);
        let mut center_heavy = h.clone();
        center_heavy.insert("2024-01-04".into(), MoodScores::uniform(50.0));
        let c2 = cluster("c2", &["2024-01-02", "2024-01-01", "2024-01-04"]);

        assert_eq!(order_by_similarity(&c, &h).last().unwrap(), "star-2024-01-03");
        assert_eq!(
            order_by_similarity(&c2, &center_heavy),
            vec!["star-2024-01-01", "star-2024-01-04", "star-2024-01-02"]
        );
    }

    #[test]
    fn graduation_requires_recent_members() {
        let clusters = vec![
            cluster("old", &["2023-12-01", "2023-12-02", "2024-01-05"]),
            cluster("fresh", &["2024-01-04", "2024-01-05", "2024-01-06"]),
        ];
        let candidates = graduation_candidates(&clusters, "2024-01-03", 3);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].id, "fresh");
    }
}
