//! Atlas use-case service.
//!
//! # Responsibility
//! - Provide day-level entry points (record, remove, recluster, render).
//! - Load, mutate and persist the store through a repository per call.
//!
//! # Invariants
//! - Every mutating call persists before returning success.
//! - Layout output is returned to the caller and never written back.
//! - Service layer remains storage-agnostic.

use crate::config::AtlasConfig;
use crate::engine::filter::StarFilter;
use crate::engine::layout::normalize_for_display;
use crate::engine::naming::ConstellationNamer;
use crate::engine::projector::Projector;
use crate::engine::recluster::{recluster, ReclusterReport};
use crate::model::cluster::Cluster;
use crate::model::connection::Connection;
use crate::model::scores::MoodScores;
use crate::model::star::{normalize_date_key, star_id_for_date};
use crate::repo::atlas_repo::{AtlasRepository, RepoError};
use crate::store::atlas_store::{AtlasError, AtlasStore, DeleteOutcome, MergeOutcome, MergeRequest};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub type ServiceResult<T> = Result<T, ServiceError>;

/// Error surfaced by atlas use cases.
#[derive(Debug)]
pub enum ServiceError {
    Repo(RepoError),
    Validation(AtlasError),
    Serialization(serde_json::Error),
}

impl Display for ServiceError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Repo(err) => write!(f, "{err}"),
            Self::Validation(err) => write!(f, "{err}"),
            Self::Serialization(err) => write!(f, "serialization failed: {err}"),
        }
    }
}

impl Error for ServiceError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Repo(err) => Some(err),
            Self::Validation(err) => Some(err),
            Self::Serialization(err) => Some(err),
        }
    }
}

impl From<RepoError> for ServiceError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<AtlasError> for ServiceError {
    fn from(value: AtlasError) -> Self {
        Self::Validation(value)
    }
}

impl From<crate::model::star::StarValidationError> for ServiceError {
    fn from(value: crate::model::star::StarValidationError) -> Self {
        Self::Validation(value.into())
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// One analyzed (or unanalyzed) journal day.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DayEntry {
    pub date: String,
    /// Absent when the day has not been analyzed yet.
    pub scores: Option<MoodScores>,
    pub keywords: Vec<String>,
    /// Dates a collaborator linked to this day.
    pub linked_dates: Vec<String>,
    pub content_length: Option<usize>,
}

/// Star with transient display coordinates.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DisplayStar {
    pub id: String,
    pub date: String,
    pub x: f64,
    pub y: f64,
    pub size: f64,
    pub keywords: Vec<String>,
    pub cluster_id: Option<String>,
}

/// Render-ready atlas for one visibility filter.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AtlasView {
    pub stars: Vec<DisplayStar>,
    pub connections: Vec<Connection>,
    /// Clusters with at least two visible members; member lists hold
    /// visible ids only.
    pub clusters: Vec<Cluster>,
}

/// Counts describing persisted state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtlasStatus {
    pub stars: usize,
    pub connections: usize,
    pub clusters: usize,
    pub floating: usize,
    pub cached_identities: usize,
    pub dirty: bool,
}

/// Use-case service wrapper for atlas operations.
pub struct AtlasService<R: AtlasRepository> {
    repo: R,
    config: AtlasConfig,
    projector: Projector,
}

impl<R: AtlasRepository> AtlasService<R> {
    /// Creates a service using the provided repository and configuration.
    pub fn new(repo: R, config: AtlasConfig) -> Self {
        let projector = Projector::new(config.projector.clone());
        Self {
            repo,
            config,
            projector,
        }
    }

    pub fn config(&self) -> &AtlasConfig {
        &self.config
    }

    /// Projects and merges one day, then persists.
    ///
    /// Days without scores use the date-derived fallback position and a
    /// content-length size.
    pub fn record_day(&self, entry: &DayEntry) -> ServiceResult<MergeOutcome> {
        let date = normalize_date_key(&entry.date)?;
        let projection =
            self.projector
                .project_or_fallback(entry.scores.as_ref(), &date, entry.content_length);
        let own_id = star_id_for_date(&date);
        let connections = entry
            .linked_dates
            .iter()
            .map(|linked| {
                normalize_date_key(linked)
                    .map(|linked| Connection::supplied(own_id.clone(), star_id_for_date(&linked)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let request = MergeRequest {
            date,
            position: projection.position,
            size: entry.scores.as_ref().map(|_| projection.size),
            keywords: entry.keywords.clone(),
            connections,
            content_length: entry.content_length,
        };

        let mut store = self.load()?;
        let outcome = store.merge(request, &self.projector)?;
        self.repo.save_atlas(&store)?;
        Ok(outcome)
    }

    /// Deletes one day's star and persists.
    pub fn remove_day(&self, date: &str) -> ServiceResult<DeleteOutcome> {
        let mut store = self.load()?;
        let outcome = store.delete_date(date)?;
        if outcome.removed {
            self.repo.save_atlas(&store)?;
        }
        Ok(outcome)
    }

    /// Runs a recluster pass and persists graph and identity cache.
    pub fn recluster(
        &self,
        namer: &dyn ConstellationNamer,
        filter: Option<&dyn StarFilter>,
    ) -> ServiceResult<ReclusterReport> {
        let mut store = self.load()?;
        let mut cache = self.repo.load_identity_cache()?;
        let report = recluster(&mut store, &mut cache, namer, &self.config.cluster, filter);
        self.repo.save_atlas(&store)?;
        self.repo.save_identity_cache(&cache)?;
        Ok(report)
    }

    /// Reclusters only when the store changed since the last pass.
    pub fn recluster_if_dirty(
        &self,
        namer: &dyn ConstellationNamer,
        filter: Option<&dyn StarFilter>,
    ) -> ServiceResult<Option<ReclusterReport>> {
        if !self.load()?.is_dirty() {
            return Ok(None);
        }
        self.recluster(namer, filter).map(Some)
    }

    /// Builds the render view for stars admitted by `filter`.
    pub fn render(&self, filter: Option<&dyn StarFilter>) -> ServiceResult<AtlasView> {
        let store = self.load()?;
        Ok(build_view(&store, &self.config, filter))
    }

    pub fn status(&self) -> ServiceResult<AtlasStatus> {
        let store = self.load()?;
        let cache = self.repo.load_identity_cache()?;
        Ok(AtlasStatus {
            stars: store.stars().len(),
            connections: store.connections().len(),
            clusters: store.clusters().len(),
            floating: store.floating_star_ids(None).len(),
            cached_identities: cache.len(),
            dirty: store.is_dirty(),
        })
    }

    /// Returns the persisted `{ stars, connections, clusters }` document.
    pub fn export_json(&self) -> ServiceResult<String> {
        Ok(self.load()?.to_json()?)
    }

    /// Replaces persisted state with a (leniently parsed) JSON document.
    ///
    /// The imported store is marked dirty so the next pass re-derives
    /// clusters.
    pub fn import_json(&self, json: &str) -> ServiceResult<AtlasStatus> {
        let mut store = AtlasStore::from_json_lenient(json, &self.projector);
        store.mark_dirty();
        self.repo.save_atlas(&store)?;
        self.status()
    }

    fn load(&self) -> ServiceResult<AtlasStore> {
        Ok(self.repo.load_atlas(&self.projector)?)
    }
}

/// Applies the filter and layout to a store snapshot.
pub fn build_view(
    store: &AtlasStore,
    config: &AtlasConfig,
    filter: Option<&dyn StarFilter>,
) -> AtlasView {
    let visible_stars = store.visible_stars(filter);
    let visible = visible_stars
        .iter()
        .map(|star| star.id.as_str())
        .collect::<HashSet<_>>();
    let clusters = store
        .clusters()
        .iter()
        .filter_map(|cluster| {
            let mut cluster = cluster.clone();
            cluster.member_ids.retain(|id| visible.contains(id.as_str()));
            cluster.is_viable().then_some(cluster)
        })
        .collect::<Vec<Cluster>>();

    let points = normalize_for_display(&store.layout_points(filter), &config.layout);
    let stars = visible_stars
        .iter()
        .zip(points)
        .map(|(star, point)| DisplayStar {
            id: star.id.clone(),
            date: star.date.clone(),
            x: point.x,
            y: point.y,
            size: star.size,
            keywords: star.keywords.clone(),
            cluster_id: clusters
                .iter()
                .find(|cluster| cluster.contains(&star.id))
                .map(|cluster| cluster.id.clone()),
        })
        .collect::<Vec<_>>();

    AtlasView {
        connections: store.visible_connections(filter).into_iter().cloned().collect(),
        clusters,
        stars,
    }
}
