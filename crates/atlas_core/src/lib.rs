//! Core domain logic for the atlas constellation engine.
//! This crate is the single source of truth for atlas invariants.

pub mod config;
pub mod db;
pub mod engine;
pub mod insight;
pub mod logging;
pub mod model;
pub mod repo;
pub mod service;
pub mod store;

pub use config::{
    AtlasConfig, ClusterConfig, ConfigError, LayoutConfig, ProjectorConfig, VisibilityConfig,
};
pub use engine::clusterer::cluster;
pub use engine::connections::{build_connections, link_shared_keywords};
pub use engine::filter::{DateAllowList, RecentWindow, StarFilter};
pub use engine::layout::{normalize_for_display, LayoutPoint};
pub use engine::naming::{ConstellationNamer, NamingError, NamingRequest, OfflineNamer};
pub use engine::projector::{Projection, Projector};
pub use engine::recluster::{recluster, ReclusterReport};
pub use engine::union_find::UnionFind;
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::cluster::{Cluster, ClusterIdentity, ClusterSignature};
pub use model::connection::{Connection, ConnectionOrigin, EdgeKey};
pub use model::scores::{MoodDimension, MoodScores};
pub use model::star::{Point, Star, StarId, StarValidationError};
pub use repo::atlas_repo::{AtlasRepository, RepoError, RepoResult, SqliteAtlasRepository};
pub use service::atlas_service::{
    AtlasService, AtlasStatus, AtlasView, DayEntry, DisplayStar, ServiceError, ServiceResult,
};
pub use store::atlas_store::{
    AtlasError, AtlasResult, AtlasSnapshot, AtlasStore, DeleteOutcome, MergeOutcome, MergeRequest,
};
pub use store::identity_cache::ClusterIdentityCache;

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
