//! Atlas repository contracts and SQLite implementation.
//!
//! # Responsibility
//! - Persist the atlas graph and the identity cache.
//! - Keep SQL details inside the core persistence boundary.
//!
//! # Invariants
//! - `save_atlas` replaces the whole graph in one immediate transaction.
//! - Read paths repair malformed rows (bad keyword JSON, missing or
//!   non-finite coordinates) instead of failing the whole load.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::engine::projector::Projector;
use crate::model::cluster::{Cluster, ClusterIdentity, ClusterSignature};
use crate::model::connection::{Connection as Edge, ConnectionOrigin};
use crate::model::star::{Point, Star};
use crate::store::atlas_store::{AtlasSnapshot, AtlasStore};
use crate::store::identity_cache::ClusterIdentityCache;
use log::{info, warn};
use rusqlite::{params, Connection, OptionalExtension, Transaction, TransactionBehavior};
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::Instant;

const DIRTY_META_KEY: &str = "dirty";
const REQUIRED_TABLES: [&str; 6] = [
    "stars",
    "connections",
    "clusters",
    "cluster_members",
    "atlas_meta",
    "cluster_identities",
];

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for atlas persistence.
#[derive(Debug)]
pub enum RepoError {
    Db(DbError),
    /// Connection was not migrated to the version this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    MissingRequiredTable(&'static str),
    Serialization(serde_json::Error),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Db(err) => write!(f, "{err}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "connection schema version {actual_version} does not match expected {expected_version}"
            ),
            Self::MissingRequiredTable(table) => write!(f, "missing required table `{table}`"),
            Self::Serialization(err) => write!(f, "serialization failed: {err}"),
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            Self::Serialization(err) => Some(err),
            Self::UninitializedConnection { .. } | Self::MissingRequiredTable(_) => None,
        }
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

impl From<serde_json::Error> for RepoError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization(value)
    }
}

/// Repository interface for atlas state.
pub trait AtlasRepository {
    /// Loads the graph; positions and sizes are repaired with `projector`.
    fn load_atlas(&self, projector: &Projector) -> RepoResult<AtlasStore>;
    /// Replaces the persisted graph with `store`.
    fn save_atlas(&self, store: &AtlasStore) -> RepoResult<()>;
    fn load_identity_cache(&self) -> RepoResult<ClusterIdentityCache>;
    /// Upserts every cache entry; entries are never deleted.
    fn save_identity_cache(&self, cache: &ClusterIdentityCache) -> RepoResult<()>;
}

/// SQLite-backed atlas repository.
pub struct SqliteAtlasRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteAtlasRepository<'conn> {
    /// Creates repository from migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_atlas_connection_ready(conn)?;
        Ok(Self { conn })
    }
}

impl AtlasRepository for SqliteAtlasRepository<'_> {
    fn load_atlas(&self, projector: &Projector) -> RepoResult<AtlasStore> {
        let started_at = Instant::now();
        let mut repaired = 0usize;

        let mut stmt = self.conn.prepare(
            "SELECT date, x, y, size, keywords_json
             FROM stars
             ORDER BY position ASC, id ASC;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<f64>>(1)?,
                row.get::<_, Option<f64>>(2)?,
                row.get::<_, Option<f64>>(3)?,
                row.get::<_, String>(4)?,
            ))
        })?;
        let mut stars = Vec::new();
        for row in rows {
            let (date, x, y, size, keywords_json) = row?;
            let keywords = match serde_json::from_str::<Vec<String>>(&keywords_json) {
                Ok(keywords) => keywords,
                Err(_) => {
                    repaired += 1;
                    Vec::new()
                }
            };
            let raw = Point::new(x.unwrap_or(f64::NAN), y.unwrap_or(f64::NAN));
            if !raw.x.is_finite() || !raw.y.is_finite() {
                repaired += 1;
            }
            match Star::new(
                &date,
                projector.clamp_point(raw),
                projector.clamp_size(size.unwrap_or(f64::NAN)),
                keywords,
            ) {
                Ok(star) => stars.push(star),
                Err(_) => repaired += 1,
            }
        }

        let mut stmt = self.conn.prepare(
            "SELECT from_id, to_id, origin
             FROM connections
             ORDER BY position ASC, edge_low ASC, edge_high ASC;",
        )?;
        let connections = stmt
            .query_map([], |row| {
                let origin = match row.get::<_, String>(2)?.as_str() {
                    "derived" => ConnectionOrigin::Derived,
                    _ => ConnectionOrigin::Supplied,
                };
                Ok(Edge::new(row.get::<_, String>(0)?, row.get::<_, String>(1)?, origin))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let clusters = load_clusters(self.conn)?;
        let dirty = self
            .conn
            .query_row(
                "SELECT value FROM atlas_meta WHERE key = ?1;",
                params![DIRTY_META_KEY],
                |row| row.get::<_, String>(0),
            )
            .optional()?
            .is_some_and(|value| value == "1");

        let mut store = AtlasStore::from_snapshot(AtlasSnapshot {
            stars,
            connections,
            clusters,
        });
        if dirty {
            store.mark_dirty();
        }

        if repaired > 0 {
            warn!(
                "event=atlas_load module=repo status=ok repaired_rows={}",
                repaired
            );
        }
        info!(
            "event=atlas_load module=repo status=ok stars={} connections={} clusters={} dirty={} duration_ms={}",
            store.stars().len(),
            store.connections().len(),
            store.clusters().len(),
            store.is_dirty(),
            started_at.elapsed().as_millis()
        );
        Ok(store)
    }

    fn save_atlas(&self, store: &AtlasStore) -> RepoResult<()> {
        let started_at = Instant::now();
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        tx.execute_batch(
            "DELETE FROM cluster_members;
             DELETE FROM clusters;
             DELETE FROM connections;
             DELETE FROM stars;",
        )?;

        for (index, star) in store.stars().iter().enumerate() {
            tx.execute(
                "INSERT INTO stars (id, date, x, y, size, keywords_json, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7);",
                params![
                    star.id,
                    star.date,
                    star.position.x,
                    star.position.y,
                    star.size,
                    serde_json::to_string(&star.keywords)?,
                    index as i64,
                ],
            )?;
        }

        for (index, edge) in store.connections().iter().enumerate() {
            let key = edge.key();
            tx.execute(
                "INSERT INTO connections (edge_low, edge_high, from_id, to_id, origin, position)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6);",
                params![
                    key.low(),
                    key.high(),
                    edge.from,
                    edge.to,
                    origin_to_db(edge.origin),
                    index as i64,
                ],
            )?;
        }

        for (index, cluster) in store.clusters().iter().enumerate() {
            tx.execute(
                "INSERT INTO clusters (id, name, summary, position) VALUES (?1, ?2, ?3, ?4);",
                params![cluster.id, cluster.name, cluster.summary, index as i64],
            )?;
            for (member_index, star_id) in cluster.member_ids.iter().enumerate() {
                tx.execute(
                    "INSERT INTO cluster_members (cluster_id, star_id, position)
                     VALUES (?1, ?2, ?3);",
                    params![cluster.id, star_id, member_index as i64],
                )?;
            }
        }

        tx.execute(
            "INSERT INTO atlas_meta (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value;",
            params![DIRTY_META_KEY, if store.is_dirty() { "1" } else { "0" }],
        )?;
        tx.commit()?;

        info!(
            "event=atlas_save module=repo status=ok stars={} connections={} clusters={} duration_ms={}",
            store.stars().len(),
            store.connections().len(),
            store.clusters().len(),
            started_at.elapsed().as_millis()
        );
        Ok(())
    }

    fn load_identity_cache(&self) -> RepoResult<ClusterIdentityCache> {
        let mut stmt = self.conn.prepare(
            "SELECT signature, name, summary FROM cluster_identities ORDER BY signature ASC;",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut cache = ClusterIdentityCache::new();
        let mut skipped = 0usize;
        for row in rows {
            let (signature, name, summary) = row?;
            if !cache.set(
                ClusterSignature::from_raw(signature),
                ClusterIdentity::new(name, summary),
            ) {
                skipped += 1;
            }
        }
        if skipped > 0 {
            warn!(
                "event=identity_cache_load module=repo status=ok skipped={}",
                skipped
            );
        }
        info!(
            "event=identity_cache_load module=repo status=ok entries={}",
            cache.len()
        );
        Ok(cache)
    }

    fn save_identity_cache(&self, cache: &ClusterIdentityCache) -> RepoResult<()> {
        let tx = Transaction::new_unchecked(self.conn, TransactionBehavior::Immediate)?;
        for (signature, identity) in cache.iter() {
            tx.execute(
                "INSERT INTO cluster_identities (signature, name, summary)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(signature) DO UPDATE SET
                    name = excluded.name,
                    summary = excluded.summary,
                    updated_at = strftime('%s', 'now');",
                params![signature.as_str(), identity.name, identity.summary],
            )?;
        }
        tx.commit()?;
        Ok(())
    }
}

fn load_clusters(conn: &Connection) -> RepoResult<Vec<Cluster>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.name, c.summary, m.star_id
         FROM clusters c
         LEFT JOIN cluster_members m ON m.cluster_id = c.id
         ORDER BY c.position ASC, c.id ASC, m.position ASC;",
    )?;
    let rows = stmt.query_map([], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, Option<String>>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
        ))
    })?;

    let mut order = Vec::new();
    let mut by_id: BTreeMap<String, Cluster> = BTreeMap::new();
    for row in rows {
        let (id, name, summary, star_id) = row?;
        let cluster = by_id.entry(id.clone()).or_insert_with(|| {
            order.push(id.clone());
            let mut cluster = Cluster::with_id(id, Vec::new());
            cluster.name = name;
            cluster.summary = summary;
            cluster
        });
        if let Some(star_id) = star_id {
            cluster.member_ids.push(star_id);
        }
    }
    Ok(order
        .into_iter()
        .filter_map(|id| by_id.remove(&id))
        .collect())
}

fn origin_to_db(origin: ConnectionOrigin) -> &'static str {
    match origin {
        ConnectionOrigin::Supplied => "supplied",
        ConnectionOrigin::Derived => "derived",
    }
}

fn ensure_atlas_connection_ready(conn: &Connection) -> RepoResult<()> {
    let expected_version = latest_version();
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }

    for table in REQUIRED_TABLES {
        let exists = conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = ?1 LIMIT 1;",
                params![table],
                |_| Ok(()),
            )
            .optional()?
            .is_some();
        if !exists {
            return Err(RepoError::MissingRequiredTable(table));
        }
    }
    Ok(())
}
