use atlas_core::db::{open_db, open_db_in_memory};
use atlas_core::{
    AtlasRepository, AtlasSnapshot, AtlasStore, Cluster, ClusterIdentity, ClusterIdentityCache,
    ClusterSignature, Connection, ConnectionOrigin, Point, Projector, RepoError, Star,
    SqliteAtlasRepository,
};
use rusqlite::Connection as SqliteConnection;

fn star(date: &str, x: f64, y: f64, keywords: &[&str]) -> Star {
    Star::new(
        date,
        Point::new(x, y),
        4.5,
        keywords.iter().map(|k| k.to_string()).collect(),
    )
    .unwrap()
}

fn sample_store() -> AtlasStore {
    let mut cluster = Cluster::with_id(
        "c-harbor",
        vec!["star-2024-04-01".to_string(), "star-2024-04-02".to_string()],
    );
    cluster.name = Some("Harbor".to_string());
    cluster.summary = Some("Quiet mornings by the water.".to_string());

    AtlasStore::from_snapshot(AtlasSnapshot {
        stars: vec![
            star("2024-04-02", 41.0, 40.0, &["sea"]),
            star("2024-04-01", 40.0, 40.0, &["sea", "coffee"]),
            star("2024-04-09", 80.0, 20.0, &[]),
        ],
        connections: vec![
            Connection::derived("star-2024-04-01", "star-2024-04-02"),
            Connection::supplied("star-2024-04-09", "star-2024-04-01"),
        ],
        clusters: vec![cluster],
    })
}

#[test]
fn save_then_load_round_trips_the_graph() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAtlasRepository::try_new(&conn).unwrap();
    let store = sample_store();

    repo.save_atlas(&store).unwrap();
    let loaded = repo.load_atlas(&Projector::default()).unwrap();

    assert_eq!(loaded, store);
    assert_eq!(loaded.stars()[0].id, "star-2024-04-02");
    assert_eq!(loaded.connections()[1].origin, ConnectionOrigin::Supplied);
    assert_eq!(loaded.connections()[1].from, "star-2024-04-09");
}

#[test]
fn dirty_flag_survives_a_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("atlas.db");
    {
        let conn = open_db(&path).unwrap();
        let repo = SqliteAtlasRepository::try_new(&conn).unwrap();
        let mut store = sample_store();
        store.mark_dirty();
        repo.save_atlas(&store).unwrap();
    }

    let conn = open_db(&path).unwrap();
    let repo = SqliteAtlasRepository::try_new(&conn).unwrap();
    let loaded = repo.load_atlas(&Projector::default()).unwrap();

    assert!(loaded.is_dirty());
    assert_eq!(loaded.stars().len(), 3);
}

#[test]
fn saving_replaces_previous_rows() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAtlasRepository::try_new(&conn).unwrap();
    repo.save_atlas(&sample_store()).unwrap();

    let mut smaller = sample_store();
    smaller.delete("star-2024-04-02");
    repo.save_atlas(&smaller).unwrap();
    let loaded = repo.load_atlas(&Projector::default()).unwrap();

    assert_eq!(loaded.stars().len(), 2);
    assert_eq!(loaded.connections().len(), 1);
    assert!(loaded.clusters().is_empty());
}

#[test]
fn load_repairs_malformed_rows() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch(
        "INSERT INTO stars (id, date, x, y, size, keywords_json, position)
         VALUES ('star-2024-05-01', '2024-05-01', NULL, 400.0, NULL, 'not json', 0),
                ('bogus', 'yesterday', 50.0, 50.0, 4.0, '[]', 1);",
    )
    .unwrap();
    let repo = SqliteAtlasRepository::try_new(&conn).unwrap();
    let projector = Projector::default();

    let loaded = repo.load_atlas(&projector).unwrap();

    assert_eq!(loaded.stars().len(), 1);
    let star = &loaded.stars()[0];
    assert_eq!(star.position.x, projector.config().view_center());
    assert_eq!(star.position.y, projector.config().view_max);
    assert_eq!(star.size, projector.merge_size(None));
    assert!(star.keywords.is_empty());
}

#[test]
fn identity_cache_round_trips_and_upserts() {
    let conn = open_db_in_memory().unwrap();
    let repo = SqliteAtlasRepository::try_new(&conn).unwrap();
    let signature = ClusterSignature::from_member_ids(&["star-2024-04-02", "star-2024-04-01"]);

    let mut cache = ClusterIdentityCache::new();
    cache.set(signature.clone(), ClusterIdentity::new("Harbor", "Sea air."));
    repo.save_identity_cache(&cache).unwrap();

    let mut renamed = ClusterIdentityCache::new();
    renamed.set(signature.clone(), ClusterIdentity::new("Lighthouse", "Night walks."));
    repo.save_identity_cache(&renamed).unwrap();

    let loaded = repo.load_identity_cache().unwrap();
    assert_eq!(loaded.len(), 1);
    assert_eq!(loaded.get(&signature).unwrap().name, "Lighthouse");
}

#[test]
fn try_new_rejects_unmigrated_connections() {
    let conn = SqliteConnection::open_in_memory().unwrap();

    let err = SqliteAtlasRepository::try_new(&conn).err().unwrap();

    assert!(matches!(
        err,
        RepoError::UninitializedConnection {
            actual_version: 0,
            ..
        }
    ));
}

#[test]
fn try_new_rejects_missing_tables() {
    let conn = open_db_in_memory().unwrap();
    conn.execute_batch("DROP TABLE cluster_identities;").unwrap();

    let err = SqliteAtlasRepository::try_new(&conn).err().unwrap();

    assert!(matches!(err, RepoError::MissingRequiredTable("cluster_identities")));
}
