//! Connection bootstrap for the atlas database.
//!
//! # Invariants
//! - Returned connections have `foreign_keys=ON` and a busy timeout.
//! - Returned connections have migrations fully applied.

use super::migrations::apply_migrations;
use super::{DbError, DbResult};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenMode {
    File,
    Memory,
}

impl OpenMode {
    fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Memory => "memory",
        }
    }
}

/// Opens (creating if needed) an atlas database file and migrates it.
///
/// Emits `db_open` events with duration and status.
pub fn open_db(path: impl AsRef<Path>) -> DbResult<Connection> {
    let path = path.as_ref();
    open_with(OpenMode::File, || Connection::open(path))
}

/// Opens a migrated in-memory atlas database.
pub fn open_db_in_memory() -> DbResult<Connection> {
    open_with(OpenMode::Memory, Connection::open_in_memory)
}

fn open_with<F>(mode: OpenMode, open: F) -> DbResult<Connection>
where
    F: FnOnce() -> rusqlite::Result<Connection>,
{
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={}", mode.as_str());

    let result = open()
        .map_err(|err| ("db_open_failed", DbError::from(err)))
        .and_then(|mut conn| {
            bootstrap_connection(&mut conn, mode)
                .map(|()| conn)
                .map_err(|err| ("db_bootstrap_failed", err))
        });

    match result {
        Ok(conn) => {
            info!(
                "event=db_open module=db status=ok mode={} duration_ms={}",
                mode.as_str(),
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err((error_code, err)) => {
            error!(
                "event=db_open module=db status=error mode={} duration_ms={} error_code={} error={}",
                mode.as_str(),
                started_at.elapsed().as_millis(),
                error_code,
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(conn: &mut Connection, mode: OpenMode) -> DbResult<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    if mode == OpenMode::File {
        // Readers keep working while a recluster pass rewrites the graph.
        conn.query_row("PRAGMA journal_mode = WAL;", [], |_| Ok(()))?;
    }
    apply_migrations(conn)?;
    Ok(())
}
