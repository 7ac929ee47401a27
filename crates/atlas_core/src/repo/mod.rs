//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service orchestration.
//!
//! # Invariants
//! - Repositories only accept connections migrated to the latest schema.
//! - Graph saves are atomic; a failed save leaves the previous graph intact.

pub mod atlas_repo;
