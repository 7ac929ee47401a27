//! In-memory atlas state and the identity side table.

pub mod atlas_store;
pub mod identity_cache;
