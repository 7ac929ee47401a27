//! Atlas domain model.
//!
//! # Responsibility
//! - Define the persisted shapes: stars, connections, clusters.
//! - Define the score vector consumed by the projector.
//!
//! # Invariants
//! - Every star is identified by a stable id derived from its date.
//! - Connection and cluster identities are order-independent.

pub mod cluster;
pub mod connection;
pub mod scores;
pub mod star;
