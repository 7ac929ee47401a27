//! Pure atlas algorithms: projection, clustering, edges, layout and the
//! recluster pass that ties them to a store.

pub mod clusterer;
pub mod connections;
pub mod filter;
pub mod layout;
pub mod naming;
pub mod projector;
pub mod recluster;
pub mod union_find;
