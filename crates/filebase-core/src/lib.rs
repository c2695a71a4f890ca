//! # filebase core
//!
//! Pure catalog logic for filebase: the node/edge data model, the error
//! taxonomy, content fingerprinting, shard layout, revision lineage, and
//! similarity ranking.
//!
//! This crate contains no tokio, sqlx, or network dependencies. The
//! application crate supplies the SQLite graph store, embedding providers,
//! and the ingestion pipeline on top of it.

pub mod embedding;
pub mod error;
pub mod hash;
pub mod models;
pub mod search;
pub mod shard;
pub mod version;

pub use error::CatalogError;
