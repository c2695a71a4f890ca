//! # Filebase
//!
//! A personal content-addressable file catalog.
//!
//! Files are deduplicated by SHA-256 fingerprint, revisions of one logical
//! file are linked through a lazily created version group, and free-text
//! descriptions carry embeddings for semantic search. Everything lives in a
//! SQLite graph: typed nodes plus typed, directed edges.
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────┐   ┌──────────────┐   ┌──────────────┐
//! │  fb CLI  │──▶│   Ingestor   │──▶│  GraphStore  │
//! └──────────┘   │ hash→resolve │   │   (SQLite)   │
//!      │         │ →embed→commit│   └──────┬───────┘
//!      │         └──────┬───────┘          │
//!      │                ▼                  │
//!      │         ┌──────────────┐          │
//!      └────────▶│   placement  │   search ◀┘
//!                └──────────────┘
//! ```
//!
//! Pure logic (hashing, shard layout, filename lineage, revision planning,
//! ranking) lives in the `filebase-core` crate.
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema migrations |
//! | [`graph`] | Node/edge store and scoped transactions |
//! | [`resolver`] | Version-chain resolution |
//! | [`ingest`] | Ingestion pipeline |
//! | [`placement`] | Physical file moves |
//! | [`embedding`] | Embedding provider implementations |
//! | [`search`] | Similarity search over descriptions |
//! | [`catalog`] | Collections, devices, descriptions, derivation edges |
//! | [`checkout`] | Checkout and relocate |
//! | [`get`] | Node inspection |
//! | [`stats`] | Catalog statistics |
//! | [`export`] | JSON export |

pub mod catalog;
pub mod checkout;
pub mod config;
pub mod db;
pub mod embedding;
pub mod export;
pub mod get;
pub mod graph;
pub mod ingest;
pub mod migrate;
pub mod placement;
pub mod resolver;
pub mod search;
pub mod stats;
