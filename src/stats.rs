//! Catalog statistics.
//!
//! Node counts per kind, edge counts per type, and total cataloged bytes.
//! Used by `fb stats`.

use anyhow::Result;
use sqlx::Row;
use std::collections::BTreeMap;

use filebase_core::models::{EdgeType, NodeKind};

use crate::config::Config;
use crate::graph::GraphStore;

/// Counts gathered by [`collect_stats`].
#[derive(Debug, Default)]
pub struct CatalogStats {
    pub nodes: BTreeMap<&'static str, i64>,
    pub edges: BTreeMap<&'static str, i64>,
    pub total_bytes: i64,
    pub last_inserted_ts: Option<i64>,
}

pub async fn collect_stats(store: &GraphStore) -> Result<CatalogStats> {
    let mut stats = CatalogStats::default();
    for kind in NodeKind::ALL {
        stats.nodes.insert(kind.as_str(), 0);
    }
    for edge_type in EdgeType::ALL {
        stats.edges.insert(edge_type.as_str(), 0);
    }

    let rows = sqlx::query("SELECT kind, COUNT(*) AS n FROM nodes GROUP BY kind")
        .fetch_all(store.pool())
        .await?;
    for row in &rows {
        let kind: String = row.get("kind");
        if let Ok(kind) = kind.parse::<NodeKind>() {
            stats.nodes.insert(kind.as_str(), row.get("n"));
        }
    }

    let rows = sqlx::query("SELECT edge_type, COUNT(*) AS n FROM edges GROUP BY edge_type")
        .fetch_all(store.pool())
        .await?;
    for row in &rows {
        let edge_type: String = row.get("edge_type");
        if let Ok(edge_type) = edge_type.parse::<EdgeType>() {
            stats.edges.insert(edge_type.as_str(), row.get("n"));
        }
    }

    stats.total_bytes = sqlx::query_scalar("SELECT COALESCE(SUM(size), 0) FROM files")
        .fetch_one(store.pool())
        .await?;
    stats.last_inserted_ts = sqlx::query_scalar("SELECT MAX(inserted_ts) FROM nodes")
        .fetch_one(store.pool())
        .await?;

    Ok(stats)
}

/// Run the stats command: query the database and print a summary.
pub async fn run_stats(config: &Config) -> Result<()> {
    let store = GraphStore::open(config).await?;
    let stats = collect_stats(&store).await?;

    let db_size = std::fs::metadata(&config.db.path)
        .map(|m| m.len())
        .unwrap_or(0);

    println!("Filebase — Catalog Stats");
    println!("========================");
    println!();
    println!("  Database:    {}", config.db.path.display());
    println!("  Size:        {}", format_bytes(db_size));
    println!(
        "  Cataloged:   {}",
        format_bytes(u64::try_from(stats.total_bytes).unwrap_or(0))
    );
    println!(
        "  Last insert: {}",
        stats
            .last_inserted_ts
            .map(format_ts_relative)
            .unwrap_or_else(|| "never".to_string())
    );
    println!();
    println!("  {:<18} {:>8}", "NODE KIND", "COUNT");
    println!("  {}", "-".repeat(27));
    for (kind, n) in &stats.nodes {
        println!("  {:<18} {:>8}", kind, n);
    }
    println!();
    println!("  {:<18} {:>8}", "EDGE TYPE", "COUNT");
    println!("  {}", "-".repeat(27));
    for (edge_type, n) in &stats.edges {
        println!("  {:<18} {:>8}", edge_type, n);
    }
    println!();

    store.close().await;
    Ok(())
}

/// Format a byte count as a human-readable string.
fn format_bytes(bytes: u64) -> String {
    if bytes < 1024 {
        format!("{} B", bytes)
    } else if bytes < 1024 * 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else if bytes < 1024 * 1024 * 1024 {
        format!("{:.1} MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        format!("{:.2} GB", bytes as f64 / (1024.0 * 1024.0 * 1024.0))
    }
}

/// Format a Unix timestamp as a relative time string (e.g. "3 hours ago").
pub(crate) fn format_ts_relative(ts: i64) -> String {
    let delta = chrono::Utc::now().timestamp() - ts;

    if delta < 0 {
        return format_ts_iso(ts);
    }

    if delta < 60 {
        "just now".to_string()
    } else if delta < 3600 {
        let mins = delta / 60;
        format!("{} min{} ago", mins, if mins == 1 { "" } else { "s" })
    } else if delta < 86400 {
        let hours = delta / 3600;
        format!("{} hour{} ago", hours, if hours == 1 { "" } else { "s" })
    } else if delta < 86400 * 30 {
        let days = delta / 86400;
        format!("{} day{} ago", days, if days == 1 { "" } else { "s" })
    } else {
        format_ts_iso(ts)
    }
}

fn format_ts_iso(ts: i64) -> String {
    chrono::DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}
