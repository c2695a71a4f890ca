//! Semantic search over stored descriptions.
//!
//! Every `has_description` edge is streamed from the store in one pass
//! and scored against the query with cosine similarity; only the best `k`
//! matches are kept in memory. Stored vectors that cannot be compared
//! (wrong dimensionality, zero norm) are skipped with a warning rather
//! than failing the whole query.

use anyhow::Result;
use futures_util::TryStreamExt;
use sqlx::Row;

use filebase_core::embedding::{blob_to_vec, validate_embedding};
use filebase_core::models::{NodeId, NodeKind};
use filebase_core::search::{DescriptionCandidate, KindFilter, Ranking, ScoredMatch};
use filebase_core::CatalogError;

use crate::config::Config;
use crate::embedding::create_provider;
use crate::graph::GraphStore;

/// Rank descriptions by similarity to `query`, best first.
///
/// Ties are broken by ascending owner id, then description id. Fails with
/// [`CatalogError::EmptyVector`] for a zero-norm query.
pub async fn search_descriptions(
    store: &GraphStore,
    query: &[f32],
    filter: KindFilter,
    k: usize,
) -> Result<Vec<ScoredMatch>> {
    let mut ranking = Ranking::new(query, filter, k)?;

    let kind = filter.node_kind().map(NodeKind::as_str);
    let mut rows = sqlx::query(
        r#"
        SELECT e.source_id AS owner_id, n.kind AS owner_kind,
               d.id AS description_id, d.text, d.embedding
        FROM edges e
        JOIN descriptions d ON d.id = e.target_id
        JOIN nodes n ON n.id = e.source_id
        WHERE e.edge_type = 'has_description'
          AND (? IS NULL OR n.kind = ?)
        "#,
    )
    .bind(kind)
    .bind(kind)
    .fetch(store.pool());

    let mut skipped = 0usize;

    while let Some(row) = rows.try_next().await? {
        let owner_kind: String = row.try_get("owner_kind")?;
        let blob: Vec<u8> = row.try_get("embedding")?;
        let candidate = DescriptionCandidate {
            node_id: NodeId(row.try_get("owner_id")?),
            node_kind: owner_kind.parse().map_err(anyhow::Error::msg)?,
            description_id: NodeId(row.try_get("description_id")?),
            text: row.try_get("text")?,
            embedding: blob_to_vec(&blob),
        };
        let description_id = candidate.description_id;

        if let Err(e) = ranking.offer(candidate) {
            skipped += 1;
            tracing::warn!(description = description_id.0, error = %e, "skipping stored embedding");
        }
    }

    if skipped > 0 {
        tracing::warn!(skipped, "descriptions skipped during search");
    }
    Ok(ranking.finish())
}

/// CLI entry point for `fb search`.
pub async fn run_search(
    config: &Config,
    query: &str,
    filter: KindFilter,
    top_k: Option<usize>,
) -> Result<()> {
    let k = top_k.unwrap_or(config.search.top_k);
    let store = GraphStore::open(config).await?;
    let embedder = create_provider(&config.embedding)?;

    let vector = embedder
        .embed(query)
        .await
        .map_err(|e| CatalogError::ExternalServiceFailure(format!("{:#}", e)))?;
    validate_embedding(&vector, embedder.dims())?;

    let matches = search_descriptions(&store, &vector, filter, k).await?;
    if matches.is_empty() {
        println!("No results.");
        return Ok(());
    }

    for (i, m) in matches.iter().enumerate() {
        let label = match store.get_node(m.node_id).await? {
            Some(node) => node.label(),
            None => String::new(),
        };
        println!(
            "{}. [{:.4}] {} {}  {}",
            i + 1,
            m.score,
            m.node_kind,
            m.node_id,
            label
        );
        println!("    description {}: {}", m.description_id, m.text);
    }
    Ok(())
}
