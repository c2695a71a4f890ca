//! Export the catalog as JSON files.
//!
//! Each node is written to `<dir>/<kind>/<shard>/<id>.json` using the
//! shard layout, so no directory grows past a hundred entries. Edges go to
//! a single `<dir>/edges.jsonl`, one JSON object per line.

use anyhow::{Context, Result};
use serde::Serialize;
use std::io::Write;
use std::path::Path;

use filebase_core::models::Node;
use filebase_core::shard::ensure_shard_path;

use crate::config::Config;
use crate::graph::GraphStore;

#[derive(Serialize)]
struct ExportNode<'a> {
    #[serde(flatten)]
    node: &'a Node,
    /// Description embeddings are exported alongside the text.
    #[serde(skip_serializing_if = "Option::is_none")]
    embedding: Option<&'a [f32]>,
}

#[derive(Debug, Default, PartialEq, Eq)]
pub struct ExportSummary {
    pub nodes: usize,
    pub edges: usize,
}

pub async fn export_catalog(store: &GraphStore, dir: &Path) -> Result<ExportSummary> {
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create export directory: {}", dir.display()))?;

    let nodes = store.all_nodes().await?;
    for node in &nodes {
        let root = dir.join(node.kind().as_str());
        let path = ensure_shard_path(&root, node.id.0.unsigned_abs(), "json")?;
        let record = ExportNode {
            node,
            embedding: node.as_description().map(|d| d.embedding.as_slice()),
        };
        let json = serde_json::to_string_pretty(&record)?;
        std::fs::write(&path, json)
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }

    let edges = store.all_edges().await?;
    let edges_path = dir.join("edges.jsonl");
    let mut out = std::io::BufWriter::new(
        std::fs::File::create(&edges_path)
            .with_context(|| format!("Failed to create {}", edges_path.display()))?,
    );
    for edge in &edges {
        serde_json::to_writer(&mut out, edge)?;
        out.write_all(b"\n")?;
    }
    out.flush()?;

    Ok(ExportSummary {
        nodes: nodes.len(),
        edges: edges.len(),
    })
}

pub async fn run_export(config: &Config, dir: &Path) -> Result<()> {
    let store = GraphStore::open(config).await?;
    let summary = export_catalog(&store, dir).await?;
    println!(
        "exported {} nodes and {} edges to {}",
        summary.nodes,
        summary.edges,
        dir.display()
    );
    store.close().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use filebase_core::models::{CollectionRecord, DescriptionRecord, EdgeType, NodeData};

    #[tokio::test]
    async fn writes_sharded_nodes_and_edge_lines() {
        let tmp = tempfile::TempDir::new().unwrap();
        let pool = crate::db::connect_path(&tmp.path().join("export.sqlite"))
            .await
            .unwrap();
        crate::migrate::run_migrations(&pool).await.unwrap();
        let store = GraphStore::new(pool);

        let mut tx = store.begin().await.unwrap();
        let col = tx
            .create_node(&NodeData::Collection(CollectionRecord {
                name: "trips".into(),
            }))
            .await
            .unwrap();
        let desc = tx
            .create_node(&NodeData::Description(DescriptionRecord {
                text: "road trips".into(),
                embedding: vec![0.5, 0.5],
                model: "m".into(),
            }))
            .await
            .unwrap();
        tx.create_edge(col, desc, EdgeType::HasDescription)
            .await
            .unwrap();
        tx.commit().await.unwrap();

        let out = tmp.path().join("out");
        let summary = export_catalog(&store, &out).await.unwrap();
        assert_eq!(summary, ExportSummary { nodes: 2, edges: 1 });

        let col_json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(out.join(format!("collection/0/{}.json", col))).unwrap(),
        )
        .unwrap();
        assert_eq!(col_json["kind"], "collection");
        assert_eq!(col_json["name"], "trips");

        let desc_json: serde_json::Value = serde_json::from_str(
            &std::fs::read_to_string(out.join(format!("description/0/{}.json", desc))).unwrap(),
        )
        .unwrap();
        assert_eq!(desc_json["embedding"][1], 0.5);

        let edges = std::fs::read_to_string(out.join("edges.jsonl")).unwrap();
        let line: serde_json::Value = serde_json::from_str(edges.lines().next().unwrap()).unwrap();
        assert_eq!(line["edge_type"], "has_description");
        assert_eq!(line["source"], col.0);
    }
}
