//! Node inspection: `fb get` and `fb recent`.

use anyhow::Result;

use filebase_core::models::{Direction, Edge, Node, NodeData, NodeId, NodeKind};

use crate::config::Config;
use crate::graph::GraphStore;

/// A node together with its edges in both directions.
#[derive(Debug)]
pub struct NodeView {
    pub node: Node,
    pub outgoing: Vec<(Edge, Node)>,
    pub incoming: Vec<(Edge, Node)>,
}

pub async fn get_node_view(store: &GraphStore, id: NodeId) -> Result<NodeView> {
    let node = store.require_node(id).await?;
    let outgoing = store.traverse_edges(id, Direction::Outgoing, None).await?;
    let incoming = store.traverse_edges(id, Direction::Incoming, None).await?;
    Ok(NodeView {
        node,
        outgoing,
        incoming,
    })
}

pub async fn run_get(config: &Config, id: NodeId) -> Result<()> {
    let store = GraphStore::open(config).await?;
    let view = get_node_view(&store, id).await?;
    let node = &view.node;

    println!("--- Node ---");
    println!("id:          {}", node.id);
    println!("kind:        {}", node.kind());
    println!("inserted:    {}", node.inserted_ts.to_rfc3339());
    match &node.data {
        NodeData::File(f) => {
            println!("root_name:   {}", f.root_name);
            println!("revision:    {}", f.revision);
            println!("fingerprint: {}", f.fingerprint);
            println!("extension:   {}", f.extension);
            println!("size:        {}", f.size);
            println!("created:     {}", f.created_ts.to_rfc3339());
            println!("layout:      {}", f.layout);
            if let Some(meta) = &f.metadata {
                println!("metadata:    {}", meta);
            }
        }
        NodeData::VersionGroup => {}
        NodeData::Description(d) => {
            println!("text:        {}", d.text);
            println!("model:       {}", d.model);
            println!("dims:        {}", d.embedding.len());
        }
        NodeData::StorageDevice(d) => {
            println!("name:        {}", d.name);
            println!("capacity:    {}", d.capacity);
            println!("path:        {}", d.path);
        }
        NodeData::Collection(c) => {
            println!("name:        {}", c.name);
        }
    }
    println!();

    println!("--- Outgoing ({}) ---", view.outgoing.len());
    for (edge, other) in &view.outgoing {
        println!(
            "  -[{}]-> {} {}  {}",
            edge.edge_type,
            other.kind(),
            other.id,
            other.label()
        );
    }
    println!();

    println!("--- Incoming ({}) ---", view.incoming.len());
    for (edge, other) in &view.incoming {
        println!(
            "  <-[{}]- {} {}  {}",
            edge.edge_type,
            other.kind(),
            other.id,
            other.label()
        );
    }

    store.close().await;
    Ok(())
}

pub async fn run_recent(config: &Config, kind: Option<NodeKind>, limit: i64) -> Result<()> {
    let store = GraphStore::open(config).await?;
    let nodes = store.recent_nodes(kind, limit).await?;
    if nodes.is_empty() {
        println!("No nodes.");
        return Ok(());
    }
    for node in &nodes {
        println!(
            "{:>6}  {:<15} {}  {}",
            node.id,
            node.kind().as_str(),
            node.inserted_ts.format("%Y-%m-%d %H:%M"),
            node.label()
        );
    }
    store.close().await;
    Ok(())
}
