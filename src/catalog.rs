//! Catalog maintenance operations outside the ingestion pipeline.
//!
//! Collections, storage devices, after-the-fact descriptions and
//! derivation edges. Description handling is shared with ingestion:
//! [`prepare_description`] does the embedding call before any transaction
//! opens, [`attach_description`] does the graph writes inside one.

use anyhow::{bail, Result};

use filebase_core::embedding::{validate_embedding, EmbeddingProvider};
use filebase_core::models::{
    CollectionRecord, DescriptionRecord, Direction, EdgeType, Node, NodeData, NodeId, NodeKind,
    StorageDeviceRecord, UniqueAttr,
};
use filebase_core::CatalogError;

use crate::config::{Config, StorageConfig};
use crate::embedding::create_provider;
use crate::graph::{GraphStore, GraphTx};

/// Description text ready to attach.
#[derive(Debug, Clone)]
pub struct PreparedDescription {
    pub text: String,
    /// `None` when the text is already cataloged and will be reused.
    embedding: Option<(Vec<f32>, String)>,
}

impl PreparedDescription {
    pub fn reuses_existing(&self) -> bool {
        self.embedding.is_none()
    }
}

/// Normalize `text` and obtain its embedding unless identical text is
/// already cataloged.
///
/// Any provider failure becomes [`CatalogError::ExternalServiceFailure`];
/// a vector of the wrong size or zero norm is rejected before it can be
/// committed.
pub async fn prepare_description(
    store: &GraphStore,
    embedder: &dyn EmbeddingProvider,
    text: &str,
) -> Result<PreparedDescription> {
    let text = text.trim();
    if text.is_empty() {
        bail!("description text is empty");
    }

    if store
        .find_node_by_unique_attr(UniqueAttr::DescriptionText(text))
        .await?
        .is_some()
    {
        tracing::debug!("description text already cataloged, reusing");
        return Ok(PreparedDescription {
            text: text.to_string(),
            embedding: None,
        });
    }

    let vector = embedder
        .embed(text)
        .await
        .map_err(|e| CatalogError::ExternalServiceFailure(format!("{:#}", e)))?;
    validate_embedding(&vector, embedder.dims())?;

    Ok(PreparedDescription {
        text: text.to_string(),
        embedding: Some((vector, embedder.model_name().to_string())),
    })
}

/// Link `owner` to the description, creating the Description node unless
/// the text already exists. Returns the Description's id.
pub async fn attach_description(
    tx: &mut GraphTx,
    owner: NodeId,
    prepared: &PreparedDescription,
) -> Result<NodeId> {
    let existing = tx
        .find_node_by_unique_attr(UniqueAttr::DescriptionText(&prepared.text))
        .await?;

    let description = match (existing, &prepared.embedding) {
        (Some(node), _) => node.id,
        (None, Some((embedding, model))) => {
            tx.create_node(&NodeData::Description(DescriptionRecord {
                text: prepared.text.clone(),
                embedding: embedding.clone(),
                model: model.clone(),
            }))
            .await?
        }
        (None, None) => {
            return Err(CatalogError::NodeNotFound(format!(
                "description '{}'",
                prepared.text
            ))
            .into())
        }
    };

    tx.create_edge(owner, description, EdgeType::HasDescription)
        .await?;
    Ok(description)
}

/// Find the storage device at `path`, registering it if absent.
pub async fn ensure_device(
    tx: &mut GraphTx,
    name: &str,
    capacity: u64,
    path: &str,
) -> Result<NodeId> {
    if let Some(node) = tx
        .find_node_by_unique_attr(UniqueAttr::DevicePath(path))
        .await?
    {
        return Ok(node.id);
    }
    let id = tx
        .create_node(&NodeData::StorageDevice(StorageDeviceRecord {
            name: name.to_string(),
            capacity,
            path: path.to_string(),
        }))
        .await?;
    tracing::info!(id = id.0, path, "storage device registered");
    Ok(id)
}

/// The intake device as configured.
pub async fn ensure_intake_device(tx: &mut GraphTx, storage: &StorageConfig) -> Result<NodeId> {
    let path = storage.intake_path.to_string_lossy();
    ensure_device(tx, &storage.intake_name, storage.intake_capacity, &path).await
}

/// The device a File is stored on.
pub async fn device_of(store: &GraphStore, file: NodeId) -> Result<Node> {
    store
        .traverse_edges(file, Direction::Outgoing, Some(EdgeType::StoredOn))
        .await?
        .into_iter()
        .map(|(_, device)| device)
        .next()
        .ok_or_else(|| CatalogError::NodeNotFound(format!("storage device for node {}", file)).into())
}

pub async fn create_collection(
    store: &GraphStore,
    embedder: &dyn EmbeddingProvider,
    name: &str,
    description: Option<&str>,
) -> Result<(NodeId, Option<NodeId>)> {
    let name = name.trim();
    if name.is_empty() {
        bail!("collection name is empty");
    }
    let prepared = match description {
        Some(text) => Some(prepare_description(store, embedder, text).await?),
        None => None,
    };

    let mut tx = store.begin().await?;
    let id = tx
        .create_node(&NodeData::Collection(CollectionRecord {
            name: name.to_string(),
        }))
        .await?;
    let description = match &prepared {
        Some(p) => Some(attach_description(&mut tx, id, p).await?),
        None => None,
    };
    tx.commit().await?;
    Ok((id, description))
}

/// Attach a description to an existing File or Collection.
pub async fn describe(
    store: &GraphStore,
    embedder: &dyn EmbeddingProvider,
    owner: NodeId,
    text: &str,
) -> Result<NodeId> {
    let node = store.require_node(owner).await?;
    if !matches!(node.kind(), NodeKind::File | NodeKind::Collection) {
        return Err(CatalogError::WrongNodeKind {
            node: owner,
            expected: NodeKind::File,
            actual: node.kind(),
        }
        .into());
    }

    let prepared = prepare_description(store, embedder, text).await?;
    let mut tx = store.begin().await?;
    let description = attach_description(&mut tx, owner, &prepared).await?;
    tx.commit().await?;
    Ok(description)
}

/// Record a File → File derivation edge.
pub async fn relate(
    store: &GraphStore,
    source: NodeId,
    target: NodeId,
    edge_type: EdgeType,
) -> Result<()> {
    if !edge_type.is_lineage() {
        bail!(
            "'{}' is not a derivation edge type (expected camera_jpeg, proxy_of or crop_of)",
            edge_type
        );
    }
    if source == target {
        bail!("a file cannot be derived from itself");
    }
    let mut tx = store.begin().await?;
    tx.create_edge(source, target, edge_type).await?;
    tx.commit().await
}

pub async fn add_device(store: &GraphStore, name: &str, capacity: u64, path: &str) -> Result<NodeId> {
    let mut tx = store.begin().await?;
    let id = tx
        .create_node(&NodeData::StorageDevice(StorageDeviceRecord {
            name: name.to_string(),
            capacity,
            path: path.to_string(),
        }))
        .await?;
    tx.commit().await?;
    Ok(id)
}

// ============ CLI entry points ============

/// Create the schema and register the intake device. Idempotent.
pub async fn run_init(config: &Config) -> Result<()> {
    let store = GraphStore::open(config).await?;
    std::fs::create_dir_all(&config.storage.intake_path)?;
    let mut tx = store.begin().await?;
    let device = ensure_intake_device(&mut tx, &config.storage).await?;
    tx.commit().await?;
    println!("Catalog initialized at {}.", config.db.path.display());
    println!(
        "  intake device {}: {}",
        device,
        config.storage.intake_path.display()
    );
    store.close().await;
    Ok(())
}

pub async fn run_collection_create(
    config: &Config,
    name: &str,
    description: Option<&str>,
) -> Result<()> {
    let store = GraphStore::open(config).await?;
    let embedder = create_provider(&config.embedding)?;
    let (id, desc) = create_collection(&store, embedder.as_ref(), name, description).await?;
    println!("collection {} created: {}", name, id);
    if let Some(desc) = desc {
        println!("  description: {}", desc);
    }
    Ok(())
}

pub async fn run_describe(config: &Config, owner: NodeId, text: &str) -> Result<()> {
    let store = GraphStore::open(config).await?;
    let embedder = create_provider(&config.embedding)?;
    let desc = describe(&store, embedder.as_ref(), owner, text).await?;
    println!("description {} attached to {}", desc, owner);
    Ok(())
}

pub async fn run_relate(
    config: &Config,
    source: NodeId,
    target: NodeId,
    edge_type: EdgeType,
) -> Result<()> {
    let store = GraphStore::open(config).await?;
    relate(&store, source, target, edge_type).await?;
    println!("{} -[{}]-> {}", source, edge_type, target);
    Ok(())
}

pub async fn run_device_add(config: &Config, name: &str, capacity: u64, path: &str) -> Result<()> {
    let store = GraphStore::open(config).await?;
    let id = add_device(&store, name, capacity, path).await?;
    println!("device {} registered: {}", name, id);
    Ok(())
}

pub async fn run_device_list(config: &Config) -> Result<()> {
    let store = GraphStore::open(config).await?;
    let devices = store
        .recent_nodes(Some(NodeKind::StorageDevice), i64::MAX)
        .await?;
    if devices.is_empty() {
        println!("No storage devices.");
        return Ok(());
    }
    for node in devices.iter().rev() {
        if let Some(dev) = node.as_storage_device() {
            let stored = store
                .traverse_edges(node.id, Direction::Incoming, Some(EdgeType::StoredOn))
                .await?
                .len();
            println!(
                "{:>6}  {:<16} {:<40} capacity={} files={}",
                node.id, dev.name, dev.path, dev.capacity, stored
            );
        }
    }
    Ok(())
}
