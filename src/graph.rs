//! SQLite-backed graph store.
//!
//! [`GraphStore`] is the explicit store handle: read operations run on a
//! pooled connection, mutations go through a [`GraphTx`] that commits all
//! or nothing. Dropping a `GraphTx` without calling [`GraphTx::commit`]
//! rolls it back.
//!
//! The store is the only component that mints node ids. Uniqueness
//! (fingerprint, device path, collection name, description text) is
//! enforced by the engine and surfaces as
//! [`CatalogError::ConstraintViolation`].
//!
//! | Operation | Purpose |
//! |-----------|---------|
//! | [`GraphTx::create_node`] | Insert a node header plus its kind's extension row |
//! | [`GraphTx::create_edge`] | Insert a typed edge between two existing nodes |
//! | [`GraphStore::find_node_by_unique_attr`] | Point lookup on a unique attribute |
//! | [`GraphStore::traverse_edges`] | Walk edges of one type from a node |

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, Sqlite, SqliteConnection, SqlitePool, Transaction};

use filebase_core::embedding::{blob_to_vec, vec_to_blob};
use filebase_core::models::{
    CollectionRecord, DescriptionRecord, Direction, Edge, EdgeType, FileRecord, Node, NodeData,
    NodeId, NodeKind, StorageDeviceRecord, UniqueAttr,
};
use filebase_core::CatalogError;

use crate::config::Config;
use crate::{db, migrate};

const NODE_COLUMNS: &str = r#"
    n.id, n.kind, n.inserted_ts,
    f.root_name, f.revision, f.fingerprint, f.extension, f.size, f.created_ts, f.layout,
    f.metadata_json,
    d.text, d.embedding, d.model,
    s.name AS device_name, s.capacity, s.path,
    c.name AS collection_name
"#;

const NODE_JOINS: &str = r#"
    LEFT JOIN files f ON f.id = n.id
    LEFT JOIN descriptions d ON d.id = n.id
    LEFT JOIN storage_devices s ON s.id = n.id
    LEFT JOIN collections c ON c.id = n.id
"#;

/// Explicit handle to the catalog database.
#[derive(Clone)]
pub struct GraphStore {
    pool: SqlitePool,
}

impl GraphStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to the configured database and bring the schema up to date.
    pub async fn open(config: &Config) -> Result<Self> {
        let pool = db::connect(config).await?;
        migrate::run_migrations(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn close(&self) {
        self.pool.close().await;
    }

    /// Start an all-or-nothing unit of work.
    pub async fn begin(&self) -> Result<GraphTx> {
        Ok(GraphTx {
            tx: self.pool.begin().await?,
        })
    }

    pub async fn get_node(&self, id: NodeId) -> Result<Option<Node>> {
        let mut conn = self.pool.acquire().await?;
        fetch_node(&mut conn, id).await
    }

    /// Like [`get_node`](Self::get_node) but a miss is
    /// [`CatalogError::NodeNotFound`].
    pub async fn require_node(&self, id: NodeId) -> Result<Node> {
        self.get_node(id)
            .await?
            .ok_or_else(|| CatalogError::NodeNotFound(format!("node {}", id)).into())
    }

    pub async fn find_node_by_unique_attr(&self, attr: UniqueAttr<'_>) -> Result<Option<Node>> {
        let mut conn = self.pool.acquire().await?;
        find_unique(&mut conn, attr).await
    }

    pub async fn traverse_edges(
        &self,
        id: NodeId,
        direction: Direction,
        edge_type: Option<EdgeType>,
    ) -> Result<Vec<(Edge, Node)>> {
        let mut conn = self.pool.acquire().await?;
        traverse(&mut conn, id, direction, edge_type).await
    }

    /// Most recently inserted nodes, newest first.
    pub async fn recent_nodes(&self, kind: Option<NodeKind>, limit: i64) -> Result<Vec<Node>> {
        let sql = format!(
            "SELECT {} FROM nodes n {} WHERE (? IS NULL OR n.kind = ?) ORDER BY n.id DESC LIMIT ?",
            NODE_COLUMNS, NODE_JOINS
        );
        let kind = kind.map(NodeKind::as_str);
        let rows = sqlx::query(&sql)
            .bind(kind)
            .bind(kind)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(node_from_row).collect()
    }

    /// Every node in id order.
    pub async fn all_nodes(&self) -> Result<Vec<Node>> {
        let sql = format!("SELECT {} FROM nodes n {} ORDER BY n.id", NODE_COLUMNS, NODE_JOINS);
        let rows = sqlx::query(&sql).fetch_all(&self.pool).await?;
        rows.iter().map(node_from_row).collect()
    }

    /// Every edge in insertion order.
    pub async fn all_edges(&self) -> Result<Vec<Edge>> {
        let rows = sqlx::query(
            "SELECT source_id, target_id, edge_type, inserted_ts AS edge_ts FROM edges \
             ORDER BY inserted_ts, source_id, target_id, edge_type",
        )
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(edge_from_row).collect()
    }
}

/// A scoped write transaction over the graph.
pub struct GraphTx {
    tx: Transaction<'static, Sqlite>,
}

impl GraphTx {
    /// Assign a new id and persist the node header and extension row.
    pub async fn create_node(&mut self, data: &NodeData) -> Result<NodeId> {
        let kind = data.kind();
        let now = Utc::now().timestamp();

        let result = sqlx::query("INSERT INTO nodes (kind, inserted_ts) VALUES (?, ?)")
            .bind(kind.as_str())
            .bind(now)
            .execute(&mut *self.tx)
            .await?;
        let id = NodeId(result.last_insert_rowid());

        let inserted = match data {
            NodeData::File(file) => {
                let metadata = file
                    .metadata
                    .as_ref()
                    .map(serde_json::to_string)
                    .transpose()?;
                let size = i64::try_from(file.size).context("file size exceeds i64")?;
                sqlx::query(
                    r#"
                    INSERT INTO files
                        (id, root_name, revision, fingerprint, extension, size, created_ts, layout, metadata_json)
                    VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
                    "#,
                )
                .bind(id.0)
                .bind(&file.root_name)
                .bind(i64::from(file.revision))
                .bind(&file.fingerprint)
                .bind(&file.extension)
                .bind(size)
                .bind(file.created_ts.timestamp())
                .bind(file.layout.as_str())
                .bind(metadata)
                .execute(&mut *self.tx)
                .await
            }
            NodeData::VersionGroup => {
                sqlx::query("INSERT INTO version_groups (id) VALUES (?)")
                    .bind(id.0)
                    .execute(&mut *self.tx)
                    .await
            }
            NodeData::Description(desc) => {
                sqlx::query(
                    "INSERT INTO descriptions (id, text, embedding, dims, model) VALUES (?, ?, ?, ?, ?)",
                )
                .bind(id.0)
                .bind(&desc.text)
                .bind(vec_to_blob(&desc.embedding))
                .bind(desc.embedding.len() as i64)
                .bind(&desc.model)
                .execute(&mut *self.tx)
                .await
            }
            NodeData::StorageDevice(dev) => {
                let capacity = i64::try_from(dev.capacity).context("capacity exceeds i64")?;
                sqlx::query(
                    "INSERT INTO storage_devices (id, name, capacity, path) VALUES (?, ?, ?, ?)",
                )
                .bind(id.0)
                .bind(&dev.name)
                .bind(capacity)
                .bind(&dev.path)
                .execute(&mut *self.tx)
                .await
            }
            NodeData::Collection(col) => {
                sqlx::query("INSERT INTO collections (id, name) VALUES (?, ?)")
                    .bind(id.0)
                    .bind(&col.name)
                    .execute(&mut *self.tx)
                    .await
            }
        };
        inserted.map_err(map_write_err)?;

        tracing::debug!(id = id.0, kind = kind.as_str(), "node created");
        Ok(id)
    }

    /// Insert `source -[edge_type]-> target`.
    ///
    /// Fails with [`CatalogError::DanglingReference`] if an endpoint is
    /// missing, [`CatalogError::WrongNodeKind`] if an endpoint's kind does
    /// not fit the edge type, and [`CatalogError::DuplicateEdge`] if the
    /// triple already exists.
    pub async fn create_edge(
        &mut self,
        source: NodeId,
        target: NodeId,
        edge_type: EdgeType,
    ) -> Result<Edge> {
        let source_kind = node_kind(&mut self.tx, source)
            .await?
            .ok_or(CatalogError::DanglingReference { node: source })?;
        let target_kind = node_kind(&mut self.tx, target)
            .await?
            .ok_or(CatalogError::DanglingReference { node: target })?;

        let (want_source, want_target) = edge_type.endpoint_kinds();
        if let Some(expected) = want_source {
            if source_kind != expected {
                return Err(CatalogError::WrongNodeKind {
                    node: source,
                    expected,
                    actual: source_kind,
                }
                .into());
            }
        }
        if target_kind != want_target {
            return Err(CatalogError::WrongNodeKind {
                node: target,
                expected: want_target,
                actual: target_kind,
            }
            .into());
        }

        let duplicate = CatalogError::DuplicateEdge {
            source_id: source,
            target,
            edge_type,
        };
        let exists: bool = sqlx::query_scalar(
            "SELECT COUNT(*) > 0 FROM edges WHERE source_id = ? AND target_id = ? AND edge_type = ?",
        )
        .bind(source.0)
        .bind(target.0)
        .bind(edge_type.as_str())
        .fetch_one(&mut *self.tx)
        .await?;
        if exists {
            return Err(duplicate.clone().into());
        }

        let now = Utc::now();
        sqlx::query(
            "INSERT INTO edges (source_id, target_id, edge_type, inserted_ts) VALUES (?, ?, ?, ?)",
        )
        .bind(source.0)
        .bind(target.0)
        .bind(edge_type.as_str())
        .bind(now.timestamp())
        .execute(&mut *self.tx)
        .await
        .map_err(|e| match unique_violation(&e) {
            Some(_) => duplicate.into(),
            None => anyhow::Error::from(e),
        })?;

        tracing::debug!(
            source = source.0,
            target = target.0,
            edge_type = edge_type.as_str(),
            "edge created"
        );
        Ok(Edge {
            source,
            target,
            edge_type,
            inserted_ts: ts_to_datetime(now.timestamp()),
        })
    }

    pub async fn get_node(&mut self, id: NodeId) -> Result<Option<Node>> {
        fetch_node(&mut self.tx, id).await
    }

    pub async fn find_node_by_unique_attr(&mut self, attr: UniqueAttr<'_>) -> Result<Option<Node>> {
        find_unique(&mut self.tx, attr).await
    }

    pub async fn traverse_edges(
        &mut self,
        id: NodeId,
        direction: Direction,
        edge_type: Option<EdgeType>,
    ) -> Result<Vec<(Edge, Node)>> {
        traverse(&mut self.tx, id, direction, edge_type).await
    }

    pub async fn commit(self) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    pub async fn rollback(self) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}

/// `true` when `err` means another writer got there first: the fingerprint
/// unique constraint fired, or SQLite reported the database busy/locked.
pub fn is_write_contention(err: &anyhow::Error) -> bool {
    if let Some(CatalogError::ConstraintViolation { constraint }) =
        err.downcast_ref::<CatalogError>()
    {
        return constraint == UniqueAttr::Fingerprint("").column();
    }
    err.chain().any(|cause| match cause.downcast_ref::<sqlx::Error>() {
        Some(sqlx::Error::Database(db)) => db
            .code()
            .and_then(|c| c.parse::<i32>().ok())
            .is_some_and(|code| matches!(code & 0xff, 5 | 6)),
        _ => false,
    })
}

fn unique_violation(err: &sqlx::Error) -> Option<String> {
    match err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            let msg = db.message();
            Some(msg.rsplit(": ").next().unwrap_or(msg).to_string())
        }
        _ => None,
    }
}

fn map_write_err(err: sqlx::Error) -> anyhow::Error {
    match unique_violation(&err) {
        Some(constraint) => CatalogError::ConstraintViolation { constraint }.into(),
        None => err.into(),
    }
}

fn ts_to_datetime(ts: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(ts, 0).unwrap_or_default()
}

async fn node_kind(conn: &mut SqliteConnection, id: NodeId) -> Result<Option<NodeKind>> {
    let kind: Option<String> = sqlx::query_scalar("SELECT kind FROM nodes WHERE id = ?")
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?;
    kind.map(|k| k.parse::<NodeKind>().map_err(anyhow::Error::msg))
        .transpose()
}

async fn fetch_node(conn: &mut SqliteConnection, id: NodeId) -> Result<Option<Node>> {
    let sql = format!("SELECT {} FROM nodes n {} WHERE n.id = ?", NODE_COLUMNS, NODE_JOINS);
    let row = sqlx::query(&sql)
        .bind(id.0)
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(node_from_row).transpose()
}

async fn find_unique(conn: &mut SqliteConnection, attr: UniqueAttr<'_>) -> Result<Option<Node>> {
    let column = match attr {
        UniqueAttr::Fingerprint(_) => "f.fingerprint",
        UniqueAttr::DevicePath(_) => "s.path",
        UniqueAttr::CollectionName(_) => "c.name",
        UniqueAttr::DescriptionText(_) => "d.text",
    };
    let sql = format!(
        "SELECT {} FROM nodes n {} WHERE {} = ?",
        NODE_COLUMNS, NODE_JOINS, column
    );
    let row = sqlx::query(&sql)
        .bind(attr.value())
        .fetch_optional(&mut *conn)
        .await?;
    row.as_ref().map(node_from_row).transpose()
}

async fn traverse(
    conn: &mut SqliteConnection,
    id: NodeId,
    direction: Direction,
    edge_type: Option<EdgeType>,
) -> Result<Vec<(Edge, Node)>> {
    let (anchor, other) = match direction {
        Direction::Outgoing => ("e.source_id", "e.target_id"),
        Direction::Incoming => ("e.target_id", "e.source_id"),
    };
    let sql = format!(
        r#"
        SELECT e.source_id, e.target_id, e.edge_type, e.inserted_ts AS edge_ts, {columns}
        FROM edges e
        JOIN nodes n ON n.id = {other}
        {joins}
        WHERE {anchor} = ? AND (? IS NULL OR e.edge_type = ?)
        ORDER BY e.inserted_ts, n.id
        "#,
        columns = NODE_COLUMNS,
        joins = NODE_JOINS,
        other = other,
        anchor = anchor,
    );
    let edge_type = edge_type.map(EdgeType::as_str);
    let rows = sqlx::query(&sql)
        .bind(id.0)
        .bind(edge_type)
        .bind(edge_type)
        .fetch_all(&mut *conn)
        .await?;

    rows.iter()
        .map(|row| Ok((edge_from_row(row)?, node_from_row(row)?)))
        .collect()
}

fn edge_from_row(row: &SqliteRow) -> Result<Edge> {
    let edge_type: String = row.try_get("edge_type")?;
    Ok(Edge {
        source: NodeId(row.try_get("source_id")?),
        target: NodeId(row.try_get("target_id")?),
        edge_type: edge_type.parse().map_err(anyhow::Error::msg)?,
        inserted_ts: ts_to_datetime(row.try_get("edge_ts")?),
    })
}

/// Decode a row selected with `NODE_COLUMNS`, dispatching on `kind`.
fn node_from_row(row: &SqliteRow) -> Result<Node> {
    let id = NodeId(row.try_get("id")?);
    let kind: String = row.try_get("kind")?;
    let kind: NodeKind = kind.parse().map_err(anyhow::Error::msg)?;
    let missing = || anyhow::anyhow!("node {} has no {} row", id, kind.table());

    let data = match kind {
        NodeKind::File => {
            let fingerprint: Option<String> = row.try_get("fingerprint")?;
            let metadata: Option<String> = row.try_get("metadata_json")?;
            let revision: i64 = row.try_get::<Option<i64>, _>("revision")?.unwrap_or(0);
            let size: i64 = row.try_get::<Option<i64>, _>("size")?.unwrap_or(0);
            let layout: Option<String> = row.try_get("layout")?;
            NodeData::File(FileRecord {
                root_name: row.try_get::<Option<String>, _>("root_name")?.unwrap_or_default(),
                revision: u32::try_from(revision).context("revision out of range")?,
                fingerprint: fingerprint.ok_or_else(missing)?,
                extension: row.try_get::<Option<String>, _>("extension")?.unwrap_or_default(),
                size: u64::try_from(size).context("size out of range")?,
                created_ts: ts_to_datetime(
                    row.try_get::<Option<i64>, _>("created_ts")?.unwrap_or(0),
                ),
                layout: layout
                    .as_deref()
                    .map(str::parse)
                    .transpose()
                    .map_err(anyhow::Error::msg)?
                    .unwrap_or_default(),
                metadata: metadata.map(|m| serde_json::from_str(&m)).transpose()?,
            })
        }
        NodeKind::VersionGroup => NodeData::VersionGroup,
        NodeKind::Description => {
            let text: Option<String> = row.try_get("text")?;
            let blob: Option<Vec<u8>> = row.try_get("embedding")?;
            NodeData::Description(DescriptionRecord {
                text: text.ok_or_else(missing)?,
                embedding: blob.map(|b| blob_to_vec(&b)).unwrap_or_default(),
                model: row.try_get::<Option<String>, _>("model")?.unwrap_or_default(),
            })
        }
        NodeKind::StorageDevice => {
            let path: Option<String> = row.try_get("path")?;
            let capacity: i64 = row.try_get::<Option<i64>, _>("capacity")?.unwrap_or(0);
            NodeData::StorageDevice(StorageDeviceRecord {
                name: row.try_get::<Option<String>, _>("device_name")?.unwrap_or_default(),
                capacity: u64::try_from(capacity).unwrap_or(0),
                path: path.ok_or_else(missing)?,
            })
        }
        NodeKind::Collection => {
            let name: Option<String> = row.try_get("collection_name")?;
            NodeData::Collection(CollectionRecord {
                name: name.ok_or_else(missing)?,
            })
        }
    };

    Ok(Node {
        id,
        inserted_ts: ts_to_datetime(row.try_get("inserted_ts")?),
        data,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn store() -> (TempDir, GraphStore) {
        let tmp = TempDir::new().unwrap();
        let pool = db::connect_path(&tmp.path().join("graph.sqlite")).await.unwrap();
        migrate::run_migrations(&pool).await.unwrap();
        (tmp, GraphStore::new(pool))
    }

    fn file(fingerprint: &str) -> NodeData {
        NodeData::File(FileRecord {
            root_name: "report".into(),
            revision: 1,
            fingerprint: fingerprint.into(),
            extension: "txt".into(),
            size: 12,
            created_ts: ts_to_datetime(1_700_000_000),
            layout: Default::default(),
            metadata: Some(serde_json::json!({"camera": "x100"})),
        })
    }

    fn collection(name: &str) -> NodeData {
        NodeData::Collection(CollectionRecord { name: name.into() })
    }

    #[tokio::test]
    async fn create_and_read_back_nodes() {
        let (_tmp, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let a = tx.create_node(&file("aa")).await.unwrap();
        let desc = tx
            .create_node(&NodeData::Description(DescriptionRecord {
                text: "quarterly report".into(),
                embedding: vec![0.5, -1.0, 2.0],
                model: "test".into(),
            }))
            .await
            .unwrap();
        tx.commit().await.unwrap();
        assert!(desc > a);

        let node = store.require_node(a).await.unwrap();
        assert_eq!(node.kind(), NodeKind::File);
        assert_eq!(node.data, file("aa"));

        let d = store.require_node(desc).await.unwrap();
        assert_eq!(d.as_description().unwrap().embedding, vec![0.5, -1.0, 2.0]);

        let err = store.require_node(NodeId(999)).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::NodeNotFound(_))
        ));
    }

    #[tokio::test]
    async fn duplicate_fingerprint_is_constraint_violation() {
        let (_tmp, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        tx.create_node(&file("same")).await.unwrap();
        let err = tx.create_node(&file("same")).await.unwrap_err();
        assert_eq!(
            err.downcast_ref::<CatalogError>(),
            Some(&CatalogError::ConstraintViolation {
                constraint: "files.fingerprint".into()
            })
        );
        assert!(is_write_contention(&err));
    }

    #[tokio::test]
    async fn duplicate_collection_name_is_not_contention() {
        let (_tmp, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        tx.create_node(&collection("trips")).await.unwrap();
        let err = tx.create_node(&collection("trips")).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<CatalogError>(),
            Some(CatalogError::ConstraintViolation { .. })
        ));
        assert!(!is_write_contention(&err));
    }

    #[tokio::test]
    async fn dropped_transaction_rolls_back() {
        let (_tmp, store) = store().await;
        {
            let mut tx = store.begin().await.unwrap();
            tx.create_node(&file("gone")).await.unwrap();
        }
        let found = store
            .find_node_by_unique_attr(UniqueAttr::Fingerprint("gone"))
            .await
            .unwrap();
        assert!(found.is_none());
        assert!(store.all_nodes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn edge_invariants() {
        let (_tmp, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let f = tx.create_node(&file("f1")).await.unwrap();
        let c = tx.create_node(&collection("album")).await.unwrap();

        tx.create_edge(f, c, EdgeType::InCollection).await.unwrap();

        let dup = tx.create_edge(f, c, EdgeType::InCollection).await.unwrap_err();
        assert_eq!(
            dup.downcast_ref::<CatalogError>(),
            Some(&CatalogError::DuplicateEdge {
                source_id: f,
                target: c,
                edge_type: EdgeType::InCollection
            })
        );

        let dangling = tx
            .create_edge(f, NodeId(4040), EdgeType::InCollection)
            .await
            .unwrap_err();
        assert_eq!(
            dangling.downcast_ref::<CatalogError>(),
            Some(&CatalogError::DanglingReference { node: NodeId(4040) })
        );

        let wrong = tx.create_edge(f, c, EdgeType::StoredOn).await.unwrap_err();
        assert!(matches!(
            wrong.downcast_ref::<CatalogError>(),
            Some(CatalogError::WrongNodeKind { .. })
        ));
        tx.commit().await.unwrap();
    }

    #[tokio::test]
    async fn traversal_in_both_directions() {
        let (_tmp, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let a = tx.create_node(&file("a")).await.unwrap();
        let b = tx.create_node(&file("b")).await.unwrap();
        let group = tx.create_node(&NodeData::VersionGroup).await.unwrap();
        tx.create_edge(a, group, EdgeType::InVersionGroup).await.unwrap();
        tx.create_edge(b, group, EdgeType::InVersionGroup).await.unwrap();
        tx.create_edge(b, a, EdgeType::ProxyOf).await.unwrap();

        let inside = tx
            .traverse_edges(a, Direction::Outgoing, Some(EdgeType::InVersionGroup))
            .await
            .unwrap();
        assert_eq!(inside.len(), 1);
        assert_eq!(inside[0].1.id, group);
        tx.commit().await.unwrap();

        let members = store
            .traverse_edges(group, Direction::Incoming, Some(EdgeType::InVersionGroup))
            .await
            .unwrap();
        let ids: Vec<NodeId> = members.iter().map(|(_, n)| n.id).collect();
        assert_eq!(ids, vec![a, b]);

        let all_out_of_b = store
            .traverse_edges(b, Direction::Outgoing, None)
            .await
            .unwrap();
        assert_eq!(all_out_of_b.len(), 2);

        let proxies = store
            .traverse_edges(a, Direction::Incoming, Some(EdgeType::ProxyOf))
            .await
            .unwrap();
        assert_eq!(proxies[0].0.source, b);

        assert_eq!(store.all_edges().await.unwrap().len(), 3);
    }

    #[tokio::test]
    async fn unique_lookups_by_kind() {
        let (_tmp, store) = store().await;
        let mut tx = store.begin().await.unwrap();
        let dev = tx
            .create_node(&NodeData::StorageDevice(StorageDeviceRecord {
                name: "wdman".into(),
                capacity: 23094,
                path: "/mnt/intake".into(),
            }))
            .await
            .unwrap();
        tx.create_node(&collection("journal")).await.unwrap();
        tx.commit().await.unwrap();

        let found = store
            .find_node_by_unique_attr(UniqueAttr::DevicePath("/mnt/intake"))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, dev);
        assert_eq!(found.as_storage_device().unwrap().name, "wdman");

        assert!(store
            .find_node_by_unique_attr(UniqueAttr::CollectionName("journal"))
            .await
            .unwrap()
            .is_some());
        assert!(store
            .find_node_by_unique_attr(UniqueAttr::CollectionName("missing"))
            .await
            .unwrap()
            .is_none());

        let recent = store.recent_nodes(Some(NodeKind::Collection), 5).await.unwrap();
        assert_eq!(recent.len(), 1);
        let everything = store.recent_nodes(None, 5).await.unwrap();
        assert_eq!(everything.len(), 2);
        assert!(everything[0].id > everything[1].id);
    }
}
