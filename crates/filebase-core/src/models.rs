//! Core data model for the catalog graph.
//!
//! Every addressable entity is a [`Node`]: a shared header (identity, kind,
//! insertion time) plus a kind-specific payload in [`NodeData`]. Nodes are
//! related only through typed, directed [`Edge`]s.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Identity of a node. Assigned by the graph store, monotonically increasing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

impl NodeId {
    pub fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for NodeId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse::<i64>().map(NodeId)
    }
}

/// The closed set of node kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    VersionGroup,
    Description,
    StorageDevice,
    Collection,
}

impl NodeKind {
    pub const ALL: [NodeKind; 5] = [
        NodeKind::File,
        NodeKind::VersionGroup,
        NodeKind::Description,
        NodeKind::StorageDevice,
        NodeKind::Collection,
    ];

    /// Tag stored in `nodes.kind`.
    pub fn as_str(self) -> &'static str {
        match self {
            NodeKind::File => "file",
            NodeKind::VersionGroup => "version_group",
            NodeKind::Description => "description",
            NodeKind::StorageDevice => "storage_device",
            NodeKind::Collection => "collection",
        }
    }

    /// Name of the extension table holding this kind's attributes.
    pub fn table(self) -> &'static str {
        match self {
            NodeKind::File => "files",
            NodeKind::VersionGroup => "version_groups",
            NodeKind::Description => "descriptions",
            NodeKind::StorageDevice => "storage_devices",
            NodeKind::Collection => "collections",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NodeKind::ALL
            .into_iter()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown node kind: '{}'", s))
    }
}

/// How a File's content is laid out on its storage device.
///
/// Recorded per file at ingest, so changing the configured layout later
/// never loses track of content placed under the previous one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Layout {
    /// `<device>/<fingerprint>`
    #[default]
    Fingerprint,
    /// `<device>/<id / 100>/<id>.<ext>`
    Sharded,
}

impl Layout {
    /// Tag stored in `files.layout`.
    pub fn as_str(self) -> &'static str {
        match self {
            Layout::Fingerprint => "fingerprint",
            Layout::Sharded => "sharded",
        }
    }
}

impl fmt::Display for Layout {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Layout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "fingerprint" => Ok(Layout::Fingerprint),
            "sharded" => Ok(Layout::Sharded),
            other => Err(format!("unknown layout: '{}'", other)),
        }
    }
}

/// Attributes of a file revision.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileRecord {
    /// Stable logical name shared by every revision of the file.
    pub root_name: String,
    /// 1-based position within the file's version chain.
    pub revision: u32,
    /// Lowercase hex SHA-256 of the content. Unique catalog-wide.
    pub fingerprint: String,
    /// Lowercased extension without the leading dot; may be empty.
    pub extension: String,
    pub size: u64,
    pub created_ts: DateTime<Utc>,
    /// Layout the content was placed with on its device.
    pub layout: Layout,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
}

/// Free text plus its embedding.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DescriptionRecord {
    pub text: String,
    #[serde(skip)]
    pub embedding: Vec<f32>,
    pub model: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StorageDeviceRecord {
    pub name: String,
    pub capacity: u64,
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CollectionRecord {
    pub name: String,
}

/// Kind-specific payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum NodeData {
    File(FileRecord),
    VersionGroup,
    Description(DescriptionRecord),
    StorageDevice(StorageDeviceRecord),
    Collection(CollectionRecord),
}

impl NodeData {
    pub fn kind(&self) -> NodeKind {
        match self {
            NodeData::File(_) => NodeKind::File,
            NodeData::VersionGroup => NodeKind::VersionGroup,
            NodeData::Description(_) => NodeKind::Description,
            NodeData::StorageDevice(_) => NodeKind::StorageDevice,
            NodeData::Collection(_) => NodeKind::Collection,
        }
    }
}

/// A node as read back from the store.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Node {
    pub id: NodeId,
    pub inserted_ts: DateTime<Utc>,
    #[serde(flatten)]
    pub data: NodeData,
}

impl Node {
    pub fn kind(&self) -> NodeKind {
        self.data.kind()
    }

    pub fn as_file(&self) -> Option<&FileRecord> {
        match &self.data {
            NodeData::File(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_description(&self) -> Option<&DescriptionRecord> {
        match &self.data {
            NodeData::Description(d) => Some(d),
            _ => None,
        }
    }

    pub fn as_storage_device(&self) -> Option<&StorageDeviceRecord> {
        match &self.data {
            NodeData::StorageDevice(d) => Some(d),
            _ => None,
        }
    }

    /// Short human label used by CLI listings.
    pub fn label(&self) -> String {
        match &self.data {
            NodeData::File(f) if f.extension.is_empty() => {
                format!("{} (rev {})", f.root_name, f.revision)
            }
            NodeData::File(f) => format!("{}.{} (rev {})", f.root_name, f.extension, f.revision),
            NodeData::VersionGroup => "version group".to_string(),
            NodeData::Description(d) => d.text.clone(),
            NodeData::StorageDevice(d) => format!("{} @ {}", d.name, d.path),
            NodeData::Collection(c) => c.name.clone(),
        }
    }
}

/// Relationship vocabulary. Closed set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    HasDescription,
    InVersionGroup,
    StoredOn,
    InCollection,
    CameraJpeg,
    ProxyOf,
    CropOf,
}

impl EdgeType {
    pub const ALL: [EdgeType; 7] = [
        EdgeType::HasDescription,
        EdgeType::InVersionGroup,
        EdgeType::StoredOn,
        EdgeType::InCollection,
        EdgeType::CameraJpeg,
        EdgeType::ProxyOf,
        EdgeType::CropOf,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EdgeType::HasDescription => "has_description",
            EdgeType::InVersionGroup => "in_version_group",
            EdgeType::StoredOn => "stored_on",
            EdgeType::InCollection => "in_collection",
            EdgeType::CameraJpeg => "camera_jpeg",
            EdgeType::ProxyOf => "proxy_of",
            EdgeType::CropOf => "crop_of",
        }
    }

    /// File → File derivation tags.
    pub fn is_lineage(self) -> bool {
        matches!(
            self,
            EdgeType::CameraJpeg | EdgeType::ProxyOf | EdgeType::CropOf
        )
    }

    /// Kinds allowed at each end of the edge. `None` means any kind.
    pub fn endpoint_kinds(self) -> (Option<NodeKind>, NodeKind) {
        match self {
            EdgeType::HasDescription => (None, NodeKind::Description),
            EdgeType::InVersionGroup => (Some(NodeKind::File), NodeKind::VersionGroup),
            EdgeType::StoredOn => (Some(NodeKind::File), NodeKind::StorageDevice),
            EdgeType::InCollection => (Some(NodeKind::File), NodeKind::Collection),
            EdgeType::CameraJpeg | EdgeType::ProxyOf | EdgeType::CropOf => {
                (Some(NodeKind::File), NodeKind::File)
            }
        }
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EdgeType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EdgeType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown edge type: '{}'", s))
    }
}

/// A typed, directed relationship. `(source, target, edge_type)` is unique.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Edge {
    pub source: NodeId,
    pub target: NodeId,
    pub edge_type: EdgeType,
    pub inserted_ts: DateTime<Utc>,
}

/// Which end of an edge a traversal starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Edges whose source is the starting node.
    Outgoing,
    /// Edges whose target is the starting node.
    Incoming,
}

/// Unique attributes usable for point lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UniqueAttr<'a> {
    Fingerprint(&'a str),
    DevicePath(&'a str),
    CollectionName(&'a str),
    DescriptionText(&'a str),
}

impl UniqueAttr<'_> {
    pub fn kind(&self) -> NodeKind {
        match self {
            UniqueAttr::Fingerprint(_) => NodeKind::File,
            UniqueAttr::DevicePath(_) => NodeKind::StorageDevice,
            UniqueAttr::CollectionName(_) => NodeKind::Collection,
            UniqueAttr::DescriptionText(_) => NodeKind::Description,
        }
    }

    /// `table.column` holding the attribute.
    pub fn column(&self) -> &'static str {
        match self {
            UniqueAttr::Fingerprint(_) => "files.fingerprint",
            UniqueAttr::DevicePath(_) => "storage_devices.path",
            UniqueAttr::CollectionName(_) => "collections.name",
            UniqueAttr::DescriptionText(_) => "descriptions.text",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            UniqueAttr::Fingerprint(v)
            | UniqueAttr::DevicePath(v)
            | UniqueAttr::CollectionName(v)
            | UniqueAttr::DescriptionText(v) => v,
        }
    }
}
