//! Error taxonomy for catalog operations.
//!
//! Each variant maps to a distinct process exit code so callers scripting
//! the CLI can tell outcomes apart without parsing messages.

use crate::models::{EdgeType, NodeId, NodeKind};

/// Errors raised by catalog invariants and collaborators.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum CatalogError {
    /// The exact content is already cataloged.
    #[error("[DuplicateContent] content {fingerprint} already cataloged as node {existing}")]
    DuplicateContent {
        existing: NodeId,
        fingerprint: String,
    },

    /// A uniqueness constraint rejected the write.
    #[error("[ConstraintViolation] unique constraint failed: {constraint}")]
    ConstraintViolation { constraint: String },

    /// An edge endpoint does not exist.
    #[error("[DanglingReference] node {node} does not exist")]
    DanglingReference { node: NodeId },

    #[error("[DuplicateEdge] edge {source_id} -[{edge_type}]-> {target} already exists")]
    DuplicateEdge {
        source_id: NodeId,
        target: NodeId,
        edge_type: EdgeType,
    },

    /// A versioned filename names a predecessor that was never ingested.
    #[error("[PriorRevisionNotFound] no file with fingerprint {fingerprint}")]
    PriorRevisionNotFound { fingerprint: String },

    #[error("[VersionChainCorrupt] node {node}: {detail}")]
    VersionChainCorrupt { node: NodeId, detail: String },

    /// The named predecessor already has a successor.
    #[error(
        "[UnsupportedBranch] node {prior} is revision {prior_revision} but its version group is at revision {latest_revision}"
    )]
    UnsupportedBranch {
        prior: NodeId,
        prior_revision: u32,
        latest_revision: u32,
    },

    /// Cosine similarity is undefined for a zero-norm operand.
    #[error("[EmptyVector] similarity is undefined for a zero-norm vector")]
    EmptyVector,

    #[error("[DimensionMismatch] expected {expected} dimensions, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    /// Embedding or transcription collaborator unavailable. Retryable.
    #[error("[ExternalServiceFailure] {0}")]
    ExternalServiceFailure(String),

    #[error("[IOFailure] {0}")]
    IoFailure(String),

    #[error("[NodeNotFound] {0}")]
    NodeNotFound(String),

    #[error("[WrongNodeKind] node {node} is a {actual}, expected {expected}")]
    WrongNodeKind {
        node: NodeId,
        expected: NodeKind,
        actual: NodeKind,
    },
}

impl CatalogError {
    /// Process exit code for this error kind.
    pub fn exit_code(&self) -> u8 {
        match self {
            CatalogError::DuplicateContent { .. } => 10,
            CatalogError::ConstraintViolation { .. } => 11,
            CatalogError::DanglingReference { .. } => 12,
            CatalogError::DuplicateEdge { .. } => 13,
            CatalogError::PriorRevisionNotFound { .. } => 14,
            CatalogError::VersionChainCorrupt { .. } => 15,
            CatalogError::UnsupportedBranch { .. } => 16,
            CatalogError::EmptyVector => 17,
            CatalogError::DimensionMismatch { .. } => 18,
            CatalogError::ExternalServiceFailure(_) => 19,
            CatalogError::IoFailure(_) => 20,
            CatalogError::NodeNotFound(_) => 21,
            CatalogError::WrongNodeKind { .. } => 22,
        }
    }

    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            CatalogError::ExternalServiceFailure(_) | CatalogError::IoFailure(_)
        )
    }
}

impl From<std::io::Error> for CatalogError {
    fn from(err: std::io::Error) -> Self {
        CatalogError::IoFailure(err.to_string())
    }
}
