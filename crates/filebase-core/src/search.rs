//! Streaming top-K ranking of description matches.
//!
//! Candidates are pushed one at a time into a bounded min-heap, so ranking a
//! large description set never holds more than `k` matches in memory.
//! Results are ordered by descending similarity, ties broken by ascending
//! owning-node id, then ascending description id.

use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;
use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::embedding::{cosine_similarity, validate_embedding};
use crate::error::CatalogError;
use crate::models::{NodeId, NodeKind};

pub const DEFAULT_TOP_K: usize = 3;

/// Which owners' descriptions to search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KindFilter {
    File,
    Collection,
    #[default]
    All,
}

impl KindFilter {
    /// `None` means no restriction.
    pub fn node_kind(self) -> Option<NodeKind> {
        match self {
            KindFilter::File => Some(NodeKind::File),
            KindFilter::Collection => Some(NodeKind::Collection),
            KindFilter::All => None,
        }
    }

    pub fn accepts(self, kind: NodeKind) -> bool {
        self.node_kind().is_none_or(|k| k == kind)
    }
}

impl FromStr for KindFilter {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(KindFilter::File),
            "collection" => Ok(KindFilter::Collection),
            "all" => Ok(KindFilter::All),
            other => Err(format!(
                "unknown kind filter: '{}'. Use file, collection, or all.",
                other
            )),
        }
    }
}

impl fmt::Display for KindFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            KindFilter::File => "file",
            KindFilter::Collection => "collection",
            KindFilter::All => "all",
        })
    }
}

/// A described node and its similarity to the query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScoredMatch {
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    pub description_id: NodeId,
    pub text: String,
    pub score: f32,
}

/// Total order: better matches compare greater.
struct Ranked(ScoredMatch);

impl Ranked {
    fn cmp_rank(&self, other: &Self) -> Ordering {
        self.0
            .score
            .total_cmp(&other.0.score)
            .then_with(|| other.0.node_id.cmp(&self.0.node_id))
            .then_with(|| other.0.description_id.cmp(&self.0.description_id))
    }
}

impl PartialEq for Ranked {
    fn eq(&self, other: &Self) -> bool {
        self.cmp_rank(other) == Ordering::Equal
    }
}

impl Eq for Ranked {}

impl PartialOrd for Ranked {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Ranked {
    fn cmp(&self, other: &Self) -> Ordering {
        self.cmp_rank(other)
    }
}

/// Bounded collector keeping the best `k` matches seen so far.
pub struct TopK {
    k: usize,
    heap: BinaryHeap<Reverse<Ranked>>,
}

impl TopK {
    pub fn new(k: usize) -> Self {
        Self {
            k,
            heap: BinaryHeap::with_capacity(k.saturating_add(1)),
        }
    }

    pub fn push(&mut self, candidate: ScoredMatch) {
        if self.k == 0 || candidate.score.is_nan() {
            return;
        }
        self.heap.push(Reverse(Ranked(candidate)));
        if self.heap.len() > self.k {
            self.heap.pop();
        }
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    /// Best match first.
    pub fn into_sorted_vec(self) -> Vec<ScoredMatch> {
        // `Reverse` flips the order, so ascending here is best-first.
        self.heap
            .into_sorted_vec()
            .into_iter()
            .map(|Reverse(Ranked(m))| m)
            .collect()
    }
}

/// A stored description attached to an owning node.
#[derive(Debug, Clone)]
pub struct DescriptionCandidate {
    pub node_id: NodeId,
    pub node_kind: NodeKind,
    pub description_id: NodeId,
    pub text: String,
    pub embedding: Vec<f32>,
}

/// One streaming pass over candidate descriptions.
///
/// The query is checked once up front; candidates are then offered one at a
/// time, so callers can feed rows straight from a database cursor.
pub struct Ranking<'q> {
    query: &'q [f32],
    filter: KindFilter,
    top: TopK,
}

impl<'q> Ranking<'q> {
    /// Fails with [`CatalogError::EmptyVector`] for a zero-norm or
    /// non-finite query.
    pub fn new(query: &'q [f32], filter: KindFilter, k: usize) -> Result<Self, CatalogError> {
        validate_embedding(query, 0)?;
        Ok(Self {
            query,
            filter,
            top: TopK::new(k),
        })
    }

    /// Score `candidate` and keep it if it is among the best `k`.
    ///
    /// Returns `Ok(false)` when the filter excludes the owner kind. A stored
    /// vector that cannot be compared with the query is an error; the
    /// ranking stays usable afterwards.
    pub fn offer(&mut self, candidate: DescriptionCandidate) -> Result<bool, CatalogError> {
        if !self.filter.accepts(candidate.node_kind) {
            return Ok(false);
        }
        let score = cosine_similarity(self.query, &candidate.embedding)?;
        self.top.push(ScoredMatch {
            node_id: candidate.node_id,
            node_kind: candidate.node_kind,
            description_id: candidate.description_id,
            text: candidate.text,
            score,
        });
        Ok(true)
    }

    /// Best match first.
    pub fn finish(self) -> Vec<ScoredMatch> {
        self.top.into_sorted_vec()
    }
}
