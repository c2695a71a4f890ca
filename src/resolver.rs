//! Version-chain resolution against the store.
//!
//! Given the lineage parsed from a filename, finds the predecessor File,
//! inspects its version group and decides the new revision number via
//! [`plan_next_revision`]. The first edit of an ungrouped file creates the
//! group lazily and links the predecessor to it; linking the new File is
//! left to the caller, which owns the new node id.
//!
//! Everything here runs inside the caller's [`GraphTx`], so a failed
//! ingestion never leaves a half-built group behind.

use anyhow::Result;

use filebase_core::models::{Direction, EdgeType, NodeData, NodeId, UniqueAttr};
use filebase_core::version::{plan_next_revision, FilenameVersion, PriorRevision, VersionPlan};
use filebase_core::CatalogError;

use crate::graph::GraphTx;

/// Where the new revision lands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedVersion {
    /// Root name inherited from the predecessor.
    pub root_name: String,
    pub revision: u32,
    /// Group the new File must join with an `in_version_group` edge.
    pub group: NodeId,
    pub prior: NodeId,
}

/// Load what the store knows about the predecessor named by `fingerprint`.
pub async fn lookup_prior(
    tx: &mut GraphTx,
    fingerprint: &str,
) -> Result<(PriorRevision, String)> {
    let prior = tx
        .find_node_by_unique_attr(UniqueAttr::Fingerprint(fingerprint))
        .await?
        .ok_or_else(|| CatalogError::PriorRevisionNotFound {
            fingerprint: fingerprint.to_string(),
        })?;
    let file = prior
        .as_file()
        .ok_or_else(|| CatalogError::VersionChainCorrupt {
            node: prior.id,
            detail: format!("fingerprint owner is a {}", prior.kind()),
        })?
        .clone();

    let groups = tx
        .traverse_edges(prior.id, Direction::Outgoing, Some(EdgeType::InVersionGroup))
        .await?;
    if groups.len() > 1 {
        return Err(CatalogError::VersionChainCorrupt {
            node: prior.id,
            detail: format!("member of {} version groups", groups.len()),
        }
        .into());
    }

    let group = groups.first().map(|(_, g)| g.id);
    let latest_in_group = match group {
        Some(group) => latest_revision(tx, group).await?,
        None => None,
    };

    Ok((
        PriorRevision {
            id: prior.id,
            revision: file.revision,
            group,
            latest_in_group,
        },
        file.root_name,
    ))
}

async fn latest_revision(tx: &mut GraphTx, group: NodeId) -> Result<Option<u32>> {
    let members = tx
        .traverse_edges(group, Direction::Incoming, Some(EdgeType::InVersionGroup))
        .await?;
    Ok(members
        .iter()
        .filter_map(|(_, node)| node.as_file().map(|f| f.revision))
        .max())
}

/// Resolve `parsed` to a group and revision, creating the group if this
/// is the first edit of the predecessor.
pub async fn resolve_version(
    tx: &mut GraphTx,
    parsed: &FilenameVersion,
) -> Result<ResolvedVersion> {
    let (prior, root_name) = lookup_prior(tx, &parsed.prior_fingerprint).await?;

    if parsed.version_number != prior.revision {
        tracing::info!(
            claimed = parsed.version_number,
            stored = prior.revision,
            "filename revision differs from stored predecessor"
        );
    }

    let plan = plan_next_revision(&prior)?;
    let group = match plan {
        VersionPlan::JoinGroup { group, .. } => group,
        VersionPlan::StartGroup { prior, .. } => {
            let group = tx.create_node(&NodeData::VersionGroup).await?;
            tx.create_edge(prior, group, EdgeType::InVersionGroup)
                .await?;
            tracing::debug!(group = group.0, prior = prior.0, "version group created");
            group
        }
    };

    Ok(ResolvedVersion {
        root_name,
        revision: plan.revision(),
        group,
        prior: prior.id,
    })
}
