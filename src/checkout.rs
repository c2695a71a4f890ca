//! Getting content back out of storage, and finishing interrupted moves.
//!
//! `checkout` copies a stored revision out under its versioned filename
//! so an edited copy re-enters the catalog as the next revision.
//! `relocate` re-runs only the physical move for a File whose graph
//! transaction committed but whose content never reached the device.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use filebase_core::hash::fingerprint_file;
use filebase_core::models::{Node, NodeId, NodeKind};
use filebase_core::version::versioned_filename;
use filebase_core::CatalogError;

use crate::catalog::device_of;
use crate::config::Config;
use crate::graph::GraphStore;
use crate::placement::{copy_out, place_file, stored_path, Placement};

async fn require_file(store: &GraphStore, id: NodeId) -> Result<Node> {
    let node = store.require_node(id).await?;
    if node.kind() != NodeKind::File {
        return Err(CatalogError::WrongNodeKind {
            node: id,
            expected: NodeKind::File,
            actual: node.kind(),
        }
        .into());
    }
    Ok(node)
}

/// Path of a File's content on the device it is stored on, under the
/// layout recorded when the file was placed.
pub async fn locate(store: &GraphStore, id: NodeId) -> Result<PathBuf> {
    let node = require_file(store, id).await?;
    let device = device_of(store, id).await?;
    let device_path = device
        .as_storage_device()
        .map(|d| PathBuf::from(&d.path))
        .ok_or_else(|| anyhow::anyhow!("stored_on target {} is not a device", device.id))?;
    let file = node
        .as_file()
        .ok_or_else(|| anyhow::anyhow!("node {} has no file record", id))?;
    Ok(stored_path(&device_path, id, file))
}

/// Copy File `id` into `dest_dir` as `<root>-v<revision>-<fingerprint>.<ext>`.
pub async fn checkout(store: &GraphStore, id: NodeId, dest_dir: &Path) -> Result<PathBuf> {
    let node = require_file(store, id).await?;
    let file = node
        .as_file()
        .ok_or_else(|| anyhow::anyhow!("node {} has no file record", id))?;
    let stored = locate(store, id).await?;
    let dest = dest_dir.join(versioned_filename(
        &file.root_name,
        file.revision,
        &file.fingerprint,
        &file.extension,
    ));

    let (from, to) = (stored.clone(), dest.clone());
    tokio::task::spawn_blocking(move || copy_out(&from, &to))
        .await
        .context("checkout task panicked")??;
    Ok(dest)
}

/// Finish the physical move of an already committed File from `source`.
///
/// The source must hash to the File's fingerprint; nothing in the graph
/// changes.
pub async fn relocate(
    store: &GraphStore,
    id: NodeId,
    source: &Path,
) -> Result<(PathBuf, Placement)> {
    let node = require_file(store, id).await?;
    let fingerprint = node
        .as_file()
        .map(|f| f.fingerprint.clone())
        .ok_or_else(|| anyhow::anyhow!("node {} has no file record", id))?;
    let dest = locate(store, id).await?;

    let (src, dst) = (source.to_path_buf(), dest.clone());
    let placement = tokio::task::spawn_blocking(move || -> Result<Placement, CatalogError> {
        if src.exists() {
            let actual = fingerprint_file(&src)?;
            if actual != fingerprint {
                return Err(CatalogError::IoFailure(format!(
                    "{} hashes to {}, node {} expects {}",
                    src.display(),
                    actual,
                    id,
                    fingerprint
                )));
            }
        }
        place_file(&src, &dst, &fingerprint)
    })
    .await
    .context("relocate task panicked")??;

    Ok((dest, placement))
}

pub async fn run_checkout(config: &Config, id: NodeId, dest: Option<&Path>) -> Result<()> {
    let store = GraphStore::open(config).await?;
    let dest_dir = dest.unwrap_or_else(|| Path::new("."));
    let path = checkout(&store, id, dest_dir).await?;
    println!("checked out {} to {}", id, path.display());
    Ok(())
}

pub async fn run_relocate(config: &Config, id: NodeId, source: &Path) -> Result<()> {
    let store = GraphStore::open(config).await?;
    let (dest, placement) = relocate(&store, id, source).await?;
    match placement {
        Placement::AlreadyPlaced => println!("{} already at {}", id, dest.display()),
        _ => println!("moved {} to {}", id, dest.display()),
    }
    Ok(())
}
