//! Ingestion pipeline orchestration.
//!
//! One file moves through:
//!
//! ```text
//! Hashing → DedupCheck → (Reject | VersionResolve) → DescriptionAttach
//!         → DeviceLink → Commit → PhysicalMove
//! ```
//!
//! [`Ingestor::plan`] does the read-only part (hashing, filename parsing,
//! timestamp inference) and returns an [`IngestPlan`] the caller can show
//! before deciding. [`Ingestor::commit`] takes the plan plus an explicit
//! `proceed` flag and performs every graph write in one transaction. The
//! file is moved only after the transaction commits, so a failed ingestion
//! leaves the source untouched.
//!
//! Two ingestions of identical content may race. The fingerprint column is
//! unique in the store, so the loser's transaction fails; it is retried,
//! the dedup check then sees the winner's node, and the loser reports
//! [`CatalogError::DuplicateContent`].

use anyhow::{bail, Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use std::path::{Path, PathBuf};
use std::time::Duration;
use walkdir::WalkDir;

use filebase_core::embedding::EmbeddingProvider;
use filebase_core::hash::fingerprint_file;
use filebase_core::models::{EdgeType, FileRecord, NodeData, NodeId, UniqueAttr};
use filebase_core::version::{parse_versioned_filename, FilenameVersion};
use filebase_core::CatalogError;

use crate::catalog::{
    attach_description, ensure_intake_device, prepare_description, PreparedDescription,
};
use crate::config::{Config, StorageConfig};
use crate::embedding::create_provider;
use crate::graph::{is_write_contention, GraphStore, GraphTx};
use crate::placement::{place_file, stored_path, Placement};
use crate::resolver::resolve_version;

const MAX_TX_ATTEMPTS: u32 = 3;

/// What the caller wants ingested.
#[derive(Debug, Clone, Default)]
pub struct IngestRequest {
    pub path: PathBuf,
    pub description: Option<String>,
    /// Overrides the timestamp inferred from the filesystem.
    pub created_ts: Option<DateTime<Utc>>,
    /// Name of an existing collection to add the file to.
    pub collection: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

/// Everything known about a candidate before any write happens.
#[derive(Debug, Clone)]
pub struct IngestPlan {
    pub source: PathBuf,
    pub fingerprint: String,
    pub size: u64,
    /// File stem, or the parsed root for a versioned name. For a new
    /// revision the stored root name comes from the predecessor.
    pub root_name: String,
    /// Lowercased, without the dot.
    pub extension: String,
    pub created_ts: DateTime<Utc>,
    pub lineage: Option<FilenameVersion>,
    pub description: Option<String>,
    pub collection: Option<String>,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone)]
pub struct IngestReport {
    pub file_id: NodeId,
    pub fingerprint: String,
    pub root_name: String,
    pub revision: u32,
    pub version_group: Option<NodeId>,
    pub description: Option<NodeId>,
    pub device: NodeId,
    pub stored_at: PathBuf,
    pub placement: Placement,
}

/// Result of [`Ingestor::commit`].
#[derive(Debug, Clone)]
pub enum IngestOutcome {
    Ingested(IngestReport),
    /// `proceed` was false; nothing was written.
    Skipped(IngestPlan),
}

/// Result of ingesting a directory.
#[derive(Debug, Default)]
pub struct DirectoryReport {
    pub ingested: Vec<IngestReport>,
    /// Files whose content was already cataloged, with the existing node.
    pub duplicates: Vec<(PathBuf, NodeId)>,
    pub previews: Vec<IngestPlan>,
}

struct Committed {
    file_id: NodeId,
    record: FileRecord,
    version_group: Option<NodeId>,
    description: Option<NodeId>,
    device: NodeId,
}

/// Runs the pipeline against one store with one embedding provider.
pub struct Ingestor<'a> {
    store: &'a GraphStore,
    embedder: &'a dyn EmbeddingProvider,
    storage: &'a StorageConfig,
}

impl<'a> Ingestor<'a> {
    pub fn new(
        store: &'a GraphStore,
        embedder: &'a dyn EmbeddingProvider,
        storage: &'a StorageConfig,
    ) -> Self {
        Self {
            store,
            embedder,
            storage,
        }
    }

    /// Hash and inspect `request.path` without touching the catalog.
    pub async fn plan(&self, request: IngestRequest) -> Result<IngestPlan> {
        let source = request.path.clone();
        let meta = std::fs::metadata(&source).map_err(|e| {
            CatalogError::IoFailure(format!("{}: {}", source.display(), e))
        })?;
        if !meta.is_file() {
            bail!("{} is not a regular file", source.display());
        }

        let hash_path = source.clone();
        let fingerprint = tokio::task::spawn_blocking(move || fingerprint_file(&hash_path))
            .await
            .context("hashing task panicked")?
            .map_err(|e| CatalogError::IoFailure(format!("{}: {}", source.display(), e)))?;

        let file_name = source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let lineage = parse_versioned_filename(&file_name);
        let (root_name, extension) = match &lineage {
            Some(parsed) => (
                parsed.root_name.clone(),
                parsed.extension.clone().unwrap_or_default(),
            ),
            None => split_name(&file_name),
        };

        let plan = IngestPlan {
            fingerprint,
            size: meta.len(),
            root_name,
            extension: extension.to_ascii_lowercase(),
            created_ts: request
                .created_ts
                .unwrap_or_else(|| infer_created_ts(&meta)),
            lineage,
            description: request.description,
            collection: request.collection,
            metadata: request.metadata,
            source: request.path,
        };
        tracing::debug!(
            source = %plan.source.display(),
            fingerprint = %plan.fingerprint,
            versioned = plan.lineage.is_some(),
            "planned ingestion"
        );
        Ok(plan)
    }

    /// Execute `plan` when `proceed` is true.
    pub async fn commit(&self, plan: IngestPlan, proceed: bool) -> Result<IngestOutcome> {
        if !proceed {
            return Ok(IngestOutcome::Skipped(plan));
        }

        // Cheap early exit; the authoritative check runs in the transaction.
        if let Some(existing) = self
            .store
            .find_node_by_unique_attr(UniqueAttr::Fingerprint(&plan.fingerprint))
            .await?
        {
            return Err(duplicate(existing.id, &plan.fingerprint));
        }

        let description = match &plan.description {
            Some(text) => Some(prepare_description(self.store, self.embedder, text).await?),
            None => None,
        };

        let mut attempt = 1;
        let committed = loop {
            match self.write_graph(&plan, description.as_ref()).await {
                Ok(committed) => break committed,
                Err(err) if attempt < MAX_TX_ATTEMPTS && is_retryable_conflict(&err) => {
                    tracing::info!(
                        attempt,
                        error = %err,
                        fingerprint = %plan.fingerprint,
                        "ingestion transaction conflicted, retrying"
                    );
                    tokio::time::sleep(Duration::from_millis(20 * u64::from(attempt))).await;
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        };

        let (stored_at, placement) = self.move_into_place(&plan.source, &committed).await?;

        tracing::info!(
            id = committed.file_id.0,
            revision = committed.record.revision,
            stored_at = %stored_at.display(),
            "ingested"
        );
        Ok(IngestOutcome::Ingested(IngestReport {
            file_id: committed.file_id,
            fingerprint: committed.record.fingerprint,
            root_name: committed.record.root_name,
            revision: committed.record.revision,
            version_group: committed.version_group,
            description: committed.description,
            device: committed.device,
            stored_at,
            placement,
        }))
    }

    /// Plan and commit in one step.
    pub async fn ingest(&self, request: IngestRequest) -> Result<IngestReport> {
        let plan = self.plan(request).await?;
        match self.commit(plan, true).await? {
            IngestOutcome::Ingested(report) => Ok(report),
            IngestOutcome::Skipped(_) => bail!("ingestion skipped"),
        }
    }

    /// Ingest each non-hidden regular file directly inside `dir`, in name
    /// order, one transaction per file. Duplicates are recorded and
    /// skipped; any other error stops the run.
    pub async fn ingest_dir(
        &self,
        dir: &Path,
        template: &IngestRequest,
        proceed: bool,
    ) -> Result<DirectoryReport> {
        let mut report = DirectoryReport::default();

        for path in list_directory(dir)? {
            let request = IngestRequest {
                path: path.clone(),
                ..template.clone()
            };
            let plan = self.plan(request).await?;
            match self.commit(plan, proceed).await {
                Ok(IngestOutcome::Ingested(r)) => report.ingested.push(r),
                Ok(IngestOutcome::Skipped(p)) => report.previews.push(p),
                Err(err) => match err.downcast_ref::<CatalogError>() {
                    Some(CatalogError::DuplicateContent { existing, .. }) => {
                        tracing::info!(path = %path.display(), existing = existing.0, "duplicate skipped");
                        report.duplicates.push((path, *existing));
                    }
                    _ => {
                        return Err(err.context(format!("while ingesting {}", path.display())))
                    }
                },
            }
        }

        Ok(report)
    }

    /// All graph writes for one file, in one transaction.
    async fn write_graph(
        &self,
        plan: &IngestPlan,
        description: Option<&PreparedDescription>,
    ) -> Result<Committed> {
        let mut tx = self.store.begin().await?;

        if let Some(existing) = tx
            .find_node_by_unique_attr(UniqueAttr::Fingerprint(&plan.fingerprint))
            .await?
        {
            return Err(duplicate(existing.id, &plan.fingerprint));
        }

        let resolved = match &plan.lineage {
            Some(parsed) => Some(resolve_version(&mut tx, parsed).await?),
            None => None,
        };

        let record = FileRecord {
            root_name: resolved
                .as_ref()
                .map(|r| r.root_name.clone())
                .unwrap_or_else(|| plan.root_name.clone()),
            revision: resolved.as_ref().map_or(1, |r| r.revision),
            fingerprint: plan.fingerprint.clone(),
            extension: plan.extension.clone(),
            size: plan.size,
            created_ts: plan.created_ts,
            layout: self.storage.layout,
            metadata: plan.metadata.clone(),
        };
        let file_id = tx.create_node(&NodeData::File(record.clone())).await?;

        let version_group = match &resolved {
            Some(r) => {
                tx.create_edge(file_id, r.group, EdgeType::InVersionGroup)
                    .await?;
                Some(r.group)
            }
            None => None,
        };

        let description = match description {
            Some(prepared) => Some(attach_description(&mut tx, file_id, prepared).await?),
            None => None,
        };

        let device = ensure_intake_device(&mut tx, self.storage).await?;
        tx.create_edge(file_id, device, EdgeType::StoredOn).await?;

        if let Some(name) = &plan.collection {
            add_to_collection(&mut tx, file_id, name).await?;
        }

        tx.commit().await?;
        Ok(Committed {
            file_id,
            record,
            version_group,
            description,
            device,
        })
    }

    async fn move_into_place(
        &self,
        source: &Path,
        committed: &Committed,
    ) -> Result<(PathBuf, Placement)> {
        let dest = stored_path(
            &self.storage.intake_path,
            committed.file_id,
            &committed.record,
        );
        let (src, dst, fp) = (
            source.to_path_buf(),
            dest.clone(),
            committed.record.fingerprint.clone(),
        );
        let placement = tokio::task::spawn_blocking(move || place_file(&src, &dst, &fp))
            .await
            .context("placement task panicked")?
            .map_err(|e| {
                CatalogError::IoFailure(format!(
                    "node {} committed but not moved ({}); rerun `fb relocate {} {}`",
                    committed.file_id,
                    e,
                    committed.file_id,
                    source.display()
                ))
            })?;
        Ok((dest, placement))
    }
}

async fn add_to_collection(tx: &mut GraphTx, file: NodeId, name: &str) -> Result<()> {
    let collection = tx
        .find_node_by_unique_attr(UniqueAttr::CollectionName(name))
        .await?
        .ok_or_else(|| CatalogError::NodeNotFound(format!("collection '{}'", name)))?;
    tx.create_edge(file, collection.id, EdgeType::InCollection)
        .await?;
    Ok(())
}

fn duplicate(existing: NodeId, fingerprint: &str) -> anyhow::Error {
    CatalogError::DuplicateContent {
        existing,
        fingerprint: fingerprint.to_string(),
    }
    .into()
}

/// Conflicts that a fresh transaction can resolve: another writer created
/// the same fingerprint, description text or intake device first, or the
/// database was busy.
fn is_retryable_conflict(err: &anyhow::Error) -> bool {
    if is_write_contention(err) {
        return true;
    }
    matches!(
        err.downcast_ref::<CatalogError>(),
        Some(CatalogError::ConstraintViolation { constraint })
            if constraint == UniqueAttr::DescriptionText("").column()
                || constraint == UniqueAttr::DevicePath("").column()
    )
}

/// `"IMG_0001.JPG"` → `("IMG_0001", "JPG")`. Dotfiles keep their name as
/// the stem.
fn split_name(file_name: &str) -> (String, String) {
    match file_name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem.to_string(), ext.to_string()),
        _ => (file_name.to_string(), String::new()),
    }
}

/// The earlier of birth time and modification time, or now when the
/// platform reports neither.
pub fn infer_created_ts(meta: &std::fs::Metadata) -> DateTime<Utc> {
    [meta.created().ok(), meta.modified().ok()]
        .into_iter()
        .flatten()
        .min()
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(Utc::now)
}

/// Parse `--created-ts`: RFC 3339 or a bare `YYYY-MM-DD` (midnight UTC).
pub fn parse_created_ts(value: &str) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
        return Ok(ts.with_timezone(&Utc));
    }
    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").with_context(|| {
        format!(
            "invalid timestamp '{}': expected RFC 3339 or YYYY-MM-DD",
            value
        )
    })?;
    date.and_hms_opt(0, 0, 0)
        .map(|dt| dt.and_utc())
        .ok_or_else(|| anyhow::anyhow!("invalid date '{}'", value))
}

/// Parse repeated `KEY=VALUE` pairs into a JSON object.
pub fn parse_metadata(pairs: &[String]) -> Result<Option<serde_json::Value>> {
    if pairs.is_empty() {
        return Ok(None);
    }
    let mut map = serde_json::Map::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .ok_or_else(|| anyhow::anyhow!("metadata must be KEY=VALUE, got '{}'", pair))?;
        map.insert(
            key.trim().to_string(),
            serde_json::Value::String(value.to_string()),
        );
    }
    Ok(Some(serde_json::Value::Object(map)))
}

fn list_directory(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| CatalogError::IoFailure(e.to_string()))?;
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if !hidden && entry.file_type().is_file() {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

fn print_plan(plan: &IngestPlan) {
    println!("{}", plan.source.display());
    println!("  fingerprint: {}", plan.fingerprint);
    println!("  size: {} bytes", plan.size);
    if plan.extension.is_empty() {
        println!("  name: {}", plan.root_name);
    } else {
        println!("  name: {}.{}", plan.root_name, plan.extension);
    }
    println!("  created: {}", plan.created_ts.to_rfc3339());
    if let Some(lineage) = &plan.lineage {
        println!(
            "  revises: {} (claimed revision {})",
            lineage.prior_fingerprint, lineage.version_number
        );
    }
    if let Some(text) = &plan.description {
        println!("  description: {}", text);
    }
    if let Some(name) = &plan.collection {
        println!("  collection: {}", name);
    }
}

fn print_report(report: &IngestReport) {
    println!("ingested {}", report.file_id);
    println!("  fingerprint: {}", report.fingerprint);
    println!("  revision: {} of {}", report.revision, report.root_name);
    if let Some(group) = report.version_group {
        println!("  version group: {}", group);
    }
    if let Some(desc) = report.description {
        println!("  description: {}", desc);
    }
    println!("  stored at: {}", report.stored_at.display());
}

/// CLI entry point for `fb ingest`.
pub async fn run_ingest(config: &Config, request: IngestRequest, dry_run: bool) -> Result<()> {
    let store = GraphStore::open(config).await?;
    let embedder = create_provider(&config.embedding)?;
    let ingestor = Ingestor::new(&store, embedder.as_ref(), &config.storage);

    if request.path.is_dir() {
        let dir = request.path.clone();
        let report = ingestor.ingest_dir(&dir, &request, !dry_run).await?;
        for plan in &report.previews {
            print_plan(plan);
        }
        for r in &report.ingested {
            print_report(r);
        }
        for (path, existing) in &report.duplicates {
            println!("duplicate {} (existing node {})", path.display(), existing);
        }
        println!(
            "ingest {}{}: {} ingested, {} duplicates",
            dir.display(),
            if dry_run { " (dry-run)" } else { "" },
            report.ingested.len(),
            report.duplicates.len()
        );
        return Ok(());
    }

    let plan = ingestor.plan(request).await?;
    match ingestor.commit(plan, !dry_run).await? {
        IngestOutcome::Skipped(plan) => {
            print_plan(&plan);
            println!("dry-run: nothing written");
        }
        IngestOutcome::Ingested(report) => print_report(&report),
    }
    Ok(())
}
