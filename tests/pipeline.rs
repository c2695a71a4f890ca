use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;

use filebase::catalog::{create_collection, prepare_description};
use filebase::checkout::{checkout, relocate};
use filebase::config::{Layout, StorageConfig};
use filebase::graph::GraphStore;
use filebase::ingest::{IngestOutcome, IngestRequest, Ingestor};
use filebase::placement::Placement;
use filebase::search::search_descriptions;
use filebase::{db, migrate};
use filebase_core::embedding::EmbeddingProvider;
use filebase_core::hash::fingerprint_bytes;
use filebase_core::models::{Direction, EdgeType, NodeId, NodeKind, UniqueAttr};
use filebase_core::search::KindFilter;
use filebase_core::CatalogError;

/// Deterministic embedder: folds the text's bytes into four buckets.
#[derive(Default)]
struct FoldEmbedder {
    calls: AtomicUsize,
}

#[async_trait]
impl EmbeddingProvider for FoldEmbedder {
    fn model_name(&self) -> &str {
        "fold-4"
    }
    fn dims(&self) -> usize {
        4
    }
    async fn embed(&self, text: &str) -> anyhow::Result<Vec<f32>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let mut v = vec![1.0f32; 4];
        for (i, b) in text.bytes().enumerate() {
            v[i % 4] += f32::from(b);
        }
        Ok(v)
    }
}

struct Unreachable;

#[async_trait]
impl EmbeddingProvider for Unreachable {
    fn model_name(&self) -> &str {
        "unreachable"
    }
    fn dims(&self) -> usize {
        4
    }
    async fn embed(&self, _text: &str) -> anyhow::Result<Vec<f32>> {
        anyhow::bail!("connection refused")
    }
}

struct Harness {
    _tmp: TempDir,
    inbox: PathBuf,
    intake: PathBuf,
    store: GraphStore,
    storage: StorageConfig,
}

impl Harness {
    async fn new(layout: Layout) -> Self {
        let tmp = TempDir::new().unwrap();
        let inbox = tmp.path().join("inbox");
        let intake = tmp.path().join("intake");
        fs::create_dir_all(&inbox).unwrap();

        let pool = db::connect_path(&tmp.path().join("data/fb.sqlite"))
            .await
            .unwrap();
        migrate::run_migrations(&pool).await.unwrap();

        let storage = StorageConfig {
            intake_path: intake.clone(),
            intake_name: "intake".into(),
            intake_capacity: 0,
            layout,
        };
        Self {
            _tmp: tmp,
            inbox,
            intake,
            store: GraphStore::new(pool),
            storage,
        }
    }

    fn write(&self, name: &str, contents: &[u8]) -> PathBuf {
        let path = self.inbox.join(name);
        fs::write(&path, contents).unwrap();
        path
    }

    fn request(&self, path: &Path) -> IngestRequest {
        IngestRequest {
            path: path.to_path_buf(),
            ..IngestRequest::default()
        }
    }

    async fn file_count(&self) -> usize {
        self.store
            .all_nodes()
            .await
            .unwrap()
            .iter()
            .filter(|n| n.kind() == NodeKind::File)
            .count()
    }
}

fn catalog_error(err: &anyhow::Error) -> &CatalogError {
    err.downcast_ref::<CatalogError>()
        .unwrap_or_else(|| panic!("expected a CatalogError, got: {:#}", err))
}

#[tokio::test]
async fn identical_bytes_are_rejected_with_existing_id() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let first = ingestor
        .ingest(h.request(&h.write("a.txt", b"same bytes")))
        .await
        .unwrap();
    assert_eq!(first.revision, 1);
    assert!(first.version_group.is_none());
    assert_eq!(first.stored_at, h.intake.join(&first.fingerprint));

    let copy = h.write("copy-of-a.txt", b"same bytes");
    let err = ingestor.ingest(h.request(&copy)).await.unwrap_err();
    assert_eq!(
        catalog_error(&err),
        &CatalogError::DuplicateContent {
            existing: first.file_id,
            fingerprint: fingerprint_bytes(b"same bytes"),
        }
    );
    assert!(copy.exists(), "rejected source must not be moved");
    assert_eq!(h.file_count().await, 1);
}

#[tokio::test]
async fn edits_form_a_gapless_chain() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let r1 = ingestor
        .ingest(h.request(&h.write("report.txt", b"draft one")))
        .await
        .unwrap();
    assert_eq!((r1.revision, r1.version_group), (1, None));

    let name2 = format!("report-v1-{}.txt", r1.fingerprint);
    let r2 = ingestor
        .ingest(h.request(&h.write(&name2, b"draft two")))
        .await
        .unwrap();
    assert_eq!(r2.revision, 2);
    assert_eq!(r2.root_name, "report");
    let group = r2.version_group.expect("second revision creates the group");

    // The advisory number in the filename is wrong on purpose.
    let name3 = format!("report-v7-{}.txt", r2.fingerprint);
    let r3 = ingestor
        .ingest(h.request(&h.write(&name3, b"draft three")))
        .await
        .unwrap();
    assert_eq!(r3.revision, 3);
    assert_eq!(r3.version_group, Some(group));

    let mut revisions: Vec<(u32, NodeId)> = h
        .store
        .traverse_edges(group, Direction::Incoming, Some(EdgeType::InVersionGroup))
        .await
        .unwrap()
        .into_iter()
        .map(|(_, n)| (n.as_file().unwrap().revision, n.id))
        .collect();
    revisions.sort();
    assert_eq!(
        revisions,
        vec![(1, r1.file_id), (2, r2.file_id), (3, r3.file_id)]
    );

    let groups = h
        .store
        .all_nodes()
        .await
        .unwrap()
        .into_iter()
        .filter(|n| n.kind() == NodeKind::VersionGroup)
        .count();
    assert_eq!(groups, 1);
}

#[tokio::test]
async fn unknown_predecessor_creates_nothing() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let h9 = fingerprint_bytes(b"never ingested");
    let path = h.write(&format!("ghost-v1-{}.txt", h9), b"orphan edit");
    let err = ingestor
        .ingest(IngestRequest {
            description: Some("an orphan".into()),
            ..h.request(&path)
        })
        .await
        .unwrap_err();

    assert_eq!(
        catalog_error(&err),
        &CatalogError::PriorRevisionNotFound { fingerprint: h9 }
    );
    assert!(path.exists());
    assert!(h.store.all_nodes().await.unwrap().is_empty());
    assert!(h.store.all_edges().await.unwrap().is_empty());
}

#[tokio::test]
async fn editing_a_superseded_revision_is_rejected() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let r1 = ingestor
        .ingest(h.request(&h.write("notes.md", b"v1")))
        .await
        .unwrap();
    ingestor
        .ingest(h.request(&h.write(&format!("notes-v1-{}.md", r1.fingerprint), b"v2")))
        .await
        .unwrap();

    let branch = h.write(&format!("notes-v1-{}.md", r1.fingerprint), b"v2 alternative");
    let err = ingestor.ingest(h.request(&branch)).await.unwrap_err();
    assert!(matches!(
        catalog_error(&err),
        CatalogError::UnsupportedBranch {
            prior_revision: 1,
            latest_revision: 2,
            ..
        }
    ));
    assert_eq!(h.file_count().await, 2);
}

#[tokio::test]
async fn search_finds_owner_of_identical_embedding() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let beach = ingestor
        .ingest(IngestRequest {
            description: Some("sunset at the beach".into()),
            ..h.request(&h.write("beach.jpg", b"jpeg bytes 1"))
        })
        .await
        .unwrap();
    ingestor
        .ingest(IngestRequest {
            description: Some("tax documents for 2021".into()),
            ..h.request(&h.write("taxes.pdf", b"pdf bytes"))
        })
        .await
        .unwrap();

    let query = embedder.embed("sunset at the beach").await.unwrap();
    let hits = search_descriptions(&h.store, &query, KindFilter::All, 3)
        .await
        .unwrap();
    assert_eq!(hits.len(), 2);
    assert_eq!(hits[0].node_id, beach.file_id);
    assert_eq!(Some(hits[0].description_id), beach.description);
    assert!((hits[0].score - 1.0).abs() < 1e-5);
    assert!(hits[0].score >= hits[1].score);

    let none = search_descriptions(&h.store, &query, KindFilter::Collection, 3)
        .await
        .unwrap();
    assert!(none.is_empty());
}

#[tokio::test]
async fn repeated_description_text_reuses_node() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let a = ingestor
        .ingest(IngestRequest {
            description: Some("scan of passport".into()),
            ..h.request(&h.write("p1.png", b"page 1"))
        })
        .await
        .unwrap();
    let b = ingestor
        .ingest(IngestRequest {
            description: Some("scan of passport".into()),
            ..h.request(&h.write("p2.png", b"page 2"))
        })
        .await
        .unwrap();

    assert_eq!(a.description, b.description);
    assert_eq!(embedder.calls.load(Ordering::SeqCst), 1);

    let prepared = prepare_description(&h.store, &Unreachable, "scan of passport")
        .await
        .unwrap();
    assert!(prepared.reuses_existing());
}

#[tokio::test]
async fn embedding_failure_leaves_catalog_and_source_untouched() {
    let h = Harness::new(Layout::Fingerprint).await;
    let ingestor = Ingestor::new(&h.store, &Unreachable, &h.storage);

    let path = h.write("memo.txt", b"memo");
    let err = ingestor
        .ingest(IngestRequest {
            description: Some("memo to self".into()),
            ..h.request(&path)
        })
        .await
        .unwrap_err();

    assert!(matches!(
        catalog_error(&err),
        CatalogError::ExternalServiceFailure(_)
    ));
    assert!(path.exists());
    assert!(h.store.all_nodes().await.unwrap().is_empty());
}

#[tokio::test]
async fn declined_plan_writes_nothing() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let path = h.write("maybe.txt", b"undecided");
    let plan = ingestor.plan(h.request(&path)).await.unwrap();
    assert_eq!(plan.fingerprint, fingerprint_bytes(b"undecided"));
    assert_eq!(plan.size, 9);
    assert_eq!(plan.root_name, "maybe");
    assert_eq!(plan.extension, "txt");

    match ingestor.commit(plan, false).await.unwrap() {
        IngestOutcome::Skipped(p) => assert_eq!(p.source, path),
        IngestOutcome::Ingested(_) => panic!("declined plan was ingested"),
    }
    assert!(path.exists());
    assert!(h.store.all_nodes().await.unwrap().is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_identical_ingestions_yield_one_node() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let left = h.write("left.bin", b"racing content");
    let right = h.write("right.bin", b"racing content");

    let (a, b) = tokio::join!(
        ingestor.ingest(h.request(&left)),
        ingestor.ingest(h.request(&right)),
    );

    let (winner, loser) = match (a, b) {
        (Ok(w), Err(l)) | (Err(l), Ok(w)) => (w, l),
        (Ok(_), Ok(_)) => panic!("both ingestions created a node"),
        (Err(x), Err(y)) => panic!("both ingestions failed: {:#} / {:#}", x, y),
    };
    assert_eq!(
        catalog_error(&loser),
        &CatalogError::DuplicateContent {
            existing: winner.file_id,
            fingerprint: fingerprint_bytes(b"racing content"),
        }
    );
    assert_eq!(h.file_count().await, 1);
    assert!(left.exists() != right.exists(), "exactly one source moved");
}

#[tokio::test]
async fn sharded_layout_places_by_id() {
    let h = Harness::new(Layout::Sharded).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let r = ingestor
        .ingest(h.request(&h.write("IMG_0001.JPG", b"raw pixels")))
        .await
        .unwrap();
    let expected = h
        .intake
        .join((r.file_id.0 / 100).to_string())
        .join(format!("{}.jpg", r.file_id));
    assert_eq!(r.stored_at, expected);
    assert_eq!(fs::read(&expected).unwrap(), b"raw pixels");
}

#[tokio::test]
async fn changing_layout_keeps_existing_files_reachable() {
    let mut h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();

    let before = Ingestor::new(&h.store, &embedder, &h.storage)
        .ingest(h.request(&h.write("old.txt", b"placed by fingerprint")))
        .await
        .unwrap();
    assert_eq!(before.stored_at, h.intake.join(&before.fingerprint));

    h.storage.layout = Layout::Sharded;
    let after = Ingestor::new(&h.store, &embedder, &h.storage)
        .ingest(h.request(&h.write("new.txt", b"placed by shard")))
        .await
        .unwrap();
    assert_eq!(
        after.stored_at,
        h.intake
            .join((after.file_id.0 / 100).to_string())
            .join(format!("{}.txt", after.file_id))
    );

    let workdir = h.inbox.join("work");
    let old_copy = checkout(&h.store, before.file_id, &workdir).await.unwrap();
    assert_eq!(fs::read(&old_copy).unwrap(), b"placed by fingerprint");
    let new_copy = checkout(&h.store, after.file_id, &workdir).await.unwrap();
    assert_eq!(fs::read(&new_copy).unwrap(), b"placed by shard");

    let stored = h.store.require_node(before.file_id).await.unwrap();
    assert_eq!(stored.as_file().unwrap().layout, Layout::Fingerprint);

    // Relocating the older file must find the existing copy, not make a
    // second one under the sharded layout.
    let (dest, placement) = relocate(&h.store, before.file_id, &h.inbox.join("old.txt"))
        .await
        .unwrap();
    assert_eq!(dest, before.stored_at);
    assert_eq!(placement, Placement::AlreadyPlaced);
    assert!(!h
        .intake
        .join((before.file_id.0 / 100).to_string())
        .join(format!("{}.txt", before.file_id))
        .exists());
}

#[tokio::test]
async fn checkout_edit_reingest_makes_next_revision() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let r1 = ingestor
        .ingest(h.request(&h.write("essay.txt", b"first draft")))
        .await
        .unwrap();

    let workdir = h.inbox.join("work");
    let out = checkout(&h.store, r1.file_id, &workdir)
        .await
        .unwrap();
    assert_eq!(
        out.file_name().unwrap().to_string_lossy(),
        format!("essay-v1-{}.txt", r1.fingerprint)
    );
    assert!(r1.stored_at.exists(), "checkout copies, never moves");

    fs::write(&out, b"second draft").unwrap();
    let r2 = ingestor.ingest(h.request(&out)).await.unwrap();
    assert_eq!(r2.revision, 2);
    assert_eq!(r2.root_name, "essay");
}

#[tokio::test]
async fn relocate_completes_an_interrupted_move() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let r = ingestor
        .ingest(h.request(&h.write("song.flac", b"audio")))
        .await
        .unwrap();

    // Simulate a committed node whose content never arrived.
    let stranded = h.inbox.join("song.flac");
    fs::rename(&r.stored_at, &stranded).unwrap();

    let (dest, placement) = relocate(&h.store, r.file_id, &stranded)
        .await
        .unwrap();
    assert_eq!(dest, r.stored_at);
    assert_eq!(placement, Placement::Renamed);
    assert!(!stranded.exists());

    let (_, again) = relocate(&h.store, r.file_id, &stranded)
        .await
        .unwrap();
    assert_eq!(again, Placement::AlreadyPlaced);

    let wrong = h.write("impostor.flac", b"different audio");
    assert!(relocate(&h.store, r.file_id, &wrong)
        .await
        .is_err());
    assert!(wrong.exists());
}

#[tokio::test]
async fn collection_membership_is_part_of_the_transaction() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let (trip, _) = create_collection(&h.store, &embedder, "iceland-2019", Some("road trip"))
        .await
        .unwrap();

    let r = ingestor
        .ingest(IngestRequest {
            collection: Some("iceland-2019".into()),
            ..h.request(&h.write("glacier.jpg", b"ice"))
        })
        .await
        .unwrap();
    let members = h
        .store
        .traverse_edges(trip, Direction::Incoming, Some(EdgeType::InCollection))
        .await
        .unwrap();
    assert_eq!(members[0].1.id, r.file_id);

    let lost = h.write("lost.jpg", b"nowhere");
    let err = ingestor
        .ingest(IngestRequest {
            collection: Some("no-such-trip".into()),
            ..h.request(&lost)
        })
        .await
        .unwrap_err();
    assert!(matches!(catalog_error(&err), CatalogError::NodeNotFound(_)));
    assert!(lost.exists());
    assert!(h
        .store
        .find_node_by_unique_attr(UniqueAttr::Fingerprint(&fingerprint_bytes(b"nowhere")))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn directory_ingest_skips_duplicates() {
    let h = Harness::new(Layout::Fingerprint).await;
    let embedder = FoldEmbedder::default();
    let ingestor = Ingestor::new(&h.store, &embedder, &h.storage);

    let batch = h.inbox.join("batch");
    fs::create_dir_all(&batch).unwrap();
    fs::write(batch.join("1.txt"), b"one").unwrap();
    fs::write(batch.join("2.txt"), b"two").unwrap();
    fs::write(batch.join("3.txt"), b"one").unwrap();
    fs::write(batch.join(".DS_Store"), b"junk").unwrap();

    let report = ingestor
        .ingest_dir(&batch, &IngestRequest::default(), true)
        .await
        .unwrap();
    assert_eq!(report.ingested.len(), 2);
    assert_eq!(report.duplicates.len(), 1);
    assert_eq!(report.duplicates[0].0, batch.join("3.txt"));
    assert_eq!(report.duplicates[0].1, report.ingested[0].file_id);
    assert!(batch.join(".DS_Store").exists());
}
