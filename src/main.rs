//! # Filebase CLI (`fb`)
//!
//! The `fb` binary is the interface to the catalog: ingesting files,
//! semantic search over descriptions, and inspection/maintenance commands.
//!
//! ## Usage
//!
//! ```bash
//! fb --config ./config/fb.toml <command>
//! ```
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `fb init` | Create the schema and register the intake device |
//! | `fb ingest <path>` | Catalog a file (or every file in a directory) |
//! | `fb search "<text>"` | Rank descriptions by similarity to the text |
//! | `fb get <id>` | Print a node with its edges |
//! | `fb recent` | List recently inserted nodes |
//! | `fb describe <id> "<text>"` | Attach a description to a file or collection |
//! | `fb relate <src> <tgt> <type>` | Record a derivation edge between files |
//! | `fb collection create <name>` | Create a collection |
//! | `fb device add` / `fb device list` | Manage storage devices |
//! | `fb checkout <id>` | Copy a revision out under its versioned filename |
//! | `fb relocate <id> <path>` | Finish the physical move of a committed file |
//! | `fb stats` | Node and edge counts |
//! | `fb export <dir>` | Dump the catalog as JSON |
//!
//! ## Exit codes
//!
//! Catalog errors exit with a code per kind (10 = duplicate content,
//! 14 = unknown predecessor, ... see `CatalogError::exit_code`). Any other
//! failure exits with 1.

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use filebase::ingest::{parse_created_ts, parse_metadata, IngestRequest};
use filebase::{catalog, checkout, config, export, get, ingest, search, stats};
use filebase_core::models::{EdgeType, NodeId, NodeKind};
use filebase_core::search::KindFilter;
use filebase_core::CatalogError;

/// Filebase — a personal content-addressable file catalog.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file. See `config/fb.example.toml` for a full example.
#[derive(Parser)]
#[command(
    name = "fb",
    about = "Filebase — a personal content-addressable file catalog",
    version,
    long_about = "Filebase catalogs files by content hash, tracks revisions of the same \
    logical file across edits, and attaches free-text descriptions with embeddings \
    for semantic search."
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/fb.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize the database schema and the intake storage device.
    ///
    /// Idempotent — running it multiple times is safe.
    Init,

    /// Catalog a file, or every non-hidden file directly inside a directory.
    ///
    /// A filename of the form `<root>-v<N>-<sha256>.<ext>` is ingested as the
    /// next revision of the file with that fingerprint.
    Ingest {
        path: PathBuf,

        /// Free-text description to embed and attach.
        #[arg(long)]
        description: Option<String>,

        /// Content creation time (RFC 3339 or YYYY-MM-DD). Defaults to the
        /// earlier of the file's birth and modification times.
        #[arg(long)]
        created_ts: Option<String>,

        /// Add the file to this existing collection.
        #[arg(long)]
        collection: Option<String>,

        /// Extra metadata as KEY=VALUE; repeatable.
        #[arg(long = "meta")]
        meta: Vec<String>,

        /// Show what would be ingested without writing anything.
        #[arg(long)]
        dry_run: bool,
    },

    /// Search descriptions by semantic similarity.
    Search {
        query: String,

        /// Restrict to descriptions of `file`s, `collection`s, or `all`.
        #[arg(long, default_value = "all")]
        kind: KindFilter,

        /// Number of results (defaults to `search.top_k`).
        #[arg(long)]
        top: Option<usize>,
    },

    /// Print a node with its outgoing and incoming edges.
    Get { id: NodeId },

    /// List the most recently inserted nodes.
    Recent {
        #[arg(long)]
        kind: Option<NodeKind>,

        #[arg(long, default_value_t = 20)]
        limit: i64,
    },

    /// Attach a description to an existing file or collection.
    Describe { id: NodeId, text: String },

    /// Record a derivation edge: `camera_jpeg`, `proxy_of` or `crop_of`.
    Relate {
        source: NodeId,
        target: NodeId,
        edge_type: EdgeType,
    },

    /// Manage collections.
    Collection {
        #[command(subcommand)]
        action: CollectionAction,
    },

    /// Manage storage devices.
    Device {
        #[command(subcommand)]
        action: DeviceAction,
    },

    /// Copy a stored revision out for editing, named so that re-ingesting
    /// the edited copy records it as the next revision.
    Checkout {
        id: NodeId,

        /// Destination directory (defaults to the current directory).
        #[arg(long)]
        dest: Option<PathBuf>,
    },

    /// Move a committed file's content into place after an interrupted ingest.
    Relocate { id: NodeId, source: PathBuf },

    /// Show node and edge counts.
    Stats,

    /// Export every node as JSON plus an edge list.
    Export { dir: PathBuf },
}

#[derive(Subcommand)]
enum CollectionAction {
    /// Create a named collection.
    Create {
        name: String,

        #[arg(long)]
        description: Option<String>,
    },
}

#[derive(Subcommand)]
enum DeviceAction {
    /// Register a storage device.
    Add {
        #[arg(long)]
        name: String,

        /// Capacity in bytes.
        #[arg(long, default_value_t = 0)]
        capacity: u64,

        #[arg(long)]
        path: String,
    },
    /// List storage devices.
    List,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("Error: {:#}", err);
            let catalog_err = err
                .chain()
                .find_map(|cause| cause.downcast_ref::<CatalogError>());
            if catalog_err.is_some_and(CatalogError::is_retryable) {
                eprintln!("Nothing was committed; the command can be retried.");
            }
            ExitCode::from(catalog_err.map_or(1, CatalogError::exit_code))
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            catalog::run_init(&cfg).await?;
        }
        Commands::Ingest {
            path,
            description,
            created_ts,
            collection,
            meta,
            dry_run,
        } => {
            let request = IngestRequest {
                path,
                description,
                created_ts: created_ts.as_deref().map(parse_created_ts).transpose()?,
                collection,
                metadata: parse_metadata(&meta)?,
            };
            ingest::run_ingest(&cfg, request, dry_run).await?;
        }
        Commands::Search { query, kind, top } => {
            search::run_search(&cfg, &query, kind, top).await?;
        }
        Commands::Get { id } => {
            get::run_get(&cfg, id).await?;
        }
        Commands::Recent { kind, limit } => {
            get::run_recent(&cfg, kind, limit).await?;
        }
        Commands::Describe { id, text } => {
            catalog::run_describe(&cfg, id, &text).await?;
        }
        Commands::Relate {
            source,
            target,
            edge_type,
        } => {
            catalog::run_relate(&cfg, source, target, edge_type).await?;
        }
        Commands::Collection {
            action: CollectionAction::Create { name, description },
        } => {
            catalog::run_collection_create(&cfg, &name, description.as_deref()).await?;
        }
        Commands::Device { action } => match action {
            DeviceAction::Add {
                name,
                capacity,
                path,
            } => catalog::run_device_add(&cfg, &name, capacity, &path).await?,
            DeviceAction::List => catalog::run_device_list(&cfg).await?,
        },
        Commands::Checkout { id, dest } => {
            checkout::run_checkout(&cfg, id, dest.as_deref()).await?;
        }
        Commands::Relocate { id, source } => {
            checkout::run_relocate(&cfg, id, &source).await?;
        }
        Commands::Stats => {
            stats::run_stats(&cfg).await?;
        }
        Commands::Export { dir } => {
            export::run_export(&cfg, &dir).await?;
        }
    }

    Ok(())
}
