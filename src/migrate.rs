//! Schema migrations.
//!
//! One `nodes` table owns identity; each node kind has an extension table
//! keyed by the same id. Triggers keep an extension row's kind consistent
//! with its node and make `nodes.kind` immutable. All statements are
//! idempotent.

use anyhow::Result;
use sqlx::SqlitePool;

use filebase_core::models::NodeKind;

const TABLES: &[&str] = &[
    r#"
    CREATE TABLE IF NOT EXISTS nodes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        kind TEXT NOT NULL CHECK (kind IN
            ('file', 'version_group', 'description', 'storage_device', 'collection')),
        inserted_ts INTEGER NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS files (
        id INTEGER PRIMARY KEY REFERENCES nodes(id),
        root_name TEXT NOT NULL,
        revision INTEGER NOT NULL CHECK (revision >= 1),
        fingerprint TEXT NOT NULL UNIQUE,
        extension TEXT NOT NULL,
        size INTEGER NOT NULL,
        created_ts INTEGER NOT NULL,
        layout TEXT NOT NULL DEFAULT 'fingerprint' CHECK (layout IN ('fingerprint', 'sharded')),
        metadata_json TEXT
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS version_groups (
        id INTEGER PRIMARY KEY REFERENCES nodes(id)
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS descriptions (
        id INTEGER PRIMARY KEY REFERENCES nodes(id),
        text TEXT NOT NULL UNIQUE,
        embedding BLOB NOT NULL,
        dims INTEGER NOT NULL,
        model TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS storage_devices (
        id INTEGER PRIMARY KEY REFERENCES nodes(id),
        name TEXT NOT NULL,
        capacity INTEGER NOT NULL,
        path TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS collections (
        id INTEGER PRIMARY KEY REFERENCES nodes(id),
        name TEXT NOT NULL UNIQUE
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS edges (
        source_id INTEGER NOT NULL REFERENCES nodes(id),
        target_id INTEGER NOT NULL REFERENCES nodes(id),
        edge_type TEXT NOT NULL,
        inserted_ts INTEGER NOT NULL,
        PRIMARY KEY (source_id, target_id, edge_type)
    )
    "#,
];

const INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_edges_source_type ON edges(source_id, edge_type)",
    "CREATE INDEX IF NOT EXISTS idx_edges_target_type ON edges(target_id, edge_type)",
    "CREATE INDEX IF NOT EXISTS idx_nodes_kind ON nodes(kind, id DESC)",
    "CREATE INDEX IF NOT EXISTS idx_files_root_name ON files(root_name)",
];

/// Columns added after a table's first release, as `(table, column, ddl)`.
const ADDED_COLUMNS: &[(&str, &str, &str)] = &[(
    "files",
    "layout",
    "ALTER TABLE files ADD COLUMN layout TEXT NOT NULL DEFAULT 'fingerprint' \
     CHECK (layout IN ('fingerprint', 'sharded'))",
)];

pub async fn run_migrations(pool: &SqlitePool) -> Result<()> {
    for ddl in TABLES.iter().chain(INDEXES) {
        sqlx::query(ddl).execute(pool).await?;
    }

    for &(table, column, ddl) in ADDED_COLUMNS {
        let present: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM pragma_table_info(?) WHERE name = ?")
                .bind(table)
                .bind(column)
                .fetch_one(pool)
                .await?;
        if present == 0 {
            sqlx::query(ddl).execute(pool).await?;
        }
    }

    for kind in NodeKind::ALL {
        let trigger = format!(
            r#"
            CREATE TRIGGER IF NOT EXISTS trg_{table}_kind
            BEFORE INSERT ON {table}
            WHEN (SELECT kind FROM nodes WHERE id = NEW.id) IS NOT '{kind}'
            BEGIN
                SELECT RAISE(ABORT, 'extension row kind mismatch: {table} requires {kind}');
            END
            "#,
            table = kind.table(),
            kind = kind.as_str(),
        );
        sqlx::query(&trigger).execute(pool).await?;
    }

    sqlx::query(
        r#"
        CREATE TRIGGER IF NOT EXISTS trg_nodes_kind_immutable
        BEFORE UPDATE OF kind ON nodes
        WHEN NEW.kind IS NOT OLD.kind
        BEGIN
            SELECT RAISE(ABORT, 'node kind is immutable');
        END
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}
