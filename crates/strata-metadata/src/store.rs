//! The metadata store trait and its SQLite implementation.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use strata_types::Layer;

use crate::error::{MetadataError, Result};
use crate::records::{Checkpoint, GoldDatasetMeta, PartitionRecord, QualityResult, SchemaRecord, TokenMapping};

/// Persistent pipeline state kept apart from partition bytes.
///
/// Every write is a single-record upsert or append; implementations serialise
/// their writes internally so the store can be shared across threads.
pub trait MetadataStore: Send + Sync {
    /// Records `checkpoint` unless the stored offset is already at or past it.
    /// Returns true if the checkpoint advanced.
    fn commit_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool>;

    fn checkpoint(&self, topic: &str, partition: i32) -> Result<Option<i64>>;

    /// All checkpoints ordered by topic then partition.
    fn checkpoints(&self) -> Result<Vec<Checkpoint>>;

    /// Inserts the schema unless (event_type, version) is already registered.
    fn register_schema(&self, record: SchemaRecord) -> Result<bool>;

    /// Registered schemas, newest first.
    fn schemas(&self, event_type: Option<&str>) -> Result<Vec<SchemaRecord>>;

    fn record_partition(&self, record: PartitionRecord) -> Result<()>;

    /// Partition records in write order.
    fn partitions(&self, layer: Option<Layer>, event_type: Option<&str>) -> Result<Vec<PartitionRecord>>;

    /// Partitions whose `source_partition` is `source`, in write order.
    fn derived_partitions(&self, source: &str) -> Result<Vec<PartitionRecord>>;

    fn record_quality(&self, result: QualityResult) -> Result<()>;

    /// Quality results, newest first, at most `limit`.
    fn quality_results(&self, event_type: Option<&str>, limit: usize) -> Result<Vec<QualityResult>>;

    /// Bronze partition paths that already have a quality result.
    fn processed_partition_paths(&self) -> Result<HashSet<String>>;

    /// Inserts mappings for tokens not yet stored. Returns the number inserted.
    fn save_token_mappings(&self, mappings: &[TokenMapping]) -> Result<usize>;

    fn token_mapping(&self, token: &str) -> Result<Option<TokenMapping>>;

    fn upsert_gold_meta(&self, meta: GoldDatasetMeta) -> Result<()>;

    fn gold_meta(&self, dataset: &str) -> Result<Option<GoldDatasetMeta>>;

    fn gold_metas(&self) -> Result<Vec<GoldDatasetMeta>>;
}

// ============================================================================
// SQLite store
// ============================================================================

/// File name of the database inside a metadata directory.
pub const DATABASE_FILE: &str = "strata.db";

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS checkpoints (
    topic TEXT NOT NULL,
    partition_id INTEGER NOT NULL,
    committed_offset INTEGER NOT NULL,
    updated_at TEXT NOT NULL,
    PRIMARY KEY (topic, partition_id)
);
CREATE TABLE IF NOT EXISTS schemas (
    event_type TEXT NOT NULL,
    version TEXT NOT NULL,
    definition TEXT NOT NULL,
    registered_at TEXT NOT NULL,
    PRIMARY KEY (event_type, version)
);
CREATE TABLE IF NOT EXISTS partitions (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    layer TEXT NOT NULL,
    event_type TEXT NOT NULL,
    path TEXT NOT NULL,
    date_start TEXT NOT NULL,
    date_end TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    size_bytes INTEGER NOT NULL,
    schema_version TEXT NOT NULL,
    source_partition TEXT,
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS partitions_by_source ON partitions (source_partition);
CREATE TABLE IF NOT EXISTS quality_results (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    partition_path TEXT NOT NULL,
    event_type TEXT NOT NULL,
    total INTEGER NOT NULL,
    passed INTEGER NOT NULL,
    rejected INTEGER NOT NULL,
    duplicates_removed INTEGER NOT NULL,
    warnings INTEGER NOT NULL,
    details TEXT NOT NULL,
    processed_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS quality_results_by_path ON quality_results (partition_path);
CREATE TABLE IF NOT EXISTS token_mappings (
    token TEXT PRIMARY KEY,
    field TEXT NOT NULL,
    encrypted TEXT NOT NULL,
    created_at TEXT NOT NULL
);
CREATE TABLE IF NOT EXISTS gold_datasets (
    dataset TEXT PRIMARY KEY,
    description TEXT NOT NULL,
    grain TEXT NOT NULL,
    refresh_schedule TEXT NOT NULL,
    record_count INTEGER NOT NULL,
    last_refreshed_at TEXT,
    freshness_seconds INTEGER
);
";

const PARTITION_COLUMNS: &str = "layer, event_type, path, date_start, date_end, record_count, size_bytes, \
                                 schema_version, source_partition, created_at";

const QUALITY_COLUMNS: &str =
    "partition_path, event_type, total, passed, rejected, duplicates_removed, warnings, details, processed_at";

const GOLD_COLUMNS: &str =
    "dataset, description, grain, refresh_schedule, record_count, last_refreshed_at, freshness_seconds";

/// Metadata kept in one SQLite database, on disk or in memory.
///
/// A single connection serves every call; writes that touch several rows run
/// in one transaction.
pub struct SqliteMetadataStore {
    path: Option<PathBuf>,
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteMetadataStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteMetadataStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteMetadataStore {
    /// Opens (creating if needed) the database file at `path`.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| MetadataError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let conn = Connection::open(&path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Self::init(conn, Some(path))
    }

    /// Opens `dir/strata.db`.
    pub fn open_in_dir(dir: impl AsRef<Path>) -> Result<Self> {
        Self::open(dir.as_ref().join(DATABASE_FILE))
    }

    /// A store that never touches disk.
    pub fn in_memory() -> Result<Self> {
        Self::init(Connection::open_in_memory()?, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.execute_batch(SCHEMA)?;
        tracing::debug!(path = ?path, "metadata store opened");
        Ok(Self {
            path,
            conn: Mutex::new(conn),
        })
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl MetadataStore for SqliteMetadataStore {
    fn commit_checkpoint(&self, checkpoint: Checkpoint) -> Result<bool> {
        let changed = self.conn().execute(
            "INSERT INTO checkpoints (topic, partition_id, committed_offset, updated_at)
             VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT (topic, partition_id) DO UPDATE
             SET committed_offset = excluded.committed_offset, updated_at = excluded.updated_at
             WHERE excluded.committed_offset > checkpoints.committed_offset",
            params![checkpoint.topic, checkpoint.partition, checkpoint.offset, checkpoint.updated_at],
        )?;
        let advanced = changed > 0;
        if advanced {
            tracing::info!(
                topic = %checkpoint.topic,
                partition = checkpoint.partition,
                offset = checkpoint.offset,
                "checkpoint committed"
            );
        }
        Ok(advanced)
    }

    fn checkpoint(&self, topic: &str, partition: i32) -> Result<Option<i64>> {
        let offset: Option<i64> = self
            .conn()
            .query_row(
                "SELECT committed_offset FROM checkpoints WHERE topic = ?1 AND partition_id = ?2",
                params![topic, partition],
                |row| row.get(0),
            )
            .optional()?;
        Ok(offset)
    }

    fn checkpoints(&self) -> Result<Vec<Checkpoint>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT topic, partition_id, committed_offset, updated_at FROM checkpoints
             ORDER BY topic, partition_id",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(Checkpoint {
                topic: row.get(0)?,
                partition: row.get(1)?,
                offset: row.get(2)?,
                updated_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn register_schema(&self, record: SchemaRecord) -> Result<bool> {
        let inserted = self.conn().execute(
            "INSERT OR IGNORE INTO schemas (event_type, version, definition, registered_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![record.event_type, record.version, record.definition, record.registered_at],
        )? > 0;
        if inserted {
            tracing::info!(event_type = %record.event_type, version = %record.version, "schema registered");
        }
        Ok(inserted)
    }

    fn schemas(&self, event_type: Option<&str>) -> Result<Vec<SchemaRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT event_type, version, definition, registered_at FROM schemas
             WHERE ?1 IS NULL OR event_type = ?1
             ORDER BY rowid DESC",
        )?;
        let rows = stmt.query_map(params![event_type], |row| {
            Ok(SchemaRecord {
                event_type: row.get(0)?,
                version: row.get(1)?,
                definition: row.get(2)?,
                registered_at: row.get(3)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn record_partition(&self, record: PartitionRecord) -> Result<()> {
        self.conn().execute(
            &format!("INSERT INTO partitions ({PARTITION_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"),
            params![
                record.layer.as_str(),
                record.event_type,
                record.path,
                record.date_start,
                record.date_end,
                record.record_count,
                record.size_bytes,
                record.schema_version,
                record.source_partition,
                record.created_at,
            ],
        )?;
        Ok(())
    }

    fn partitions(&self, layer: Option<Layer>, event_type: Option<&str>) -> Result<Vec<PartitionRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PARTITION_COLUMNS} FROM partitions
             WHERE (?1 IS NULL OR layer = ?1) AND (?2 IS NULL OR event_type = ?2)
             ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![layer.map(Layer::as_str), event_type], partition_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn derived_partitions(&self, source: &str) -> Result<Vec<PartitionRecord>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {PARTITION_COLUMNS} FROM partitions WHERE source_partition = ?1 ORDER BY id"
        ))?;
        let rows = stmt.query_map(params![source], partition_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn record_quality(&self, result: QualityResult) -> Result<()> {
        self.conn().execute(
            &format!("INSERT INTO quality_results ({QUALITY_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"),
            params![
                result.partition_path,
                result.event_type,
                result.total,
                result.passed,
                result.rejected,
                result.duplicates_removed,
                result.warnings,
                result.details,
                result.processed_at,
            ],
        )?;
        Ok(())
    }

    fn quality_results(&self, event_type: Option<&str>, limit: usize) -> Result<Vec<QualityResult>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!(
            "SELECT {QUALITY_COLUMNS} FROM quality_results
             WHERE ?1 IS NULL OR event_type = ?1
             ORDER BY id DESC LIMIT ?2"
        ))?;
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        let rows = stmt.query_map(params![event_type, limit], |row| {
            Ok(QualityResult {
                partition_path: row.get(0)?,
                event_type: row.get(1)?,
                total: row.get(2)?,
                passed: row.get(3)?,
                rejected: row.get(4)?,
                duplicates_removed: row.get(5)?,
                warnings: row.get(6)?,
                details: row.get(7)?,
                processed_at: row.get(8)?,
            })
        })?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn processed_partition_paths(&self) -> Result<HashSet<String>> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT DISTINCT partition_path FROM quality_results")?;
        let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }

    fn save_token_mappings(&self, mappings: &[TokenMapping]) -> Result<usize> {
        if mappings.is_empty() {
            return Ok(0);
        }
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare_cached(
                "INSERT OR IGNORE INTO token_mappings (token, field, encrypted, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
            )?;
            for m in mappings {
                inserted += stmt.execute(params![m.token, m.field, m.encrypted, m.created_at])?;
            }
        }
        tx.commit()?;
        Ok(inserted)
    }

    fn token_mapping(&self, token: &str) -> Result<Option<TokenMapping>> {
        let mapping = self
            .conn()
            .query_row(
                "SELECT token, field, encrypted, created_at FROM token_mappings WHERE token = ?1",
                params![token],
                |row| {
                    Ok(TokenMapping {
                        token: row.get(0)?,
                        field: row.get(1)?,
                        encrypted: row.get(2)?,
                        created_at: row.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(mapping)
    }

    fn upsert_gold_meta(&self, meta: GoldDatasetMeta) -> Result<()> {
        self.conn().execute(
            &format!(
                "INSERT INTO gold_datasets ({GOLD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                 ON CONFLICT (dataset) DO UPDATE SET
                     description = excluded.description,
                     grain = excluded.grain,
                     refresh_schedule = excluded.refresh_schedule,
                     record_count = excluded.record_count,
                     last_refreshed_at = excluded.last_refreshed_at,
                     freshness_seconds = excluded.freshness_seconds"
            ),
            params![
                meta.dataset,
                meta.description,
                meta.grain,
                meta.refresh_schedule,
                meta.record_count,
                meta.last_refreshed_at,
                meta.freshness_seconds,
            ],
        )?;
        Ok(())
    }

    fn gold_meta(&self, dataset: &str) -> Result<Option<GoldDatasetMeta>> {
        let meta = self
            .conn()
            .query_row(
                &format!("SELECT {GOLD_COLUMNS} FROM gold_datasets WHERE dataset = ?1"),
                params![dataset],
                gold_row,
            )
            .optional()?;
        Ok(meta)
    }

    fn gold_metas(&self) -> Result<Vec<GoldDatasetMeta>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(&format!("SELECT {GOLD_COLUMNS} FROM gold_datasets ORDER BY dataset"))?;
        let rows = stmt.query_map([], gold_row)?;
        Ok(rows.collect::<rusqlite::Result<_>>()?)
    }
}

fn partition_row(row: &Row<'_>) -> rusqlite::Result<PartitionRecord> {
    let layer: String = row.get(0)?;
    let layer = layer
        .parse::<Layer>()
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
    Ok(PartitionRecord {
        layer,
        event_type: row.get(1)?,
        path: row.get(2)?,
        date_start: row.get(3)?,
        date_end: row.get(4)?,
        record_count: row.get(5)?,
        size_bytes: row.get(6)?,
        schema_version: row.get(7)?,
        source_partition: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn gold_row(row: &Row<'_>) -> rusqlite::Result<GoldDatasetMeta> {
    Ok(GoldDatasetMeta {
        dataset: row.get(0)?,
        description: row.get(1)?,
        grain: row.get(2)?,
        refresh_schedule: row.get(3)?,
        record_count: row.get(4)?,
        last_refreshed_at: row.get(5)?,
        freshness_seconds: row.get(6)?,
    })
}
